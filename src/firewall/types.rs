use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Outbound => "Outbound",
            Self::Inbound => "Inbound",
        }
    }

    pub fn netsh_arg(self) -> &'static str {
        match self {
            Self::Outbound => "out",
            Self::Inbound => "in",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Udp,
    Tcp,
    Any,
}

impl Protocol {
    pub fn label(self) -> &'static str {
        match self {
            Self::Udp => "UDP",
            Self::Tcp => "TCP",
            Self::Any => "Any",
        }
    }

    pub fn netsh_arg(self) -> &'static str {
        match self {
            Self::Udp => "udp",
            Self::Tcp => "tcp",
            Self::Any => "any",
        }
    }

    /// Only UDP and TCP rules carry a remote port restriction.
    pub fn has_ports(self) -> bool {
        !matches!(self, Self::Any)
    }
}

/// One of the six block rules, identified by direction and protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSlot {
    pub direction: Direction,
    pub protocol: Protocol,
}

impl RuleSlot {
    const fn new(direction: Direction, protocol: Protocol) -> Self {
        Self {
            direction,
            protocol,
        }
    }

    pub fn rule_name(&self, base: &str) -> String {
        format!(
            "{base}-{}-{}",
            self.direction.label(),
            self.protocol.label()
        )
    }
}

pub const RULE_SLOTS: [RuleSlot; 6] = [
    RuleSlot::new(Direction::Outbound, Protocol::Udp),
    RuleSlot::new(Direction::Inbound, Protocol::Udp),
    RuleSlot::new(Direction::Outbound, Protocol::Tcp),
    RuleSlot::new(Direction::Inbound, Protocol::Tcp),
    RuleSlot::new(Direction::Outbound, Protocol::Any),
    RuleSlot::new(Direction::Inbound, Protocol::Any),
];

/// Inclusive remote port range, written `start-end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

pub const DEFAULT_RELAY_PORTS: PortRange = PortRange {
    start: 27015,
    end: 27068,
};

impl Default for PortRange {
    fn default() -> Self {
        DEFAULT_RELAY_PORTS
    }
}

impl Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid port range '{0}', expected <start>-<end> with start <= end")]
pub struct InvalidPortRange(String);

impl FromStr for PortRange {
    type Err = InvalidPortRange;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPortRange(s.to_string());
        let (start, end) = s.trim().split_once('-').ok_or_else(invalid)?;
        let start: u16 = start.trim().parse().map_err(|_| invalid())?;
        let end: u16 = end.trim().parse().map_err(|_| invalid())?;
        if start > end {
            return Err(invalid());
        }
        Ok(Self { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::{PortRange, RULE_SLOTS};

    #[test]
    fn rule_names() {
        let names: Vec<String> = RULE_SLOTS
            .iter()
            .map(|slot| slot.rule_name("SteamRelayBlock"))
            .collect();
        assert_eq!(
            names,
            [
                "SteamRelayBlock-Outbound-UDP",
                "SteamRelayBlock-Inbound-UDP",
                "SteamRelayBlock-Outbound-TCP",
                "SteamRelayBlock-Inbound-TCP",
                "SteamRelayBlock-Outbound-Any",
                "SteamRelayBlock-Inbound-Any",
            ]
        );
    }

    #[test]
    fn port_ranges() {
        assert_eq!(PortRange::default().to_string(), "27015-27068");
        assert_eq!(
            "1000 - 2000".parse::<PortRange>(),
            Ok(PortRange {
                start: 1000,
                end: 2000
            })
        );
        assert!("2000-1000".parse::<PortRange>().is_err());
        assert!("27015".parse::<PortRange>().is_err());
        assert!("a-b".parse::<PortRange>().is_err());
    }
}
