//! In-memory stand-in for `netsh advfirewall firewall` used by tests.

use std::collections::BTreeMap;
use std::io;
use std::sync::Mutex;

use super::command::{CommandExecutor, CommandOutput};

const NO_MATCH: &str = "\r\nNo rules match the specified criteria.\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FakeRule {
    pub direction: String,
    pub protocol: String,
    pub remote_ips: String,
    pub remote_ports: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    rules: BTreeMap<String, FakeRule>,
    fail_on_add: Option<String>,
    calls: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeNetsh {
    state: Mutex<State>,
    unavailable: bool,
}

impl FakeNetsh {
    pub fn failing_on(rule: &str) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().fail_on_add = Some(rule.to_string());
        fake
    }

    /// Every invocation fails to spawn, as if `netsh` were missing.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    pub fn clear_failure(&self) {
        self.state.lock().unwrap().fail_on_add = None;
    }

    pub fn insert_rule(&self, name: &str, remote_ips: &str) {
        self.state.lock().unwrap().rules.insert(
            name.to_string(),
            FakeRule {
                direction: String::from("out"),
                protocol: String::from("any"),
                remote_ips: remote_ips.to_string(),
                remote_ports: None,
            },
        );
    }

    pub fn rules(&self) -> BTreeMap<String, FakeRule> {
        self.state.lock().unwrap().rules.clone()
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().calls.clone()
    }

    fn handle(&self, args: &[String]) -> CommandOutput {
        let mut state = self.state.lock().unwrap();
        state.calls.push(args.to_vec());

        let verb = args.get(2).map(String::as_str).unwrap_or_default();
        let params: BTreeMap<&str, &str> = args
            .iter()
            .skip(4)
            .filter_map(|arg| arg.split_once('='))
            .collect();
        let name = params.get("name").copied().unwrap_or_default().to_string();

        match verb {
            "show" => match state.rules.get(&name) {
                Some(rule) => ok(render(&name, rule)),
                None => failed(NO_MATCH),
            },
            "delete" => match state.rules.remove(&name) {
                Some(_) => ok(String::from("\r\nDeleted 1 rule(s).\r\nOk.\r\n")),
                None => failed(NO_MATCH),
            },
            "add" => {
                if state.fail_on_add.as_deref() == Some(name.as_str()) {
                    return failed("An error occurred while creating the rule.\r\n");
                }
                let rule = FakeRule {
                    direction: params.get("dir").copied().unwrap_or_default().to_string(),
                    protocol: params.get("protocol").copied().unwrap_or_default().to_string(),
                    remote_ips: params.get("remoteip").copied().unwrap_or_default().to_string(),
                    remote_ports: params.get("remoteport").map(|p| p.to_string()),
                };
                state.rules.insert(name, rule);
                ok(String::from("Ok.\r\n"))
            }
            _ => failed("The following command was not found.\r\n"),
        }
    }
}

impl CommandExecutor for FakeNetsh {
    async fn execute(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        if self.unavailable || program != "netsh" {
            return Err(io::Error::new(io::ErrorKind::NotFound, "program not found"));
        }
        Ok(self.handle(args))
    }
}

fn ok(stdout: String) -> CommandOutput {
    CommandOutput {
        stdout,
        stderr: String::new(),
        success: true,
        code: Some(0),
    }
}

fn failed(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        success: false,
        code: Some(1),
    }
}

fn render(name: &str, rule: &FakeRule) -> String {
    let remote_ips = rule
        .remote_ips
        .split(',')
        .map(|ip| format!("{ip}/32"))
        .collect::<Vec<_>>()
        .join(",");
    let direction = if rule.direction == "in" { "In" } else { "Out" };
    format!(
        "\r\nRule Name:                            {name}\r\n\
         ----------------------------------------------------------------------\r\n\
         Enabled:                              Yes\r\n\
         Direction:                            {direction}\r\n\
         Profiles:                             Domain,Private,Public\r\n\
         LocalIP:                              Any\r\n\
         RemoteIP:                             {remote_ips}\r\n\
         Protocol:                             {}\r\n\
         RemotePort:                           {}\r\n\
         Action:                               Block\r\n\
         Ok.\r\n",
        rule.protocol.to_uppercase(),
        rule.remote_ports.as_deref().unwrap_or("Any"),
    )
}
