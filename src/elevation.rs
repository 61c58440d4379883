//! Firewall changes need an elevated process. When the current one is not,
//! it is started again through UAC with the same arguments and waited on.
//! The elevated copy gets its own console window, so only its exit status
//! comes back here.

use std::path::Path;

use anyhow::bail;
use tracing::{info, instrument, warn};

use crate::firewall::CommandExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elevation {
    /// Already running with administrator rights.
    Elevated,
    /// An elevated copy ran to completion and succeeded; this process
    /// should exit.
    Relaunched,
}

/// `net session` only succeeds for administrators.
pub async fn is_elevated<E: CommandExecutor>(executor: &E) -> bool {
    match executor.execute("net", &[String::from("session")]).await {
        Ok(output) => output.success,
        Err(err) => {
            warn!(msg = "Could not determine privileges", ?err);
            false
        }
    }
}

#[instrument(skip(executor, args))]
pub async fn ensure_elevated<E: CommandExecutor>(
    executor: &E,
    exe: &Path,
    args: &[String],
) -> Result<Elevation, anyhow::Error> {
    if is_elevated(executor).await {
        return Ok(Elevation::Elevated);
    }

    info!("Administrator rights required, relaunching elevated");
    let output = executor
        .execute("powershell", &relaunch_args(exe, args))
        .await?;
    if !output.success {
        bail!("elevated run failed: {}", output.error_message());
    }
    info!("Elevated run finished");
    Ok(Elevation::Relaunched)
}

fn relaunch_args(exe: &Path, args: &[String]) -> Vec<String> {
    let mut command = format!(
        "$p = Start-Process -FilePath {} -Verb RunAs -Wait -PassThru",
        ps_quote(&exe.to_string_lossy())
    );
    if !args.is_empty() {
        let list = args
            .iter()
            .map(|arg| {
                if arg.contains(' ') {
                    ps_quote(&format!("\"{arg}\""))
                } else {
                    ps_quote(arg)
                }
            })
            .collect::<Vec<_>>()
            .join(",");
        command.push_str(" -ArgumentList ");
        command.push_str(&list);
    }
    command.push_str("; exit $p.ExitCode");

    vec![
        String::from("-NoProfile"),
        String::from("-NonInteractive"),
        String::from("-Command"),
        command,
    ]
}

fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
