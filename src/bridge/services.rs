use std::io;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;

use crate::error::BridgeError;

pub const SYSTEMCTL: &str = "systemctl";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceUnit {
    pub unit: String,
    pub load: String,
    pub active: String,
    pub sub: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCommand {
    Start,
    Stop,
    Restart,
}

impl ServiceCommand {
    pub fn verb(self) -> &'static str {
        match self {
            ServiceCommand::Start => "start",
            ServiceCommand::Stop => "stop",
            ServiceCommand::Restart => "restart",
        }
    }
}

/// Parses `list-units --no-legend` output. Lines with fewer than five
/// columns are skipped.
pub fn parse_units(output: &str) -> Vec<ServiceUnit> {
    output
        .lines()
        .filter_map(|line| {
            // Failed units are prefixed with a status bullet.
            let line = line.trim().trim_start_matches('●').trim_start();
            let mut rest = line;
            let mut fields = [""; 4];
            for field in &mut fields {
                let (head, tail) = rest.split_once(char::is_whitespace)?;
                *field = head;
                rest = tail.trim_start();
            }
            let description = rest.trim_end();
            if description.is_empty() {
                return None;
            }
            let [unit, load, active, sub] = fields;
            Some(ServiceUnit {
                unit: unit.to_string(),
                load: load.to_string(),
                active: active.to_string(),
                sub: sub.to_string(),
                description: description.to_string(),
            })
        })
        .collect()
}

/// Drives the service manager through its command-line client.
pub struct ServiceManager {
    program: String,
    timeout: Duration,
}

impl ServiceManager {
    pub fn new(timeout: Duration) -> Self {
        Self::with_program(SYSTEMCTL, timeout)
    }

    pub fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        ServiceManager {
            program: program.into(),
            timeout,
        }
    }

    pub async fn list(&self) -> Result<Vec<ServiceUnit>, BridgeError> {
        let output = self
            .run(&[
                "list-units",
                "--type=service",
                "--all",
                "--no-legend",
                "--no-pager",
            ])
            .await?;
        Ok(parse_units(&output))
    }

    pub async fn control(&self, command: ServiceCommand, unit: &str) -> Result<(), BridgeError> {
        let unit = unit.trim();
        if unit.is_empty() || unit.starts_with('-') {
            return Err(BridgeError::Rejected(format!("`{unit}` is not a unit name")));
        }
        self.run(&[command.verb(), unit]).await?;
        tracing::info!(unit, command = command.verb(), "service command completed");
        Ok(())
    }

    async fn run(&self, args: &[&str]) -> Result<String, BridgeError> {
        let rendered = format!("{} {}", self.program, args.join(" "));
        let child = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) if err.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(program = %self.program, "service manager not installed");
                return Err(BridgeError::Unavailable("service manager"));
            }
            Ok(Err(err)) => return Err(BridgeError::Io(err)),
            Err(_) => {
                tracing::warn!(command = %rendered, "service command timed out");
                return Err(BridgeError::TimedOut {
                    command: rendered,
                    millis: self.timeout.as_millis() as u64,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let message = match stderr.trim() {
                "" => stdout.trim().to_string(),
                text => text.to_string(),
            };
            tracing::warn!(command = %rendered, %message, "service command failed");
            return Err(BridgeError::CommandFailed {
                command: rendered,
                message,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
