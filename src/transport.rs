//! Host collaborators the router hands messages to.
//!
//! The router only sees the traits. The `Command*` implementations shell out
//! to programs named in the configuration: a modem or gateway CLI for direct
//! SMS and a desktop opener for links.

use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::process::Command;

use crate::error::TransportError;

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, number: &str, body: &str) -> Result<(), TransportError>;

    /// Send `parts` in order. Implementations that cannot send them as one
    /// unit must report a failure after the first part as
    /// [`TransportError::PartialSend`] so callers know what already went out.
    async fn send_multipart(&self, number: &str, parts: &[String]) -> Result<(), TransportError>;
}

#[async_trait]
pub trait LinkLauncher: Send + Sync {
    fn can_resolve(&self, url: &str) -> bool;

    async fn open(&self, url: &str) -> Result<(), TransportError>;
}

/// Whether the bridge may send SMS without user interaction.
pub trait SmsPermission: Send + Sync {
    fn is_granted(&self) -> bool;

    /// Ask for the capability. Never blocks on the answer.
    fn request(&self);
}

/// Split a configured command line into program and leading arguments.
fn split_command(line: &str) -> Option<(String, Vec<String>)> {
    let mut words = line.split_whitespace().map(str::to_string);
    let program = words.next()?;
    Some((program, words.collect()))
}

async fn run(program: &str, args: &[String], extra: &[&str]) -> Result<(), TransportError> {
    debug!("Running {} {:?} {:?}", program, args, extra);
    let status = Command::new(program)
        .args(args)
        .args(extra)
        .status()
        .await
        .map_err(|source| TransportError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(TransportError::Failed {
            program: program.to_string(),
            status,
        })
    }
}

/// Sends SMS by running `<command> <number> <body>` once per segment.
pub struct CommandSmsSender {
    program: String,
    args: Vec<String>,
}

impl CommandSmsSender {
    pub fn from_command_line(line: &str) -> Option<Self> {
        let (program, args) = split_command(line)?;
        Some(Self { program, args })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl SmsSender for CommandSmsSender {
    async fn send(&self, number: &str, body: &str) -> Result<(), TransportError> {
        run(&self.program, &self.args, &[number, body]).await
    }

    async fn send_multipart(&self, number: &str, parts: &[String]) -> Result<(), TransportError> {
        for (index, part) in parts.iter().enumerate() {
            debug!("Sending part {}/{} to {}", index + 1, parts.len(), number);
            if let Err(e) = run(&self.program, &self.args, &[number, part]).await {
                if index == 0 {
                    return Err(e);
                }
                return Err(TransportError::PartialSend {
                    sent: index,
                    total: parts.len(),
                    source: Box::new(e),
                });
            }
        }
        Ok(())
    }
}

/// Stand-in sender used when no SMS command is configured. Every attempt
/// fails so the router falls back to the compose screen.
pub struct NoSmsSender;

#[async_trait]
impl SmsSender for NoSmsSender {
    async fn send(&self, _number: &str, _body: &str) -> Result<(), TransportError> {
        Err(TransportError::Other("no SMS command configured".to_string()))
    }

    async fn send_multipart(&self, _number: &str, _parts: &[String]) -> Result<(), TransportError> {
        Err(TransportError::Other("no SMS command configured".to_string()))
    }
}

pub const DEFAULT_SCHEMES: &[&str] = &["https", "http", "sms", "smsto"];

/// Opens links with a desktop opener such as `xdg-open`. The opener is
/// looked up on `PATH` once, when the launcher is built.
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
    resolved: Option<PathBuf>,
}

impl CommandLauncher {
    pub fn new(command_line: &str) -> Option<Self> {
        let (program, args) = split_command(command_line)?;
        let resolved = which::which(&program).ok();
        if resolved.is_none() {
            warn!("Opener {} not found on PATH", program);
        }
        Some(Self {
            program,
            args,
            resolved,
        })
    }

    fn handles_scheme(url: &str) -> bool {
        match url.split_once(':') {
            Some((scheme, _)) => DEFAULT_SCHEMES
                .iter()
                .any(|s| s.eq_ignore_ascii_case(scheme)),
            None => false,
        }
    }
}

#[async_trait]
impl LinkLauncher for CommandLauncher {
    fn can_resolve(&self, url: &str) -> bool {
        Self::handles_scheme(url) && self.resolved.is_some()
    }

    async fn open(&self, url: &str) -> Result<(), TransportError> {
        if !Self::handles_scheme(url) {
            return Err(TransportError::NoHandler(url.to_string()));
        }
        match &self.resolved {
            Some(path) => run(&path.to_string_lossy(), &self.args, &[url]).await,
            None => Err(TransportError::NoHandler(url.to_string())),
        }
    }
}

/// Direct sending is permitted when the configured SMS program exists on
/// `PATH` at startup.
pub struct CommandPermission {
    program: Option<String>,
    granted: bool,
}

impl CommandPermission {
    pub fn new(program: Option<String>) -> Self {
        let granted = program
            .as_deref()
            .map(|p| which::which(p).is_ok())
            .unwrap_or(false);
        Self { program, granted }
    }
}

impl SmsPermission for CommandPermission {
    fn is_granted(&self) -> bool {
        self.granted
    }

    fn request(&self) {
        match &self.program {
            Some(program) => warn!(
                "SMS program {} not found on PATH, direct SMS disabled",
                program
            ),
            None => warn!("EMERGENCY_SMS_COMMAND is not set, direct SMS disabled"),
        }
    }
}
