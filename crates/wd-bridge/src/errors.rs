use harness_core_types::protocol::NOT_IMPLEMENTED_SIGNATURE;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The driver does not support the command (old protocol level).
    #[error("{}: {command}", NOT_IMPLEMENTED_SIGNATURE)]
    NotImplemented { command: String },
    #[error("{0}")]
    Timeout(String),
    #[error("javascript error: {0}")]
    Script(String),
    #[error("no such session")]
    NoSuchSession,
    #[error("{message}")]
    Command { code: String, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected driver response: {0}")]
    Protocol(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

impl DriverError {
    pub fn not_implemented(command: impl Into<String>) -> Self {
        DriverError::NotImplemented {
            command: command.into(),
        }
    }

    pub fn command(code: impl Into<String>, message: impl Into<String>) -> Self {
        DriverError::Command {
            code: code.into(),
            message: message.into(),
        }
    }

    /// True when the error signals a missing driver capability rather than a
    /// failure. Recognised by variant or by the well-known message fragment.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, DriverError::NotImplemented { .. })
            || self.to_string().contains(NOT_IMPLEMENTED_SIGNATURE)
    }

    /// Map a W3C error code and message onto a driver error.
    pub fn from_wire(code: &str, message: &str) -> Self {
        match code {
            "unknown command" | "unknown method" | "unsupported operation" => {
                DriverError::not_implemented(message)
            }
            "script timeout" | "timeout" => DriverError::Timeout(message.to_string()),
            "javascript error" => DriverError::Script(message.to_string()),
            "invalid session id" => DriverError::NoSuchSession,
            _ => DriverError::command(code, message),
        }
    }
}

impl From<reqwest::Error> for DriverError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DriverError::Timeout(err.to_string())
        } else {
            DriverError::Transport(err.to_string())
        }
    }
}
