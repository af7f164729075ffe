use std::fmt;
use std::io;

/// Every fallible controller operation funnels into this type.
#[derive(Debug)]
pub enum Error {
    /// The bus device could not be opened.
    TransportOpen(String),
    /// The bus opened but the expander could not be addressed or set up.
    TransportConfigure(String),
    /// A packet write to the expander failed.
    TransportWrite(String),
    /// The timer worker could not be created.
    TimerRegistration(io::Error),
    /// The timer could not be started with the requested intervals.
    TimerArm(String),
    /// Configuration is invalid or could not be loaded.
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportOpen(msg) => write!(f, "failed to open transport: {msg}"),
            Self::TransportConfigure(msg) => write!(f, "failed to configure transport: {msg}"),
            Self::TransportWrite(msg) => write!(f, "transport write failed: {msg}"),
            Self::TimerRegistration(e) => write!(f, "timer registration failed: {e}"),
            Self::TimerArm(msg) => write!(f, "failed to arm timer: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TimerRegistration(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
