//! Error types for the retrobridge runtime

use thiserror::Error;

/// Main error type for the runtime
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Save state error: {0}")]
    State(#[from] StateError),

    #[error("Cheat error: {0}")]
    Cheat(#[from] CheatError),

    #[error("Engine fault: {0}")]
    EngineFault(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

/// Errors raised while loading a game; no session exists afterwards
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("Missing firmware asset: {0}")]
    MissingFirmware(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Engine initialization failed: {0}")]
    EngineInitFailure(String),
}

/// Lifecycle errors; the session state is left unchanged
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Invalid transition: cannot {op} while {state}")]
    InvalidTransition { op: &'static str, state: &'static str },

    #[error("No session loaded")]
    NoSession,

    #[error("Engine {0} already has a live session")]
    EngineBusy(String),

    #[error("Unknown system: {0}")]
    UnknownSystem(String),
}

/// Save-state errors; the running session is left untouched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Corrupt save state: {0}")]
    CorruptBlob(String),

    #[error("Incompatible save state schema: expected {expected}, found {found}")]
    IncompatibleSchema { expected: String, found: String },

    #[error("State access requested mid-frame")]
    MidFrame,
}

/// Cheat insertion/removal errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheatError {
    #[error("Unrecognized cheat family: {0}")]
    UnrecognizedFamily(String),

    #[error("Cheat family {0} is not supported by this system")]
    UnsupportedFamily(String),

    #[error("Invalid cheat code: {0}")]
    InvalidCode(String),

    #[error("Unknown cheat handle: {0}")]
    UnknownHandle(u64),
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LifecycleError::InvalidTransition {
            op: "resume",
            state: "running",
        };
        assert_eq!(
            format!("{}", err),
            "Invalid transition: cannot resume while running"
        );

        let err = StateError::IncompatibleSchema {
            expected: "nes/3".to_string(),
            found: "nes/2".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Incompatible save state schema: expected nes/3, found nes/2"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err: BridgeError = SetupError::MissingFirmware("bios7".to_string()).into();
        assert!(matches!(err, BridgeError::Setup(SetupError::MissingFirmware(_))));

        let err: BridgeError = CheatError::UnknownHandle(7).into();
        assert!(matches!(err, BridgeError::Cheat(_)));
    }
}
