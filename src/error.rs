use thiserror::Error;

/// Caller mistakes: bad stack parameters or unparseable names. These abort
/// whatever was being built; nothing downstream recovers from them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("monitor {monitor} out of range ({available} available)")]
    MonitorOutOfRange { monitor: usize, available: usize },

    #[error("unknown stack location `{0}`")]
    UnknownLocation(String),

    #[error("unknown urgency `{0}`")]
    UnknownUrgency(String),
}
