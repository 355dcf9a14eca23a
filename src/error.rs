//! Setup-time failures. Nothing on the per-frame path returns an error.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("host environment unavailable: {0}")]
    HostUnavailable(String),
    #[error("host activity is missing")]
    ActivityMissing,
}
