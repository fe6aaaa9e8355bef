use std::io;
use std::process::ExitCode;

/// Failure of the display backend. Never handled below `main`.
#[derive(Debug, thiserror::Error)]
pub(crate) enum BackendError {
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("{command} failed with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("unexpected output from {command}: {reason}")]
    InvalidOutput { command: String, reason: String },
    #[error("unknown display {0:?}")]
    UnknownDisplay(String),
    #[error("no connected displays found")]
    NoDisplays,
    #[error("no displays given to clone")]
    NothingToClone,
    #[error("display {display:?} does not support {resolution}")]
    UnsupportedResolution { display: String, resolution: String },
    #[error("no free crtc available for display {0:?}")]
    NoFreeCrtc(String),
    #[error("no display backend available, rebuild with one of the xrandr, sway or randr features")]
    NoBackend,
    #[error("X11: {0}")]
    X11(String),
}

#[cfg(feature = "randr")]
impl From<x11rb::errors::ConnectError> for BackendError {
    fn from(err: x11rb::errors::ConnectError) -> Self {
        BackendError::X11(err.to_string())
    }
}

#[cfg(feature = "randr")]
impl From<x11rb::errors::ConnectionError> for BackendError {
    fn from(err: x11rb::errors::ConnectionError) -> Self {
        BackendError::X11(err.to_string())
    }
}

#[cfg(feature = "randr")]
impl From<x11rb::errors::ReplyError> for BackendError {
    fn from(err: x11rb::errors::ReplyError) -> Self {
        BackendError::X11(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("{0}")]
    Usage(String),
    #[error("displays share no common resolution")]
    NoCommonResolution,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl Error {
    pub(crate) fn exit_code(&self) -> ExitCode {
        match self {
            Error::Usage(_) => ExitCode::from(2),
            Error::NoCommonResolution | Error::Backend(_) => ExitCode::FAILURE,
        }
    }
}
