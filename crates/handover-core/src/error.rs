//! Errors surfaced through handover completions.

/// Failure delivered to a handover or lifecycle completion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// The call targeted an engine that is not running.
    #[error("no engine running")]
    NoEngine,
    /// Entrypoints can only run once the engine loader is initialized.
    #[error("engine loader is not initialized; entrypoints need an initialized loader")]
    LoaderNotInitialized,
    #[error("engine failed to start: {0}")]
    StartFailed(String),
    #[error("illegal arguments: {0}")]
    IllegalArguments(String),
    /// The engine answered a method call with an error.
    #[error("{message}")]
    Channel {
        code: String,
        message: String,
        details: Option<String>,
    },
    #[error("method {0} is not implemented")]
    NotImplemented(String),
    /// The event or method call could not be handed to the transport.
    #[error("sending event failed: {0}")]
    SendFailed(String),
    #[error("no response for call {0} within the configured timeout")]
    TimedOut(String),
    /// The pending call was discarded before anyone completed it.
    #[error("call was abandoned before completion")]
    Abandoned,
    #[error("bridge executor is no longer running")]
    ExecutorClosed,
    #[error("surface operation failed: {0}")]
    Surface(String),
    #[error("invalid start parameters: {0}")]
    InvalidStartParams(String),
}

impl BridgeError {
    /// Stable error code reported across the boundary.
    pub fn code(&self) -> &str {
        match self {
            BridgeError::NoEngine => "NO_ENGINE",
            BridgeError::LoaderNotInitialized => "LOADER_NOT_INITIALIZED",
            BridgeError::StartFailed(_) => "ENGINE_RUN_FAILED",
            BridgeError::IllegalArguments(_) => "ILLEGAL_ARGUMENTS",
            BridgeError::Channel { code, .. } => code,
            BridgeError::NotImplemented(_) => "NOT_IMPLEMENTED",
            BridgeError::SendFailed(_) => "SEND_FAILED",
            BridgeError::TimedOut(_) => "TIMED_OUT",
            BridgeError::Abandoned => "ABANDONED",
            BridgeError::ExecutorClosed => "EXECUTOR_CLOSED",
            BridgeError::Surface(_) => "SURFACE_ERROR",
            BridgeError::InvalidStartParams(_) => "INVALID_START_PARAMS",
        }
    }

    /// Human-readable trace: the message plus any engine-supplied details.
    pub fn trace(&self) -> String {
        let mut trace = self.to_string();
        if let BridgeError::Channel {
            details: Some(details),
            ..
        } = self
        {
            trace.push_str("\n  details: ");
            trace.push_str(details);
        }
        trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_error_keeps_engine_code() {
        let err = BridgeError::Channel {
            code: "UNAUTHORIZED".into(),
            message: "token expired".into(),
            details: Some("refresh failed".into()),
        };
        assert_eq!(err.code(), "UNAUTHORIZED");
        assert_eq!(err.to_string(), "token expired");
        assert_eq!(err.trace(), "token expired\n  details: refresh failed");
    }

    #[test]
    fn fixed_codes() {
        assert_eq!(BridgeError::NoEngine.code(), "NO_ENGINE");
        assert_eq!(BridgeError::NotImplemented("x".into()).code(), "NOT_IMPLEMENTED");
        assert_eq!(BridgeError::NoEngine.trace(), "no engine running");
    }

    #[test]
    fn timeout_names_the_call() {
        let err = BridgeError::TimedOut("3f2a".into());
        assert_eq!(err.code(), "TIMED_OUT");
        assert_eq!(
            err.to_string(),
            "no response for call 3f2a within the configured timeout"
        );
    }
}
