//! Error types for the tween engine.
//!
//! Most failures in the engine are recovered locally (bad values decompose to
//! a sentinel, empty target lists degrade to a no-op animation). Only misuse
//! of the public API surfaces as an `Err`.

use serde::{Deserialize, Serialize};

/// Error type for tween engine operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum TweenError {
    /// A manual frame was opened while another one was still open.
    #[error("Frame already open at {opened_at}ms; call end_frame() before begin_frame()")]
    FrameAlreadyOpen { opened_at: f64 },

    /// `end_frame` was called without a matching `begin_frame`.
    #[error("No frame is open; call begin_frame() first")]
    FrameNotOpen,

    /// The tickable was released or never existed.
    #[error("Tickable not found: {id}")]
    TickableNotFound { id: String },

    /// The engine is mid-render (a callback is running); reads are refused
    /// and playback calls are deferred until the render returns.
    #[error("Engine is busy rendering")]
    EngineBusy,

    /// Easing description could not be parsed.
    #[error("Unknown easing: {name}")]
    UnknownEasing { name: String },

    /// Animation parameters were rejected.
    #[error("Invalid parameters: {reason}")]
    InvalidParams { reason: String },

    /// Serialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },
}

impl TweenError {
    /// Check if this is a recoverable error
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EngineBusy | Self::UnknownEasing { .. } | Self::InvalidParams { .. }
        )
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::FrameAlreadyOpen { .. } | Self::FrameNotOpen => "frame",
            Self::TickableNotFound { .. } | Self::EngineBusy => "lookup",
            Self::UnknownEasing { .. } | Self::InvalidParams { .. } => "validation",
            Self::SerializationError { .. } => "serialization",
        }
    }
}

impl From<serde_json::Error> for TweenError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_are_not_recoverable() {
        let err = TweenError::FrameAlreadyOpen { opened_at: 16.0 };
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "frame");
        assert_eq!(TweenError::FrameNotOpen.category(), "frame");
    }

    #[test]
    fn param_errors_are_recoverable() {
        let err = TweenError::InvalidParams {
            reason: "duration must be non-negative".into(),
        };
        assert!(err.is_recoverable());
        assert_eq!(err.category(), "validation");
        assert!(TweenError::EngineBusy.is_recoverable());
    }

    #[test]
    fn json_errors_convert() {
        let err: TweenError = serde_json::from_str::<f64>("{").unwrap_err().into();
        assert_eq!(err.category(), "serialization");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_serialization() {
        let error = TweenError::UnknownEasing {
            name: "wobble".into(),
        };
        let serialized = serde_json::to_string(&error).unwrap();
        let deserialized: TweenError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(error, deserialized);
    }
}
