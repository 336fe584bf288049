//! Error types for the interception layer.
//!
//! Platform failures carry the failing API and its error code. Visibility
//! transitions wrap them with the save/restore step that was running, so a
//! caller can tell exactly how far a failed transition got.

use std::fmt;

use thiserror::Error;

/// A platform input API rejected a call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{operation} failed (error code {code})")]
pub struct OsError {
    /// Name of the failing API, e.g. `"GetClipCursor"`.
    pub operation: &'static str,
    /// Platform error code (`GetLastError` or the `HRESULT` bits).
    pub code: u32,
}

impl OsError {
    pub const fn new(operation: &'static str, code: u32) -> Self {
        Self { operation, code }
    }
}

pub type OsResult<T> = Result<T, OsError>;

/// Individual steps of an overlay visibility transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionStep {
    SetArrowCursor,
    SaveCursorPosition,
    SaveClipRect,
    ApplyClipRect,
    RedirectRawInput,
    RestoreCursorPosition,
    RestoreClipRect,
    RestoreRawInput,
}

impl TransitionStep {
    /// Adapter for `map_err` at each step.
    pub(crate) fn fail(self) -> impl FnOnce(OsError) -> TransitionError {
        move |source| TransitionError { step: self, source }
    }
}

impl fmt::Display for TransitionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TransitionStep::SetArrowCursor => "set the arrow cursor",
            TransitionStep::SaveCursorPosition => "save the cursor position",
            TransitionStep::SaveClipRect => "save the clip rectangle",
            TransitionStep::ApplyClipRect => "apply the overlay clip rectangle",
            TransitionStep::RedirectRawInput => "redirect raw input devices",
            TransitionStep::RestoreCursorPosition => "restore the cursor position",
            TransitionStep::RestoreClipRect => "restore the clip rectangle",
            TransitionStep::RestoreRawInput => "restore raw input devices",
        };
        f.write_str(text)
    }
}

/// A visibility transition stopped part-way.
///
/// Steps before `step` completed and are not rolled back.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("overlay input transition failed: could not {step}")]
pub struct TransitionError {
    pub step: TransitionStep,
    #[source]
    pub source: OsError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_error_display() {
        let err = OsError::new("GetClipCursor", 5);
        assert_eq!(err.to_string(), "GetClipCursor failed (error code 5)");
    }

    #[test]
    fn test_transition_error_names_step() {
        let err = TransitionStep::SaveClipRect.fail()(OsError::new("GetClipCursor", 5));
        assert_eq!(err.step, TransitionStep::SaveClipRect);
        assert_eq!(
            err.to_string(),
            "overlay input transition failed: could not save the clip rectangle"
        );
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("GetClipCursor failed (error code 5)"));
    }
}
