//! Common utility functions.
//!
//! Provides branch prediction hints for the hook fast paths and panic payload
//! formatting for subscriber isolation.

use std::any::Any;

/// Marker function for cold code paths.
///
/// Used with branch prediction hints to inform the compiler about infrequently executed paths.
#[inline(always)]
#[cold]
pub fn cold() {}

/// Branch prediction hint for conditions expected to be false.
///
/// Hooks run on every intercepted call; suppression and overlay ownership are
/// the rare case.
///
/// # Example
/// ```ignore
/// if unlikely(suppressed) {
///     return HookResult::PassThrough;
/// }
/// ```
#[inline(always)]
pub fn unlikely(b: bool) -> bool {
    if b {
        cold()
    }
    b
}

/// Extracts a printable message from a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlikely() {
        assert!(unlikely(true));
        assert!(!unlikely(false));
    }

    #[test]
    fn test_panic_message_str() {
        let payload = std::panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static message");
    }

    #[test]
    fn test_panic_message_formatted() {
        let value = 42;
        let payload = std::panic::catch_unwind(|| panic!("value was {}", value)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "value was 42");
    }

    #[test]
    fn test_panic_message_other_payload() {
        let payload = std::panic::catch_unwind(|| std::panic::panic_any(7u32)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
