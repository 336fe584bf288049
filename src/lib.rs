//! In-process input interception for overlays.
//!
//! While an overlay is visible it owns the host's input: the host sees a
//! frozen cursor, clip rectangle and raw-input state, and its input messages
//! are withheld and replayed to the overlay instead. Hiding the overlay puts
//! everything back. [`InputContext`] is the entry point.

pub mod attach;
pub mod callbacks;
pub mod config;
pub mod context;
pub mod cursor;
pub mod error;
pub mod guard;
pub mod hooks;
pub mod hotkey;
pub mod logging;
pub mod platform;
pub mod queue;
pub mod raw_input;
pub mod types;
pub mod util;

pub use callbacks::{BroadcastReport, CallbackHandle, CallbackRegistry};
pub use config::InputConfig;
pub use context::InputContext;
pub use error::{OsError, TransitionError, TransitionStep};
pub use hooks::{HookRegistrations, HookTable};
pub use hotkey::Hotkey;
pub use platform::{CurrentWindow, InputPlatform, OverlayWindow};
pub use types::{HookResult, WindowMessage};
