//! Access to the real OS input APIs.
//!
//! [`InputPlatform`] is the unhooked side of every intercepted API. When the
//! core needs the true cursor position or has to register raw input devices
//! it goes through this trait, under the matching `SuppressGuard`, so an
//! installed detour passes the call through.

pub mod simulated;
#[cfg(windows)]
pub mod win32;

use std::sync::Arc;
use std::sync::atomic::{AtomicIsize, Ordering};

use crate::error::OsResult;
use crate::types::{
    CursorHandle, Point, RawInputDevice, Rect, ThreadHandle, ThreadId, WindowHandle,
};

/// API names reported in `OsError::operation`.
pub mod op {
    pub const LOAD_CURSOR: &str = "LoadCursorW";
    pub const GET_CURSOR_POS: &str = "GetCursorPos";
    pub const SET_CURSOR_POS: &str = "SetCursorPos";
    pub const GET_CLIP_CURSOR: &str = "GetClipCursor";
    pub const CLIP_CURSOR: &str = "ClipCursor";
    pub const GET_WINDOW_RECT: &str = "GetWindowRect";
    pub const GET_REGISTERED_RAW_INPUT_DEVICES: &str = "GetRegisteredRawInputDevices";
    pub const REGISTER_RAW_INPUT_DEVICES: &str = "RegisterRawInputDevices";
    pub const OPEN_THREAD: &str = "OpenThread";
    pub const ATTACH_THREAD_INPUT: &str = "AttachThreadInput";
}

/// The OS input subsystem as seen by the interception core.
pub trait InputPlatform: Send + Sync {
    /// The standard arrow cursor.
    fn arrow_cursor(&self) -> OsResult<CursorHandle>;
    /// Sets the cursor shape and returns the previous one.
    fn set_cursor(&self, cursor: CursorHandle) -> CursorHandle;
    fn cursor_position(&self) -> OsResult<Point>;
    fn set_cursor_position(&self, point: Point) -> OsResult<()>;
    /// Adjusts the display counter and returns its new value.
    fn show_cursor(&self, show: bool) -> i32;
    fn clip_rect(&self) -> OsResult<Rect>;
    fn set_clip_rect(&self, rect: Rect) -> OsResult<()>;
    fn is_window(&self, window: WindowHandle) -> bool;
    fn window_rect(&self, window: WindowHandle) -> OsResult<Rect>;
    fn registered_raw_input_devices(&self) -> OsResult<Vec<RawInputDevice>>;
    fn register_raw_input_devices(&self, devices: &[RawInputDevice]) -> OsResult<()>;
    fn current_thread_id(&self) -> ThreadId;
    fn open_thread(&self, thread: ThreadId) -> OsResult<ThreadHandle>;
    fn close_thread(&self, handle: ThreadHandle);
    fn attach_thread_input(&self, from: ThreadId, to: ThreadId, attach: bool) -> OsResult<()>;
    /// Asynchronous key state: the key is held right now.
    fn is_key_down(&self, virtual_key: u32) -> bool;
}

/// The window module's view of the overlay's target window.
pub trait OverlayWindow: Send + Sync {
    fn current_window(&self) -> WindowHandle;
}

/// Current-window slot updated by whoever tracks the host window.
#[derive(Debug, Default)]
pub struct CurrentWindow(AtomicIsize);

impl CurrentWindow {
    pub fn new(window: WindowHandle) -> Self {
        Self(AtomicIsize::new(window.0))
    }

    pub fn set(&self, window: WindowHandle) {
        self.0.store(window.0, Ordering::Release);
    }
}

impl OverlayWindow for CurrentWindow {
    fn current_window(&self) -> WindowHandle {
        WindowHandle(self.0.load(Ordering::Acquire))
    }
}

/// Thread handle closed when dropped.
pub struct OwnedThread {
    id: ThreadId,
    handle: ThreadHandle,
    platform: Arc<dyn InputPlatform>,
}

impl OwnedThread {
    pub fn open(platform: &Arc<dyn InputPlatform>, id: ThreadId) -> OsResult<Self> {
        let handle = platform.open_thread(id)?;
        Ok(Self {
            id,
            handle,
            platform: Arc::clone(platform),
        })
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }
}

impl std::fmt::Debug for OwnedThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedThread")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .finish()
    }
}

impl Drop for OwnedThread {
    fn drop(&mut self) {
        self.platform.close_thread(self.handle);
    }
}

/// Platform backend for the running host.
#[cfg(windows)]
pub fn native() -> Arc<dyn InputPlatform> {
    Arc::new(win32::Win32Platform::new())
}

/// Platform backend for the running host.
#[cfg(not(windows))]
pub fn native() -> Arc<dyn InputPlatform> {
    Arc::new(simulated::SimulatedPlatform::new())
}

#[cfg(test)]
mod tests {
    use super::simulated::SimulatedPlatform;
    use super::*;

    #[test]
    fn test_current_window_tracks_updates() {
        let window = CurrentWindow::new(WindowHandle(10));
        assert_eq!(window.current_window(), WindowHandle(10));
        window.set(WindowHandle(20));
        assert_eq!(window.current_window(), WindowHandle(20));
        assert!(CurrentWindow::default().current_window().is_null());
    }

    #[test]
    fn test_owned_thread_closes_on_drop() {
        let sim = Arc::new(SimulatedPlatform::new());
        let platform: Arc<dyn InputPlatform> = sim.clone();
        let id = platform.current_thread_id();

        let thread = OwnedThread::open(&platform, id).unwrap();
        assert_eq!(thread.id(), id);
        assert_eq!(sim.open_thread_count(), 1);
        drop(thread);
        assert_eq!(sim.open_thread_count(), 0);
    }

    #[test]
    fn test_owned_thread_open_failure() {
        let sim = Arc::new(SimulatedPlatform::new());
        let platform: Arc<dyn InputPlatform> = sim.clone();
        sim.mark_thread_exited(ThreadId(4242));

        let err = OwnedThread::open(&platform, ThreadId(4242)).unwrap_err();
        assert_eq!(err.operation, op::OPEN_THREAD);
        assert_eq!(sim.open_thread_count(), 0);
    }
}
