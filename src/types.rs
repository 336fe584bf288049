//! Plain value types shared by every interception component.
//!
//! Handles are carried as raw integers so the core runs on hosts without the
//! Win32 API; `platform::win32` converts them at the boundary.

use std::fmt;

/// Window handle (`HWND`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub const NULL: Self = Self(0);

    #[inline(always)]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Cursor handle (`HCURSOR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CursorHandle(pub isize);

impl CursorHandle {
    pub const NULL: Self = Self(0);
}

/// OS thread identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ThreadId(pub u32);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Open handle to a thread, owned through `platform::OwnedThread`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadHandle(pub isize);

/// GPU device pointer reported by the device-release notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub usize);

/// Screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Screen rectangle, `right`/`bottom` exclusive as in `RECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Left [{}] Top [{}] Right [{}] Bottom [{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// HID usage page for generic desktop controls.
pub const HID_USAGE_PAGE_GENERIC: u16 = 0x01;
/// HID usage ID for mice.
pub const HID_USAGE_GENERIC_MOUSE: u16 = 0x02;
/// HID usage ID for keyboards.
pub const HID_USAGE_GENERIC_KEYBOARD: u16 = 0x06;

/// Removes the top level collection from the inclusion list.
pub const RIDEV_REMOVE: u32 = 0x0000_0001;
/// Prevents legacy messages from being generated for the device.
pub const RIDEV_NOLEGACY: u32 = 0x0000_0030;

/// One raw-input device registration (`RAWINPUTDEVICE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawInputDevice {
    pub usage_page: u16,
    pub usage: u16,
    pub flags: u32,
    pub target: WindowHandle,
}

/// Device classes the redirector knows how to move between windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawDeviceKind {
    Mouse,
    Keyboard,
    Other,
}

impl RawInputDevice {
    pub const fn new(usage_page: u16, usage: u16, flags: u32, target: WindowHandle) -> Self {
        Self {
            usage_page,
            usage,
            flags,
            target,
        }
    }

    pub const fn mouse(target: WindowHandle) -> Self {
        Self::new(HID_USAGE_PAGE_GENERIC, HID_USAGE_GENERIC_MOUSE, 0, target)
    }

    pub const fn keyboard(target: WindowHandle) -> Self {
        Self::new(HID_USAGE_PAGE_GENERIC, HID_USAGE_GENERIC_KEYBOARD, 0, target)
    }

    pub fn kind(&self) -> RawDeviceKind {
        match (self.usage_page, self.usage) {
            (HID_USAGE_PAGE_GENERIC, HID_USAGE_GENERIC_MOUSE) => RawDeviceKind::Mouse,
            (HID_USAGE_PAGE_GENERIC, HID_USAGE_GENERIC_KEYBOARD) => RawDeviceKind::Keyboard,
            _ => RawDeviceKind::Other,
        }
    }

    /// Whether two registrations address the same top level collection.
    pub fn same_usage(&self, other: &RawInputDevice) -> bool {
        self.usage_page == other.usage_page && self.usage == other.usage
    }
}

/// Window message identifiers used by the interception policy.
pub mod msg {
    pub const WM_INPUT: u32 = 0x00FF;
    pub const WM_KEYFIRST: u32 = 0x0100;
    pub const WM_KEYDOWN: u32 = 0x0100;
    pub const WM_KEYUP: u32 = 0x0101;
    pub const WM_CHAR: u32 = 0x0102;
    pub const WM_SYSKEYDOWN: u32 = 0x0104;
    pub const WM_KEYLAST: u32 = 0x0109;
    pub const WM_MOUSEFIRST: u32 = 0x0200;
    pub const WM_MOUSEMOVE: u32 = 0x0200;
    pub const WM_LBUTTONDOWN: u32 = 0x0201;
    pub const WM_LBUTTONUP: u32 = 0x0202;
    pub const WM_MOUSEWHEEL: u32 = 0x020A;
    pub const WM_MOUSELAST: u32 = 0x020E;
    pub const WM_SIZE: u32 = 0x0005;
    pub const WM_ACTIVATE: u32 = 0x0006;
}

/// Messages withheld from the host while the overlay owns input.
#[inline]
pub fn is_blocked_message(message: u32) -> bool {
    message == msg::WM_INPUT
        || (msg::WM_KEYFIRST..=msg::WM_KEYLAST).contains(&message)
        || (msg::WM_MOUSEFIRST..=msg::WM_MOUSELAST).contains(&message)
}

/// A window-procedure message as seen by the window hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMessage {
    pub window: WindowHandle,
    pub message: u32,
    pub wparam: usize,
    pub lparam: isize,
}

impl WindowMessage {
    pub const fn new(window: WindowHandle, message: u32, wparam: usize, lparam: isize) -> Self {
        Self {
            window,
            message,
            wparam,
            lparam,
        }
    }

    /// Bit 30 of a key message's `lParam`: the key was already down.
    #[inline(always)]
    pub fn is_auto_repeat(&self) -> bool {
        (self.lparam >> 30) & 1 == 1
    }
}

/// Outcome of an intercepted call.
///
/// `Handled(value)` means the real implementation must not run and `value`
/// is returned to the caller of the hooked API verbatim.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookResult<T> {
    PassThrough,
    Handled(T),
}

impl<T> HookResult<T> {
    #[inline(always)]
    pub fn is_handled(&self) -> bool {
        matches!(self, HookResult::Handled(_))
    }

    /// Returns the handled value, or runs the real implementation.
    pub fn resolve(self, original: impl FnOnce() -> T) -> T {
        match self {
            HookResult::Handled(value) => value,
            HookResult::PassThrough => original(),
        }
    }
}
