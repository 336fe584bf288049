//! Win32 backend.
//!
//! Every call here goes to the real user32/kernel32 export. When a detour
//! is installed over one of these APIs the caller holds the matching
//! suppression guard, so the detour forwards to the original.

use std::ffi::c_void;

use windows::Win32::Foundation::{CloseHandle, GetLastError, HANDLE, HWND, POINT, RECT};
use windows::Win32::System::Threading::{
    AttachThreadInput, GetCurrentThreadId, OpenThread, THREAD_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;
use windows::Win32::UI::Input::{
    GetRegisteredRawInputDevices, RAWINPUTDEVICE, RAWINPUTDEVICE_FLAGS, RegisterRawInputDevices,
};
use windows::Win32::UI::WindowsAndMessaging::{
    ClipCursor, GetClipCursor, GetCursorPos, GetWindowRect, HCURSOR, IDC_ARROW, IsWindow,
    LoadCursorW, SetCursor, SetCursorPos, ShowCursor,
};
use windows::core::Error as WinError;

use super::{InputPlatform, op};
use crate::error::{OsError, OsResult};
use crate::types::{
    CursorHandle, Point, RawInputDevice, Rect, ThreadHandle, ThreadId, WindowHandle,
};

/// `ERROR_INSUFFICIENT_BUFFER`
const ERROR_INSUFFICIENT_BUFFER: u32 = 122;

#[inline]
fn os_error(operation: &'static str) -> impl FnOnce(WinError) -> OsError {
    move |e| OsError::new(operation, e.code().0 as u32)
}

#[inline]
fn last_error(operation: &'static str) -> OsError {
    OsError::new(operation, unsafe { GetLastError() }.0)
}

#[inline(always)]
fn hwnd(window: WindowHandle) -> HWND {
    HWND(window.0 as *mut c_void)
}

#[inline(always)]
fn to_rect(rect: &RECT) -> Rect {
    Rect::new(rect.left, rect.top, rect.right, rect.bottom)
}

#[inline(always)]
fn from_rect(rect: Rect) -> RECT {
    RECT {
        left: rect.left,
        top: rect.top,
        right: rect.right,
        bottom: rect.bottom,
    }
}

fn to_device(raw: &RAWINPUTDEVICE) -> RawInputDevice {
    RawInputDevice::new(
        raw.usUsagePage,
        raw.usUsage,
        raw.dwFlags.0,
        WindowHandle(raw.hwndTarget.0 as isize),
    )
}

fn from_device(device: &RawInputDevice) -> RAWINPUTDEVICE {
    RAWINPUTDEVICE {
        usUsagePage: device.usage_page,
        usUsage: device.usage,
        dwFlags: RAWINPUTDEVICE_FLAGS(device.flags),
        hwndTarget: hwnd(device.target),
    }
}

#[derive(Debug, Default)]
pub struct Win32Platform;

impl Win32Platform {
    pub fn new() -> Self {
        Self
    }
}

impl InputPlatform for Win32Platform {
    fn arrow_cursor(&self) -> OsResult<CursorHandle> {
        let cursor = unsafe { LoadCursorW(None, IDC_ARROW) }.map_err(os_error(op::LOAD_CURSOR))?;
        Ok(CursorHandle(cursor.0 as isize))
    }

    fn set_cursor(&self, cursor: CursorHandle) -> CursorHandle {
        let next = (cursor != CursorHandle::NULL).then(|| HCURSOR(cursor.0 as *mut c_void));
        let previous = unsafe { SetCursor(next) };
        CursorHandle(previous.0 as isize)
    }

    fn cursor_position(&self) -> OsResult<Point> {
        let mut point = POINT::default();
        unsafe { GetCursorPos(&mut point) }.map_err(os_error(op::GET_CURSOR_POS))?;
        Ok(Point::new(point.x, point.y))
    }

    fn set_cursor_position(&self, point: Point) -> OsResult<()> {
        unsafe { SetCursorPos(point.x, point.y) }.map_err(os_error(op::SET_CURSOR_POS))
    }

    fn show_cursor(&self, show: bool) -> i32 {
        unsafe { ShowCursor(show) }
    }

    fn clip_rect(&self) -> OsResult<Rect> {
        let mut rect = RECT::default();
        unsafe { GetClipCursor(&mut rect) }.map_err(os_error(op::GET_CLIP_CURSOR))?;
        Ok(to_rect(&rect))
    }

    fn set_clip_rect(&self, rect: Rect) -> OsResult<()> {
        let rect = from_rect(rect);
        unsafe { ClipCursor(Some(&rect)) }.map_err(os_error(op::CLIP_CURSOR))
    }

    fn is_window(&self, window: WindowHandle) -> bool {
        !window.is_null() && unsafe { IsWindow(Some(hwnd(window))) }.as_bool()
    }

    fn window_rect(&self, window: WindowHandle) -> OsResult<Rect> {
        let mut rect = RECT::default();
        unsafe { GetWindowRect(hwnd(window), &mut rect) }
            .map_err(os_error(op::GET_WINDOW_RECT))?;
        Ok(to_rect(&rect))
    }

    fn registered_raw_input_devices(&self) -> OsResult<Vec<RawInputDevice>> {
        let size = std::mem::size_of::<RAWINPUTDEVICE>() as u32;
        let mut count = 0u32;

        // First call reports the number of registrations
        let result = unsafe { GetRegisteredRawInputDevices(None, &mut count, size) };
        if result == u32::MAX {
            let err = last_error(op::GET_REGISTERED_RAW_INPUT_DEVICES);
            if err.code != ERROR_INSUFFICIENT_BUFFER {
                return Err(err);
            }
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut devices = vec![RAWINPUTDEVICE::default(); count as usize];
        let written = unsafe {
            GetRegisteredRawInputDevices(Some(devices.as_mut_ptr()), &mut count, size)
        };
        if written == u32::MAX {
            return Err(last_error(op::GET_REGISTERED_RAW_INPUT_DEVICES));
        }
        devices.truncate(written as usize);

        Ok(devices.iter().map(to_device).collect())
    }

    fn register_raw_input_devices(&self, devices: &[RawInputDevice]) -> OsResult<()> {
        let devices: Vec<RAWINPUTDEVICE> = devices.iter().map(from_device).collect();
        unsafe {
            RegisterRawInputDevices(&devices, std::mem::size_of::<RAWINPUTDEVICE>() as u32)
        }
        .map_err(os_error(op::REGISTER_RAW_INPUT_DEVICES))
    }

    fn current_thread_id(&self) -> ThreadId {
        ThreadId(unsafe { GetCurrentThreadId() })
    }

    fn open_thread(&self, thread: ThreadId) -> OsResult<ThreadHandle> {
        let handle = unsafe { OpenThread(THREAD_QUERY_LIMITED_INFORMATION, false, thread.0) }
            .map_err(os_error(op::OPEN_THREAD))?;
        Ok(ThreadHandle(handle.0 as isize))
    }

    fn close_thread(&self, handle: ThreadHandle) {
        let _ = unsafe { CloseHandle(HANDLE(handle.0 as *mut c_void)) };
    }

    fn attach_thread_input(&self, from: ThreadId, to: ThreadId, attach: bool) -> OsResult<()> {
        if unsafe { AttachThreadInput(from.0, to.0, attach) }.as_bool() {
            Ok(())
        } else {
            Err(last_error(op::ATTACH_THREAD_INPUT))
        }
    }

    #[inline]
    fn is_key_down(&self, virtual_key: u32) -> bool {
        unsafe { GetAsyncKeyState(virtual_key as i32) < 0 }
    }
}
