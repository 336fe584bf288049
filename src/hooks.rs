//! Registration points of the interception modules.
//!
//! Each detour owns one registry in the [`HookTable`] and, on every call,
//! runs `intercept` over it: the first subscriber returning `Handled(value)`
//! makes the detour return `value` without calling the original API.

use crate::callbacks::{BroadcastReport, CallbackHandle, CallbackRegistry};
use crate::types::{CursorHandle, DeviceHandle, HookResult, Point, RawInputDevice, Rect, WindowMessage};

/// Window procedure. `Handled(result)` consumes the message.
pub type WindowMessageHook = dyn Fn(&WindowMessage) -> HookResult<isize> + Send + Sync;
pub type SetCursorHook = dyn Fn(CursorHandle) -> HookResult<CursorHandle> + Send + Sync;
pub type GetCursorPosHook = dyn Fn() -> HookResult<Point> + Send + Sync;
pub type SetCursorPosHook = dyn Fn(Point) -> HookResult<bool> + Send + Sync;
pub type ShowCursorHook = dyn Fn(bool) -> HookResult<i32> + Send + Sync;
/// `None` releases the clip.
pub type ClipCursorHook = dyn Fn(Option<Rect>) -> HookResult<bool> + Send + Sync;
pub type GetClipCursorHook = dyn Fn() -> HookResult<Rect> + Send + Sync;
/// Device input (DirectInput style) reads. `Handled` drops the read.
pub type DeviceInputHook = dyn Fn() -> HookResult<()> + Send + Sync;
/// `None` is a size query.
pub type GetRawInputBufferHook = dyn Fn(Option<&mut [u8]>) -> HookResult<u32> + Send + Sync;
pub type GetRawInputDataHook = dyn Fn(Option<&mut [u8]>) -> HookResult<u32> + Send + Sync;
pub type RegisterRawInputDevicesHook = dyn Fn(&[RawInputDevice]) -> HookResult<bool> + Send + Sync;
pub type DeviceReleasedHook = dyn Fn(DeviceHandle) + Send + Sync;

#[derive(Default)]
pub struct HookTable {
    pub window_message: CallbackRegistry<WindowMessageHook>,
    pub set_cursor: CallbackRegistry<SetCursorHook>,
    pub get_cursor_pos: CallbackRegistry<GetCursorPosHook>,
    pub set_cursor_pos: CallbackRegistry<SetCursorPosHook>,
    pub show_cursor: CallbackRegistry<ShowCursorHook>,
    pub clip_cursor: CallbackRegistry<ClipCursorHook>,
    pub get_clip_cursor: CallbackRegistry<GetClipCursorHook>,
    pub device_input: CallbackRegistry<DeviceInputHook>,
    pub get_raw_input_buffer: CallbackRegistry<GetRawInputBufferHook>,
    pub get_raw_input_data: CallbackRegistry<GetRawInputDataHook>,
    pub register_raw_input_devices: CallbackRegistry<RegisterRawInputDevicesHook>,
    pub device_released: CallbackRegistry<DeviceReleasedHook>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the GPU device module when a device is torn down.
    pub fn notify_device_released(&self, device: DeviceHandle) -> BroadcastReport {
        self.device_released.broadcast(|hook| hook(device))
    }
}

/// Handles returned by `InputContext::install`.
#[derive(Debug)]
#[must_use = "dropping the registrations leaves the hooks installed"]
pub struct HookRegistrations {
    pub(crate) window_message: CallbackHandle,
    pub(crate) set_cursor: CallbackHandle,
    pub(crate) get_cursor_pos: CallbackHandle,
    pub(crate) set_cursor_pos: CallbackHandle,
    pub(crate) show_cursor: CallbackHandle,
    pub(crate) clip_cursor: CallbackHandle,
    pub(crate) get_clip_cursor: CallbackHandle,
    pub(crate) device_input: CallbackHandle,
    pub(crate) get_raw_input_buffer: CallbackHandle,
    pub(crate) get_raw_input_data: CallbackHandle,
    pub(crate) register_raw_input_devices: CallbackHandle,
}

impl HookRegistrations {
    /// Removes every registration from `table`.
    pub fn uninstall(self, table: &HookTable) {
        table.window_message.unregister(self.window_message);
        table.set_cursor.unregister(self.set_cursor);
        table.get_cursor_pos.unregister(self.get_cursor_pos);
        table.set_cursor_pos.unregister(self.set_cursor_pos);
        table.show_cursor.unregister(self.show_cursor);
        table.clip_cursor.unregister(self.clip_cursor);
        table.get_clip_cursor.unregister(self.get_clip_cursor);
        table.device_input.unregister(self.device_input);
        table.get_raw_input_buffer.unregister(self.get_raw_input_buffer);
        table.get_raw_input_data.unregister(self.get_raw_input_data);
        table
            .register_raw_input_devices
            .unregister(self.register_raw_input_devices);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_device_released_broadcast() {
        let table = HookTable::new();
        let released = Arc::new(Mutex::new(Vec::new()));
        let sink = released.clone();
        table
            .device_released
            .register(Box::new(move |device| sink.lock().push(device)));

        let report = table.notify_device_released(DeviceHandle(0xD3D));
        assert_eq!(report.delivered, 1);
        assert_eq!(*released.lock(), vec![DeviceHandle(0xD3D)]);
    }

    #[test]
    fn test_raw_buffer_hook_sees_each_subscriber_write() {
        let table = HookTable::new();
        table.get_raw_input_buffer.register(Box::new(|buffer: Option<&mut [u8]>| {
            if let Some(buffer) = buffer {
                buffer[0] = 1;
            }
            HookResult::PassThrough
        }));
        table.get_raw_input_buffer.register(Box::new(|buffer: Option<&mut [u8]>| {
            let first = buffer.map(|b| b[0]).unwrap_or_default();
            HookResult::Handled(u32::from(first))
        }));

        let mut buffer = [0u8; 4];
        let result = table
            .get_raw_input_buffer
            .intercept(|hook| hook(Some(&mut buffer[..])));
        assert_eq!(result, HookResult::Handled(1));
    }
}
