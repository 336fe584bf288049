//! Raw-input registration redirect.
//!
//! Hosts that read the mouse or keyboard through raw input keep receiving
//! `WM_INPUT` no matter what the window procedure does. While the overlay is
//! visible their generic mouse and keyboard registrations are pointed at the
//! overlay window, and put back verbatim when it hides.

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::error::{TransitionError, TransitionStep};
use crate::guard::{HookKind, HookSuppression};
use crate::platform::InputPlatform;
use crate::types::{
    HookResult, RIDEV_NOLEGACY, RIDEV_REMOVE, RawDeviceKind, RawInputDevice, WindowHandle,
};

/// `(UINT)-1`, the raw-input APIs' error return.
pub const RAW_INPUT_ERROR: u32 = u32::MAX;

pub type DeviceList = SmallVec<[RawInputDevice; 4]>;

fn log_device(index: usize, device: &RawInputDevice) {
    debug!(
        "Device: [{}]. UsagePage: [{}]. Usage: [{}]. Flags: [{:08X}]. Target: [{:#x}].",
        index, device.usage_page, device.usage, device.flags, device.target.0
    );
}

pub struct RawInputRedirector {
    platform: Arc<dyn InputPlatform>,
    /// Registrations captured by the last redirect, `None` once restored.
    snapshot: Mutex<Option<DeviceList>>,
}

impl RawInputRedirector {
    pub fn new(platform: Arc<dyn InputPlatform>) -> Self {
        Self {
            platform,
            snapshot: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> Option<DeviceList> {
        self.snapshot.lock().clone()
    }

    /// Snapshots the registered devices and points any generic mouse or
    /// keyboard registration at `window`.
    ///
    /// A snapshot not yet restored is kept: the registrations live at that
    /// point already target the overlay.
    pub fn redirect(
        &self,
        suppression: &HookSuppression,
        window: WindowHandle,
    ) -> Result<(), TransitionError> {
        let _register = suppression.suppress(HookKind::RegisterRawInputDevices);

        debug!("Setting new raw input devices");
        let kept = self.snapshot.lock().clone();
        let devices = match kept {
            Some(devices) => {
                debug!("Keeping {} saved raw input device(s)", devices.len());
                devices
            }
            None => {
                let devices: DeviceList = self
                    .platform
                    .registered_raw_input_devices()
                    .map_err(TransitionStep::RedirectRawInput.fail())?
                    .into_iter()
                    .collect();
                *self.snapshot.lock() = Some(devices.clone());
                devices
            }
        };

        let has_mouse = devices.iter().any(|d| d.kind() == RawDeviceKind::Mouse);
        let has_keyboard = devices.iter().any(|d| d.kind() == RawDeviceKind::Keyboard);

        if !has_mouse && !has_keyboard {
            debug!("No registered mouse or keyboard raw input devices");
            return Ok(());
        }

        let mut redirected: SmallVec<[RawInputDevice; 2]> = SmallVec::new();
        if has_mouse {
            redirected.push(RawInputDevice::mouse(window));
        }
        if has_keyboard {
            redirected.push(RawInputDevice::keyboard(window));
        }
        for device in &redirected {
            trace!("Redirecting {:?} device to {:#x}", device.kind(), window.0);
            self.platform
                .register_raw_input_devices(std::slice::from_ref(device))
                .map_err(TransitionStep::RedirectRawInput.fail())?;
        }
        Ok(())
    }

    /// Re-registers the snapshotted mouse and keyboard devices.
    ///
    /// Other devices were never touched by the redirect; they are logged and
    /// skipped.
    pub fn restore(&self, suppression: &HookSuppression) -> Result<(), TransitionError> {
        let Some(devices) = self.snapshot.lock().clone() else {
            return Ok(());
        };

        let _register = suppression.suppress(HookKind::RegisterRawInputDevices);
        debug!("Restoring old raw input devices");
        for (index, device) in devices.iter().enumerate() {
            log_device(index, device);
            match device.kind() {
                RawDeviceKind::Mouse | RawDeviceKind::Keyboard => {
                    self.platform
                        .register_raw_input_devices(std::slice::from_ref(device))
                        .map_err(TransitionStep::RestoreRawInput.fail())?;
                }
                RawDeviceKind::Other => {
                    warn!(
                        "Skipping unknown raw input device (usage page {:#x}, usage {:#x})",
                        device.usage_page, device.usage
                    );
                }
            }
        }

        *self.snapshot.lock() = None;
        Ok(())
    }

    /// `GetRawInputBuffer`: no data while the overlay is visible.
    pub fn on_get_raw_input_buffer(
        &self,
        visible: bool,
        buffer: Option<&mut [u8]>,
    ) -> HookResult<u32> {
        if !visible {
            return HookResult::PassThrough;
        }
        if let Some(buffer) = buffer {
            buffer.fill(0);
        }
        HookResult::Handled(RAW_INPUT_ERROR)
    }

    /// `GetRawInputData`: size queries (no buffer) still reach the OS.
    pub fn on_get_raw_input_data(&self, visible: bool, buffer: Option<&mut [u8]>) -> HookResult<u32> {
        match buffer {
            Some(buffer) if visible => {
                buffer.fill(0);
                HookResult::Handled(RAW_INPUT_ERROR)
            }
            _ => HookResult::PassThrough,
        }
    }

    /// `RegisterRawInputDevices`: logged, then refused while the overlay is
    /// visible.
    pub fn on_register_raw_input_devices(
        &self,
        visible: bool,
        devices: &[RawInputDevice],
    ) -> HookResult<bool> {
        for (index, device) in devices.iter().enumerate() {
            log_device(index, device);
            if device.flags & RIDEV_NOLEGACY == RIDEV_NOLEGACY {
                debug!("Raw input device {} registered with RIDEV_NOLEGACY", index);
            }
            if device.flags & RIDEV_REMOVE == RIDEV_REMOVE {
                debug!("Raw input device {} removed", index);
            }
        }

        if visible {
            HookResult::Handled(false)
        } else {
            HookResult::PassThrough
        }
    }
}
