//! The interception context.
//!
//! [`InputContext`] owns all state the overlay takes from the host: the
//! visibility flag, the saved cursor and clip state, the raw-input snapshot,
//! the deferred message queue and the per-thread input attachments. Hook
//! subscribers installed through [`InputContext::install`] route every
//! intercepted call to the `on_*` policy methods.
//!
//! Each `on_*` method first checks its [`HookKind`] suppression: while the
//! context itself is calling the API, the hook passes straight through.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use tracing::{debug, error, info, warn};

use crate::attach::ThreadInputAttacher;
use crate::callbacks::{BroadcastReport, CallbackHandle, CallbackRegistry};
use crate::config::InputConfig;
use crate::cursor::{CursorController, CursorState};
use crate::error::TransitionError;
use crate::guard::{HookKind, HookSuppression};
use crate::hooks::{HookRegistrations, HookTable};
use crate::hotkey::Hotkey;
use crate::platform::{InputPlatform, OverlayWindow};
use crate::queue::{InputQueue, QueuedMessage};
use crate::raw_input::{DeviceList, RawInputRedirector};
use crate::types::{
    CursorHandle, HookResult, Point, RawInputDevice, Rect, WindowMessage, is_blocked_message,
};
use crate::util::unlikely;

/// Receives window messages replayed by [`InputContext::process_queued_input`].
pub type InputEventCallback = dyn Fn(&WindowMessage) + Send + Sync;
/// Receives the new visibility after every transition.
pub type VisibilityCallback = dyn Fn(bool) + Send + Sync;

/// Value returned for a window message the overlay consumed.
const MESSAGE_CONSUMED: isize = 0;

pub struct InputContext {
    platform: Arc<dyn InputPlatform>,
    window: Arc<dyn OverlayWindow>,
    hotkey: Hotkey,
    suppression: HookSuppression,
    /// Serializes transitions against the hook policies.
    mode: ReentrantMutex<()>,
    visible: AtomicBool,
    previous_visible: AtomicBool,
    cursor: CursorController,
    raw_input: RawInputRedirector,
    queue: InputQueue,
    attacher: ThreadInputAttacher,
    input_events: CallbackRegistry<InputEventCallback>,
    visibility_events: CallbackRegistry<VisibilityCallback>,
}

impl InputContext {
    pub fn new(
        platform: Arc<dyn InputPlatform>,
        window: Arc<dyn OverlayWindow>,
        hotkey: Hotkey,
    ) -> Self {
        Self {
            cursor: CursorController::new(platform.clone()),
            raw_input: RawInputRedirector::new(platform.clone()),
            attacher: ThreadInputAttacher::new(platform.clone()),
            platform,
            window,
            hotkey,
            suppression: HookSuppression::new(),
            mode: ReentrantMutex::new(()),
            visible: AtomicBool::new(false),
            previous_visible: AtomicBool::new(false),
            queue: InputQueue::new(),
            input_events: CallbackRegistry::new(),
            visibility_events: CallbackRegistry::new(),
        }
    }

    /// Builds a context from the config file settings and initialises
    /// logging at the configured level.
    pub fn from_config(
        platform: Arc<dyn InputPlatform>,
        window: Arc<dyn OverlayWindow>,
        config: &InputConfig,
    ) -> anyhow::Result<Self> {
        crate::logging::init(config.debug_logging);
        let hotkey = config.hotkey()?;
        info!("Overlay toggle hotkey: {}", hotkey);
        Ok(Self::new(platform, window, hotkey))
    }

    pub fn hotkey(&self) -> Hotkey {
        self.hotkey
    }

    pub fn register_on_input_event(&self, callback: Box<InputEventCallback>) -> CallbackHandle {
        self.input_events.register(callback)
    }

    pub fn unregister_on_input_event(&self, handle: CallbackHandle) -> bool {
        self.input_events.unregister(handle)
    }

    pub fn register_on_visibility_change(&self, callback: Box<VisibilityCallback>) -> CallbackHandle {
        self.visibility_events.register(callback)
    }

    pub fn unregister_on_visibility_change(&self, handle: CallbackHandle) -> bool {
        self.visibility_events.unregister(handle)
    }

    #[inline]
    pub fn is_overlay_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    pub fn previous_overlay_visible(&self) -> bool {
        self.previous_visible.load(Ordering::Acquire)
    }

    /// Moves input ownership between host and overlay.
    ///
    /// When `visible != previous` the host's cursor, clip, and raw-input
    /// state is saved (overlay shown) or restored (overlay hidden). When they
    /// match, a visible overlay re-applies its clip rectangle for the
    /// window's current bounds and a hidden one forgets any stale saved
    /// cursor position.
    ///
    /// The flag takes the requested value before any step runs. On error the
    /// steps that completed stay in effect and the error names the one that
    /// failed.
    ///
    /// The context's own flag is the authority on which side owns input: a
    /// `previous` that disagrees with it is logged and replaced, so a repeated
    /// call never saves overlay state as the host's.
    pub fn set_overlay_visible(&self, visible: bool, previous: bool) -> Result<(), TransitionError> {
        let (result, changed) = {
            let _mode = self.mode.lock();
            self.transition(visible, previous)
        };
        self.finish_transition(visible, changed, result)
    }

    /// Flips visibility, as the hotkey does.
    pub fn toggle_overlay(&self) -> Result<(), TransitionError> {
        let (visible, result, changed) = {
            let _mode = self.mode.lock();
            let visible = !self.is_overlay_visible();
            info!("{}", if visible { "Showing overlay" } else { "Hiding overlay" });
            let (result, changed) = self.transition(visible, !visible);
            (visible, result, changed)
        };
        self.finish_transition(visible, changed, result)
    }

    /// Runs the steps for `previous -> visible`. Caller holds the mode lock.
    fn transition(&self, visible: bool, previous: bool) -> (Result<(), TransitionError>, bool) {
        let owned = self.is_overlay_visible();
        let previous = if previous != owned {
            warn!(
                "Overlay visibility passed as {} but tracked as {}, using tracked value",
                previous, owned
            );
            owned
        } else {
            previous
        };

        self.previous_visible.store(previous, Ordering::Release);
        self.visible.store(visible, Ordering::Release);

        let result = match (visible, previous) {
            (true, false) => self.enter_overlay(),
            (false, true) => self.leave_overlay(),
            (true, true) => self.refresh_clip(),
            (false, false) => {
                self.cursor.clear_saved_position();
                Ok(())
            }
        };
        (result, visible != previous)
    }

    /// Reports the outcome once the mode lock is released.
    fn finish_transition(
        &self,
        visible: bool,
        changed: bool,
        result: Result<(), TransitionError>,
    ) -> Result<(), TransitionError> {
        if let Err(e) = &result {
            error!("{}: {}", e, e.source);
        }
        if changed {
            self.visibility_events.broadcast(|callback| callback(visible));
        }
        result
    }

    fn enter_overlay(&self) -> Result<(), TransitionError> {
        let window = self.window.current_window();
        let suppression = &self.suppression;

        self.cursor.set_arrow_cursor(suppression)?;
        self.cursor.save_position(suppression)?;
        self.cursor.show(suppression);
        self.cursor.save_clip(suppression)?;
        self.cursor.apply_clip_union(suppression, window)?;
        self.raw_input.redirect(suppression, window)?;

        debug!("Overlay owns input");
        Ok(())
    }

    fn leave_overlay(&self) -> Result<(), TransitionError> {
        let suppression = &self.suppression;

        self.cursor.restore_cursor(suppression);
        self.cursor.restore_position(suppression)?;
        self.cursor.hide(suppression);
        self.cursor.restore_clip(suppression)?;
        self.raw_input.restore(suppression)?;

        debug!("Host owns input");
        Ok(())
    }

    fn refresh_clip(&self) -> Result<(), TransitionError> {
        self.cursor
            .apply_clip_union(&self.suppression, self.window.current_window())
    }

    /// Replays queued window messages to input subscribers, oldest first.
    ///
    /// Call once per overlay frame. Before each message the calling thread
    /// is attached to the message's originating thread; a failed attachment
    /// is logged and the message is still delivered.
    pub fn process_queued_input(&self) -> usize {
        let _set_cursor = self.suppression.suppress(HookKind::SetCursor);
        let _get_cursor_pos = self.suppression.suppress(HookKind::GetCursorPos);

        self.queue.drain(|entry| {
            if let Err(e) = self.attacher.ensure_attached(entry.thread_id) {
                warn!(
                    "Failed to attach to thread {} for message {:#06x}: {}",
                    entry.thread_id, entry.message.message, e
                );
            }

            let report: BroadcastReport = self
                .input_events
                .broadcast(|callback| callback(&entry.message));
            if unlikely(report.failed != 0) {
                warn!(
                    "{} input subscriber(s) failed on message {:#06x}",
                    report.failed, entry.message.message
                );
            }
        })
    }

    pub fn queued_input_len(&self) -> usize {
        self.queue.len()
    }

    /// Window procedure policy.
    ///
    /// Every message is queued for the overlay. The toggle hotkey is
    /// consumed and flips visibility; while the overlay is visible keyboard,
    /// mouse and `WM_INPUT` messages are withheld from the host.
    pub fn on_window_message(&self, message: &WindowMessage) -> HookResult<isize> {
        self.queue
            .push(QueuedMessage::capture(*message, &self.platform));

        if unlikely(self.hotkey.matches(message, self.platform.as_ref())) {
            if let Err(e) = self.toggle_overlay() {
                error!("Overlay toggle failed: {}", e);
            }
            return HookResult::Handled(MESSAGE_CONSUMED);
        }

        if self.is_overlay_visible() && is_blocked_message(message.message) {
            HookResult::Handled(MESSAGE_CONSUMED)
        } else {
            HookResult::PassThrough
        }
    }

    pub fn on_set_cursor(&self, cursor: CursorHandle) -> HookResult<CursorHandle> {
        if unlikely(self.suppression.is_suppressed(HookKind::SetCursor)) {
            return HookResult::PassThrough;
        }
        let _mode = self.mode.lock();
        self.cursor.on_set_cursor(self.is_overlay_visible(), cursor)
    }

    pub fn on_get_cursor_pos(&self) -> HookResult<Point> {
        if unlikely(self.suppression.is_suppressed(HookKind::GetCursorPos)) {
            return HookResult::PassThrough;
        }
        let _mode = self.mode.lock();
        self.cursor.on_get_cursor_pos(self.is_overlay_visible())
    }

    pub fn on_set_cursor_pos(&self, position: Point) -> HookResult<bool> {
        if unlikely(self.suppression.is_suppressed(HookKind::SetCursorPos)) {
            return HookResult::PassThrough;
        }
        let _mode = self.mode.lock();
        self.cursor
            .on_set_cursor_pos(self.is_overlay_visible(), position)
    }

    pub fn on_show_cursor(&self, show: bool) -> HookResult<i32> {
        if unlikely(self.suppression.is_suppressed(HookKind::ShowCursor)) {
            return HookResult::PassThrough;
        }
        let _mode = self.mode.lock();
        self.cursor.on_show_cursor(self.is_overlay_visible(), show)
    }

    pub fn on_clip_cursor(&self, rect: Option<Rect>) -> HookResult<bool> {
        if unlikely(self.suppression.is_suppressed(HookKind::ClipCursor)) {
            return HookResult::PassThrough;
        }
        let _mode = self.mode.lock();
        self.cursor.on_clip_cursor(self.is_overlay_visible(), rect)
    }

    pub fn on_get_clip_cursor(&self) -> HookResult<Rect> {
        if unlikely(self.suppression.is_suppressed(HookKind::GetClipCursor)) {
            return HookResult::PassThrough;
        }
        let _mode = self.mode.lock();
        self.cursor.on_get_clip_cursor(self.is_overlay_visible())
    }

    /// Device input reads return nothing while the overlay is visible.
    pub fn on_device_input(&self) -> HookResult<()> {
        if self.is_overlay_visible() {
            HookResult::Handled(())
        } else {
            HookResult::PassThrough
        }
    }

    pub fn on_get_raw_input_buffer(&self, buffer: Option<&mut [u8]>) -> HookResult<u32> {
        let _mode = self.mode.lock();
        self.raw_input
            .on_get_raw_input_buffer(self.is_overlay_visible(), buffer)
    }

    pub fn on_get_raw_input_data(&self, buffer: Option<&mut [u8]>) -> HookResult<u32> {
        let _mode = self.mode.lock();
        self.raw_input
            .on_get_raw_input_data(self.is_overlay_visible(), buffer)
    }

    pub fn on_register_raw_input_devices(&self, devices: &[RawInputDevice]) -> HookResult<bool> {
        if unlikely(self.suppression.is_suppressed(HookKind::RegisterRawInputDevices)) {
            return HookResult::PassThrough;
        }
        let _mode = self.mode.lock();
        self.raw_input
            .on_register_raw_input_devices(self.is_overlay_visible(), devices)
    }

    /// Subscribes this context to every interception point in `table`.
    ///
    /// Subscribers hold a weak reference; once the context is dropped they
    /// pass every call through.
    pub fn install(self: &Arc<Self>, table: &HookTable) -> HookRegistrations {
        let ctx = Arc::downgrade(self);
        let window_message = table.window_message.register(Box::new({
            let ctx = ctx.clone();
            move |message: &WindowMessage| with_context(&ctx, |c| c.on_window_message(message))
        }));
        let set_cursor = table.set_cursor.register(Box::new({
            let ctx = ctx.clone();
            move |cursor| with_context(&ctx, |c| c.on_set_cursor(cursor))
        }));
        let get_cursor_pos = table.get_cursor_pos.register(Box::new({
            let ctx = ctx.clone();
            move || with_context(&ctx, |c| c.on_get_cursor_pos())
        }));
        let set_cursor_pos = table.set_cursor_pos.register(Box::new({
            let ctx = ctx.clone();
            move |position| with_context(&ctx, |c| c.on_set_cursor_pos(position))
        }));
        let show_cursor = table.show_cursor.register(Box::new({
            let ctx = ctx.clone();
            move |show| with_context(&ctx, |c| c.on_show_cursor(show))
        }));
        let clip_cursor = table.clip_cursor.register(Box::new({
            let ctx = ctx.clone();
            move |rect| with_context(&ctx, |c| c.on_clip_cursor(rect))
        }));
        let get_clip_cursor = table.get_clip_cursor.register(Box::new({
            let ctx = ctx.clone();
            move || with_context(&ctx, |c| c.on_get_clip_cursor())
        }));
        let device_input = table.device_input.register(Box::new({
            let ctx = ctx.clone();
            move || with_context(&ctx, |c| c.on_device_input())
        }));
        let get_raw_input_buffer = table.get_raw_input_buffer.register(Box::new({
            let ctx = ctx.clone();
            move |buffer: Option<&mut [u8]>| with_context(&ctx, |c| c.on_get_raw_input_buffer(buffer))
        }));
        let get_raw_input_data = table.get_raw_input_data.register(Box::new({
            let ctx = ctx.clone();
            move |buffer: Option<&mut [u8]>| with_context(&ctx, |c| c.on_get_raw_input_data(buffer))
        }));
        let register_raw_input_devices = table.register_raw_input_devices.register(Box::new(
            move |devices: &[RawInputDevice]| with_context(&ctx, |c| c.on_register_raw_input_devices(devices)),
        ));

        debug!("Input hooks installed");
        HookRegistrations {
            window_message,
            set_cursor,
            get_cursor_pos,
            set_cursor_pos,
            show_cursor,
            clip_cursor,
            get_clip_cursor,
            device_input,
            get_raw_input_buffer,
            get_raw_input_data,
            register_raw_input_devices,
        }
    }

    /// Hands input back to the host and releases every thread attachment.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) -> Result<(), TransitionError> {
        let result = if self.is_overlay_visible() {
            self.set_overlay_visible(false, true)
        } else {
            Ok(())
        };

        let released = self.attacher.teardown();
        if released != 0 {
            debug!("Released {} thread input attachment(s)", released);
        }
        result
    }

    /// Releases the calling thread's input attachment, if any.
    pub fn release_thread_attachment(&self) -> bool {
        self.attacher.release_current_thread()
    }

    pub fn attached_thread_count(&self) -> usize {
        self.attacher.len()
    }

    pub fn cursor_state(&self) -> CursorState {
        self.cursor.state()
    }

    pub fn raw_input_snapshot(&self) -> Option<DeviceList> {
        self.raw_input.snapshot()
    }

    pub fn suppression(&self) -> &HookSuppression {
        &self.suppression
    }
}

#[inline]
fn with_context<T>(
    ctx: &Weak<InputContext>,
    policy: impl FnOnce(&InputContext) -> HookResult<T>,
) -> HookResult<T> {
    match ctx.upgrade() {
        Some(ctx) => policy(&ctx),
        None => HookResult::PassThrough,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransitionStep;
    use crate::platform::simulated::SimulatedPlatform;
    use crate::platform::{CurrentWindow, op};
    use crate::types::{WindowHandle, msg};

    const WINDOW: WindowHandle = WindowHandle(0x80);

    fn context() -> (Arc<SimulatedPlatform>, InputContext) {
        let sim = Arc::new(SimulatedPlatform::new());
        sim.add_window(WINDOW, Rect::new(0, 0, 640, 480));
        let ctx = InputContext::new(
            sim.clone(),
            Arc::new(CurrentWindow::new(WINDOW)),
            Hotkey::default(),
        );
        (sim, ctx)
    }

    #[test]
    fn test_starts_hidden() {
        let (_, ctx) = context();
        assert!(!ctx.is_overlay_visible());
        assert_eq!(ctx.on_get_cursor_pos(), HookResult::PassThrough);
        assert_eq!(ctx.on_device_input(), HookResult::PassThrough);
    }

    #[test]
    fn test_flag_set_even_when_step_fails() {
        let (sim, ctx) = context();
        sim.fail(op::GET_CURSOR_POS);

        let err = ctx.set_overlay_visible(true, false).unwrap_err();
        assert_eq!(err.step, TransitionStep::SaveCursorPosition);
        assert!(ctx.is_overlay_visible());
        assert!(!ctx.previous_overlay_visible());
    }

    #[test]
    fn test_suppressed_hook_passes_through() {
        let (_, ctx) = context();
        ctx.set_overlay_visible(true, false).unwrap();
        assert!(ctx.on_show_cursor(true).is_handled());

        let _guard = ctx.suppression().suppress(HookKind::ShowCursor);
        assert_eq!(ctx.on_show_cursor(true), HookResult::PassThrough);
    }

    #[test]
    fn test_device_input_dropped_while_visible() {
        let (_, ctx) = context();
        ctx.set_overlay_visible(true, false).unwrap();
        assert_eq!(ctx.on_device_input(), HookResult::Handled(()));
    }

    #[test]
    fn test_non_input_message_passes_while_visible() {
        let (_, ctx) = context();
        ctx.set_overlay_visible(true, false).unwrap();
        let size = WindowMessage::new(WINDOW, msg::WM_SIZE, 0, 0);
        let click = WindowMessage::new(WINDOW, msg::WM_LBUTTONDOWN, 0, 0);
        assert_eq!(ctx.on_window_message(&size), HookResult::PassThrough);
        assert_eq!(ctx.on_window_message(&click), HookResult::Handled(MESSAGE_CONSUMED));
        assert_eq!(ctx.queued_input_len(), 2);
    }

    #[test]
    fn test_visibility_broadcast_only_on_change() {
        let (_, ctx) = context();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        ctx.register_on_visibility_change(Box::new(move |visible| sink.lock().push(visible)));

        ctx.set_overlay_visible(true, false).unwrap();
        ctx.set_overlay_visible(true, true).unwrap();
        ctx.toggle_overlay().unwrap();
        assert_eq!(*seen.lock(), vec![true, false]);
    }
}
