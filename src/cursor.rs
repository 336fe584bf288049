//! Cursor and clip-rectangle save/restore.
//!
//! [`CursorController`] owns everything the overlay takes away from the host
//! when it becomes visible: the cursor shape, the cursor position, the
//! display counter increments, the clip rectangle. Each saved value is an
//! `Option` so a restore only runs when a matching save happened, and it is
//! cleared once restored. A save never replaces a value still waiting to be
//! restored: after a failed hand-back that value is the host's, while the
//! live OS state is the overlay's. The cursor shape is the exception; its
//! restore cannot fail.
//!
//! While the overlay owns input, the cursor hooks answer from this saved
//! state instead of the OS, so the host keeps seeing the values it set.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{TransitionError, TransitionStep};
use crate::guard::{HookKind, HookSuppression};
use crate::platform::InputPlatform;
use crate::types::{CursorHandle, HookResult, Point, Rect, WindowHandle};

/// Host cursor state recorded while the overlay owns input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorState {
    /// Cursor shape the host last set.
    pub saved_cursor: Option<CursorHandle>,
    /// Position the host sees while the overlay is visible.
    pub saved_position: Option<Point>,
    /// Clip rectangle the host sees while the overlay is visible.
    pub saved_clip: Option<Rect>,
    /// Display counter increments owed back to the host.
    pub show_count: i32,
}

pub struct CursorController {
    platform: Arc<dyn InputPlatform>,
    state: Mutex<CursorState>,
}

impl CursorController {
    pub fn new(platform: Arc<dyn InputPlatform>) -> Self {
        Self {
            platform,
            state: Mutex::new(CursorState::default()),
        }
    }

    pub fn state(&self) -> CursorState {
        *self.state.lock()
    }

    /// Swaps in the arrow cursor, remembering the host's cursor.
    pub fn set_arrow_cursor(&self, suppression: &HookSuppression) -> Result<(), TransitionError> {
        let arrow = self
            .platform
            .arrow_cursor()
            .map_err(TransitionStep::SetArrowCursor.fail())?;

        let _guard = suppression.suppress(HookKind::SetCursor);
        debug!("Setting arrow cursor");
        let previous = self.platform.set_cursor(arrow);
        self.state.lock().saved_cursor = Some(previous);
        Ok(())
    }

    /// Puts the host's cursor back, if one was recorded.
    pub fn restore_cursor(&self, suppression: &HookSuppression) {
        let Some(cursor) = self.state.lock().saved_cursor.take() else {
            return;
        };

        let _guard = suppression.suppress(HookKind::SetCursor);
        debug!("Setting old cursor");
        self.platform.set_cursor(cursor);
    }

    pub fn save_position(&self, suppression: &HookSuppression) -> Result<(), TransitionError> {
        if let Some(kept) = self.state.lock().saved_position {
            debug!("Keeping saved cursor position: [{}, {}]", kept.x, kept.y);
            return Ok(());
        }

        let _guard = suppression.suppress(HookKind::GetCursorPos);
        let position = self
            .platform
            .cursor_position()
            .map_err(TransitionStep::SaveCursorPosition.fail())?;

        debug!("Saving cursor position: [{}, {}]", position.x, position.y);
        self.state.lock().saved_position = Some(position);
        Ok(())
    }

    /// Moves the cursor back to the saved position. Nothing saved, nothing moved.
    pub fn restore_position(&self, suppression: &HookSuppression) -> Result<(), TransitionError> {
        let Some(position) = self.state.lock().saved_position else {
            return Ok(());
        };

        let _guard = suppression.suppress(HookKind::SetCursorPos);
        debug!("Restoring cursor position: [{}, {}]", position.x, position.y);
        self.platform
            .set_cursor_position(position)
            .map_err(TransitionStep::RestoreCursorPosition.fail())?;
        self.state.lock().saved_position = None;
        Ok(())
    }

    /// Forgets a saved position without moving the cursor.
    pub fn clear_saved_position(&self) {
        if self.state.lock().saved_position.take().is_some() {
            trace!("Cleared stale cursor position");
        }
    }

    /// Raises the display counter until the OS reports the cursor as shown.
    pub fn show(&self, suppression: &HookSuppression) {
        let _guard = suppression.suppress(HookKind::ShowCursor);
        let mut added = 0;
        loop {
            added += 1;
            if self.platform.show_cursor(true) >= 0 {
                break;
            }
        }
        debug!("Raised cursor display count {} time(s)", added);
        self.state.lock().show_count += added;
    }

    /// Takes back every display counter increment still owed.
    pub fn hide(&self, suppression: &HookSuppression) {
        let _guard = suppression.suppress(HookKind::ShowCursor);
        let mut state = self.state.lock();
        while state.show_count > 0 {
            state.show_count -= 1;
            self.platform.show_cursor(false);
        }
    }

    pub fn save_clip(&self, suppression: &HookSuppression) -> Result<(), TransitionError> {
        if let Some(kept) = self.state.lock().saved_clip {
            debug!("Keeping saved clip cursor: {}", kept);
            return Ok(());
        }

        let _guard = suppression.suppress(HookKind::GetClipCursor);
        let clip = self
            .platform
            .clip_rect()
            .map_err(TransitionStep::SaveClipRect.fail())?;

        debug!("Saving current clip cursor: {}", clip);
        self.state.lock().saved_clip = Some(clip);
        Ok(())
    }

    /// Widens the clip rectangle so the overlay window is reachable.
    ///
    /// The new rectangle is the union of the saved clip and the window's
    /// bounds. An invalid window is logged and leaves the clip untouched.
    pub fn apply_clip_union(
        &self,
        suppression: &HookSuppression,
        window: WindowHandle,
    ) -> Result<(), TransitionError> {
        if !self.platform.is_window(window) {
            warn!("Invalid window {:#x}, leaving clip cursor unchanged", window.0);
            return Ok(());
        }

        let bounds = self
            .platform
            .window_rect(window)
            .map_err(TransitionStep::ApplyClipRect.fail())?;
        let clip = match self.state.lock().saved_clip {
            Some(saved) => saved.union(&bounds),
            None => bounds,
        };

        let _guard = suppression.suppress(HookKind::ClipCursor);
        debug!("Setting new clip cursor: {}", clip);
        self.platform
            .set_clip_rect(clip)
            .map_err(TransitionStep::ApplyClipRect.fail())
    }

    pub fn restore_clip(&self, suppression: &HookSuppression) -> Result<(), TransitionError> {
        let Some(clip) = self.state.lock().saved_clip else {
            return Ok(());
        };

        let _guard = suppression.suppress(HookKind::ClipCursor);
        debug!("Restoring old clip cursor: {}", clip);
        self.platform
            .set_clip_rect(clip)
            .map_err(TransitionStep::RestoreClipRect.fail())?;
        self.state.lock().saved_clip = None;
        Ok(())
    }

    /// `SetCursor`: the new cursor is always recorded. While the overlay is
    /// visible the real cursor is left alone and the previously recorded one
    /// is returned.
    pub fn on_set_cursor(&self, visible: bool, cursor: CursorHandle) -> HookResult<CursorHandle> {
        let previous = self.state.lock().saved_cursor.replace(cursor);
        if visible {
            HookResult::Handled(previous.unwrap_or(CursorHandle::NULL))
        } else {
            HookResult::PassThrough
        }
    }

    pub fn on_get_cursor_pos(&self, visible: bool) -> HookResult<Point> {
        if !visible {
            return HookResult::PassThrough;
        }
        HookResult::Handled(self.state.lock().saved_position.unwrap_or_default())
    }

    pub fn on_set_cursor_pos(&self, visible: bool, position: Point) -> HookResult<bool> {
        if !visible {
            return HookResult::PassThrough;
        }
        self.state.lock().saved_position = Some(position);
        HookResult::Handled(true)
    }

    pub fn on_show_cursor(&self, visible: bool, show: bool) -> HookResult<i32> {
        if !visible {
            return HookResult::PassThrough;
        }
        let mut state = self.state.lock();
        state.show_count += if show { 1 } else { -1 };
        HookResult::Handled(state.show_count)
    }

    /// `ClipCursor`. Releasing the clip (`None`) always reaches the OS.
    pub fn on_clip_cursor(&self, visible: bool, rect: Option<Rect>) -> HookResult<bool> {
        match rect {
            Some(rect) if visible => {
                self.state.lock().saved_clip = Some(rect);
                HookResult::Handled(true)
            }
            _ => HookResult::PassThrough,
        }
    }

    pub fn on_get_clip_cursor(&self, visible: bool) -> HookResult<Rect> {
        if !visible {
            return HookResult::PassThrough;
        }
        match self.state.lock().saved_clip {
            Some(clip) => HookResult::Handled(clip),
            None => HookResult::PassThrough,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::op;
    use crate::platform::simulated::{ARROW_CURSOR, SCREEN, SimulatedPlatform};

    const WINDOW: WindowHandle = WindowHandle(0x40);

    fn controller() -> (Arc<SimulatedPlatform>, CursorController, HookSuppression) {
        let sim = Arc::new(SimulatedPlatform::new());
        sim.add_window(WINDOW, Rect::new(100, 100, 900, 700));
        let controller = CursorController::new(sim.clone());
        (sim, controller, HookSuppression::new())
    }

    #[test]
    fn test_arrow_cursor_swap_and_restore() {
        let (sim, cursor, suppression) = controller();
        let host_cursor = sim.cursor();

        cursor.set_arrow_cursor(&suppression).unwrap();
        assert_eq!(sim.cursor(), ARROW_CURSOR);
        assert_eq!(cursor.state().saved_cursor, Some(host_cursor));

        cursor.restore_cursor(&suppression);
        assert_eq!(sim.cursor(), host_cursor);
        assert!(cursor.state().saved_cursor.is_none());
    }

    #[test]
    fn test_arrow_cursor_load_failure() {
        let (sim, cursor, suppression) = controller();
        sim.fail(op::LOAD_CURSOR);
        let err = cursor.set_arrow_cursor(&suppression).unwrap_err();
        assert_eq!(err.step, TransitionStep::SetArrowCursor);
        assert!(cursor.state().saved_cursor.is_none());
    }

    #[test]
    fn test_position_restored_once() {
        let (sim, cursor, suppression) = controller();
        sim.move_cursor(Point::new(10, 20));
        cursor.save_position(&suppression).unwrap();

        sim.move_cursor(Point::new(500, 500));
        cursor.restore_position(&suppression).unwrap();
        assert_eq!(sim.position(), Point::new(10, 20));

        sim.move_cursor(Point::new(30, 30));
        cursor.restore_position(&suppression).unwrap();
        assert_eq!(sim.position(), Point::new(30, 30), "nothing left to restore");
    }

    #[test]
    fn test_cleared_position_is_not_restored() {
        let (sim, cursor, suppression) = controller();
        cursor.save_position(&suppression).unwrap();
        cursor.clear_saved_position();
        sim.move_cursor(Point::new(1, 1));
        cursor.restore_position(&suppression).unwrap();
        assert_eq!(sim.position(), Point::new(1, 1));
    }

    #[test]
    fn test_show_until_visible_then_hide() {
        let (sim, cursor, suppression) = controller();
        // Host hid the cursor twice
        sim.show_cursor(false);
        sim.show_cursor(false);

        cursor.show(&suppression);
        assert_eq!(sim.display_count(), 0);
        assert_eq!(cursor.state().show_count, 2);

        cursor.hide(&suppression);
        assert_eq!(sim.display_count(), -2);
        assert_eq!(cursor.state().show_count, 0);
    }

    #[test]
    fn test_show_when_already_visible_adds_one() {
        let (sim, cursor, suppression) = controller();
        cursor.show(&suppression);
        assert_eq!(sim.display_count(), 1);
        cursor.hide(&suppression);
        assert_eq!(sim.display_count(), 0);
    }

    #[test]
    fn test_clip_union_and_restore() {
        let (sim, cursor, suppression) = controller();
        let host_clip = Rect::new(200, 0, 1000, 400);
        sim.set_clip_rect(host_clip).unwrap();

        cursor.save_clip(&suppression).unwrap();
        cursor.apply_clip_union(&suppression, WINDOW).unwrap();
        assert_eq!(sim.clip(), Rect::new(100, 0, 1000, 700));

        cursor.restore_clip(&suppression).unwrap();
        assert_eq!(sim.clip(), host_clip);
        assert!(cursor.state().saved_clip.is_none());
    }

    #[test]
    fn test_clip_union_invalid_window_is_skipped() {
        let (sim, cursor, suppression) = controller();
        cursor.save_clip(&suppression).unwrap();
        cursor.apply_clip_union(&suppression, WindowHandle(0x99)).unwrap();
        assert_eq!(sim.clip(), SCREEN);
    }

    #[test]
    fn test_failed_clip_restore_keeps_saved_value() {
        let (sim, cursor, suppression) = controller();
        cursor.save_clip(&suppression).unwrap();
        sim.fail(op::CLIP_CURSOR);

        let err = cursor.restore_clip(&suppression).unwrap_err();
        assert_eq!(err.step, TransitionStep::RestoreClipRect);
        assert_eq!(cursor.state().saved_clip, Some(SCREEN));

        sim.recover(op::CLIP_CURSOR);
        cursor.restore_clip(&suppression).unwrap();
        assert!(cursor.state().saved_clip.is_none());
    }

    #[test]
    fn test_save_keeps_value_pending_restore() {
        let (sim, cursor, suppression) = controller();
        let host_clip = Rect::new(0, 0, 50, 50);
        sim.set_clip_rect(host_clip).unwrap();
        sim.move_cursor(Point::new(7, 8));
        cursor.save_position(&suppression).unwrap();
        cursor.save_clip(&suppression).unwrap();
        cursor.apply_clip_union(&suppression, WINDOW).unwrap();

        // Live state now belongs to the overlay
        sim.move_cursor(Point::new(600, 600));
        cursor.save_position(&suppression).unwrap();
        cursor.save_clip(&suppression).unwrap();
        assert_eq!(cursor.state().saved_position, Some(Point::new(7, 8)));
        assert_eq!(cursor.state().saved_clip, Some(host_clip));

        cursor.restore_clip(&suppression).unwrap();
        assert_eq!(sim.clip(), host_clip);
    }

    #[test]
    fn test_hooks_pass_through_when_hidden() {
        let (_, cursor, _) = controller();
        assert_eq!(cursor.on_get_cursor_pos(false), HookResult::PassThrough);
        assert_eq!(cursor.on_set_cursor_pos(false, Point::new(1, 1)), HookResult::PassThrough);
        assert_eq!(cursor.on_show_cursor(false, true), HookResult::PassThrough);
        assert_eq!(cursor.on_clip_cursor(false, Some(SCREEN)), HookResult::PassThrough);
        assert_eq!(cursor.on_get_clip_cursor(false), HookResult::PassThrough);
        assert_eq!(cursor.on_set_cursor(false, CursorHandle(5)), HookResult::PassThrough);
        // Still recorded for the next restore
        assert_eq!(cursor.state().saved_cursor, Some(CursorHandle(5)));
    }

    #[test]
    fn test_set_cursor_while_visible_returns_previous() {
        let (_, cursor, _) = controller();
        assert_eq!(cursor.on_set_cursor(true, CursorHandle(5)), HookResult::Handled(CursorHandle::NULL));
        assert_eq!(cursor.on_set_cursor(true, CursorHandle(6)), HookResult::Handled(CursorHandle(5)));
        assert_eq!(cursor.state().saved_cursor, Some(CursorHandle(6)));
    }

    #[test]
    fn test_set_cursor_pos_updates_saved_position() {
        let (sim, cursor, _) = controller();
        assert_eq!(cursor.on_set_cursor_pos(true, Point::new(4, 5)), HookResult::Handled(true));
        assert_eq!(cursor.on_get_cursor_pos(true), HookResult::Handled(Point::new(4, 5)));
        assert_ne!(sim.position(), Point::new(4, 5));
    }

    #[test]
    fn test_clip_hooks_track_internal_rect() {
        let (sim, cursor, _) = controller();
        let rect = Rect::new(1, 2, 3, 4);
        assert_eq!(cursor.on_get_clip_cursor(true), HookResult::PassThrough);
        assert_eq!(cursor.on_clip_cursor(true, Some(rect)), HookResult::Handled(true));
        assert_eq!(cursor.on_get_clip_cursor(true), HookResult::Handled(rect));
        assert_eq!(cursor.on_clip_cursor(true, None), HookResult::PassThrough);
        assert_eq!(sim.clip(), SCREEN);
    }
}
