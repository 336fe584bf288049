//! In-memory model of the OS input subsystem.
//!
//! Used on hosts without Win32 and by the test suite. It keeps the pieces
//! of state the interception core touches (cursor shape and position, the
//! display counter, the clip rectangle, window rectangles, raw-input
//! registrations, thread attachments, async key state) and follows the
//! platform's rules for each: the display counter starts at 0 and the
//! cursor is shown while it is non-negative, registering a device replaces
//! the registration with the same usage, `RIDEV_REMOVE` drops it.
//!
//! Any fallible operation can be made to fail with [`SimulatedPlatform::fail`].

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use super::{InputPlatform, op};
use crate::error::{OsError, OsResult};
use crate::types::{
    CursorHandle, Point, RIDEV_REMOVE, RawInputDevice, Rect, ThreadHandle, ThreadId,
    WindowHandle,
};

/// Handle returned for the stock arrow cursor.
pub const ARROW_CURSOR: CursorHandle = CursorHandle(0x0001_0003);
/// Virtual screen used as the unclipped clip rectangle.
pub const SCREEN: Rect = Rect::new(0, 0, 1920, 1080);

/// `ERROR_ACCESS_DENIED`, reported by injected failures.
const ERROR_ACCESS_DENIED: u32 = 5;
/// `ERROR_INVALID_PARAMETER`, reported for unknown threads and windows.
const ERROR_INVALID_PARAMETER: u32 = 87;
/// `ERROR_INVALID_WINDOW_HANDLE`.
const ERROR_INVALID_WINDOW_HANDLE: u32 = 1400;

static NEXT_THREAD_ID: AtomicU32 = AtomicU32::new(1000);

thread_local! {
    static SIMULATED_THREAD_ID: Cell<u32> = const { Cell::new(0) };
}

fn simulated_thread_id() -> ThreadId {
    SIMULATED_THREAD_ID.with(|id| {
        if id.get() == 0 {
            id.set(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed));
        }
        ThreadId(id.get())
    })
}

#[derive(Debug)]
struct SimState {
    cursor: CursorHandle,
    position: Point,
    display_count: i32,
    clip: Rect,
    windows: HashMap<WindowHandle, Rect>,
    raw_devices: Vec<RawInputDevice>,
    attachments: Vec<(ThreadId, ThreadId)>,
    open_threads: HashMap<ThreadHandle, ThreadId>,
    next_thread_handle: isize,
    exited_threads: HashSet<ThreadId>,
    keys_down: HashSet<u32>,
    failing: HashSet<&'static str>,
}

impl SimState {
    fn check(&self, operation: &'static str) -> OsResult<()> {
        if self.failing.contains(operation) {
            return Err(OsError::new(operation, ERROR_ACCESS_DENIED));
        }
        Ok(())
    }
}

pub struct SimulatedPlatform {
    state: Mutex<SimState>,
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                cursor: CursorHandle(0x0001_0005),
                position: Point::new(SCREEN.right / 2, SCREEN.bottom / 2),
                display_count: 0,
                clip: SCREEN,
                windows: HashMap::new(),
                raw_devices: Vec::new(),
                attachments: Vec::new(),
                open_threads: HashMap::new(),
                next_thread_handle: 0x100,
                exited_threads: HashSet::new(),
                keys_down: HashSet::new(),
                failing: HashSet::new(),
            }),
        }
    }

    /// Makes every later call of `operation` fail until [`Self::recover`].
    pub fn fail(&self, operation: &'static str) {
        self.state.lock().failing.insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.state.lock().failing.remove(operation);
    }

    pub fn add_window(&self, window: WindowHandle, rect: Rect) {
        self.state.lock().windows.insert(window, rect);
    }

    pub fn remove_window(&self, window: WindowHandle) {
        self.state.lock().windows.remove(&window);
    }

    /// Physical mouse movement, bypassing every hook.
    pub fn move_cursor(&self, point: Point) {
        self.state.lock().position = point;
    }

    pub fn set_key_down(&self, virtual_key: u32, down: bool) {
        let mut state = self.state.lock();
        if down {
            state.keys_down.insert(virtual_key);
        } else {
            state.keys_down.remove(&virtual_key);
        }
    }

    pub fn mark_thread_exited(&self, thread: ThreadId) {
        self.state.lock().exited_threads.insert(thread);
    }

    pub fn set_registered_devices(&self, devices: Vec<RawInputDevice>) {
        self.state.lock().raw_devices = devices;
    }

    pub fn cursor(&self) -> CursorHandle {
        self.state.lock().cursor
    }

    pub fn position(&self) -> Point {
        self.state.lock().position
    }

    pub fn display_count(&self) -> i32 {
        self.state.lock().display_count
    }

    pub fn clip(&self) -> Rect {
        self.state.lock().clip
    }

    pub fn registered_devices(&self) -> Vec<RawInputDevice> {
        self.state.lock().raw_devices.clone()
    }

    pub fn attachments(&self) -> Vec<(ThreadId, ThreadId)> {
        self.state.lock().attachments.clone()
    }

    pub fn open_thread_count(&self) -> usize {
        self.state.lock().open_threads.len()
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InputPlatform for SimulatedPlatform {
    fn arrow_cursor(&self) -> OsResult<CursorHandle> {
        self.state.lock().check(op::LOAD_CURSOR)?;
        Ok(ARROW_CURSOR)
    }

    fn set_cursor(&self, cursor: CursorHandle) -> CursorHandle {
        std::mem::replace(&mut self.state.lock().cursor, cursor)
    }

    fn cursor_position(&self) -> OsResult<Point> {
        let state = self.state.lock();
        state.check(op::GET_CURSOR_POS)?;
        Ok(state.position)
    }

    fn set_cursor_position(&self, point: Point) -> OsResult<()> {
        let mut state = self.state.lock();
        state.check(op::SET_CURSOR_POS)?;
        state.position = point;
        Ok(())
    }

    fn show_cursor(&self, show: bool) -> i32 {
        let mut state = self.state.lock();
        state.display_count += if show { 1 } else { -1 };
        state.display_count
    }

    fn clip_rect(&self) -> OsResult<Rect> {
        let state = self.state.lock();
        state.check(op::GET_CLIP_CURSOR)?;
        Ok(state.clip)
    }

    fn set_clip_rect(&self, rect: Rect) -> OsResult<()> {
        let mut state = self.state.lock();
        state.check(op::CLIP_CURSOR)?;
        state.clip = rect;
        Ok(())
    }

    fn is_window(&self, window: WindowHandle) -> bool {
        self.state.lock().windows.contains_key(&window)
    }

    fn window_rect(&self, window: WindowHandle) -> OsResult<Rect> {
        let state = self.state.lock();
        state.check(op::GET_WINDOW_RECT)?;
        state
            .windows
            .get(&window)
            .copied()
            .ok_or(OsError::new(op::GET_WINDOW_RECT, ERROR_INVALID_WINDOW_HANDLE))
    }

    fn registered_raw_input_devices(&self) -> OsResult<Vec<RawInputDevice>> {
        let state = self.state.lock();
        state.check(op::GET_REGISTERED_RAW_INPUT_DEVICES)?;
        Ok(state.raw_devices.clone())
    }

    fn register_raw_input_devices(&self, devices: &[RawInputDevice]) -> OsResult<()> {
        let mut state = self.state.lock();
        state.check(op::REGISTER_RAW_INPUT_DEVICES)?;
        for device in devices {
            let existing = state.raw_devices.iter().position(|d| d.same_usage(device));
            match (existing, device.flags & RIDEV_REMOVE != 0) {
                (Some(index), true) => {
                    state.raw_devices.remove(index);
                }
                (None, true) => {
                    return Err(OsError::new(
                        op::REGISTER_RAW_INPUT_DEVICES,
                        ERROR_INVALID_PARAMETER,
                    ));
                }
                (Some(index), false) => state.raw_devices[index] = *device,
                (None, false) => state.raw_devices.push(*device),
            }
        }
        Ok(())
    }

    fn current_thread_id(&self) -> ThreadId {
        simulated_thread_id()
    }

    fn open_thread(&self, thread: ThreadId) -> OsResult<ThreadHandle> {
        let mut state = self.state.lock();
        state.check(op::OPEN_THREAD)?;
        if state.exited_threads.contains(&thread) {
            return Err(OsError::new(op::OPEN_THREAD, ERROR_INVALID_PARAMETER));
        }
        let handle = ThreadHandle(state.next_thread_handle);
        state.next_thread_handle += 4;
        state.open_threads.insert(handle, thread);
        Ok(handle)
    }

    fn close_thread(&self, handle: ThreadHandle) {
        self.state.lock().open_threads.remove(&handle);
    }

    fn attach_thread_input(&self, from: ThreadId, to: ThreadId, attach: bool) -> OsResult<()> {
        let mut state = self.state.lock();
        state.check(op::ATTACH_THREAD_INPUT)?;
        if from == to
            || state.exited_threads.contains(&from)
            || state.exited_threads.contains(&to)
        {
            return Err(OsError::new(op::ATTACH_THREAD_INPUT, ERROR_INVALID_PARAMETER));
        }

        let existing = state.attachments.iter().position(|pair| *pair == (from, to));
        match (attach, existing) {
            (true, None) => state.attachments.push((from, to)),
            (true, Some(_)) => {}
            (false, Some(index)) => {
                state.attachments.remove(index);
            }
            (false, None) => {
                return Err(OsError::new(op::ATTACH_THREAD_INPUT, ERROR_INVALID_PARAMETER));
            }
        }
        Ok(())
    }

    fn is_key_down(&self, virtual_key: u32) -> bool {
        self.state.lock().keys_down.contains(&virtual_key)
    }
}
