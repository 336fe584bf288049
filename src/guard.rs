//! Per-hook suppression used to call hooked APIs from inside the core.
//!
//! While a [`SuppressGuard`] for a [`HookKind`] is alive, the matching hook
//! passes straight through to the real implementation, but only on the
//! thread that took the guard. Host threads calling the same API meanwhile
//! still get the overlay policy. Each (thread, kind) pair keeps a depth
//! counter rather than a flag, so nested guards release independently.

use std::marker::PhantomData;
use std::thread;

/// Intercepted APIs the core calls back into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    SetCursor,
    GetCursorPos,
    SetCursorPos,
    ShowCursor,
    ClipCursor,
    GetClipCursor,
    RegisterRawInputDevices,
}

impl HookKind {
    pub const COUNT: usize = 7;

    pub const ALL: [HookKind; HookKind::COUNT] = [
        HookKind::SetCursor,
        HookKind::GetCursorPos,
        HookKind::SetCursorPos,
        HookKind::ShowCursor,
        HookKind::ClipCursor,
        HookKind::GetClipCursor,
        HookKind::RegisterRawInputDevices,
    ];
}

type SuppressionKey = (thread::ThreadId, HookKind);

/// Suppression set owned by an `InputContext`.
#[derive(Default)]
pub struct HookSuppression {
    /// Guard depth per calling thread and hook. Entries at depth 0 are removed.
    depth: scc::HashMap<SuppressionKey, u32>,
}

impl HookSuppression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppresses `kind` on the calling thread until the returned guard is
    /// dropped.
    #[must_use = "the hook is only suppressed while the guard is alive"]
    pub fn suppress(&self, kind: HookKind) -> SuppressGuard<'_> {
        let key = (thread::current().id(), kind);
        self.depth
            .entry_sync(key)
            .and_modify(|depth| *depth += 1)
            .or_insert(1);
        SuppressGuard {
            set: self,
            key,
            _not_send: PhantomData,
        }
    }

    /// True while the calling thread holds a guard for `kind`.
    #[inline]
    pub fn is_suppressed(&self, kind: HookKind) -> bool {
        self.depth
            .read_sync(&(thread::current().id(), kind), |_, depth| *depth != 0)
            .unwrap_or(false)
    }

    fn release(&self, key: SuppressionKey) {
        if let scc::hash_map::Entry::Occupied(mut entry) = self.depth.entry_sync(key) {
            *entry.get_mut() -= 1;
            if *entry.get() == 0 {
                let _ = entry.remove();
            }
        }
    }
}

/// Scoped suppression of one hook on one thread; released on every exit path.
///
/// Not `Send`: the guard must be dropped on the thread that took it.
pub struct SuppressGuard<'a> {
    set: &'a HookSuppression,
    key: SuppressionKey,
    _not_send: PhantomData<*const ()>,
}

impl SuppressGuard<'_> {
    pub fn kind(&self) -> HookKind {
        self.key.1
    }
}

impl Drop for SuppressGuard<'_> {
    fn drop(&mut self) {
        self.set.release(self.key);
    }
}
