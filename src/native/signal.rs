//! Per-object signal slots.
//!
//! The engine keeps at most one callback per signal name on each object. A
//! slot owns an opaque user-data pointer; its destroy notify runs once the
//! slot has been disconnected (or the object dropped) and no emission is still
//! using it.
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::object::ImageObject;
use super::progress::Progress;

/// Callback installed on a progress signal.
pub type SignalCallback =
    extern "C" fn(image: *const ImageObject, progress: *const Progress, user_data: *mut c_void);

/// Releases the user data of a slot.
pub type DestroyNotify = extern "C" fn(user_data: *mut c_void);

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct SignalId(u64);

static NEXT_SIGNAL_ID: AtomicU64 = AtomicU64::new(1);

impl SignalId {
    fn next() -> Self {
        SignalId(NEXT_SIGNAL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone, Copy)]
struct UserData(*mut c_void);

// The pointer is only handed back to the callback and destroy notify that
// were registered with it; both must accept calls from any thread.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

pub(crate) struct SignalSlot {
    id: SignalId,
    callback: SignalCallback,
    user_data: UserData,
    destroy: Option<DestroyNotify>,
}

impl SignalSlot {
    pub(crate) fn invoke(&self, image: *const ImageObject, progress: &Progress) {
        (self.callback)(image, progress as *const Progress, self.user_data.0);
    }
}

impl Drop for SignalSlot {
    fn drop(&mut self) {
        if let Some(destroy) = self.destroy {
            destroy(self.user_data.0);
        }
    }
}

#[derive(Default)]
pub(crate) struct SignalTable {
    slots: HashMap<&'static str, Arc<SignalSlot>>,
}

impl SignalTable {
    pub(crate) fn is_connected(&self, signal: &'static str) -> bool {
        self.slots.contains_key(signal)
    }

    /// Occupy `signal`. Returns `None` when the slot is already taken, in
    /// which case the caller still owns `user_data`.
    pub(crate) fn connect(
        &mut self,
        signal: &'static str,
        callback: SignalCallback,
        user_data: *mut c_void,
        destroy: Option<DestroyNotify>,
    ) -> Option<SignalId> {
        if self.slots.contains_key(signal) {
            return None;
        }
        let id = SignalId::next();
        self.slots.insert(
            signal,
            Arc::new(SignalSlot {
                id,
                callback,
                user_data: UserData(user_data),
                destroy,
            }),
        );
        Some(id)
    }

    /// Detach the slot with `id`, handing it back so the caller controls when
    /// the destroy notify runs (never under the table lock).
    pub(crate) fn take(&mut self, id: SignalId) -> Option<Arc<SignalSlot>> {
        let signal = self
            .slots
            .iter()
            .find(|(_, slot)| slot.id == id)
            .map(|(name, _)| *name)?;
        self.slots.remove(signal)
    }

    pub(crate) fn get(&self, signal: &'static str) -> Option<Arc<SignalSlot>> {
        self.slots.get(signal).cloned()
    }

    pub(crate) fn drain(&mut self) -> Vec<Arc<SignalSlot>> {
        self.slots.drain().map(|(_, slot)| slot).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    static DESTROYED: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn noop(_: *const ImageObject, _: *const Progress, _: *mut c_void) {}

    extern "C" fn count_destroy(_: *mut c_void) {
        DESTROYED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn second_connect_is_refused() {
        let mut table = SignalTable::default();
        let first = table.connect("eval", noop, std::ptr::null_mut(), None);
        assert!(first.is_some());
        assert!(table.connect("eval", noop, std::ptr::null_mut(), None).is_none());
        assert!(table.connect("posteval", noop, std::ptr::null_mut(), None).is_some());
    }

    #[test]
    fn destroy_runs_after_last_reference() {
        let before = DESTROYED.load(Ordering::SeqCst);
        let mut table = SignalTable::default();
        let id = table
            .connect("preeval", noop, std::ptr::null_mut(), Some(count_destroy))
            .unwrap();
        let in_flight = table.get("preeval").unwrap();
        let taken = table.take(id).unwrap();
        drop(taken);
        assert_eq!(DESTROYED.load(Ordering::SeqCst), before);
        drop(in_flight);
        assert_eq!(DESTROYED.load(Ordering::SeqCst), before + 1);
        assert!(!table.is_connected("preeval"));
    }
}
