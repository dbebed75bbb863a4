use std::collections::HashMap;
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use once_cell::sync::Lazy;
use tracing::{debug, error, trace, warn};

use super::snapshot::ProgressSnapshot;
use crate::api::Image;
use crate::config::ProgressConfig;
use crate::error::{Error, Result};
use crate::native::{ImageId, ImageObject, NativeImage, Progress, SignalId};
use crate::types::{CyclePolicy, Phase, ReenablePolicy};

/// Error a handler may return; it is logged and swallowed.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = std::result::Result<(), HandlerError>;

type Handler = Arc<dyn Fn(&Image, &ProgressSnapshot) -> HandlerResult + Send + Sync>;

/// Identifies one handler registration, for [`ProgressAdapter::unregister`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct RegistrationToken {
    pub image: ImageId,
    pub phase: Phase,
    id: u64,
}

#[derive(Clone)]
struct Registration {
    id: u64,
    handler: Handler,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum PassState {
    Idle,
    Evaluating,
    /// Single-shot tracking after its first pass
    Done,
}

/// Subscription set of one tracked image. Owned by the three installed
/// trampolines; the adapter table only holds a weak reference.
struct Tracked {
    image: ImageId,
    cycle: CyclePolicy,
    handlers: [RwLock<Vec<Registration>>; 3],
    state: Mutex<PassState>,
    signals: Mutex<Vec<SignalId>>,
    adapter: Weak<Shared>,
}

impl Tracked {
    /// Advance the pass state for `phase`; false means the event is dropped.
    fn advance(&self, phase: Phase) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == PassState::Done {
            return false;
        }
        *state = match phase {
            Phase::PreEval | Phase::Eval => PassState::Evaluating,
            Phase::PostEval => match self.cycle {
                CyclePolicy::Repeat => PassState::Idle,
                CyclePolicy::SingleShot => PassState::Done,
            },
        };
        true
    }

    fn deliver(&self, image: &Image, phase: Phase, snapshot: &ProgressSnapshot) {
        if !self.advance(phase) {
            trace!(
                "Dropping \"{}\" on image {}: single-shot tracking already completed",
                phase, self.image
            );
            return;
        }

        // Copy on read: registrations made or removed by a handler take
        // effect from the next dispatch.
        let handlers: Vec<Registration> = self.handlers[phase.index()]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        trace!(
            "Dispatching \"{}\" on image {} to {} handler(s): {}",
            phase,
            self.image,
            handlers.len(),
            snapshot
        );

        for reg in &handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| (reg.handler)(image, snapshot))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    "Progress handler {} for \"{}\" on image {} failed: {}",
                    reg.id, phase, self.image, e
                ),
                Err(payload) => error!(
                    "Progress handler {} for \"{}\" on image {} panicked: {}",
                    reg.id,
                    phase,
                    self.image,
                    panic_message(payload.as_ref())
                ),
            }
        }
    }

    fn clear(&self) {
        for list in &self.handlers {
            list.write().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        if let Some(shared) = self.adapter.upgrade() {
            let mut table = shared.tracked.lock().unwrap_or_else(PoisonError::into_inner);
            // A newer subscription set for the same image may have replaced us.
            if table.get(&self.image).is_some_and(|w| w.strong_count() == 0) {
                table.remove(&self.image);
            }
        }
        trace!("Released progress tracking for image {}", self.image);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// User data behind one native slot.
struct Trampoline {
    phase: Phase,
    tracked: Arc<Tracked>,
}

extern "C" fn progress_trampoline(
    image: *const ImageObject,
    progress: *const Progress,
    user_data: *mut c_void,
) {
    if image.is_null() || progress.is_null() || user_data.is_null() {
        return;
    }
    // Nothing may unwind across this boundary.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: `user_data` is the `Box<Trampoline>` leaked in
        // `enable_progress`; the engine keeps the slot, and so the box, alive
        // until this emission returns.
        let trampoline = unsafe { &*(user_data as *const Trampoline) };
        // SAFETY: the engine passes a pointer to a live `#[repr(C)]` struct
        // and a live object for the duration of the call.
        let progress = unsafe { *progress };
        let native = unsafe { NativeImage::from_borrowed_ptr(image) };
        let snapshot = ProgressSnapshot::from(&progress);
        trampoline
            .tracked
            .deliver(&Image::from_native(native), trampoline.phase, &snapshot);
    }));
    if outcome.is_err() {
        error!("Progress trampoline panicked");
    }
}

extern "C" fn release_trampoline(user_data: *mut c_void) {
    if !user_data.is_null() {
        // SAFETY: called once by the engine with the pointer produced by
        // `Box::into_raw` in `enable_progress`.
        drop(unsafe { Box::from_raw(user_data as *mut Trampoline) });
    }
}

struct Shared {
    policy: RwLock<ProgressConfig>,
    tracked: Mutex<HashMap<ImageId, Weak<Tracked>>>,
    next_id: AtomicU64,
}

/// Fans the engine's single progress slot per signal out to any number of
/// ordered handlers per phase.
///
/// Each tracked image gets exactly one trampoline per phase. Handlers are
/// appended to the trampoline's list and run synchronously, in registration
/// order, on whichever thread evaluates the image. A handler that returns an
/// error or panics is logged and skipped; it never stops its siblings or the
/// evaluation. There is no way for a handler to cancel a pass.
#[derive(Clone)]
pub struct ProgressAdapter {
    shared: Arc<Shared>,
}

static GLOBAL: Lazy<ProgressAdapter> =
    Lazy::new(|| ProgressAdapter::new(crate::config::current().progress));

impl Default for ProgressAdapter {
    fn default() -> Self {
        Self::new(ProgressConfig::default())
    }
}

impl ProgressAdapter {
    pub fn new(policy: ProgressConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                policy: RwLock::new(policy),
                tracked: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Process-wide adapter used by the `Image` convenience methods.
    pub fn global() -> &'static ProgressAdapter {
        &GLOBAL
    }

    pub fn policy(&self) -> ProgressConfig {
        *self
            .shared
            .policy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Change policies. The cycle policy applies to images tracked from now on.
    pub fn set_policy(&self, policy: ProgressConfig) {
        *self
            .shared
            .policy
            .write()
            .unwrap_or_else(PoisonError::into_inner) = policy;
    }

    fn lookup(&self, image: ImageId) -> Option<Arc<Tracked>> {
        self.shared
            .tracked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&image)
            .and_then(Weak::upgrade)
    }

    pub fn is_tracked(&self, image: &Image) -> bool {
        self.lookup(image.id()).is_some()
    }

    /// Number of handlers currently registered for `(image, phase)`.
    pub fn handler_count(&self, image: &Image, phase: Phase) -> usize {
        let Some(tracked) = self.lookup(image.id()) else {
            return 0;
        };
        tracked.handlers[phase.index()]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Turn on progress reporting for `image` and install one trampoline per
    /// phase. Passes already under way are not reported retroactively.
    pub fn enable_progress(&self, image: &Image) -> Result<()> {
        let id = image.id();
        let native = image.native();
        let policy = self.policy();

        if self.lookup(id).is_some() {
            return match policy.reenable {
                ReenablePolicy::Idempotent => {
                    debug!("Progress already enabled for image {}", id);
                    native.set_progress(true);
                    Ok(())
                }
                ReenablePolicy::Reject => Err(Error::AlreadyTracked { image: id }),
            };
        }

        let tracked = Arc::new(Tracked {
            image: id,
            cycle: policy.cycle,
            handlers: Default::default(),
            state: Mutex::new(PassState::Idle),
            signals: Mutex::new(Vec::with_capacity(Phase::ALL.len())),
            adapter: Arc::downgrade(&self.shared),
        });

        let mut connected = Vec::with_capacity(Phase::ALL.len());
        for phase in Phase::ALL {
            let user_data = Box::into_raw(Box::new(Trampoline {
                phase,
                tracked: Arc::clone(&tracked),
            })) as *mut c_void;
            match native.signal_connect(
                phase.signal_name(),
                progress_trampoline,
                user_data,
                Some(release_trampoline),
            ) {
                Ok(signal) => connected.push(signal),
                Err(e) => {
                    release_trampoline(user_data);
                    for signal in connected {
                        native.signal_disconnect(signal);
                    }
                    return Err(e.into());
                }
            }
        }
        *tracked.signals.lock().unwrap_or_else(PoisonError::into_inner) = connected;

        {
            let mut table = self
                .shared
                .tracked
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            table.retain(|_, w| w.strong_count() > 0);
            table.insert(id, Arc::downgrade(&tracked));
        }
        native.set_progress(true);
        debug!(
            "Enabled progress tracking for image {} ({:?})",
            id, policy.cycle
        );
        Ok(())
    }

    /// Detach the trampolines and release every registration for `image`.
    /// Returns false if the image was not tracked.
    pub fn disable_progress(&self, image: &Image) -> bool {
        let id = image.id();
        let removed = self
            .shared
            .tracked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        let Some(tracked) = removed.and_then(|w| w.upgrade()) else {
            return false;
        };

        let native = image.native();
        native.set_progress(false);
        let signals: Vec<SignalId> = tracked
            .signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for signal in signals {
            native.signal_disconnect(signal);
        }
        tracked.clear();
        debug!("Disabled progress tracking for image {}", id);
        true
    }

    /// Append `handler` to the ordered list for `(image, phase)`.
    ///
    /// Fails with [`Error::NotTracked`] unless [`enable_progress`] was called
    /// for the image first.
    ///
    ///
    /// Handlers are owned by the image, so a handler must reach the image
    /// through its `&Image` argument. Capturing a clone of the handle forms a
    /// reference cycle: the image and its registrations then live until the
    /// handler is unregistered or progress is disabled.
    ///
    /// [`enable_progress`]: ProgressAdapter::enable_progress
    pub fn register<F>(&self, image: &Image, phase: Phase, handler: F) -> Result<RegistrationToken>
    where
        F: Fn(&Image, &ProgressSnapshot) -> HandlerResult + Send + Sync + 'static,
    {
        let tracked = self
            .lookup(image.id())
            .ok_or(Error::NotTracked { image: image.id() })?;
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        tracked.handlers[phase.index()]
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration {
                id,
                handler: Arc::new(handler),
            });
        debug!(
            "Registered progress handler {} for \"{}\" on image {}",
            id,
            phase,
            image.id()
        );
        Ok(RegistrationToken {
            image: image.id(),
            phase,
            id,
        })
    }

    /// Remove one handler. Returns false if it was already gone.
    pub fn unregister(&self, token: RegistrationToken) -> bool {
        let Some(tracked) = self.lookup(token.image) else {
            return false;
        };
        let mut list = tracked.handlers[token.phase.index()]
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match list.iter().position(|r| r.id == token.id) {
            Some(pos) => {
                list.remove(pos);
                debug!(
                    "Unregistered progress handler {} for \"{}\" on image {}",
                    token.id, token.phase, token.image
                );
                true
            }
            None => false,
        }
    }

    /// Deliver `snapshot` to the handlers registered for `(image, phase)`, in
    /// registration order. This is the entry point the installed trampolines
    /// use; calling it directly on an untracked image does nothing.
    pub fn dispatch(&self, image: &Image, phase: Phase, snapshot: &ProgressSnapshot) {
        match self.lookup(image.id()) {
            Some(tracked) => tracked.deliver(image, phase, snapshot),
            None => trace!(
                "Ignoring \"{}\" for untracked image {}",
                phase,
                image.id()
            ),
        }
    }
}
