//! The control-plane state shared by every worker, the administrator, and
//! the Reaper: the pause barrier, the quiescence barrier, and the
//! chopping-block handoff. Bundled into one `ControlContext` rather than
//! scattered module-level globals, per the design note in this crate's
//! requirements.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, info};

/// One client's identity as seen by the control plane: an id and the
/// condition variable the Reaper signals to wake it for good.
pub struct ClientHandle {
    pub id: u64,
    exit: Mutex<bool>,
    exit_cv: Condvar,
}

impl ClientHandle {
    pub fn new(id: u64) -> Self {
        ClientHandle {
            id,
            exit: Mutex::new(false),
            exit_cv: Condvar::new(),
        }
    }

    /// Block until the Reaper calls `signal_exit`. Spurious wakeups are
    /// handled by re-checking the flag.
    fn wait_for_exit_signal(&self) {
        let mut flag = self.exit.lock().expect("client exit flag poisoned");
        while !*flag {
            flag = self.exit_cv.wait(flag).expect("client exit flag poisoned");
        }
    }

    fn signal_exit(&self) {
        let mut flag = self.exit.lock().expect("client exit flag poisoned");
        *flag = true;
        self.exit_cv.notify_all();
    }
}

#[derive(Default)]
struct PauseState {
    paused: bool,
}

/// Global pause: workers check this between commands, never mid-command.
#[derive(Default)]
pub struct PauseBarrier {
    state: Mutex<PauseState>,
    cv: Condvar,
}

impl PauseBarrier {
    pub fn pause(&self) {
        let mut state = self.state.lock().expect("pause lock poisoned");
        state.paused = true;
        info!(target: "submerge", "pause engaged");
    }

    pub fn resume(&self) {
        let mut state = self.state.lock().expect("pause lock poisoned");
        state.paused = false;
        self.cv.notify_all();
        info!(target: "submerge", "pause released");
    }

    /// Called by a worker between commands. Blocks while paused.
    pub fn wait_if_paused(&self, client_id: u64) {
        let mut state = self.state.lock().expect("pause lock poisoned");
        if state.paused {
            debug!(target: "submerge", client_id, "worker entering pause wait");
            while state.paused {
                state = self.cv.wait(state).expect("pause lock poisoned");
            }
            debug!(target: "submerge", client_id, "worker leaving pause wait");
        }
    }
}

#[derive(Default)]
struct RunningState {
    count: u64,
}

/// The "wait until idle" barrier: tracks spawned-but-not-yet-reaped workers.
#[derive(Default)]
pub struct QuiescenceBarrier {
    state: Mutex<RunningState>,
    cv: Condvar,
}

impl QuiescenceBarrier {
    fn spawned(&self) {
        let mut state = self.state.lock().expect("running lock poisoned");
        state.count += 1;
    }

    fn reaped(&self) {
        let mut state = self.state.lock().expect("running lock poisoned");
        state.count -= 1;
        self.cv.notify_all();
    }

    /// Block until every worker spawned so far has been reaped. Workers
    /// spawned concurrently with a `drain` in progress extend the wait.
    pub fn drain(&self) {
        let mut state = self.state.lock().expect("running lock poisoned");
        while state.count > 0 {
            state = self.cv.wait(state).expect("running lock poisoned");
        }
    }

    /// Current count, exposed for tests verifying counter exactness.
    pub fn count(&self) -> u64 {
        self.state.lock().expect("running lock poisoned").count
    }
}

#[derive(Default)]
struct ChoppingBlockState {
    occupant: Option<Arc<ClientHandle>>,
    stop: bool,
}

/// The single-slot mailbox by which a worker requests its own reaping, plus
/// the registry of join handles the Reaper needs to actually join a worker
/// it only knows by id.
#[derive(Default)]
struct ChoppingBlock {
    state: Mutex<ChoppingBlockState>,
    cv: Condvar,
}

impl ChoppingBlock {
    /// Called by a terminating worker. Blocks until the slot is free, then
    /// installs itself and returns.
    fn enqueue(&self, handle: Arc<ClientHandle>) {
        let mut state = self.state.lock().expect("chopping block poisoned");
        while state.occupant.is_some() {
            state = self.cv.wait(state).expect("chopping block poisoned");
        }
        state.occupant = Some(handle);
        self.cv.notify_all();
    }

    /// Called by the Reaper. Blocks until either a worker is waiting (in
    /// which case it's returned without clearing the slot, so the slot
    /// stays occupied for the whole teardown, per this crate's resolution
    /// of the original's ambiguous chopping-block-mutex-vs-destroy
    /// ordering) or a shutdown has been requested and there is nothing
    /// left to reap.
    fn wait_for_occupant_or_stop(&self) -> Option<Arc<ClientHandle>> {
        let mut state = self.state.lock().expect("chopping block poisoned");
        loop {
            if let Some(handle) = state.occupant.clone() {
                return Some(handle);
            }
            if state.stop {
                return None;
            }
            state = self.cv.wait(state).expect("chopping block poisoned");
        }
    }

    fn clear(&self) {
        let mut state = self.state.lock().expect("chopping block poisoned");
        state.occupant = None;
        self.cv.notify_all();
    }

    fn request_stop(&self) {
        let mut state = self.state.lock().expect("chopping block poisoned");
        state.stop = true;
        self.cv.notify_all();
    }
}

/// Shared control-plane state: pause barrier, quiescence barrier, and the
/// chopping-block handoff, plus the join-handle registry the Reaper needs
/// to join a worker it only has an id/exit-signal for.
#[derive(Default)]
pub struct ControlContext {
    pub pause: PauseBarrier,
    pub running: QuiescenceBarrier,
    chopping_block: ChoppingBlock,
    joins: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl ControlContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly spawned worker's join handle and count it as running.
    pub fn register_spawn(&self, id: u64, join: JoinHandle<()>) {
        self.joins
            .lock()
            .expect("join registry poisoned")
            .insert(id, join);
        self.running.spawned();
    }

    /// Called by a worker at end-of-input: hand itself to the Reaper and
    /// block until it is signalled to exit.
    pub fn terminate_self(&self, handle: &Arc<ClientHandle>) {
        self.chopping_block.enqueue(Arc::clone(handle));
        handle.wait_for_exit_signal();
    }

    /// Request that the Reaper's loop stop once there is nothing left in
    /// the chopping block. Called once, from the administrator's shutdown
    /// path, after `drain` has already returned.
    pub fn request_reaper_stop(&self) {
        self.chopping_block.request_stop();
    }

    /// The Reaper's loop body: wait for a worker or a stop request. Returns
    /// `false` once stopped and there was nothing left to reap.
    pub fn reap_one(&self) -> bool {
        let handle = match self.chopping_block.wait_for_occupant_or_stop() {
            Some(handle) => handle,
            None => return false,
        };
        handle.signal_exit();

        let join = self
            .joins
            .lock()
            .expect("join registry poisoned")
            .remove(&handle.id);
        match join {
            Some(join) => {
                if join.join().is_err() {
                    tracing::error!(target: "submerge", client_id = handle.id, "worker thread panicked");
                } else {
                    info!(target: "submerge", client_id = handle.id, "worker reaped");
                }
            }
            None => {
                tracing::error!(target: "submerge", client_id = handle.id, "reaped worker had no registered join handle");
            }
        }

        self.running.reaped();
        self.chopping_block.clear();
        true
    }
}
