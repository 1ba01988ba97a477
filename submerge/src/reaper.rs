//! The Reaper: a single background thread that drains the chopping-block
//! slot one client at a time.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::control::ControlContext;

/// Spawn the Reaper thread. It runs until `cc.request_reaper_stop()` is
/// called and the chopping block is empty.
pub fn spawn(cc: Arc<ControlContext>) -> JoinHandle<()> {
    thread::spawn(move || {
        debug!(target: "submerge", "reaper started");
        while cc.reap_one() {}
        debug!(target: "submerge", "reaper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ClientHandle;
    use std::thread;
    use std::time::Duration;
    use test_log::test;

    #[test]
    fn reaper_stops_cleanly_with_nothing_to_reap() {
        let cc = Arc::new(ControlContext::new());
        let reaper = spawn(Arc::clone(&cc));
        thread::sleep(Duration::from_millis(20));
        cc.request_reaper_stop();
        reaper.join().unwrap();
    }

    #[test]
    fn reaper_drains_a_pending_worker_before_stopping() {
        let cc = Arc::new(ControlContext::new());
        let handle = Arc::new(ClientHandle::new(7));
        let worker_cc = Arc::clone(&cc);
        let worker_handle = Arc::clone(&handle);
        let join = thread::spawn(move || {
            worker_cc.terminate_self(&worker_handle);
        });
        cc.register_spawn(7, join);

        let reaper = spawn(Arc::clone(&cc));
        // Give the worker a chance to enqueue itself before we ask to stop.
        thread::sleep(Duration::from_millis(20));
        cc.request_reaper_stop();
        reaper.join().unwrap();
        assert_eq!(cc.running.count(), 0);
    }
}
