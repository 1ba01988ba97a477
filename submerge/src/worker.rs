//! The client worker: serves commands from a window until end-of-input,
//! then hands itself to the Reaper.

use std::sync::Arc;

use tracing::{debug, info, warn};

use submerge_rowdb::Tree;

use crate::control::{ClientHandle, ControlContext};
use crate::interpreter::interpret_command;
use crate::window::Window;

/// Fixed response buffer capacity, matching the original's `char response[256]`.
pub const RESPONSE_CAPACITY: usize = 256;

/// Serve `window` against `tree` until end-of-input, observing `cc`'s pause
/// barrier between commands, then surrender `handle` to the Reaper.
pub fn run_client(
    handle: Arc<ClientHandle>,
    cc: Arc<ControlContext>,
    tree: Arc<Tree>,
    mut window: Box<dyn Window>,
) {
    debug!(target: "submerge", client_id = handle.id, "worker spawned");
    let mut response = String::new();

    loop {
        let line = match window.serve(&response) {
            Ok(Some(line)) => line,
            Ok(None) => {
                if let Err(e) = window.finish("all done") {
                    warn!(target: "submerge", client_id = handle.id, error = %e, "failed to write final response");
                }
                info!(target: "submerge", client_id = handle.id, "all done");
                break;
            }
            Err(e) => {
                warn!(target: "submerge", client_id = handle.id, error = %e, "window I/O error, terminating client");
                break;
            }
        };

        cc.pause.wait_if_paused(handle.id);

        if let Err(e) = interpret_command(&line, &mut response, RESPONSE_CAPACITY, &tree) {
            warn!(target: "submerge", client_id = handle.id, error = ?e, "interpreter error");
            response.clear();
            response.push_str("malformed command");
        }
    }

    debug!(target: "submerge", client_id = handle.id, "worker reached end of input");
    cc.terminate_self(&handle);
    // The window is dropped here, once the Reaper has signalled this worker
    // to stop waiting and `run_client` is about to return.
}
