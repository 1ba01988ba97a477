//! The administrator: reads single-letter control commands from its input
//! and spawns, pauses, resumes, drains, or exits.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use submerge_rowdb::Tree;

use crate::control::{ClientHandle, ControlContext};
use crate::reaper;
use crate::tokenizer::split_words;
use crate::window::{FileWindow, TerminalWindow, Window};
use crate::worker;

/// Owns the control context and the shared tree, and drives the admin loop.
pub struct Admin {
    cc: Arc<ControlContext>,
    tree: Arc<Tree>,
    next_id: AtomicU64,
}

impl Admin {
    pub fn new(tree: Arc<Tree>) -> Self {
        Admin {
            cc: Arc::new(ControlContext::new()),
            tree,
            next_id: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Run the admin loop: read lines from `input`, write diagnostics to
    /// `diagnostics`, until an `x` command (or end-of-input on `input`
    /// itself) is seen. Blocks for the whole lifetime of the server.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, mut diagnostics: W) -> io::Result<()> {
        let reaper_handle = reaper::spawn(Arc::clone(&self.cc));

        let mut line = String::new();
        loop {
            line.clear();
            let n = input.read_line(&mut line)?;
            if n == 0 {
                break;
            }

            let words = split_words(&line);
            if words.is_empty() {
                writeln!(diagnostics, "YOU HAVE TO TYPE SOMETHING FIRST.")?;
                continue;
            }
            if words[0].chars().count() != 1 {
                writeln!(diagnostics, "IMPROPER COMMAND FORMAT. CHECK FIRST ARGUMENT.")?;
                continue;
            }
            let cmd = words[0].chars().next().expect("checked non-empty above");
            if cmd != 'E' && words.len() > 1 {
                writeln!(diagnostics, "IMPROPER COMMAND. TRY AGAIN.")?;
                continue;
            }
            if cmd == 'E' && !(2..=3).contains(&words.len()) {
                writeln!(
                    diagnostics,
                    "IMPROPER USAGE. TRY AGAIN. 'E input_file [output_file]'"
                )?;
                continue;
            }

            match cmd {
                'e' => self.spawn_interactive(&mut diagnostics)?,
                'E' => self.spawn_file_backed(&words, &mut diagnostics)?,
                's' => self.cc.pause.pause(),
                'g' => self.cc.pause.resume(),
                'w' => {
                    info!(target: "submerge", "draining");
                    self.cc.running.drain();
                    info!(target: "submerge", "drained");
                }
                'x' => {
                    self.shutdown(reaper_handle);
                    return Ok(());
                }
                _ => writeln!(diagnostics, "ERROR. INVALID COMMAND.")?,
            }
        }

        self.shutdown(reaper_handle);
        Ok(())
    }

    fn spawn_interactive(&self, diagnostics: &mut impl Write) -> io::Result<()> {
        let id = self.next_id();
        match TerminalWindow::spawn(id) {
            Ok(window) => {
                self.spawn_worker(id, Box::new(window));
                Ok(())
            }
            Err(e) => {
                warn!(target: "submerge", client_id = id, error = %e, "failed to spawn interactive client");
                writeln!(diagnostics, "COULD NOT CREATE CLIENT WINDOW.")
            }
        }
    }

    fn spawn_file_backed(&self, words: &[String], diagnostics: &mut impl Write) -> io::Result<()> {
        let id = self.next_id();
        let input_path = &words[1];
        let output_path = words.get(2).map(String::as_str);
        match FileWindow::open(input_path, output_path) {
            Ok(window) => {
                self.spawn_worker(id, Box::new(window));
                Ok(())
            }
            Err(e) => {
                warn!(target: "submerge", client_id = id, error = %e, "failed to open client files");
                writeln!(diagnostics, "INVALID INPUT FILE. TRY AGAIN.")
            }
        }
    }

    fn spawn_worker(&self, id: u64, window: Box<dyn Window>) {
        let handle = Arc::new(ClientHandle::new(id));
        let cc = Arc::clone(&self.cc);
        let tree = Arc::clone(&self.tree);
        let join = thread::spawn(move || worker::run_client(handle, cc, tree, window));
        self.cc.register_spawn(id, join);
        info!(target: "submerge", client_id = id, "worker spawned");
    }

    fn shutdown(&self, reaper_handle: JoinHandle<()>) {
        info!(target: "submerge", "shutting down: draining remaining clients");
        self.cc.running.drain();
        self.cc.request_reaper_stop();
        let _ = reaper_handle.join();
        info!(target: "submerge", "shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use test_log::test;

    fn dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn scenario_file_client_add_then_query() {
        let dir = dir();
        let in_path = dir.path().join("add_only.txt");
        let out_path = dir.path().join("out1.txt");
        std::fs::write(&in_path, "a hello world\nq hello\n").unwrap();

        let admin_input = format!(
            "E {} {}\nw\nx\n",
            in_path.to_str().unwrap(),
            out_path.to_str().unwrap()
        );

        let admin = Admin::new(Arc::new(Tree::new()));
        let mut diagnostics = Vec::new();
        admin
            .run(Cursor::new(admin_input), &mut diagnostics)
            .unwrap();

        let out = std::fs::read_to_string(&out_path).unwrap();
        assert!(out.lines().any(|line| line.contains("world")));
        assert_eq!(out.lines().last(), Some("all done"));
    }

    #[test]
    fn scenario_two_clients_disjoint_keys_all_land() {
        let dir = dir();
        let in_path = dir.path().join("ten.txt");
        let mut contents = String::new();
        for i in 0..10 {
            contents.push_str(&format!("a k{i} v{i}\n"));
        }
        std::fs::write(&in_path, &contents).unwrap();

        let admin_input = format!(
            "E {0}\nE {0}\nw\nx\n",
            in_path.to_str().unwrap()
        );

        let tree = Arc::new(Tree::new());
        let admin = Admin::new(Arc::clone(&tree));
        let mut diagnostics = Vec::new();
        admin
            .run(Cursor::new(admin_input), &mut diagnostics)
            .unwrap();

        for i in 0..10 {
            let key = format!("k{i}");
            assert_eq!(
                tree.query(&key),
                submerge_rowdb::QueryOutcome::Found(format!("v{i}"))
            );
        }
    }

    #[test]
    fn scenario_eof_client_is_reaped_before_drain_returns() {
        let dir = dir();
        let in_path = dir.path().join("empty.txt");
        std::fs::write(&in_path, "").unwrap();

        let admin_input = format!("E {}\nw\nx\n", in_path.to_str().unwrap());

        let admin = Admin::new(Arc::new(Tree::new()));
        let mut diagnostics = Vec::new();
        admin
            .run(Cursor::new(admin_input), &mut diagnostics)
            .unwrap();
        // `run` having returned at all already proves `w` didn't hang.
    }

    #[test]
    fn scenario_bad_commands_print_diagnostics_and_still_exit_cleanly() {
        let admin_input = "foo\nE\nx\n".to_string();
        let admin = Admin::new(Arc::new(Tree::new()));
        let mut diagnostics = Vec::new();
        admin
            .run(Cursor::new(admin_input), &mut diagnostics)
            .unwrap();

        let text = String::from_utf8(diagnostics).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
