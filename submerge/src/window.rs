//! The per-client transport: either an interactive terminal child process,
//! or a pair of input/output files. Both collapse the same `create`/
//! `create_file`/`serve`/`destroy` contract into one trait plus `Drop`.

use std::env;
use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};

/// A transport a worker reads commands from and writes responses to.
pub trait Window: Send {
    /// Write `prev_response` as the prompt for the next line, then read and
    /// return that line (without its trailing newline), or `None` on EOF.
    fn serve(&mut self, prev_response: &str) -> io::Result<Option<String>>;

    /// Write `last_response` with no further read. Called once, in place of
    /// `serve`, when the worker has reached end-of-input: the client must
    /// still see this response even though there is no next prompt.
    fn finish(&mut self, last_response: &str) -> io::Result<()>;
}

/// An interactive client backed by a spawned terminal emulator.
///
/// The default backend is `xterm`; set `SUBMERGE_TERMINAL` to use another
/// one (mainly so tests and non-X11 environments can substitute `cat` or
/// similar instead of actually spawning a terminal).
pub struct TerminalWindow {
    child: Child,
    reader: BufReader<std::process::ChildStdout>,
}

impl TerminalWindow {
    pub fn spawn(id: u64) -> io::Result<Self> {
        let terminal = env::var("SUBMERGE_TERMINAL").unwrap_or_else(|_| "xterm".to_string());
        let title = format!("Client {id}");
        let mut child = Command::new(terminal)
            .arg("-title")
            .arg(title)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        let stdout = child.stdout.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "terminal child had no stdout pipe")
        })?;
        Ok(TerminalWindow {
            child,
            reader: BufReader::new(stdout),
        })
    }
}

impl Window for TerminalWindow {
    fn serve(&mut self, prev_response: &str) -> io::Result<Option<String>> {
        if let Some(stdin) = self.child.stdin.as_mut() {
            writeln!(stdin, "{prev_response}")?;
        }
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches('\n').to_string()))
    }

    fn finish(&mut self, last_response: &str) -> io::Result<()> {
        if let Some(stdin) = self.child.stdin.as_mut() {
            writeln!(stdin, "{last_response}")?;
        }
        Ok(())
    }
}

impl Drop for TerminalWindow {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A non-interactive client backed by an input file and an output file
/// (standard output of the server process when no output file is given).
pub struct FileWindow {
    input: BufReader<std::fs::File>,
    output: Box<dyn Write + Send>,
}

impl FileWindow {
    pub fn open(input_path: &str, output_path: Option<&str>) -> io::Result<Self> {
        let input = std::fs::File::open(input_path)?;
        let output: Box<dyn Write + Send> = match output_path {
            Some(path) => Box::new(std::fs::File::create(path)?),
            None => Box::new(io::stdout()),
        };
        Ok(FileWindow {
            input: BufReader::new(input),
            output,
        })
    }
}

impl Window for FileWindow {
    fn serve(&mut self, prev_response: &str) -> io::Result<Option<String>> {
        writeln!(self.output, "{prev_response}")?;
        self.output.flush()?;
        let mut line = String::new();
        let n = self.input.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches('\n').to_string()))
    }

    fn finish(&mut self, last_response: &str) -> io::Result<()> {
        writeln!(self.output, "{last_response}")?;
        self.output.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use test_log::test;

    #[test]
    fn file_window_round_trips_lines() {
        let mut input = tempfile::NamedTempFile::new().unwrap();
        writeln!(input, "a k1 v1").unwrap();
        writeln!(input, "q k1").unwrap();
        let output = tempfile::NamedTempFile::new().unwrap();

        let mut window = FileWindow::open(
            input.path().to_str().unwrap(),
            Some(output.path().to_str().unwrap()),
        )
        .unwrap();

        let first = window.serve("").unwrap();
        assert_eq!(first.as_deref(), Some("a k1 v1"));
        let second = window.serve("ok").unwrap();
        assert_eq!(second.as_deref(), Some("q k1"));
        let third = window.serve("v1").unwrap();
        assert_eq!(third, None);
    }

    #[test]
    fn file_window_open_fails_on_missing_input() {
        assert!(FileWindow::open("/no/such/file", None).is_err());
    }

    #[test]
    fn file_window_finish_writes_the_final_response_with_no_further_read() {
        let input = tempfile::NamedTempFile::new().unwrap();
        let output = tempfile::NamedTempFile::new().unwrap();

        let mut window = FileWindow::open(
            input.path().to_str().unwrap(),
            Some(output.path().to_str().unwrap()),
        )
        .unwrap();

        window.finish("all done").unwrap();

        let contents = std::fs::read_to_string(output.path()).unwrap();
        assert_eq!(contents, "all done\n");
    }
}
