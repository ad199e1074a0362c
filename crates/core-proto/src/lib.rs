//! Line protocol client for the load-balancer admin socket.
//!
//! The admin socket speaks a line-oriented request/reply protocol. After an
//! initial handshake (`prompt`, then `set timeout cli 60`) the session stays
//! in interactive prompt mode: every reply ends with the sentinel `"> "` at
//! the tail of the receive buffer. The client owns exactly one connected
//! stream and runs one request/reply pair at a time; a reply must be fully
//! drained to the sentinel before the next command is sent.
//!
//! Framing invariants:
//! * The sentinel only matches at the buffer tail. Across partial reads only
//!   the last `PROMPT.len() - 1` bytes of the previous tail need to be
//!   retained for matching.
//! * Reply lines split on `\n`; a trailing CR is preserved (callers
//!   tolerate it).
//! * EOF before the sentinel is a hard protocol error.

use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, trace};

/// Receive buffer size for a single read.
pub const BUFSIZE: usize = 4096;
/// Interactive prompt sentinel terminating every reply.
pub const PROMPT: &str = "> ";
/// Hard cap on reply lines yielded per command.
pub const MAXLINES: usize = 1000;
/// Idle timeout requested from the remote side during the handshake.
pub const CLI_TIMEOUT_SECS: u64 = 60;
/// Per-command read timeout on our side.
pub const CMD_TIMEOUT: Duration = Duration::from_secs(1);

mod error;
pub use error::ProtoError;

/// Command seam between the coordinator/data plane and the socket.
///
/// `execute` runs one full request/reply cycle; the returned lines never
/// include the prompt sentinel. Test doubles script replies through this
/// trait without a live socket.
pub trait Console {
    fn execute(&mut self, cmd: &str) -> Result<Vec<String>, ProtoError>;
    fn read_only(&self) -> bool;
}

/// Stateful admin-socket session in interactive prompt mode.
#[derive(Debug)]
pub struct Socket {
    stream: UnixStream,
    read_only: bool,
}

impl Socket {
    /// Connect and enter interactive prompt mode.
    ///
    /// Requires a remote that understands the `prompt` command; failing the
    /// handshake (including a drain that does not complete within the read
    /// timeout) is reported as [`ProtoError::Init`].
    pub fn connect<P: AsRef<Path>>(path: P, read_only: bool) -> Result<Self, ProtoError> {
        let stream = UnixStream::connect(path.as_ref())?;
        stream.set_read_timeout(Some(CMD_TIMEOUT))?;
        let mut socket = Socket { stream, read_only };
        debug!(target: "proto", path = %path.as_ref().display(), "connected");

        socket.handshake().map_err(|_| ProtoError::Init)?;
        Ok(socket)
    }

    fn handshake(&mut self) -> Result<(), ProtoError> {
        self.send("prompt")?;
        self.wait()?;
        self.send(&format!("set timeout cli {CLI_TIMEOUT_SECS}"))?;
        self.wait()?;
        debug!(target: "proto", "prompt mode established");
        Ok(())
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Write one command line, newline-terminated, in a single call.
    pub fn send(&mut self, cmdline: &str) -> Result<(), ProtoError> {
        trace!(target: "proto", cmd = cmdline, "send");
        let mut buf = Vec::with_capacity(cmdline.len() + 1);
        buf.extend_from_slice(cmdline.as_bytes());
        buf.push(b'\n');
        self.stream.write_all(&buf)?;
        Ok(())
    }

    /// Read and discard until the prompt sentinel appears at the buffer tail.
    pub fn wait(&mut self) -> Result<(), ProtoError> {
        let mut chunk = [0u8; BUFSIZE];
        let mut tail: Vec<u8> = Vec::with_capacity(BUFSIZE + PROMPT.len());
        loop {
            if tail.ends_with(PROMPT.as_bytes()) {
                return Ok(());
            }
            let keep = tail.len().saturating_sub(PROMPT.len() - 1);
            tail.drain(..keep);
            let n = self.fill(&mut chunk)?;
            tail.extend_from_slice(&chunk[..n]);
        }
    }

    /// Bounded lazy sequence of reply lines for the command sent last.
    ///
    /// Stops when the sentinel is observed at the buffer tail or after
    /// [`MAXLINES`] lines; in the cap case the remainder plus the prompt are
    /// drained and discarded so the session stays in lockstep.
    pub fn recv(&mut self) -> Replies<'_> {
        Replies {
            socket: self,
            rbuf: Vec::with_capacity(BUFSIZE),
            yielded: 0,
            done: false,
        }
    }

    /// Explicit session teardown; equivalent to dropping the client.
    pub fn close(self) {}

    fn fill(&mut self, chunk: &mut [u8]) -> Result<usize, ProtoError> {
        let n = self.stream.read(chunk)?;
        if n == 0 {
            return Err(ProtoError::UnexpectedEof);
        }
        Ok(n)
    }
}

impl Drop for Socket {
    /// Best-effort teardown: `quit` then close, errors swallowed.
    fn drop(&mut self) {
        let _ = self.send("quit");
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

impl Console for Socket {
    fn execute(&mut self, cmd: &str) -> Result<Vec<String>, ProtoError> {
        self.send(cmd)?;
        self.recv().collect()
    }

    fn read_only(&self) -> bool {
        self.read_only
    }
}

/// Iterator over the reply lines of one command.
pub struct Replies<'a> {
    socket: &'a mut Socket,
    rbuf: Vec<u8>,
    yielded: usize,
    done: bool,
}

impl Replies<'_> {
    fn take_line(&mut self) -> Option<String> {
        let pos = self.rbuf.iter().position(|&b| b == b'\n')?;
        let line = String::from_utf8_lossy(&self.rbuf[..pos]).into_owned();
        self.rbuf.drain(..=pos);
        Some(line)
    }
}

impl Iterator for Replies<'_> {
    type Item = Result<String, ProtoError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut chunk = [0u8; BUFSIZE];
        loop {
            if self.yielded < MAXLINES {
                if let Some(line) = self.take_line() {
                    self.yielded += 1;
                    return Some(Ok(line));
                }
            }
            if self.rbuf.ends_with(PROMPT.as_bytes()) {
                self.done = true;
                return None;
            }
            if self.yielded == MAXLINES {
                // Cap reached: stop buffering, keep only the sentinel tail.
                let keep = self.rbuf.len().saturating_sub(PROMPT.len() - 1);
                self.rbuf.drain(..keep);
            }
            match self.socket.fill(&mut chunk) {
                Ok(n) => self.rbuf.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
