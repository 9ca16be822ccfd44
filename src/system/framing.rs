// src/system/framing.rs

//! Command framing over a shared stdio channel.
//!
//! A persistent shell process has exactly one stdout and one stderr. To know where the
//! output of one command ends, every command is wrapped by its dialect between a
//! begin marker and an end marker carrying the exit code. Markers are unique per
//! command, so stale output from an earlier command can never be mistaken for the
//! current one.
//!
//! Pipes are drained by dedicated reader threads into unbounded channels. This keeps a
//! chatty stderr from blocking the child while we are still waiting on stdout.

use crate::{constants::MARKER_PREFIX, models::TransportId, system::error::ShellError};
use log::{debug, trace};
use std::{
    io::{ErrorKind, Read},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError},
    },
    thread,
    time::{Duration, Instant},
};
use uuid::Uuid;

/// Poll interval used while blocking, so that kills and deadlines are noticed quickly.
const POLL_SLICE: Duration = Duration::from_millis(100);
const READ_BUFFER_SIZE: usize = 8192;

/// The unique begin/end marker pair of one dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMarker {
    token: String,
}

impl FrameMarker {
    pub fn new() -> Self {
        Self {
            token: format!("{}{}", MARKER_PREFIX, Uuid::new_v4().simple()),
        }
    }

    pub fn begin(&self) -> String {
        format!("{}-begin", self.token)
    }

    pub fn end(&self) -> String {
        format!("{}-end", self.token)
    }
}

impl Default for FrameMarker {
    fn default() -> Self {
        Self::new()
    }
}

/// Bookkeeping for one blocking wait: an optional deadline and the kill flag of the
/// owning process.
#[derive(Debug)]
pub(crate) struct Waiter<'a> {
    transport: TransportId,
    killed: &'a AtomicBool,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    waiting_for: &'static str,
}

impl<'a> Waiter<'a> {
    pub(crate) fn new(
        transport: TransportId,
        killed: &'a AtomicBool,
        timeout: Option<Duration>,
        waiting_for: &'static str,
    ) -> Self {
        Self {
            transport,
            killed,
            timeout,
            deadline: timeout.map(|t| Instant::now() + t),
            waiting_for,
        }
    }

    /// A waiter sharing an absolute deadline computed earlier.
    pub(crate) fn until(
        transport: TransportId,
        killed: &'a AtomicBool,
        deadline: Option<(Instant, Duration)>,
        waiting_for: &'static str,
    ) -> Self {
        Self {
            transport,
            killed,
            timeout: deadline.map(|(_, t)| t),
            deadline: deadline.map(|(d, _)| d),
            waiting_for,
        }
    }

    pub(crate) fn transport(&self) -> TransportId {
        self.transport
    }

    /// How long the next blocking call may sleep.
    fn next_slice(&self) -> Result<Duration, ShellError> {
        if self.killed.load(Ordering::SeqCst) {
            return Err(ShellError::Killed(self.transport));
        }
        match (self.deadline, self.timeout) {
            (Some(deadline), Some(after)) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(ShellError::Timeout {
                        waiting_for: self.waiting_for,
                        after,
                    });
                }
                Ok(POLL_SLICE.min(deadline - now))
            }
            _ => Ok(POLL_SLICE),
        }
    }
}

/// Outcome of a single bounded body read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyRead {
    Data(usize),
    End,
}

/// The receiving side of one drained pipe, plus bytes received but not consumed yet.
#[derive(Debug)]
pub(crate) struct ChunkStream {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    eof: bool,
}

impl ChunkStream {
    /// Starts a reader thread that forwards everything read from `reader`.
    pub(crate) fn spawn<R>(name: String, mut reader: R) -> std::io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let thread_name = name.clone();
        thread::Builder::new().name(thread_name).spawn(move || {
            let mut buf = [0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let chunk = buf.iter().take(n).copied().collect::<Vec<u8>>();
                        if tx.send(chunk).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!("Reader '{}' stopped: {}", name, e);
                        break;
                    }
                }
            }
        })?;
        Ok(Self::from_receiver(rx))
    }

    pub(crate) fn from_receiver(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            eof: false,
        }
    }

    /// Pulls one more chunk into the pending buffer. Returns `false` at end of stream.
    fn fill(&mut self, waiter: &Waiter<'_>) -> Result<bool, ShellError> {
        if self.eof {
            return Ok(false);
        }
        loop {
            let slice = waiter.next_slice()?;
            match self.rx.recv_timeout(slice) {
                Ok(chunk) => {
                    self.pending.extend(chunk);
                    return Ok(true);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    self.eof = true;
                    return Ok(false);
                }
            }
        }
    }

    fn fill_or_died(&mut self, waiter: &Waiter<'_>) -> Result<(), ShellError> {
        if self.fill(waiter)? {
            Ok(())
        } else {
            Err(ShellError::ProcessDied(waiter.transport()))
        }
    }

    /// Discards everything up to and including `needle`.
    pub(crate) fn skip_through(&mut self, needle: &[u8], waiter: &Waiter<'_>) -> Result<(), ShellError> {
        loop {
            if let Some(pos) = find(&self.pending, needle) {
                if pos > 0 {
                    trace!(
                        "Skipping {} bytes of unframed output: {:?}",
                        pos,
                        String::from_utf8_lossy(self.pending.get(..pos).unwrap_or_default())
                    );
                }
                self.pending.drain(..pos + needle.len());
                return Ok(());
            }
            let keep = self.pending.len().min(needle.len().saturating_sub(1));
            let discard = self.pending.len() - keep;
            if discard > 0 {
                self.pending.drain(..discard);
            }
            self.fill_or_died(waiter)?;
        }
    }

    /// Copies body bytes into `out` until `needle` is reached. The needle itself is
    /// consumed when [`BodyRead::End`] is returned.
    pub(crate) fn read_body(
        &mut self,
        out: &mut [u8],
        needle: &[u8],
        waiter: &Waiter<'_>,
    ) -> Result<BodyRead, ShellError> {
        if out.is_empty() {
            return Ok(BodyRead::Data(0));
        }
        loop {
            let available = match find(&self.pending, needle) {
                Some(0) => {
                    self.pending.drain(..needle.len());
                    return Ok(BodyRead::End);
                }
                Some(pos) => pos,
                // A partial needle can only hide in the last `needle.len() - 1` bytes.
                None => self.pending.len().saturating_sub(needle.len().saturating_sub(1)),
            };
            if available > 0 {
                let n = available.min(out.len());
                for (dst, src) in out.iter_mut().zip(self.pending.drain(..n)) {
                    *dst = src;
                }
                return Ok(BodyRead::Data(n));
            }
            self.fill_or_died(waiter)?;
        }
    }

    /// Collects the whole body up to `needle`, consuming the needle.
    pub(crate) fn read_body_to_end(&mut self, needle: &[u8], waiter: &Waiter<'_>) -> Result<Vec<u8>, ShellError> {
        let mut body = Vec::new();
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            match self.read_body(&mut buf, needle, waiter)? {
                BodyRead::Data(n) => body.extend(buf.iter().take(n)),
                BodyRead::End => return Ok(body),
            }
        }
    }

    /// Reads up to the next line feed and returns the line without its terminator.
    pub(crate) fn read_line(&mut self, waiter: &Waiter<'_>) -> Result<String, ShellError> {
        loop {
            if let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=pos).take(pos).collect();
                return Ok(String::from_utf8_lossy(&line)
                    .trim_end_matches('\r')
                    .to_string());
            }
            self.fill_or_died(waiter)?;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_of(chunks: &[&[u8]]) -> ChunkStream {
        let (tx, rx) = mpsc::channel();
        for chunk in chunks {
            tx.send(chunk.to_vec()).unwrap();
        }
        drop(tx);
        ChunkStream::from_receiver(rx)
    }

    #[test]
    fn test_markers_are_unique() {
        let a = FrameMarker::new();
        let b = FrameMarker::new();
        assert_ne!(a, b);
        assert!(a.begin().starts_with(MARKER_PREFIX));
        assert!(a.end().ends_with("-end"));
    }

    #[test]
    fn test_body_split_across_chunk_boundaries() {
        // --- Setup ---
        let killed = AtomicBool::new(false);
        let waiter = Waiter::new(TransportId(1), &killed, None, "test output");
        let mut stream = stream_of(&[b"junkBE", b"GIN\nhello ", b"world\n--E", b"ND:0\n"]);

        // --- Execute ---
        stream.skip_through(b"BEGIN\n", &waiter).unwrap();
        let body = stream.read_body_to_end(b"\n--END:", &waiter).unwrap();
        let code = stream.read_line(&waiter).unwrap();

        // --- Assert ---
        assert_eq!(body, b"hello world");
        assert_eq!(code, "0");
    }

    #[test]
    fn test_binary_body_with_partial_needle_lookalikes() {
        let killed = AtomicBool::new(false);
        let waiter = Waiter::new(TransportId(1), &killed, None, "test output");
        let mut stream = stream_of(&[b"B\n\x00\n--E\xff\n--", b"EN", b"D:17\r\n"]);

        stream.skip_through(b"B\n", &waiter).unwrap();
        let body = stream.read_body_to_end(b"\n--END:", &waiter).unwrap();
        assert_eq!(body, b"\x00\n--E\xff");
        assert_eq!(stream.read_line(&waiter).unwrap(), "17");
    }

    #[test]
    fn test_eof_before_end_marker_is_process_death() {
        let killed = AtomicBool::new(false);
        let waiter = Waiter::new(TransportId(7), &killed, None, "test output");
        let mut stream = stream_of(&[b"BEGIN\npartial"]);

        stream.skip_through(b"BEGIN\n", &waiter).unwrap();
        let err = stream.read_body_to_end(b"\nEND:", &waiter).unwrap_err();
        assert!(matches!(err, ShellError::ProcessDied(TransportId(7))));
    }

    #[test]
    fn test_wait_times_out() {
        let killed = AtomicBool::new(false);
        let waiter = Waiter::new(
            TransportId(1),
            &killed,
            Some(Duration::from_millis(150)),
            "test output",
        );
        let (_tx, rx) = mpsc::channel::<Vec<u8>>();
        let mut stream = ChunkStream::from_receiver(rx);

        let started = Instant::now();
        let err = stream.skip_through(b"never", &waiter).unwrap_err();
        assert!(matches!(err, ShellError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_kill_flag_interrupts_wait() {
        let killed = AtomicBool::new(true);
        let waiter = Waiter::new(TransportId(2), &killed, None, "test output");
        let (_tx, rx) = mpsc::channel::<Vec<u8>>();
        let mut stream = ChunkStream::from_receiver(rx);

        let err = stream.read_line(&waiter).unwrap_err();
        assert!(matches!(err, ShellError::Killed(TransportId(2))));
    }
}
