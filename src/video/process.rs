use std::io::Read;
use std::process::Child;
use std::thread::{self, JoinHandle};

/// Bytes of diagnostic output kept from a child's stderr.
const TAIL_BYTES: usize = 2048;

/// Drains a child's stderr on a background thread, keeping the last
/// [`TAIL_BYTES`] so a failing ffmpeg can say why without the pipe ever
/// filling up and stalling it.
pub(crate) struct StderrTail {
    handle: Option<JoinHandle<Vec<u8>>>,
}

impl StderrTail {
    /// Take `child`'s stderr pipe, if it has one.
    pub(crate) fn capture(child: &mut Child) -> Self {
        let handle = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut kept = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    match stderr.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            kept.extend_from_slice(&chunk[..n]);
                            if kept.len() > 2 * TAIL_BYTES {
                                kept.drain(..kept.len() - TAIL_BYTES);
                            }
                        }
                    }
                }
                kept
            })
        });
        Self { handle }
    }

    /// Wait for stderr to close and return its last lines. Only call once the
    /// child has exited or its stdout has hit EOF.
    pub(crate) fn collect(&mut self) -> String {
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(bytes)) => stderr_tail(&bytes),
            _ => String::new(),
        }
    }
}

/// Last non-empty lines of `bytes` that fit in [`TAIL_BYTES`], joined with
/// `; ` for a single log line.
pub(crate) fn stderr_tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(TAIL_BYTES);
    let text = String::from_utf8_lossy(&bytes[start..]);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let keep = lines.len().saturating_sub(5);
    lines[keep..].join("; ")
}

/// Append a non-empty stderr tail to an error message.
pub(crate) fn with_tail(message: String, tail: &str) -> String {
    if tail.is_empty() {
        message
    } else {
        format!("{message}: {tail}")
    }
}
