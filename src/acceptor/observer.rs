//! Where the bytes read from each client end up.
//!
//! Every successful read produces exactly one call to
//! [`Observer::observe`], tagged with the id of the worker that served the
//! connection. The default [`StdoutObserver`] prints one line per read for
//! the operator; tests plug in a collector instead.

use std::io::{self, Write};

/// Identity of a worker within the pool (0-based).
pub type WorkerId = usize;

pub trait Observer: Send + Sync + 'static {
    /// Called once per served connection with the raw bytes of its single read.
    fn observe(&self, worker: WorkerId, payload: &[u8]);
}

/// Prints `worker <id> => <payload>` on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutObserver;

impl Observer for StdoutObserver {
    fn observe(&self, worker: WorkerId, payload: &[u8]) {
        let mut out = io::stdout().lock();
        // a closed stdout must not take the worker down
        let _ = writeln!(out, "{}", format_observation(worker, payload));
    }
}

/// Payload is opaque; non-UTF-8 bytes are shown lossily.
pub fn format_observation(worker: WorkerId, payload: &[u8]) -> String {
    format!("worker {worker} => {}", String::from_utf8_lossy(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_names_worker_and_payload() {
        assert_eq!(format_observation(2, b"hello"), "worker 2 => hello");
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let line = format_observation(0, &[b'a', 0xff, b'b']);
        assert_eq!(line, "worker 0 => a\u{fffd}b");
    }
}
