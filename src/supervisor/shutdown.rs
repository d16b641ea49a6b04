//! The process-wide running flag and the signal handler that clears it.
//!
//! Workers are threads of one process, so a single flag is enough: the
//! handler stores `false`, every worker loop and the supervisor wait loop
//! load it. A worker notices within one epoll wait timeout.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::core::error::{FatalError, Op};

/// Cooperative stop signal shared by the supervisor and every worker.
#[derive(Debug, Clone)]
pub struct Shutdown {
    running: Arc<AtomicBool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Ask everyone to stop. Idempotent.
    pub fn trigger(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

// Read from the signal handler: after init, `get` is a single atomic load.
static SIGNAL_TARGET: OnceLock<Arc<AtomicBool>> = OnceLock::new();

extern "C" fn on_signal(_sig: libc::c_int) {
    if let Some(running) = SIGNAL_TARGET.get() {
        running.store(false, Ordering::Relaxed);
    }
}

/// Route SIGINT and SIGTERM to `shutdown`.
///
/// Only one flag can be the signal target per process; installing a second,
/// different one is an error.
pub fn install_signal_handlers(shutdown: &Shutdown) -> Result<(), FatalError> {
    let target = SIGNAL_TARGET.get_or_init(|| shutdown.running.clone());
    if !Arc::ptr_eq(target, &shutdown.running) {
        return Err(FatalError::new(
            Op::InstallSignalHandler,
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                "signal handlers already route to another shutdown flag",
            ),
        ));
    }

    for sig in [libc::SIGINT, libc::SIGTERM] {
        let prev = unsafe { libc::signal(sig, on_signal as *const () as libc::sighandler_t) };
        if prev == libc::SIG_ERR {
            return Err(FatalError::last_os_error(Op::InstallSignalHandler));
        }
    }
    Ok(())
}
