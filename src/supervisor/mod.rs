//! Owns the listening socket and the worker pool.
//!
//! The listener is bound exactly once, before any worker exists. Every
//! worker thread gets a handle to that same socket and registers it with
//! its own epoll. On shutdown the supervisor joins every worker first and
//! only then closes the listener, so no worker is left polling a closed
//! descriptor.

pub mod shutdown;

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::{io, process, thread};

use core_affinity::CoreId;
use tracing::{debug, error, info, warn};

use crate::acceptor::{Observer, ServerConfig, Worker, WorkerReport};
use crate::core::error::{FatalError, Op, OpContext};
use crate::core::socket::make_listener;

pub use shutdown::{Shutdown, install_signal_handlers};

/// Per-worker reports collected at shutdown.
#[derive(Debug, Clone, Default)]
pub struct SupervisorReport {
    pub workers: Vec<WorkerReport>,
}

impl SupervisorReport {
    pub fn accepted(&self) -> u64 {
        self.workers.iter().map(|w| w.accepted).sum()
    }

    pub fn served(&self) -> u64 {
        self.workers.iter().map(|w| w.served).sum()
    }
}

pub struct Supervisor {
    config: ServerConfig,
    listener: Arc<TcpListener>,
    observer: Arc<dyn Observer>,
    shutdown: Shutdown,
}

impl Supervisor {
    /// Create the shared listening socket. Nothing else binds after this.
    pub fn bind(
        config: ServerConfig,
        observer: Arc<dyn Observer>,
        shutdown: Shutdown,
    ) -> Result<Self, FatalError> {
        let listener = make_listener(config.listen_addr, config.backlog)?;
        info!(
            addr = %config.listen_addr,
            backlog = config.backlog,
            workers = config.workers,
            "server started"
        );
        Ok(Self {
            config,
            listener: Arc::new(listener),
            observer,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Spawn the workers and block until shutdown has completed.
    ///
    /// A fatal error inside a worker terminates the process with status 1;
    /// it is never handed back here.
    pub fn run(self) -> Result<SupervisorReport, FatalError> {
        let cores = if self.config.pin_cores {
            core_affinity::get_core_ids().unwrap_or_default()
        } else {
            Vec::new()
        };

        let mut handles = Vec::with_capacity(self.config.workers);
        for id in 0..self.config.workers {
            let core = (!cores.is_empty()).then(|| cores[id % cores.len()]);
            match self.spawn_worker(id, core) {
                Ok(h) => handles.push(h),
                Err(e) => {
                    // let the ones already running wind down before bailing
                    self.shutdown.trigger();
                    for h in handles {
                        let _ = h.join();
                    }
                    return Err(e);
                }
            }
        }

        while self.shutdown.is_running() {
            thread::sleep(self.config.supervisor_poll);
        }
        debug!("shutdown requested; waiting for workers");

        let mut report = SupervisorReport::default();
        for (id, h) in handles.into_iter().enumerate() {
            match h.join() {
                Ok(r) => report.workers.push(r),
                Err(_) => warn!(worker = id, "worker panicked"),
            }
        }

        // every worker has dropped its handle; this closes the socket
        drop(self.listener);
        info!(
            accepted = report.accepted(),
            served = report.served(),
            "gracefully exiting"
        );
        Ok(report)
    }

    fn spawn_worker(
        &self,
        id: usize,
        core: Option<CoreId>,
    ) -> Result<thread::JoinHandle<WorkerReport>, FatalError> {
        let listener = Arc::clone(&self.listener);
        let observer = Arc::clone(&self.observer);
        let shutdown = self.shutdown.clone();
        let config = self.config.worker.clone();

        thread::Builder::new()
            .name(format!("acceptd-w{id}"))
            .spawn(move || {
                if let Some(core) = core {
                    if core_affinity::set_for_current(core) {
                        debug!(worker = id, core = core.id, "pinned to core");
                    } else {
                        warn!(worker = id, core = core.id, "failed to pin to core");
                    }
                }
                match Worker::new(id, listener, config, observer, shutdown).and_then(Worker::run) {
                    Ok(report) => report,
                    Err(e) => {
                        error!(worker = id, op = e.op.as_label(), "fatal: {e}");
                        process::exit(1);
                    }
                }
            })
            .op(Op::SpawnWorker)
    }
}
