use std::net::TcpListener;
use std::os::fd::AsRawFd;
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::error::{FatalError, Op, OpContext};
use crate::core::poller::{Events, Poller, Readiness};
use crate::core::token::Token;
use crate::supervisor::shutdown::Shutdown;

use super::client_table::ClientTable;
use super::config::WorkerConfig;
use super::handlers::{ServeOutcome, drain_accepts, serve_client};
use super::observer::{Observer, WorkerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Running,
    Draining,
    Stopped,
}

/// What one worker did over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub id: WorkerId,
    pub accepted: u64,
    pub served: u64,
    /// Events ignored because of error/hangup/non-readable flags
    pub skipped: u64,
}

/// One event loop over a private epoll instance and the shared listener
///
/// Everything except the listener and the shutdown flag is owned here and
/// never touched by another worker.
pub struct Worker {
    id: WorkerId,
    state: WorkerState,
    listener: Arc<TcpListener>,
    poller: Poller,
    events: Events,
    read_buf: Vec<u8>,
    clients: ClientTable,
    observer: Arc<dyn Observer>,
    shutdown: Shutdown,
    config: WorkerConfig,
    report: WorkerReport,
}

impl Worker {
    /// Starting: create the epoll instance and arm the shared listener.
    pub fn new(
        id: WorkerId,
        listener: Arc<TcpListener>,
        config: WorkerConfig,
        observer: Arc<dyn Observer>,
        shutdown: Shutdown,
    ) -> Result<Self, FatalError> {
        let poller = Poller::new().op(Op::CreatePoller)?;
        poller
            .register(listener.as_raw_fd(), Token::Listener)
            .op(Op::Register)?;

        Ok(Self {
            id,
            state: WorkerState::Starting,
            listener,
            poller,
            events: Events::with_capacity(config.max_events),
            read_buf: vec![0; config.read_buffer_capacity],
            clients: ClientTable::with_capacity(config.max_events),
            observer,
            shutdown,
            config,
            report: WorkerReport {
                id,
                ..WorkerReport::default()
            },
        })
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn report(&self) -> &WorkerReport {
        &self.report
    }

    /// Client sockets accepted but not yet closed.
    pub fn open_clients(&self) -> usize {
        self.clients.len()
    }

    /// Run until the shutdown flag clears.
    ///
    /// The flag is checked once per wait, so a stop request takes effect
    /// at most one wait timeout later. Client sockets still open at that
    /// point are closed when the worker is dropped.
    pub fn run(mut self) -> Result<WorkerReport, FatalError> {
        self.transition(WorkerState::Running);
        info!(worker = self.id, "worker is ready");

        while self.shutdown.is_running() {
            self.turn()?;
        }

        self.transition(WorkerState::Draining);
        let report = self.report.clone();
        self.transition(WorkerState::Stopped);
        info!(
            worker = self.id,
            accepted = report.accepted,
            served = report.served,
            "worker shuts down"
        );
        Ok(report)
    }

    /// One wait plus dispatch of everything it returned.
    pub fn turn(&mut self) -> Result<(), FatalError> {
        self.poller
            .wait(&mut self.events, self.config.wait_timeout)
            .op(Op::Wait)?;

        for i in 0..self.events.len() {
            let Some(event) = self.events.get(i) else {
                break;
            };
            self.dispatch(event)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, event: Readiness) -> Result<(), FatalError> {
        if event.is_flagged() {
            self.report.skipped += 1;
            debug!(
                worker = self.id,
                token = ?event.token,
                flags = event.flags,
                "skipping flagged event"
            );
            if self.config.close_on_hangup
                && let Token::Client(slot) = event.token
            {
                drop(self.clients.take(slot));
            }
            return Ok(());
        }

        match event.token {
            Token::Listener => {
                let n = drain_accepts(self.id, &self.listener, &self.poller, &mut self.clients)?;
                self.report.accepted += n as u64;
            }
            Token::Client(slot) => {
                let Some(stream) = self.clients.take(slot) else {
                    debug!(worker = self.id, slot, "event for empty slot");
                    return Ok(());
                };
                let outcome =
                    serve_client(self.id, stream, &mut self.read_buf, self.observer.as_ref())?;
                if let ServeOutcome::Served(_) = outcome {
                    self.report.served += 1;
                }
            }
        }
        Ok(())
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(worker = self.id, from = ?self.state, to = ?next, "worker state");
        self.state = next;
    }
}
