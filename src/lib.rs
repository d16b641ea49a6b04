//! Multi-worker TCP acceptor over one shared listening socket.
//!
//! A [`Supervisor`] binds the listener once and runs a fixed pool of
//! [`Worker`]s. Each worker waits on its own edge-triggered epoll, drains
//! the accept queue when the listener fires, reads every client exactly
//! once, reports the bytes to an [`Observer`], and closes the connection.

pub mod acceptor;
pub mod core;
pub mod logging;
pub mod supervisor;

pub use acceptor::{
    Observer, ServerConfig, StdoutObserver, Worker, WorkerConfig, WorkerId, WorkerReport,
    WorkerState,
};
pub use crate::core::error::{FatalError, Op};
pub use supervisor::{Shutdown, Supervisor, SupervisorReport, install_signal_handlers};
