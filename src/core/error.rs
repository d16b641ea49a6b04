//! Fatal error type shared by every layer of the acceptor.
//!
//! Nothing in the acceptor is retried: a failing socket, epoll or accept
//! call is reported with the operation that failed and the process exits.
//! Expected conditions (would-block on accept, flagged descriptors) never
//! become a [`FatalError`].

use std::io;

use thiserror::Error;

/// The OS operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    CreateSocket,
    SetSockOpt,
    Bind,
    Listen,
    CreatePoller,
    Register,
    Wait,
    SetNonblocking,
    Accept,
    Read,
    InstallSignalHandler,
    SpawnWorker,
}

impl Op {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Op::CreateSocket => "create_socket",
            Op::SetSockOpt => "set_sockopt",
            Op::Bind => "bind",
            Op::Listen => "listen",
            Op::CreatePoller => "create_poller",
            Op::Register => "register",
            Op::Wait => "wait",
            Op::SetNonblocking => "set_nonblocking",
            Op::Accept => "accept",
            Op::Read => "read",
            Op::InstallSignalHandler => "install_signal_handler",
            Op::SpawnWorker => "spawn_worker",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Op::CreateSocket => "create server socket",
            Op::SetSockOpt => "set server socket options",
            Op::Bind => "bind server socket",
            Op::Listen => "listen on server socket",
            Op::CreatePoller => "create epoll instance",
            Op::Register => "add fd to epoll",
            Op::Wait => "wait on epoll",
            Op::SetNonblocking => "set fd to nonblocking",
            Op::Accept => "accept client socket",
            Op::Read => "read client socket",
            Op::InstallSignalHandler => "install signal handler",
            Op::SpawnWorker => "spawn worker",
        }
    }
}

/// An unrecoverable OS failure.
#[derive(Error, Debug)]
#[error("failed to {}: {source}", .op.describe())]
pub struct FatalError {
    pub op: Op,
    #[source]
    pub source: io::Error,
}

impl FatalError {
    pub fn new(op: Op, source: io::Error) -> Self {
        Self { op, source }
    }

    /// Wraps `errno` from the last failed libc call.
    pub fn last_os_error(op: Op) -> Self {
        Self::new(op, io::Error::last_os_error())
    }
}

/// Tags an `io::Result` with the operation it came from.
pub trait OpContext<T> {
    fn op(self, op: Op) -> Result<T, FatalError>;
}

impl<T> OpContext<T> for io::Result<T> {
    fn op(self, op: Op) -> Result<T, FatalError> {
        self.map_err(|e| FatalError::new(op, e))
    }
}
