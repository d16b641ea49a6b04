//! Per-worker accept and read pipeline
//!
//! This module provides the worker side of the acceptor:
//! - Worker event loop over a private edge-triggered epoll
//! - Accept draining and single-read connection handling
//! - Client socket table and observation sink

pub mod client_table;
pub mod config;
pub mod handlers;
pub mod observer;
pub mod worker;

// Re-export main types
pub use config::{ServerConfig, WorkerConfig};
pub use observer::{Observer, StdoutObserver, WorkerId};
pub use worker::{Worker, WorkerReport, WorkerState};
