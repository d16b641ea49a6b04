use std::net::SocketAddr;
use std::time::Duration;

use crate::core::constants;
use crate::core::socket::any_addr;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of readiness events taken from one epoll wait
    pub max_events: usize,
    /// Size of the single read performed on each client
    pub read_buffer_capacity: usize,
    /// Upper bound on one epoll wait; also the shutdown latency
    pub wait_timeout: Duration,
    /// Close client sockets flagged with error/hangup instead of leaving
    /// them registered until the worker exits
    pub close_on_hangup: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_events: constants::MAX_EVENTS,
            read_buffer_capacity: constants::READ_BUF,
            wait_timeout: constants::WAIT_TIMEOUT,
            close_on_hangup: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub backlog: i32,
    pub workers: usize,
    /// How often the supervisor checks the running flag
    pub supervisor_poll: Duration,
    /// Pin worker `i` to core `i % ncores`
    pub pin_cores: bool,
    pub worker: WorkerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: any_addr(constants::LISTEN_PORT),
            backlog: constants::LISTEN_BACKLOG,
            workers: constants::WORKER_COUNT,
            supervisor_poll: constants::SUPERVISOR_POLL,
            pin_cores: false,
            worker: WorkerConfig::default(),
        }
    }
}
