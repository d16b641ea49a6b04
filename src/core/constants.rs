use std::time::Duration;

pub const LISTEN_PORT: u16 = 6868;
pub const WORKER_COUNT: usize = 4;
pub const LISTEN_BACKLOG: i32 = 100;

pub const MAX_EVENTS: usize = 1024;
pub const READ_BUF: usize = 1024;

// a worker re-checks the running flag at least this often
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(1);
pub const SUPERVISOR_POLL: Duration = Duration::from_secs(1);
