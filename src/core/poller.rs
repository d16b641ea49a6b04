use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use crate::core::token::{Token, pack_token, unpack_token};

/// Edge-triggered epoll instance owned by a single worker
///
/// Every registration is `EPOLLIN | EPOLLET`: an event fires once per
/// readiness transition, so whoever receives a listener event must accept
/// until `EAGAIN` before waiting again.
///
/// There is no deregister call. Closing a descriptor removes it from the
/// interest list.
#[derive(Debug)]
pub struct Poller {
    epfd: OwnedFd,
}

impl Poller {
    pub fn new() -> io::Result<Self> {
        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // epoll_create1 returned a fresh descriptor that nothing else owns
        let epfd = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self { epfd })
    }

    /// Arm `fd` for edge-triggered readable notification.
    pub fn register(&self, fd: RawFd, token: Token) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: (libc::EPOLLIN | libc::EPOLLET) as u32,
            u64: pack_token(token),
        };
        let ret =
            unsafe { libc::epoll_ctl(self.epfd.as_raw_fd(), libc::EPOLL_CTL_ADD, fd, &mut event) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Block up to `timeout` and refill `events` with whatever is ready.
    ///
    /// A timeout leaves `events` empty. So does a signal landing during the
    /// wait, which is how a worker notices a shutdown request promptly.
    pub fn wait(&self, events: &mut Events, timeout: Duration) -> io::Result<()> {
        events.clear();
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        let n = unsafe {
            libc::epoll_wait(
                self.epfd.as_raw_fd(),
                events.buf.as_mut_ptr(),
                events.buf.capacity() as i32,
                timeout_ms,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }
        // the kernel initialized the first n entries
        unsafe { events.buf.set_len(n as usize) };
        Ok(())
    }
}

/// Reusable buffer of ready events for one worker.
pub struct Events {
    buf: Vec<libc::epoll_event>,
}

impl Events {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity.max(1)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn get(&self, i: usize) -> Option<Readiness> {
        self.buf.get(i).map(to_readiness)
    }

    pub fn iter(&self) -> impl Iterator<Item = Readiness> + '_ {
        self.buf.iter().map(to_readiness)
    }
}

fn to_readiness(ev: &libc::epoll_event) -> Readiness {
    // epoll_event is packed on x86_64; copy fields out by value
    let flags = ev.events;
    let data = ev.u64;
    Readiness {
        token: unpack_token(data),
        flags,
    }
}

/// One ready descriptor and its condition flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub token: Token,
    pub flags: u32,
}

impl Readiness {
    pub fn is_readable(&self) -> bool {
        self.flags & libc::EPOLLIN as u32 != 0
    }

    pub fn is_error(&self) -> bool {
        self.flags & libc::EPOLLERR as u32 != 0
    }

    pub fn is_hangup(&self) -> bool {
        self.flags & libc::EPOLLHUP as u32 != 0
    }

    /// Error, hangup, or anything other than plain readability.
    pub fn is_flagged(&self) -> bool {
        self.is_error() || self.is_hangup() || !self.is_readable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::time::Instant;

    #[test]
    fn wait_times_out_with_empty_batch() {
        let poller = Poller::new().unwrap();
        let mut events = Events::with_capacity(8);

        let started = Instant::now();
        poller.wait(&mut events, Duration::from_millis(50)).unwrap();

        assert!(events.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn readable_socket_reports_its_token() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();

        let poller = Poller::new().unwrap();
        poller.register(server.as_raw_fd(), Token::Client(3)).unwrap();
        client.write_all(b"ping").unwrap();

        let mut events = Events::with_capacity(8);
        poller.wait(&mut events, Duration::from_secs(2)).unwrap();

        let ready: Vec<Readiness> = events.iter().collect();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].token, Token::Client(3));
        assert!(ready[0].is_readable());
        assert!(!ready[0].is_flagged());
    }

    #[test]
    fn edge_triggered_fires_once_per_transition() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();

        let poller = Poller::new().unwrap();
        poller.register(server.as_raw_fd(), Token::Client(0)).unwrap();
        client.write_all(b"unread").unwrap();

        let mut events = Events::with_capacity(8);
        poller.wait(&mut events, Duration::from_secs(2)).unwrap();
        assert_eq!(events.len(), 1);

        // nothing was read, but no new transition happened either
        poller.wait(&mut events, Duration::from_millis(50)).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn registering_closed_fd_fails() {
        let poller = Poller::new().unwrap();
        assert!(poller.register(-1, Token::Listener).is_err());
    }
}
