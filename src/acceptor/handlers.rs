use std::io::{self, Read};
use std::net::{TcpListener, TcpStream};
use std::os::fd::AsRawFd;

use tracing::debug;

use crate::core::error::{FatalError, Op, OpContext};
use crate::core::poller::Poller;
use crate::core::token::Token;

use super::client_table::ClientTable;
use super::observer::{Observer, WorkerId};

/// Accept until the listen queue is empty.
///
/// The listener is edge-triggered, so one event can stand for many queued
/// connections. Stopping early would leave them stalled until some
/// unrelated event wakes this worker. Other workers race us for the same
/// queue; losing that race shows up here as `WouldBlock`.
///
/// Returns how many connections this call accepted.
pub fn drain_accepts(
    worker: WorkerId,
    listener: &TcpListener,
    poller: &Poller,
    clients: &mut ClientTable,
) -> Result<usize, FatalError> {
    let mut accepted = 0;
    loop {
        let (stream, peer) = match listener.accept() {
            Ok(conn) => conn,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FatalError::new(Op::Accept, e)),
        };

        stream.set_nonblocking(true).op(Op::SetNonblocking)?;
        let fd = stream.as_raw_fd();
        let slot = clients.insert(stream);
        poller.register(fd, Token::Client(slot)).op(Op::Register)?;

        debug!(worker, %peer, fd, slot, "accepted client");
        accepted += 1;
    }
    Ok(accepted)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// One read happened and was observed; carries the byte count.
    Served(usize),
    /// Nothing to read after all; closed without an observation.
    Spurious,
}

/// One bounded read, one observation, then close.
///
/// The stream is consumed: dropping it closes the descriptor, which removes
/// it from epoll. Nothing is ever written back to the client.
pub fn serve_client(
    worker: WorkerId,
    stream: TcpStream,
    buf: &mut [u8],
    observer: &dyn Observer,
) -> Result<ServeOutcome, FatalError> {
    let fd = stream.as_raw_fd();
    let n = loop {
        match (&stream).read(buf) {
            Ok(n) => break n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                debug!(worker, fd, "client not readable; closing");
                return Ok(ServeOutcome::Spurious);
            }
            Err(e) => return Err(FatalError::new(Op::Read, e)),
        }
    };

    observer.observe(worker, &buf[..n]);
    debug!(worker, fd, bytes = n, "served client; closing");
    drop(stream);
    Ok(ServeOutcome::Served(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use crate::core::socket::make_listener;

    #[derive(Default)]
    struct Collect(Mutex<Vec<(WorkerId, Vec<u8>)>>);

    impl Observer for Collect {
        fn observe(&self, worker: WorkerId, payload: &[u8]) {
            self.0.lock().unwrap().push((worker, payload.to_vec()));
        }
    }

    fn listener() -> TcpListener {
        make_listener("127.0.0.1:0".parse().unwrap(), 64).unwrap()
    }

    #[test]
    fn drain_on_empty_queue_returns_immediately() {
        let listener = listener();
        let poller = Poller::new().unwrap();
        let mut clients = ClientTable::with_capacity(4);

        let accepted = drain_accepts(0, &listener, &poller, &mut clients).unwrap();
        assert_eq!(accepted, 0);
        assert!(clients.is_empty());
    }

    #[test]
    fn drain_takes_every_queued_connection() {
        let listener = listener();
        let addr = listener.local_addr().unwrap();
        let poller = Poller::new().unwrap();
        let mut clients = ClientTable::with_capacity(8);

        let _conns: Vec<TcpStream> = (0..6).map(|_| TcpStream::connect(addr).unwrap()).collect();
        thread::sleep(Duration::from_millis(50));

        let accepted = drain_accepts(0, &listener, &poller, &mut clients).unwrap();
        assert_eq!(accepted, 6);
        assert_eq!(clients.len(), 6);
    }

    #[test]
    fn accepted_clients_are_nonblocking() {
        let listener = listener();
        let addr = listener.local_addr().unwrap();
        let poller = Poller::new().unwrap();
        let mut clients = ClientTable::with_capacity(1);

        let _conn = TcpStream::connect(addr).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(drain_accepts(0, &listener, &poller, &mut clients).unwrap(), 1);

        let mut buf = [0u8; 8];
        let err = (&*clients.get(0).unwrap()).read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn serve_reads_once_observes_and_closes() {
        let listener = listener();
        let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        thread::sleep(Duration::from_millis(20));
        let (server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();

        client.write_all(b"0123456789").unwrap();
        thread::sleep(Duration::from_millis(50));

        let observer = Collect::default();
        let mut buf = vec![0u8; 1024];
        let outcome = serve_client(5, server, &mut buf, &observer).unwrap();

        assert_eq!(outcome, ServeOutcome::Served(10));
        assert_eq!(*observer.0.lock().unwrap(), vec![(5, b"0123456789".to_vec())]);

        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut rest = Vec::new();
        match client.read_to_end(&mut rest) {
            Ok(_) => assert!(rest.is_empty()),
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
        }
    }

    #[test]
    fn read_is_capped_at_buffer_size() {
        let listener = listener();
        let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        thread::sleep(Duration::from_millis(20));
        let (server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();

        client.write_all(&[b'x'; 64]).unwrap();
        thread::sleep(Duration::from_millis(50));

        let observer = Collect::default();
        let mut buf = vec![0u8; 16];
        let outcome = serve_client(0, server, &mut buf, &observer).unwrap();

        assert_eq!(outcome, ServeOutcome::Served(16));
        assert_eq!(observer.0.lock().unwrap()[0].1.len(), 16);
    }

    #[test]
    fn nothing_to_read_closes_without_observation() {
        let listener = listener();
        let _client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        thread::sleep(Duration::from_millis(20));
        let (server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();

        let observer = Collect::default();
        let mut buf = vec![0u8; 16];
        let outcome = serve_client(0, server, &mut buf, &observer).unwrap();

        assert_eq!(outcome, ServeOutcome::Spurious);
        assert!(observer.0.lock().unwrap().is_empty());
    }
}
