use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener};

use crate::core::error::{FatalError, Op, OpContext};

/// Socket utility functions for the acceptor
///
/// Only one listening socket exists per process: it is created here once
/// and every worker registers that same descriptor with its own epoll.

/// Wildcard IPv4 address on `port`.
pub fn any_addr(port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))
}

/// Create the shared non-blocking listening socket
///
/// SO_REUSEADDR lets a restarted server rebind while old connections sit
/// in TIME_WAIT. No SO_REUSEPORT: workers share this one socket instead of
/// binding their own.
pub fn make_listener(addr: SocketAddr, backlog: i32) -> Result<TcpListener, FatalError> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let sock = Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).op(Op::CreateSocket)?;
    sock.set_nonblocking(true).op(Op::SetNonblocking)?;
    sock.set_reuse_address(true).op(Op::SetSockOpt)?;
    sock.bind(&addr.into()).op(Op::Bind)?;
    sock.listen(backlog).op(Op::Listen)?;
    Ok(sock.into())
}
