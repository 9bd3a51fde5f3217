//! Boundary calls into the host networking stack: socket creation, address
//! family conversion, and the handful of `setsockopt` tunables this crate
//! needs. Everything past a non-blocking fd and a resolved address is
//! owned by [`crate::listener`]/[`crate::conn`], not by this module.

use std::io;
use std::mem;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

/// `TCP_KEEPINTVL`, seconds between keepalive probes once idle.
pub(crate) const KEEPALIVE_INTERVAL_SECS: libc::c_int = 5;

/// Creates a non-blocking, close-on-exec `AF_INET`/`SOCK_STREAM` socket.
pub(crate) fn new_v4_stream_socket() -> io::Result<OwnedFd> {
    #[cfg(any(
        target_os = "android",
        target_os = "illumos",
        target_os = "linux",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
    ))]
    let ty = libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC;
    #[cfg(any(target_os = "ios", target_os = "macos"))]
    let ty = libc::SOCK_STREAM;

    let fd = syscall!(socket(libc::AF_INET, ty, 0))?;

    // Darwin has neither `SOCK_NONBLOCK` nor `SOCK_CLOEXEC`; set both flags
    // with `fcntl` instead, closing the socket if either call fails.
    #[cfg(any(target_os = "ios", target_os = "macos"))]
    if let Err(err) = syscall!(fcntl(fd, libc::F_SETFL, libc::O_NONBLOCK))
        .and_then(|_| syscall!(fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC)))
    {
        let _ = syscall!(close(fd));
        return Err(err);
    }

    // SAFETY: `socket(2)` returned a valid owned fd on success.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

pub(crate) fn set_reuseaddr(fd: RawFd) -> io::Result<()> {
    let value: libc::c_int = 1;
    syscall!(setsockopt(
        fd,
        libc::SOL_SOCKET,
        libc::SO_REUSEADDR,
        &value as *const _ as *const libc::c_void,
        mem::size_of::<libc::c_int>() as libc::socklen_t,
    ))
    .map(|_| ())
}

pub(crate) fn set_keepalive(fd: RawFd) -> io::Result<()> {
    let enable: libc::c_int = 1;
    syscall!(setsockopt(
        fd,
        libc::SOL_SOCKET,
        libc::SO_KEEPALIVE,
        &enable as *const _ as *const libc::c_void,
        mem::size_of::<libc::c_int>() as libc::socklen_t,
    ))?;
    syscall!(setsockopt(
        fd,
        libc::IPPROTO_TCP,
        libc::TCP_KEEPINTVL,
        &KEEPALIVE_INTERVAL_SECS as *const _ as *const libc::c_void,
        mem::size_of::<libc::c_int>() as libc::socklen_t,
    ))
    .map(|_| ())
}

pub(crate) fn bind(fd: RawFd, addr: SocketAddr) -> io::Result<()> {
    let (raw, len) = to_sockaddr_in(addr)?;
    syscall!(bind(fd, &raw as *const _ as *const libc::sockaddr, len)).map(|_| ())
}

pub(crate) fn listen(fd: RawFd, backlog: libc::c_int) -> io::Result<()> {
    syscall!(listen(fd, backlog)).map(|_| ())
}

/// Accepts one pending connection, returning the new non-blocking,
/// close-on-exec fd and the peer's address. `Err` with
/// `ErrorKind::WouldBlock` means the backlog is currently empty.
pub(crate) fn accept(fd: RawFd) -> io::Result<(OwnedFd, SocketAddr)> {
    let mut storage: libc::sockaddr_in = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;

    #[cfg(any(
        target_os = "android",
        target_os = "illumos",
        target_os = "linux",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "openbsd",
    ))]
    let accepted = syscall!(accept4(
        fd,
        &mut storage as *mut _ as *mut libc::sockaddr,
        &mut len,
        libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
    ))?;

    // Neither Darwin nor NetBSD's libc binding exposes `accept4(2)`; the
    // accepted socket inherits the listener's non-blocking flag on these
    // platforms, so only `CLOEXEC` needs to be set explicitly.
    #[cfg(any(target_os = "ios", target_os = "macos", target_os = "netbsd"))]
    let accepted = {
        let accepted = syscall!(accept(
            fd,
            &mut storage as *mut _ as *mut libc::sockaddr,
            &mut len,
        ))?;
        syscall!(fcntl(accepted, libc::F_SETFD, libc::FD_CLOEXEC))?;
        accepted
    };

    let peer = from_sockaddr_in(&storage);
    // SAFETY: `accept`/`accept4` returned a valid owned fd on success.
    Ok((unsafe { OwnedFd::from_raw_fd(accepted) }, peer))
}

pub(crate) fn local_addr(fd: RawFd) -> io::Result<SocketAddr> {
    let mut storage: libc::sockaddr_in = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
    syscall!(getsockname(
        fd,
        &mut storage as *mut _ as *mut libc::sockaddr,
        &mut len,
    ))?;
    Ok(from_sockaddr_in(&storage))
}

fn to_sockaddr_in(addr: SocketAddr) -> io::Result<(libc::sockaddr_in, libc::socklen_t)> {
    let SocketAddr::V4(addr) = addr else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "blocktcp only supports IPv4 addresses",
        ));
    };
    let sockaddr = libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: addr.port().to_be(),
        sin_addr: libc::in_addr {
            s_addr: u32::from_ne_bytes(addr.ip().octets()),
        },
        sin_zero: [0; 8],
        #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
        sin_len: mem::size_of::<libc::sockaddr_in>() as u8,
    };
    Ok((sockaddr, mem::size_of::<libc::sockaddr_in>() as libc::socklen_t))
}

fn from_sockaddr_in(raw: &libc::sockaddr_in) -> SocketAddr {
    let ip = Ipv4Addr::from(raw.sin_addr.s_addr.to_ne_bytes());
    SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(raw.sin_port)))
}
