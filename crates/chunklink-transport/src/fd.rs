//! Readiness and queue-depth queries shared by every fd-backed link.

use std::io::ErrorKind;
use std::os::fd::RawFd;
use std::time::Duration;

use crate::error::Result;

/// Wait until `fd` is readable, or it hung up, or `timeout` elapses.
pub(crate) fn wait_readable(fd: RawFd, timeout: Duration) -> Result<bool> {
    poll_one(fd, libc::POLLIN, timeout)
}

/// Wait until `fd` accepts output, or `timeout` elapses.
pub(crate) fn wait_writable(fd: RawFd, timeout: Duration) -> Result<bool> {
    poll_one(fd, libc::POLLOUT, timeout)
}

/// Bytes queued in the kernel receive buffer (`FIONREAD`).
pub(crate) fn bytes_available(fd: RawFd) -> Result<usize> {
    let mut pending: libc::c_int = 0;

    // SAFETY: `pending` is a valid, writable c_int for the duration of the call
    // and `fd` is an open descriptor owned by the caller.
    let rc = unsafe { libc::ioctl(fd, libc::FIONREAD, &mut pending as *mut libc::c_int) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(pending.max(0) as usize)
}

fn poll_one(fd: RawFd, events: libc::c_short, timeout: Duration) -> Result<bool> {
    let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };

    loop {
        // SAFETY: `pfd` is a single valid pollfd and nfds is 1.
        let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                continue;
            }
            return Err(err.into());
        }
        let ready = events | libc::POLLHUP | libc::POLLERR;
        return Ok(rc > 0 && pfd.revents & ready != 0);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;

    use super::*;

    #[test]
    fn idle_socket_is_not_readable() {
        let (left, _right) = UnixStream::pair().unwrap();
        let ready = wait_readable(left.as_raw_fd(), Duration::from_millis(10)).unwrap();
        assert!(!ready);
        assert_eq!(bytes_available(left.as_raw_fd()).unwrap(), 0);
    }

    #[test]
    fn pending_bytes_are_reported() {
        let (left, mut right) = UnixStream::pair().unwrap();
        right.write_all(b"SIZE_ACK").unwrap();

        assert!(wait_readable(left.as_raw_fd(), Duration::from_millis(100)).unwrap());
        assert_eq!(bytes_available(left.as_raw_fd()).unwrap(), 8);
    }

    #[test]
    fn fresh_socket_is_writable() {
        let (left, _right) = UnixStream::pair().unwrap();
        assert!(wait_writable(left.as_raw_fd(), Duration::from_millis(10)).unwrap());
    }

    #[test]
    fn hangup_counts_as_readable() {
        let (left, right) = UnixStream::pair().unwrap();
        drop(right);
        assert!(wait_readable(left.as_raw_fd(), Duration::from_millis(10)).unwrap());
    }
}
