//! The readiness multiplexer module.

use std::{
    io, ptr,
    os::unix::io::{AsRawFd, RawFd},
};

/// The readiness sources the client multiplexes, carried as the
/// application data word of each registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEvent {
    Timer,
    Connection,
}

impl DispatchEvent {
    fn data(self) -> u64 {
        self as u64
    }

    fn from_data(data: u64) -> Option<Self> {
        match data {
            0 => Some(DispatchEvent::Timer),
            1 => Some(DispatchEvent::Connection),
            _ => None,
        }
    }
}

/// The readiness flags of one polled event.
#[derive(Debug, Clone, Copy)]
pub struct Readiness {
    events: u32,
}

impl Readiness {
    pub fn is_readable(&self) -> bool {
        self.events & libc::EPOLLIN as u32 != 0
    }

    pub fn is_hangup(&self) -> bool {
        self.events & (libc::EPOLLHUP | libc::EPOLLERR) as u32 != 0
    }
}

/// An owned `epoll` descriptor.
pub struct Epoll {
    fd: RawFd,
}

impl Epoll {
    pub fn new() -> io::Result<Self> {
        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Epoll { fd })
    }

    /// Adds `fd` to the interest list, watching for input readiness.
    pub fn register(&self, fd: RawFd, source: DispatchEvent) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: libc::EPOLLIN as u32,
            u64: source.data(),
        };
        let code = unsafe { libc::epoll_ctl(self.fd, libc::EPOLL_CTL_ADD, fd, &mut event) };
        if code < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Removes `fd` from the interest list.
    ///
    /// Must happen before the watched descriptor is closed: a descriptor
    /// number reused after an unremoved registration would inherit it.
    pub fn unregister(&self, fd: RawFd) -> io::Result<()> {
        let code = unsafe { libc::epoll_ctl(self.fd, libc::EPOLL_CTL_DEL, fd, ptr::null_mut()) };
        if code < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Polls for at most one ready event without blocking.
    pub fn poll_one(&self) -> io::Result<Option<(DispatchEvent, Readiness)>> {
        let mut event = libc::epoll_event { events: 0, u64: 0 };
        let amount = unsafe { libc::epoll_wait(self.fd, &mut event, 1, 0) };
        if amount < 0 {
            return Err(io::Error::last_os_error());
        }
        if amount == 0 {
            return Ok(None);
        }

        let events = event.events;
        let data = event.u64;
        Ok(DispatchEvent::from_data(data).map(|source| (source, Readiness { events })))
    }
}

impl AsRawFd for Epoll {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for Epoll {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn an_empty_multiplexer_has_no_events() {
        let epoll = Epoll::new().unwrap();
        assert!(epoll.poll_one().unwrap().is_none());
    }

    #[test]
    fn a_registered_source_is_reported_with_its_tag() {
        let epoll = Epoll::new().unwrap();
        let mut fds = [0 as RawFd; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let (reader, writer) = (fds[0], fds[1]);

        epoll.register(reader, DispatchEvent::Connection).unwrap();
        assert!(epoll.poll_one().unwrap().is_none());

        assert_eq!(unsafe { libc::write(writer, b"x".as_ptr() as *const _, 1) }, 1);
        let (source, readiness) = epoll.poll_one().unwrap().unwrap();
        assert_eq!(source, DispatchEvent::Connection);
        assert!(readiness.is_readable());
        assert!(!readiness.is_hangup());

        epoll.unregister(reader).unwrap();
        assert!(epoll.poll_one().unwrap().is_none());

        unsafe {
            libc::close(reader);
            libc::close(writer);
        }
    }
}
