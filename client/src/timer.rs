//! The clock and timer source module.
//!
//! Lease arithmetic runs on `CLOCK_BOOTTIME`, the monotonic clock that
//! keeps advancing while the machine is suspended, so expiry is measured
//! in wall-continuous time. Everything is microseconds of that clock;
//! wall-clock values never enter a comparison.

use std::{
    io,
    os::unix::io::{AsRawFd, RawFd},
    ptr,
};

pub const MICROS_PER_SEC: u64 = 1_000_000;
const NANOS_PER_MICRO: u64 = 1_000;

/// Reads the boot-time monotonic clock in microseconds.
pub fn monotonic_now() -> io::Result<u64> {
    let mut timespec = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let code = unsafe { libc::clock_gettime(libc::CLOCK_BOOTTIME, &mut timespec) };
    if code < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(timespec.tv_sec as u64 * MICROS_PER_SEC + timespec.tv_nsec as u64 / NANOS_PER_MICRO)
}

/// An owned non-blocking `timerfd` on the boot-time clock.
pub struct Timer {
    fd: RawFd,
}

impl Timer {
    pub fn new() -> io::Result<Self> {
        let fd = unsafe {
            libc::timerfd_create(libc::CLOCK_BOOTTIME, libc::TFD_CLOEXEC | libc::TFD_NONBLOCK)
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Timer { fd })
    }

    /// Arms the timer with an absolute boot-clock deadline in microseconds.
    ///
    /// A deadline already in the past makes the timer readable at once.
    pub fn arm_at(&self, deadline: u64) -> io::Result<()> {
        self.set(libc::timespec {
            tv_sec: (deadline / MICROS_PER_SEC) as libc::time_t,
            tv_nsec: ((deadline % MICROS_PER_SEC) * NANOS_PER_MICRO) as libc::c_long,
        })
    }

    /// Disarms the timer.
    pub fn disarm(&self) -> io::Result<()> {
        self.set(libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        })
    }

    /// Drains the expiration counter without blocking.
    ///
    /// Returns the number of expirations since the last read; zero when
    /// the timer has not fired.
    pub fn expirations(&self) -> io::Result<u64> {
        let mut count = 0u64;
        let amount = unsafe {
            libc::read(
                self.fd,
                &mut count as *mut u64 as *mut libc::c_void,
                ::std::mem::size_of::<u64>(),
            )
        };
        if amount < 0 {
            let error = io::Error::last_os_error();
            if error.kind() == io::ErrorKind::WouldBlock {
                return Ok(0);
            }
            return Err(error);
        }
        Ok(count)
    }

    fn set(&self, it_value: libc::timespec) -> io::Result<()> {
        let spec = libc::itimerspec {
            it_interval: libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
            it_value,
        };
        let code = unsafe {
            libc::timerfd_settime(self.fd, libc::TFD_TIMER_ABSTIME, &spec, ptr::null_mut())
        };
        if code < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl AsRawFd for Timer {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::*;

    #[test]
    fn the_clock_is_monotonic() {
        let first = monotonic_now().unwrap();
        let second = monotonic_now().unwrap();
        assert!(second >= first);
    }

    #[test]
    fn an_unarmed_timer_reads_zero() {
        let timer = Timer::new().unwrap();
        assert_eq!(timer.expirations().unwrap(), 0);
    }

    #[test]
    fn a_past_deadline_fires_immediately() {
        let timer = Timer::new().unwrap();
        timer.arm_at(monotonic_now().unwrap().saturating_sub(MICROS_PER_SEC)).unwrap();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(timer.expirations().unwrap(), 1);
        // the counter resets after a drain
        assert_eq!(timer.expirations().unwrap(), 0);
    }

    #[test]
    fn a_disarmed_timer_does_not_fire() {
        let timer = Timer::new().unwrap();
        timer.arm_at(monotonic_now().unwrap() + 5_000).unwrap();
        timer.disarm().unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(timer.expirations().unwrap(), 0);
    }
}
