//! The lease timing module.
//!
//! RFC 2131 §4.4.5
//! T1 defaults to (0.5 * duration_of_lease). T2 defaults to
//! (0.875 * duration_of_lease).

use dhcp4_protocol::Message;

use crate::state::Event;
use crate::timer::MICROS_PER_SEC;

/// Is used if a server does not provide the `renewal_time` option.
const RENEWAL_TIME_FACTOR: f64 = 0.5;
/// Is used if a server does not provide the `rebinding_time` option.
const REBINDING_TIME_FACTOR: f64 = 0.875;

/// The three lease thresholds as absolute boot-clock microseconds.
///
/// A zero threshold is not armed. At rest `t1 <= t2 <= lifetime` holds
/// over the nonzero values.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LeaseTiming {
    /// The renewal deadline (T1).
    pub t1: u64,
    /// The rebinding deadline (T2).
    pub t2: u64,
    /// The lease expiration deadline.
    pub lifetime: u64,
}

impl LeaseTiming {
    /// Derives the thresholds from an accepted `DHCPACK`.
    ///
    /// Returns `None` if the message carries no lease time. Out-of-order
    /// server values are clamped so the rest of the crate can rely on
    /// the ordering invariant.
    pub fn from_ack(message: &Message, now: u64) -> Option<Self> {
        let address_time = message.options.address_time()?;
        let renewal_time = message
            .options
            .renewal_time()
            .unwrap_or(((address_time as f64) * RENEWAL_TIME_FACTOR) as u32);
        let rebinding_time = message
            .options
            .rebinding_time()
            .unwrap_or(((address_time as f64) * REBINDING_TIME_FACTOR) as u32);

        let lifetime = now + u64::from(address_time) * MICROS_PER_SEC;
        let t2 = (now + u64::from(rebinding_time) * MICROS_PER_SEC).min(lifetime);
        let t1 = (now + u64::from(renewal_time) * MICROS_PER_SEC).min(t2);

        Some(LeaseTiming { t1, t2, lifetime })
    }

    /// Whether the nonzero thresholds do not decrease.
    pub fn is_ordered(&self) -> bool {
        let mut last = 0;
        for threshold in [self.t1, self.t2, self.lifetime].iter() {
            if *threshold == 0 {
                continue;
            }
            if *threshold < last {
                return false;
            }
            last = *threshold;
        }
        true
    }

    /// Selects the single transition due at `now`, preferring the most
    /// advanced threshold, and zeroes it together with every lower one.
    ///
    /// The zeroing guarantees each threshold fires at most once per
    /// lease and that a later call naturally selects the next remaining
    /// threshold.
    pub fn expire(&mut self, now: u64) -> Option<Event> {
        if self.lifetime != 0 && now >= self.lifetime {
            self.t1 = 0;
            self.t2 = 0;
            self.lifetime = 0;
            return Some(Event::TimerLifetime);
        }
        if self.t2 != 0 && now >= self.t2 {
            self.t1 = 0;
            self.t2 = 0;
            return Some(Event::TimerT2);
        }
        if self.t1 != 0 && now >= self.t1 {
            self.t1 = 0;
            return Some(Event::TimerT1);
        }
        None
    }

    /// The deadline the timer should be armed with next.
    pub fn next_deadline(&self) -> Option<u64> {
        [self.t1, self.t2, self.lifetime]
            .iter()
            .copied()
            .filter(|threshold| *threshold != 0)
            .min()
    }

    /// Disarms all three thresholds.
    pub fn clear(&mut self) {
        *self = LeaseTiming::default();
    }
}
