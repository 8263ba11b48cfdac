//! The DHCP client state module.

use std::{fmt, net::Ipv4Addr};

use crate::timing::LeaseTiming;

/// RFC 2131 DHCP states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpState {
    Init,
    Selecting,
    InitReboot,
    Rebooting,
    Requesting,
    Bound,
    Renewing,
    Rebinding,
}

impl fmt::Display for DhcpState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::DhcpState::*;
        match self {
            Init => write!(f, "INIT"),
            Selecting => write!(f, "SELECTING"),
            InitReboot => write!(f, "INIT-REBOOT"),
            Rebooting => write!(f, "REBOOTING"),
            Requesting => write!(f, "REQUESTING"),
            Bound => write!(f, "BOUND"),
            Renewing => write!(f, "RENEWING"),
            Rebinding => write!(f, "REBINDING"),
        }
    }
}

/// The inputs driving state transitions: the three lease thresholds and
/// the three server message types the client reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    TimerT1,
    TimerT2,
    TimerLifetime,
    Offer,
    Ack,
    Nak,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Event::*;
        match self {
            TimerT1 => write!(f, "T1"),
            TimerT2 => write!(f, "T2"),
            TimerLifetime => write!(f, "LIFETIME"),
            Offer => write!(f, "DHCPOFFER"),
            Ack => write!(f, "DHCPACK"),
            Nak => write!(f, "DHCPNAK"),
        }
    }
}

impl DhcpState {
    /// The RFC 2131 §4.4 transition table.
    ///
    /// Total over every (state, event) pair: a pair without an arrow in
    /// the RFC keeps its state, so messages addressed to stale leases
    /// and timer thresholds resolved out of order never disturb the
    /// machine.
    pub fn transition(self, event: Event) -> DhcpState {
        use self::DhcpState::*;
        match event {
            Event::TimerT1 => match self {
                Bound => Renewing,
                ignored => ignored,
            },
            Event::TimerT2 => match self {
                Bound | Renewing => Rebinding,
                ignored => ignored,
            },
            Event::TimerLifetime => match self {
                Bound | Renewing | Rebinding => Init,
                ignored => ignored,
            },
            Event::Offer => match self {
                Selecting => Requesting,
                ignored => ignored,
            },
            // accepting a lease is an explicit contract, not a table arrow
            Event::Ack => self,
            Event::Nak => match self {
                Rebooting | Requesting | Renewing | Rebinding => Init,
                ignored => ignored,
            },
        }
    }
}

/// Mutable `Client` data.
pub struct State {
    /// Current DHCP client state (RFC 2131).
    dhcp_state: DhcpState,
    /// Generated by the client for each session.
    transaction_id: u32,
    /// Recorded by the client from the selected `DHCPOFFER`.
    offered_address: Ipv4Addr,
    /// The address of the server selected from a `DHCPOFFER` or `DHCPACK`.
    dhcp_server_id: Option<Ipv4Addr>,
    /// Recorded by the client from the `DHCPACK`.
    assigned_address: Ipv4Addr,
    /// The T1/T2/expiry thresholds of the current lease.
    timing: LeaseTiming,
}

impl State {
    /// Constructs a default state: `INIT` with nothing armed.
    pub fn new() -> Self {
        State {
            dhcp_state: DhcpState::Init,
            transaction_id: rand::random::<u32>(),
            offered_address: Ipv4Addr::UNSPECIFIED,
            dhcp_server_id: None,
            assigned_address: Ipv4Addr::UNSPECIFIED,
            timing: LeaseTiming::default(),
        }
    }

    /// Applies one event, returning the state after it.
    ///
    /// The update is atomic from the caller's perspective: any
    /// transition back into `INIT` takes the lease bookkeeping with it
    /// in the same call.
    pub fn apply(&mut self, event: Event) -> DhcpState {
        let from = self.dhcp_state;
        let to = from.transition(event);
        if to != from {
            debug!("Transitioning from {} to {} on {}", from, to, event);
            if to == DhcpState::Init {
                self.clear_lease();
            }
        }
        self.dhcp_state = to;
        to
    }

    /// Moves the machine through an externally driven arrow, one the six
    /// events never take (session start, lease acceptance).
    pub fn enter(&mut self, to: DhcpState) {
        debug!("Entering {} from {}", to, self.dhcp_state);
        self.dhcp_state = to;
    }

    /// Forces the reset sink: `INIT` with nothing armed or recorded.
    pub fn reset(&mut self) {
        self.dhcp_state = DhcpState::Init;
        self.clear_lease();
    }

    /// Records the committed lease thresholds and enters `BOUND`.
    pub fn bind(&mut self, timing: LeaseTiming) {
        self.timing = timing;
        self.enter(DhcpState::Bound);
    }

    /// Fires the most advanced due threshold, if any.
    pub fn expire(&mut self, now: u64) -> Option<Event> {
        self.timing.expire(now)
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timing.next_deadline()
    }

    pub fn dhcp_state(&self) -> DhcpState {
        self.dhcp_state
    }

    pub fn xid(&self) -> u32 {
        self.transaction_id
    }

    /// Picks a fresh transaction ID for a new session.
    pub fn regenerate_xid(&mut self) {
        self.transaction_id = rand::random::<u32>();
    }

    pub fn timing(&self) -> LeaseTiming {
        self.timing
    }

    pub fn offered_address(&self) -> Ipv4Addr {
        self.offered_address
    }

    pub fn dhcp_server_id(&self) -> Option<Ipv4Addr> {
        self.dhcp_server_id
    }

    pub fn assigned_address(&self) -> Ipv4Addr {
        self.assigned_address
    }

    pub fn record_offer(&mut self, dhcp_server_id: Option<Ipv4Addr>, offered_address: Ipv4Addr) {
        self.dhcp_server_id = dhcp_server_id;
        self.offered_address = offered_address;
    }

    pub fn record_assignment(&mut self, dhcp_server_id: Option<Ipv4Addr>, address: Ipv4Addr) {
        if dhcp_server_id.is_some() {
            self.dhcp_server_id = dhcp_server_id;
        }
        self.assigned_address = address;
    }

    fn clear_lease(&mut self) {
        self.timing.clear();
        self.offered_address = Ipv4Addr::UNSPECIFIED;
        self.dhcp_server_id = None;
        self.assigned_address = Ipv4Addr::UNSPECIFIED;
    }
}

#[cfg(test)]
mod tests {
    use super::DhcpState::*;
    use super::Event::*;
    use super::*;

    const ALL_STATES: [DhcpState; 8] = [
        Init, Selecting, InitReboot, Rebooting, Requesting, Bound, Renewing, Rebinding,
    ];
    const ALL_EVENTS: [Event; 6] = [TimerT1, TimerT2, TimerLifetime, Offer, Ack, Nak];

    /// Every arrow of the RFC 2131 table; everything else stays put.
    const ARROWS: [(DhcpState, Event, DhcpState); 11] = [
        (Selecting, Offer, Requesting),
        (Rebooting, Nak, Init),
        (Requesting, Nak, Init),
        (Bound, TimerT1, Renewing),
        (Bound, TimerT2, Rebinding),
        (Bound, TimerLifetime, Init),
        (Renewing, TimerT2, Rebinding),
        (Renewing, TimerLifetime, Init),
        (Renewing, Nak, Init),
        (Rebinding, TimerLifetime, Init),
        (Rebinding, Nak, Init),
    ];

    fn expected(state: DhcpState, event: Event) -> DhcpState {
        ARROWS
            .iter()
            .find(|(from, on, _)| *from == state && *on == event)
            .map(|(_, _, to)| *to)
            .unwrap_or(state)
    }

    #[test]
    fn the_whole_grid_is_defined() {
        for state in ALL_STATES.iter() {
            for event in ALL_EVENTS.iter() {
                assert_eq!(
                    state.transition(*event),
                    expected(*state, *event),
                    "({}, {})",
                    state,
                    event
                );
            }
        }
    }

    #[test]
    fn ignored_events_are_idempotent() {
        for state in ALL_STATES.iter() {
            for event in ALL_EVENTS.iter() {
                if expected(*state, *event) != *state {
                    continue;
                }
                let mut current = *state;
                for _ in 0..5 {
                    current = current.transition(*event);
                    assert_eq!(current, *state, "({}, {})", state, event);
                }
            }
        }
    }

    #[test]
    fn ack_changes_no_state() {
        for state in ALL_STATES.iter() {
            assert_eq!(state.transition(Ack), *state);
        }
    }

    #[test]
    fn a_nak_while_renewing_resets_everything() {
        let mut state = State::new();
        state.dhcp_state = Renewing;
        state.timing = crate::timing::LeaseTiming {
            t1: 0,
            t2: 1000,
            lifetime: 2000,
        };
        state.dhcp_server_id = Some("192.0.2.1".parse().unwrap());

        assert_eq!(state.apply(Nak), Init);
        assert_eq!(state.timing(), crate::timing::LeaseTiming::default());
        assert_eq!(state.dhcp_server_id(), None);
    }

    #[test]
    fn an_ignored_event_keeps_the_lease_bookkeeping() {
        let mut state = State::new();
        state.dhcp_state = Bound;
        state.timing = crate::timing::LeaseTiming {
            t1: 500,
            t2: 800,
            lifetime: 1000,
        };

        assert_eq!(state.apply(Offer), Bound);
        assert_eq!(state.timing().lifetime, 1000);
    }

    #[test]
    fn binding_records_the_thresholds() {
        let mut state = State::new();
        state.enter(Selecting);
        state.bind(crate::timing::LeaseTiming {
            t1: 500,
            t2: 800,
            lifetime: 1000,
        });
        assert_eq!(state.dhcp_state(), Bound);
        assert_eq!(state.next_deadline(), Some(500));
    }
}
