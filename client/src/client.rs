//! The main DHCP client module.

use std::{
    io,
    net::{Ipv4Addr, SocketAddrV4},
    os::unix::io::{AsRawFd, RawFd},
};

use eui48::MacAddress;

use dhcp4_protocol::{Message, MessageType, DHCP_PORT_SERVER};

use crate::{
    builder::MessageBuilder,
    epoll::{DispatchEvent, Epoll, Readiness},
    state::{DhcpState, Event, State},
    timer::{self, Timer},
    timing::LeaseTiming,
    transport::Transport,
};

/// One DHCP conversation on one interface.
///
/// The client owns its multiplexer, its timer and (once attached) its
/// transport, and is driven entirely by readiness: the embedder puts
/// [`Client::get_fd`] into its own poll set and calls
/// [`Client::dispatch`] whenever the descriptor reads ready. Every
/// dispatch handles at most one internal event and returns promptly.
///
/// ```text
///               The DHCP client lifecycle (RFC 2131 §4.4)
///
///     INIT ---------- send DHCPDISCOVER ----------> SELECTING
///     INIT-REBOOT --- send DHCPREQUEST -----------> REBOOTING
///     SELECTING ----- DHCPOFFER / send REQUEST ---> REQUESTING
///     REQUESTING ---- accept_lease ---------------> BOUND
///     BOUND --------- T1 / send REQUEST ----------> RENEWING
///     RENEWING ------ T2 / broadcast REQUEST -----> REBINDING
///     any of them --- lease expired or DHCPNAK ---> INIT
/// ```
pub struct Client<T: Transport> {
    /// The readiness multiplexer handed out through `get_fd`.
    epoll: Epoll,
    /// The T1/T2/expiry timer source.
    timer: Timer,
    /// The attached conversation endpoint, if any.
    connection: Option<T>,
    /// Current DHCP state and lease bookkeeping.
    state: State,
    /// Builds the requests this client emits.
    builder: MessageBuilder,
    /// A `DHCPACK` waiting for the embedder's `accept_lease` decision.
    last_ack: Option<Message>,
}

impl<T: Transport> Client<T> {
    /// Creates a client in `INIT` with nothing armed.
    ///
    /// The multiplexing descriptor is fully configured here, timer
    /// included; nothing is network-visible until [`Client::connect`]
    /// and [`Client::start`].
    ///
    /// # Errors
    /// `io::Error` if a descriptor cannot be created or registered. No
    /// partially initialized client escapes: whatever was acquired is
    /// released on the error path.
    pub fn new(
        client_hardware_address: MacAddress,
        client_id: Option<Vec<u8>>,
        hostname: Option<String>,
    ) -> io::Result<Self> {
        let epoll = Epoll::new()?;
        let timer = Timer::new()?;
        epoll.register(timer.as_raw_fd(), DispatchEvent::Timer)?;

        Ok(Client {
            epoll,
            timer,
            connection: None,
            state: State::new(),
            builder: MessageBuilder::new(client_hardware_address, client_id, hostname),
            last_ack: None,
        })
    }

    /// The descriptor the embedder adds to its own multiplexer.
    pub fn get_fd(&self) -> RawFd {
        self.epoll.as_raw_fd()
    }

    /// Attaches the conversation endpoint and starts watching it.
    pub fn connect(&mut self, connection: T) -> io::Result<()> {
        if self.connection.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "A connection is already attached",
            ));
        }
        self.epoll
            .register(connection.as_raw_fd(), DispatchEvent::Connection)?;
        self.connection = Some(connection);
        Ok(())
    }

    /// Detaches and returns the conversation endpoint, unregistering
    /// the descriptor before the endpoint can be dropped and closed.
    pub fn disconnect(&mut self) -> io::Result<Option<T>> {
        match self.connection.take() {
            Some(connection) => {
                self.epoll.unregister(connection.as_raw_fd())?;
                Ok(Some(connection))
            }
            None => Ok(None),
        }
    }

    /// Starts a session (RFC 2131 §4.4.1, §4.4.2).
    ///
    /// Without a previous address the client broadcasts a
    /// `DHCPDISCOVER` and moves to `SELECTING`; with one it verifies the
    /// address through the `INIT-REBOOT` path and moves to `REBOOTING`.
    ///
    /// # Errors
    /// `io::Error` if no transport is attached, the send fails, or the
    /// client is not in `INIT`. On a send failure the client stays in
    /// `INIT`.
    pub fn start(&mut self, previous_address: Option<Ipv4Addr>) -> io::Result<()> {
        if self.state.dhcp_state() != DhcpState::Init {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "A session starts over from INIT",
            ));
        }

        self.state.regenerate_xid();
        let result = match previous_address {
            None => self.start_discovery(),
            Some(address) => self.start_reboot(address),
        };
        if result.is_err() {
            self.state.reset();
        }
        result
    }

    /// Processes at most one pending readiness event.
    ///
    /// Returns `Ok` even when there was nothing to do. Any hard error
    /// resets the machine to `INIT` (lease timings cleared) before it
    /// propagates, so the embedder can keep driving the descriptor and
    /// restart discovery.
    pub fn dispatch(&mut self) -> io::Result<()> {
        let result = self.dispatch_one();
        if let Err(ref error) = result {
            warn!("Resetting to INIT after a hard error: {}", error);
            self.state.reset();
        }
        result
    }

    /// Commits an accepted lease: records the thresholds, arms the
    /// timer to the earliest of them and enters `BOUND`.
    ///
    /// The thresholds are absolute boot-clock microseconds with
    /// `t1 <= t2 <= lifetime` over the nonzero values; a zero threshold
    /// is skipped. This is the only way into `BOUND`: an inbound
    /// `DHCPACK` alone never rebinds the machine, it is retained for
    /// the embedder (see [`Client::take_ack`]).
    pub fn accept_lease(&mut self, t1: u64, t2: u64, lifetime: u64) -> io::Result<()> {
        let timing = LeaseTiming { t1, t2, lifetime };
        if !timing.is_ordered() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Lease thresholds must not decrease",
            ));
        }

        self.state.bind(timing);
        match timing.next_deadline() {
            Some(deadline) => self.timer.arm_at(deadline)?,
            None => self.timer.disarm()?,
        }
        Ok(())
    }

    /// Takes the `DHCPACK` waiting for an `accept_lease` decision.
    ///
    /// The message is retained only until the next dispatched one.
    pub fn take_ack(&mut self) -> Option<Message> {
        self.last_ack.take()
    }

    pub fn dhcp_state(&self) -> DhcpState {
        self.state.dhcp_state()
    }

    pub fn transaction_id(&self) -> u32 {
        self.state.xid()
    }

    pub fn lease_timing(&self) -> LeaseTiming {
        self.state.timing()
    }

    fn start_discovery(&mut self) -> io::Result<()> {
        /*
        RFC 2131 §4.4.1
        The client begins in INIT state and forms a DHCPDISCOVER message.
        The client MAY suggest a network address and/or lease time by
        including the 'requested IP address' and 'IP address lease time'
        options.
        */

        let request = self.builder.discover(self.state.xid(), true, None);
        self.send_request(request)?;
        self.state.enter(DhcpState::Selecting);
        Ok(())
    }

    fn start_reboot(&mut self, previous_address: Ipv4Addr) -> io::Result<()> {
        /*
        RFC 2131 §4.4.2
        The client begins in INIT-REBOOT state and sends a DHCPREQUEST
        message. The client MUST insert its known network address as a
        'requested IP address' option in the DHCPREQUEST message.
        */

        self.state.enter(DhcpState::InitReboot);
        let request = self
            .builder
            .request_init_reboot(self.state.xid(), true, previous_address);
        self.send_request(request)?;
        self.state.enter(DhcpState::Rebooting);
        Ok(())
    }

    fn dispatch_one(&mut self) -> io::Result<()> {
        match self.epoll.poll_one()? {
            Some((DispatchEvent::Timer, readiness)) => self.dispatch_timer(readiness),
            Some((DispatchEvent::Connection, readiness)) => self.dispatch_connection(readiness),
            None => Ok(()),
        }
    }

    /// Timer readiness: fire the single most advanced expired threshold.
    fn dispatch_timer(&mut self, readiness: Readiness) -> io::Result<()> {
        if readiness.is_hangup() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "Timer descriptor hangup",
            ));
        }

        if self.timer.expirations()? == 0 {
            return Ok(());
        }

        let now = timer::monotonic_now()?;
        if let Some(event) = self.state.expire(now) {
            self.handle_event(event)?;
        }
        if let Some(deadline) = self.state.next_deadline() {
            self.timer.arm_at(deadline)?;
        }
        Ok(())
    }

    /// Connection readiness: take one message and map it to an event.
    fn dispatch_connection(&mut self, readiness: Readiness) -> io::Result<()> {
        if readiness.is_readable() {
            let message = match self.connection.as_mut() {
                Some(connection) => connection.dispatch()?,
                // a stale event for an endpoint detached meanwhile
                None => return Ok(()),
            };
            return match message {
                Some(message) => self.dispatch_message(message),
                None => Ok(()),
            };
        }

        if readiness.is_hangup() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "Connection hangup",
            ));
        }

        Ok(())
    }

    fn dispatch_message(&mut self, message: Message) -> io::Result<()> {
        log_receive!(message);
        check_xid!(self.state.xid(), message.transaction_id);
        let message_type = validate!(message);

        match message_type {
            MessageType::DhcpOffer => self.handle_offer(message),
            MessageType::DhcpAck => self.handle_ack(message),
            MessageType::DhcpNak => self.handle_event(Event::Nak),
            message_type => {
                warn!("Ignoring an unexpected DHCP message type {}", message_type);
                Ok(())
            }
        }
    }

    fn handle_offer(&mut self, offer: Message) -> io::Result<()> {
        let from = self.state.dhcp_state();
        self.state.apply(Event::Offer);
        if from != DhcpState::Selecting {
            // ignored by the table; stale offers are discarded
            return Ok(());
        }

        /*
        RFC 2131 §4.4.1
        If the parameters are acceptable, the client records the address
        of the server that supplied the parameters from the 'server
        identifier' field and sends that address in the 'server
        identifier' field of a DHCPREQUEST broadcast message.
        */

        self.state
            .record_offer(offer.options.dhcp_server_id(), offer.your_ip_address);
        match self.state.dhcp_server_id() {
            Some(dhcp_server_id) => {
                let request = self.builder.request_selecting(
                    self.state.xid(),
                    true,
                    self.state.offered_address(),
                    dhcp_server_id,
                );
                self.send_request(request)
            }
            None => {
                warn!("The offer names no server to request the lease from");
                Ok(())
            }
        }
    }

    fn handle_ack(&mut self, ack: Message) -> io::Result<()> {
        self.state.apply(Event::Ack);
        match self.state.dhcp_state() {
            DhcpState::Requesting
            | DhcpState::Rebooting
            | DhcpState::Renewing
            | DhcpState::Rebinding => {
                self.state
                    .record_assignment(ack.options.dhcp_server_id(), ack.your_ip_address);
                self.last_ack = Some(ack);
            }
            other => debug!("Ignoring {} in {} state", MessageType::DhcpAck, other),
        }
        Ok(())
    }

    fn handle_event(&mut self, event: Event) -> io::Result<()> {
        let from = self.state.dhcp_state();
        let to = self.state.apply(event);
        if to == from {
            return Ok(());
        }

        match (event, to) {
            (Event::TimerT1, DhcpState::Renewing) => {
                /*
                RFC 2131 §4.4.5
                At time T1 the client moves to RENEWING state and sends
                (via unicast) a DHCPREQUEST message to the server to
                extend its lease.
                */

                let request = self.builder.request_renew(
                    self.state.xid(),
                    false,
                    self.state.assigned_address(),
                );
                self.send_request(request)?;
            }
            (Event::TimerT2, DhcpState::Rebinding) => {
                /*
                RFC 2131 §4.4.5
                If no DHCPACK arrives before time T2, the client moves to
                REBINDING state and sends (via broadcast) a DHCPREQUEST
                message to extend its lease.
                */

                let request = self.builder.request_renew(
                    self.state.xid(),
                    true,
                    self.state.assigned_address(),
                );
                self.send_request(request)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Chooses the packet destination address according to the RFC 2131
    /// rules: only the renewal unicast goes straight to the leasing
    /// server, everything else is broadcast.
    fn destination(&self) -> Ipv4Addr {
        match self.state.dhcp_server_id() {
            Some(dhcp_server_id) if self.state.dhcp_state() == DhcpState::Renewing => {
                dhcp_server_id
            }
            _ => Ipv4Addr::BROADCAST,
        }
    }

    /// Sends a request.
    fn send_request(&mut self, request: Message) -> io::Result<()> {
        let destination = SocketAddrV4::new(self.destination(), DHCP_PORT_SERVER);
        log_send!(request, destination);

        match self.connection.as_mut() {
            Some(connection) => connection.send(destination, &request),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "No transport attached",
            )),
        }
    }
}

impl<T: Transport> AsRawFd for Client<T> {
    fn as_raw_fd(&self) -> RawFd {
        self.get_fd()
    }
}

impl<T: Transport> Drop for Client<T> {
    fn drop(&mut self) {
        // unregister before the endpoint drop closes its descriptor
        if let Some(connection) = self.connection.take() {
            let _ = self.epoll.unregister(connection.as_raw_fd());
        }
    }
}
