//! A DHCPv4 client core driven by a single readiness descriptor.
//!
//! The crate implements the RFC 2131 client state machine together with
//! its lease timers. It neither spawns threads nor blocks: the embedder
//! adds [`Client::get_fd`] to its own multiplexer and calls
//! [`Client::dispatch`] whenever the descriptor becomes readable. Each
//! dispatch consumes at most one internal event, so the embedder keeps
//! full control over scheduling.

#[macro_use]
mod macros;
mod builder;
mod client;
mod epoll;
mod state;
mod timer;
mod timing;
mod transport;

#[macro_use]
extern crate log;
extern crate eui48;
extern crate libc;
extern crate rand;

extern crate dhcp4_protocol;

pub use self::{
    builder::MessageBuilder,
    client::Client,
    state::{DhcpState, Event},
    timer::monotonic_now,
    timing::LeaseTiming,
    transport::{Transport, UdpTransport},
};
