//! A minimal embedding: the client descriptor in a `poll(2)` loop.
//!
//! Needs the capability to bind the DHCP client port, so run it as root
//! (or with CAP_NET_BIND_SERVICE) on an interface without an address.

use std::{io, net::Ipv4Addr};

use eui48::MacAddress;

use dhcp4_client::{monotonic_now, Client, DhcpState, LeaseTiming, UdpTransport};

fn main() -> io::Result<()> {
    env_logger::init();

    let hardware_address = MacAddress::from_bytes(&[0x02, 0x00, 0x00, 0xaa, 0xbb, 0xcc])
        .expect("A valid MAC-48 address");

    let mut client: Client<UdpTransport> =
        Client::new(hardware_address, None, Some("dhcp4-demo".to_owned()))?;
    client.connect(UdpTransport::new(Ipv4Addr::UNSPECIFIED)?)?;
    client.start(None)?;

    let mut pollfd = libc::pollfd {
        fd: client.get_fd(),
        events: libc::POLLIN,
        revents: 0,
    };

    loop {
        let ready = unsafe { libc::poll(&mut pollfd, 1, 1000) };
        if ready < 0 {
            return Err(io::Error::last_os_error());
        }

        if let Err(error) = client.dispatch() {
            eprintln!("dispatch failed: {}; restarting discovery", error);
            client.start(None)?;
            continue;
        }

        if let Some(ack) = client.take_ack() {
            if let Some(timing) = LeaseTiming::from_ack(&ack, monotonic_now()?) {
                println!("bound to {}", ack.your_ip_address);
                client.accept_lease(timing.t1, timing.t2, timing.lifetime)?;
            }
        }

        if client.dhcp_state() == DhcpState::Init {
            // the lease expired or was NAKed; go again
            client.start(None)?;
        }
    }
}
