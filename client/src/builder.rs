//! A builder for the messages this client emits.

use std::net::Ipv4Addr;

use eui48::{MacAddress, EUI48LEN};

use dhcp4_protocol::{
    HardwareType, Message, MessageType, OperationCode, OptionTag, Options,
    SIZE_MESSAGE_MINIMAL,
};

/// Builds common client messages with some parameters.
pub struct MessageBuilder {
    /// Mandatory `MAC-48` address.
    client_hardware_address: MacAddress,
    /// Is set explicitly by user or defaulted to `client_hardware_address` bytes.
    client_id: Vec<u8>,
    /// The optional machine hostname.
    hostname: Option<String>,
}

impl MessageBuilder {
    /// Creates a builder with message parameters which will not be changed.
    pub fn new(
        client_hardware_address: MacAddress,
        client_id: Option<Vec<u8>>,
        hostname: Option<String>,
    ) -> Self {
        let client_id =
            client_id.unwrap_or_else(|| client_hardware_address.as_bytes().to_vec());

        MessageBuilder {
            client_hardware_address,
            client_id,
            hostname,
        }
    }

    /// Creates a general `DHCPDISCOVER` message.
    pub fn discover(
        &self,
        transaction_id: u32,
        is_broadcast: bool,
        address_request: Option<Ipv4Addr>,
    ) -> Message {
        let mut options = self.default_options();
        options.set_message_type(MessageType::DhcpDiscover);
        if let Some(address_request) = address_request {
            options.set_address_request(address_request);
        }

        self.message(transaction_id, is_broadcast, Ipv4Addr::UNSPECIFIED, options)
    }

    /// Creates a `DHCPREQUEST` answering a `DHCPOFFER` in `SELECTING` state.
    pub fn request_selecting(
        &self,
        transaction_id: u32,
        is_broadcast: bool,
        address_request: Ipv4Addr,
        dhcp_server_id: Ipv4Addr,
    ) -> Message {
        let mut options = self.default_options();
        options.set_message_type(MessageType::DhcpRequest);
        options.set_dhcp_server_id(dhcp_server_id);
        options.set_address_request(address_request);

        self.message(transaction_id, is_broadcast, Ipv4Addr::UNSPECIFIED, options)
    }

    /// Creates a `DHCPREQUEST` verifying a previous address in `INIT-REBOOT`
    /// state.
    ///
    /// RFC 2131 §4.3.2
    /// The client MUST insert its known network address in the
    /// 'requested IP address' option and MUST NOT include a
    /// 'server identifier'.
    pub fn request_init_reboot(
        &self,
        transaction_id: u32,
        is_broadcast: bool,
        address_request: Ipv4Addr,
    ) -> Message {
        let mut options = self.default_options();
        options.set_message_type(MessageType::DhcpRequest);
        options.set_address_request(address_request);

        self.message(transaction_id, is_broadcast, Ipv4Addr::UNSPECIFIED, options)
    }

    /// Creates a `DHCPREQUEST` extending the lease in `RENEWING` or
    /// `REBINDING` state.
    ///
    /// RFC 2131 §4.3.2
    /// The client fills the 'ciaddr' field with its current address and
    /// MUST NOT include a 'server identifier' or a 'requested IP address'.
    pub fn request_renew(
        &self,
        transaction_id: u32,
        is_broadcast: bool,
        client_ip_address: Ipv4Addr,
    ) -> Message {
        let mut options = self.default_options();
        options.set_message_type(MessageType::DhcpRequest);

        self.message(transaction_id, is_broadcast, client_ip_address, options)
    }

    fn default_options(&self) -> Options {
        let mut options = Options::new();
        options.set_client_id(self.client_id.clone());
        if let Some(ref hostname) = self.hostname {
            options.set_hostname(hostname);
        }
        options.set_max_message_size(SIZE_MESSAGE_MINIMAL as u16);
        options.set_parameter_list(&[
            OptionTag::SubnetMask,
            OptionTag::Routers,
            OptionTag::DomainNameServers,
            OptionTag::AddressTime,
            OptionTag::RenewalTime,
            OptionTag::RebindingTime,
        ]);
        options
    }

    fn message(
        &self,
        transaction_id: u32,
        is_broadcast: bool,
        client_ip_address: Ipv4Addr,
        options: Options,
    ) -> Message {
        Message {
            operation_code: OperationCode::BootRequest,
            hardware_type: HardwareType::Ethernet,
            hardware_address_length: EUI48LEN as u8,
            hardware_options: 0,

            transaction_id,
            seconds: 0,
            is_broadcast,

            client_ip_address,
            your_ip_address: Ipv4Addr::UNSPECIFIED,
            server_ip_address: Ipv4Addr::UNSPECIFIED,
            gateway_ip_address: Ipv4Addr::UNSPECIFIED,

            client_hardware_address: self.client_hardware_address,
            server_name: String::new(),
            boot_filename: String::new(),

            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> MessageBuilder {
        MessageBuilder::new(
            MacAddress::from_bytes(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]).unwrap(),
            None,
            Some("crabshack".to_owned()),
        )
    }

    #[test]
    fn a_discover_carries_the_defaults() {
        let message = builder().discover(7, true, None);
        assert_eq!(
            message.options.message_type(),
            Some(MessageType::DhcpDiscover)
        );
        assert_eq!(message.transaction_id, 7);
        assert!(message.is_broadcast);
        assert_eq!(
            message.options.get(OptionTag::ClientId),
            Some(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01][..])
        );
        assert_eq!(
            message.options.get(OptionTag::Hostname),
            Some(&b"crabshack"[..])
        );
        assert!(message.options.get(OptionTag::ParameterList).is_some());
    }

    #[test]
    fn a_selecting_request_names_the_server() {
        let message = builder().request_selecting(
            7,
            true,
            Ipv4Addr::new(192, 0, 2, 100),
            Ipv4Addr::new(192, 0, 2, 1),
        );
        assert_eq!(
            message.options.message_type(),
            Some(MessageType::DhcpRequest)
        );
        assert_eq!(
            message.options.dhcp_server_id(),
            Some(Ipv4Addr::new(192, 0, 2, 1))
        );
        assert_eq!(
            message.options.address_request(),
            Some(Ipv4Addr::new(192, 0, 2, 100))
        );
        assert!(message.client_ip_address.is_unspecified());
    }

    #[test]
    fn a_renewing_request_uses_ciaddr_only() {
        let message = builder().request_renew(7, false, Ipv4Addr::new(192, 0, 2, 100));
        assert_eq!(message.client_ip_address, Ipv4Addr::new(192, 0, 2, 100));
        assert!(message.options.dhcp_server_id().is_none());
        assert!(message.options.address_request().is_none());
    }
}
