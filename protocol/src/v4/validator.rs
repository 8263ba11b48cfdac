//! DHCP message validation module.

use super::{options::MessageType, Message};

/// The error type returned by `Message::validate`.
#[derive(Fail, Debug)]
pub enum Error {
    #[fail(display = "Validation error: {}", _0)]
    Validation(&'static str),
}

macro_rules! must_have_option (
    ($option:expr, $name:expr) => (
        if $option.is_none() {
            return Err(Error::Validation($name));
        }
    );
);

impl Message {
    /// DHCP message validation.
    ///
    /// Returns the DHCP message type on successful validation.
    ///
    /// # Errors
    /// Returns `Error::Validation` if the message type option is missing,
    /// malformed or unknown, or a required option is absent.
    pub fn validate(&self) -> Result<MessageType, Error> {
        let message_type = match self.options.message_type() {
            Some(MessageType::Undefined) | None => {
                return Err(Error::Validation("dhcp_message_type"))
            }
            Some(message_type) => message_type,
        };

        match message_type {
            // client generated packets section
            MessageType::DhcpDiscover => {}
            MessageType::DhcpRequest => {
                if self.options.dhcp_server_id().is_some() || self.client_ip_address.is_unspecified()
                {
                    must_have_option!(self.options.address_request(), "address_request");
                }
            }
            MessageType::DhcpInform => {}
            MessageType::DhcpRelease | MessageType::DhcpDecline => {
                must_have_option!(self.options.dhcp_server_id(), "dhcp_server_id");
            }

            // server generated packets section
            MessageType::DhcpOffer | MessageType::DhcpAck => {
                must_have_option!(self.options.address_time(), "address_time");
                must_have_option!(self.options.dhcp_server_id(), "dhcp_server_id");
            }
            MessageType::DhcpNak => {
                must_have_option!(self.options.dhcp_server_id(), "dhcp_server_id");
            }

            MessageType::Undefined => return Err(Error::Validation("dhcp_message_type")),
        }

        Ok(message_type)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use eui48::MacAddress;

    use super::super::{options::Options, HardwareType, OperationCode};
    use super::*;

    fn reply(options: Options) -> Message {
        Message {
            operation_code: OperationCode::BootReply,
            hardware_type: HardwareType::Ethernet,
            hardware_address_length: 6,
            hardware_options: 0,
            transaction_id: 1,
            seconds: 0,
            is_broadcast: false,
            client_ip_address: Ipv4Addr::UNSPECIFIED,
            your_ip_address: Ipv4Addr::new(192, 0, 2, 100),
            server_ip_address: Ipv4Addr::UNSPECIFIED,
            gateway_ip_address: Ipv4Addr::UNSPECIFIED,
            client_hardware_address: MacAddress::nil(),
            server_name: String::new(),
            boot_filename: String::new(),
            options,
        }
    }

    #[test]
    fn a_message_without_a_type_is_invalid() {
        assert!(reply(Options::new()).validate().is_err());
    }

    #[test]
    fn an_offer_needs_a_server_id_and_a_lease_time() {
        let mut options = Options::new();
        options.set_message_type(MessageType::DhcpOffer);
        options.set_address_time(3600);
        assert!(reply(options).validate().is_err());

        let mut options = Options::new();
        options.set_message_type(MessageType::DhcpOffer);
        options.set_address_time(3600);
        options.set_dhcp_server_id(Ipv4Addr::new(192, 0, 2, 1));
        let validated = reply(options).validate().unwrap();
        assert_eq!(validated, MessageType::DhcpOffer);
    }

    #[test]
    fn a_nak_needs_only_a_server_id() {
        let mut options = Options::new();
        options.set_message_type(MessageType::DhcpNak);
        options.set_dhcp_server_id(Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(reply(options).validate().unwrap(), MessageType::DhcpNak);
    }

    #[test]
    fn an_unknown_type_code_is_invalid() {
        let mut options = Options::new();
        options.set(super::super::options::OptionTag::DhcpMessageType, vec![240]);
        assert!(reply(options).validate().is_err());
    }
}
