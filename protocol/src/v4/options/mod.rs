//! DHCP options module.
//!
//! Options are kept as an ordered store addressed by the numeric tag, so
//! that consumers can look up any option without the crate knowing its
//! meaning. The few options the client itself interprets get typed
//! accessors below.

pub mod message_type;
pub mod option_tag;
pub mod overload;

use std::{collections::BTreeMap, net::Ipv4Addr};

pub use self::{message_type::MessageType, option_tag::OptionTag, overload::Overload};

/// The variable part of a DHCP message.
#[derive(Default)]
pub struct Options {
    entries: BTreeMap<u8, Vec<u8>>,
}

impl Options {
    pub fn new() -> Self {
        Options::default()
    }

    /// Looks up one option by its numeric tag.
    pub fn query(&self, tag: u8) -> Option<&[u8]> {
        self.entries.get(&tag).map(Vec::as_slice)
    }

    /// Looks up one option by its well-known name.
    pub fn get(&self, tag: OptionTag) -> Option<&[u8]> {
        self.query(tag as u8)
    }

    /// Replaces the option value.
    pub fn set(&mut self, tag: OptionTag, value: Vec<u8>) {
        self.entries.insert(tag as u8, value);
    }

    /// Appends to the option value, inserting it if missing.
    ///
    /// RFC 3396: multiple instances of one option are concatenated
    /// in order of appearance.
    pub fn append(&mut self, tag: u8, value: &[u8]) {
        self.entries
            .entry(tag)
            .or_insert_with(Vec::new)
            .extend_from_slice(value);
    }

    /// Iterates the options in ascending tag order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &[u8])> {
        self.entries.iter().map(|(tag, value)| (*tag, value.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The DHCP message type, if the option is present with a valid size.
    pub fn message_type(&self) -> Option<MessageType> {
        match self.get(OptionTag::DhcpMessageType) {
            Some(value) if value.len() == 1 => Some(MessageType::from(value[0])),
            _ => None,
        }
    }

    pub fn dhcp_server_id(&self) -> Option<Ipv4Addr> {
        self.get_ipv4(OptionTag::DhcpServerId)
    }

    pub fn subnet_mask(&self) -> Option<Ipv4Addr> {
        self.get_ipv4(OptionTag::SubnetMask)
    }

    pub fn address_request(&self) -> Option<Ipv4Addr> {
        self.get_ipv4(OptionTag::AddressRequest)
    }

    pub fn address_time(&self) -> Option<u32> {
        self.get_u32(OptionTag::AddressTime)
    }

    pub fn renewal_time(&self) -> Option<u32> {
        self.get_u32(OptionTag::RenewalTime)
    }

    pub fn rebinding_time(&self) -> Option<u32> {
        self.get_u32(OptionTag::RebindingTime)
    }

    pub fn overload(&self) -> Option<Overload> {
        match self.get(OptionTag::Overload) {
            Some(value) if value.len() == 1 => Some(Overload::from(value[0])),
            _ => None,
        }
    }

    pub fn set_message_type(&mut self, value: MessageType) {
        self.set(OptionTag::DhcpMessageType, vec![value as u8]);
    }

    pub fn set_address_request(&mut self, value: Ipv4Addr) {
        self.set(OptionTag::AddressRequest, value.octets().to_vec());
    }

    pub fn set_address_time(&mut self, value: u32) {
        self.set(OptionTag::AddressTime, value.to_be_bytes().to_vec());
    }

    pub fn set_renewal_time(&mut self, value: u32) {
        self.set(OptionTag::RenewalTime, value.to_be_bytes().to_vec());
    }

    pub fn set_rebinding_time(&mut self, value: u32) {
        self.set(OptionTag::RebindingTime, value.to_be_bytes().to_vec());
    }

    pub fn set_dhcp_server_id(&mut self, value: Ipv4Addr) {
        self.set(OptionTag::DhcpServerId, value.octets().to_vec());
    }

    pub fn set_max_message_size(&mut self, value: u16) {
        self.set(OptionTag::DhcpMaxMessageSize, value.to_be_bytes().to_vec());
    }

    pub fn set_client_id(&mut self, value: Vec<u8>) {
        self.set(OptionTag::ClientId, value);
    }

    pub fn set_hostname(&mut self, value: &str) {
        self.set(OptionTag::Hostname, value.as_bytes().to_vec());
    }

    pub fn set_parameter_list(&mut self, tags: &[OptionTag]) {
        self.set(
            OptionTag::ParameterList,
            tags.iter().map(|tag| *tag as u8).collect(),
        );
    }

    fn get_ipv4(&self, tag: OptionTag) -> Option<Ipv4Addr> {
        match self.get(tag) {
            Some(value) if value.len() == 4 => {
                Some(Ipv4Addr::new(value[0], value[1], value[2], value[3]))
            }
            _ => None,
        }
    }

    fn get_u32(&self, tag: OptionTag) -> Option<u32> {
        match self.get(tag) {
            Some(value) if value.len() == 4 => {
                Some(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_returns_raw_value() {
        let mut options = Options::new();
        options.set_dhcp_server_id(Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(options.query(54), Some(&[192, 0, 2, 1][..]));
    }

    #[test]
    fn message_type_requires_single_octet() {
        let mut options = Options::new();
        options.set(OptionTag::DhcpMessageType, vec![2, 2]);
        assert!(options.message_type().is_none());

        options.set_message_type(MessageType::DhcpOffer);
        assert_eq!(options.message_type(), Some(MessageType::DhcpOffer));
    }

    #[test]
    fn append_concatenates_repeated_options() {
        let mut options = Options::new();
        options.append(55, &[1, 3]);
        options.append(55, &[6]);
        assert_eq!(options.get(OptionTag::ParameterList), Some(&[1, 3, 6][..]));
    }

    #[test]
    fn typed_getters_check_the_size() {
        let mut options = Options::new();
        options.set(OptionTag::AddressTime, vec![0, 1]);
        assert!(options.address_time().is_none());

        options.set_address_time(7200);
        assert_eq!(options.address_time(), Some(7200));
    }
}
