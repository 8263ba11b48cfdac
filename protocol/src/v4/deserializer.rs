//! DHCP message deserialization module.

use std::{io, net::Ipv4Addr};

use bytes::Buf;
use eui48::{MacAddress, EUI48LEN};

use super::{
    constants::*,
    options::{Options, Overload},
    Message,
};

/// Checks if there is enough space in buffer to get a value.
macro_rules! check_remaining(
    ($cursor:expr, $length:expr) => (
        if $cursor.remaining() < $length {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Packet is too small"));
        }
    )
);

const TAG_PAD: u8 = 0;
const TAG_END: u8 = 255;

impl Message {
    /// DHCP message deserialization.
    ///
    /// # Errors
    /// `io::Error` if the packet is truncated, the options magic cookie is
    /// wrong or an option length octet points beyond the packet.
    pub fn from_bytes(src: &[u8]) -> io::Result<Self> {
        let mut cursor = io::Cursor::new(src);
        check_remaining!(cursor, OFFSET_OPTIONS);

        let operation_code = cursor.get_u8().into();
        let hardware_type = cursor.get_u8().into();
        let hardware_address_length = cursor.get_u8();
        let hardware_options = cursor.get_u8();
        let transaction_id = cursor.get_u32();
        let seconds = cursor.get_u16();
        let is_broadcast = cursor.get_u16() & FLAG_BROADCAST != 0;
        let client_ip_address = Ipv4Addr::from(cursor.get_u32());
        let your_ip_address = Ipv4Addr::from(cursor.get_u32());
        let server_ip_address = Ipv4Addr::from(cursor.get_u32());
        let gateway_ip_address = Ipv4Addr::from(cursor.get_u32());

        let mut hardware_address = [0u8; SIZE_HARDWARE_ADDRESS];
        cursor.copy_to_slice(&mut hardware_address);
        let client_hardware_address = MacAddress::from_bytes(&hardware_address[..EUI48LEN])
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Hardware address"))?;

        let mut server_name = [0u8; SIZE_SERVER_NAME];
        cursor.copy_to_slice(&mut server_name);
        let mut boot_filename = [0u8; SIZE_BOOT_FILENAME];
        cursor.copy_to_slice(&mut boot_filename);

        if cursor.get_u32() != MAGIC_COOKIE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "MAGIC_COOKIE"));
        }

        let mut message = Message {
            operation_code,
            hardware_type,
            hardware_address_length,
            hardware_options,
            transaction_id,
            seconds,
            is_broadcast,
            client_ip_address,
            your_ip_address,
            server_ip_address,
            gateway_ip_address,
            client_hardware_address,
            server_name: nul_terminated(&server_name),
            boot_filename: nul_terminated(&boot_filename),
            options: Options::new(),
        };

        Self::append_options(&mut cursor, &mut message.options)?;
        match message.options.overload() {
            Some(Overload::File) => {
                Self::append_region(src, OFFSET_BOOT_FILENAME, SIZE_BOOT_FILENAME, &mut message)?;
            }
            Some(Overload::Sname) => {
                Self::append_region(src, OFFSET_SERVER_NAME, SIZE_SERVER_NAME, &mut message)?;
            }
            Some(Overload::Both) => {
                Self::append_region(src, OFFSET_BOOT_FILENAME, SIZE_BOOT_FILENAME, &mut message)?;
                Self::append_region(src, OFFSET_SERVER_NAME, SIZE_SERVER_NAME, &mut message)?;
            }
            _ => {}
        }

        Ok(message)
    }

    fn append_options(cursor: &mut io::Cursor<&[u8]>, options: &mut Options) -> io::Result<()> {
        while cursor.remaining() > 0 {
            let tag = cursor.get_u8();
            match tag {
                TAG_PAD => continue,
                TAG_END => break,
                tag => {
                    check_remaining!(cursor, 1);
                    let length = cursor.get_u8() as usize;
                    check_remaining!(cursor, length);
                    let position = cursor.position() as usize;
                    options.append(tag, &cursor.get_ref()[position..position + length]);
                    cursor.advance(length);
                }
            }
        }
        Ok(())
    }

    /// Appends the options hidden in an overloaded fixed header field.
    fn append_region(
        src: &[u8],
        offset: usize,
        size: usize,
        message: &mut Message,
    ) -> io::Result<()> {
        let mut cursor = io::Cursor::new(&src[offset..offset + size]);
        Self::append_options(&mut cursor, &mut message.options)
    }
}

fn nul_terminated(field: &[u8]) -> String {
    let end = field.iter().position(|byte| *byte == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::super::options::{MessageType, OptionTag};
    use super::*;

    fn offer_packet() -> Vec<u8> {
        let mut packet = Vec::with_capacity(SIZE_PACKET_MINIMAL);
        packet.push(2); // BOOTREPLY
        packet.push(1); // Ethernet
        packet.push(6);
        packet.push(0);
        packet.extend_from_slice(&0x2a2a2a2au32.to_be_bytes());
        packet.extend_from_slice(&0u16.to_be_bytes()); // secs
        packet.extend_from_slice(&FLAG_BROADCAST.to_be_bytes());
        packet.extend_from_slice(&[0, 0, 0, 0]); // ciaddr
        packet.extend_from_slice(&[192, 0, 2, 100]); // yiaddr
        packet.extend_from_slice(&[192, 0, 2, 1]); // siaddr
        packet.extend_from_slice(&[0, 0, 0, 0]); // giaddr
        packet.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
        packet.extend_from_slice(&[0u8; SIZE_HARDWARE_ADDRESS - 6]);
        packet.extend_from_slice(&[0u8; SIZE_SERVER_NAME]);
        packet.extend_from_slice(&[0u8; SIZE_BOOT_FILENAME]);
        packet.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        packet.extend_from_slice(&[53, 1, 2]); // DHCPOFFER
        packet.extend_from_slice(&[54, 4, 192, 0, 2, 1]);
        packet.extend_from_slice(&[51, 4, 0, 0, 0x1c, 0x20]); // 7200 s
        packet.push(TAG_END);
        packet
    }

    #[test]
    fn parses_an_offer() {
        let message = Message::from_bytes(&offer_packet()).unwrap();
        assert_eq!(message.transaction_id, 0x2a2a2a2a);
        assert!(message.is_broadcast);
        assert_eq!(message.your_ip_address, Ipv4Addr::new(192, 0, 2, 100));
        assert_eq!(message.options.message_type(), Some(MessageType::DhcpOffer));
        assert_eq!(
            message.options.dhcp_server_id(),
            Some(Ipv4Addr::new(192, 0, 2, 1))
        );
        assert_eq!(message.options.address_time(), Some(7200));
    }

    #[test]
    fn keeps_unknown_options_queryable() {
        let mut packet = offer_packet();
        let end = packet.pop().unwrap();
        packet.extend_from_slice(&[43, 2, 0xca, 0xfe]); // vendor specific
        packet.push(end);

        let message = Message::from_bytes(&packet).unwrap();
        assert_eq!(message.options.query(43), Some(&[0xca, 0xfe][..]));
    }

    #[test]
    fn pad_octets_are_skipped() {
        let mut packet = offer_packet();
        let end = packet.pop().unwrap();
        packet.extend_from_slice(&[TAG_PAD, TAG_PAD]);
        packet.extend_from_slice(&[58, 4, 0, 0, 0, 60]);
        packet.push(end);

        let message = Message::from_bytes(&packet).unwrap();
        assert_eq!(message.options.renewal_time(), Some(60));
    }

    #[test]
    fn options_after_end_are_ignored() {
        let mut packet = offer_packet();
        packet.extend_from_slice(&[58, 4, 0, 0, 0, 60]);

        let message = Message::from_bytes(&packet).unwrap();
        assert!(message.options.renewal_time().is_none());
    }

    #[test]
    fn rejects_a_truncated_header() {
        assert!(Message::from_bytes(&offer_packet()[..OFFSET_MAGIC_COOKIE]).is_err());
    }

    #[test]
    fn rejects_a_wrong_magic_cookie() {
        let mut packet = offer_packet();
        packet[OFFSET_MAGIC_COOKIE] = 0;
        assert!(Message::from_bytes(&packet).is_err());
    }

    #[test]
    fn rejects_an_option_length_past_the_packet() {
        let mut packet = offer_packet();
        packet.pop();
        packet.extend_from_slice(&[61, 200]); // claims 200 octets, has none
        assert!(Message::from_bytes(&packet).is_err());
    }

    #[test]
    fn overloaded_file_field_is_parsed() {
        let mut packet = offer_packet();
        packet[OFFSET_BOOT_FILENAME..OFFSET_BOOT_FILENAME + 6]
            .copy_from_slice(&[58, 4, 0, 0, 0, 60]);
        let end = packet.pop().unwrap();
        packet.extend_from_slice(&[OptionTag::Overload as u8, 1, 1]);
        packet.push(end);

        let message = Message::from_bytes(&packet).unwrap();
        assert_eq!(message.options.renewal_time(), Some(60));
        assert_eq!(message.options.message_type(), Some(MessageType::DhcpOffer));
    }

    #[test]
    fn repeated_options_concatenate() {
        let mut packet = offer_packet();
        let end = packet.pop().unwrap();
        packet.extend_from_slice(&[55, 2, 1, 3]);
        packet.extend_from_slice(&[55, 1, 6]);
        packet.push(end);

        let message = Message::from_bytes(&packet).unwrap();
        assert_eq!(
            message.options.get(OptionTag::ParameterList),
            Some(&[1, 3, 6][..])
        );
    }
}
