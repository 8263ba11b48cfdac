//! DHCP message serialization module.

use std::io;

use bytes::BufMut;
use eui48::EUI48LEN;

use super::{constants::*, Message};

/// A single option chunk may not exceed one length octet.
const MAX_OPTION_CHUNK: usize = 255;

impl Message {
    /// DHCP message serialization.
    ///
    /// Writes the message into `dst` and pads it up to the BOOTP minimum,
    /// returning the number of bytes to put on the wire.
    ///
    /// # Errors
    /// `io::Error` if `dst` cannot hold the encoded message.
    pub fn to_bytes(&self, dst: &mut [u8]) -> io::Result<usize> {
        let required = self.encoded_size().max(SIZE_PACKET_MINIMAL);
        if dst.len() < required {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "Buffer is too small",
            ));
        }

        let capacity = dst.len();
        let mut buffer: &mut [u8] = dst;
        buffer.put_u8(self.operation_code as u8);
        buffer.put_u8(self.hardware_type as u8);
        buffer.put_u8(self.hardware_address_length);
        buffer.put_u8(self.hardware_options);
        buffer.put_u32(self.transaction_id);
        buffer.put_u16(self.seconds);
        buffer.put_u16(if self.is_broadcast { FLAG_BROADCAST } else { 0 });
        buffer.put_slice(&self.client_ip_address.octets());
        buffer.put_slice(&self.your_ip_address.octets());
        buffer.put_slice(&self.server_ip_address.octets());
        buffer.put_slice(&self.gateway_ip_address.octets());
        buffer.put_slice(self.client_hardware_address.as_bytes());
        buffer.put_bytes(0, SIZE_HARDWARE_ADDRESS - EUI48LEN);
        put_fixed(&mut buffer, self.server_name.as_bytes(), SIZE_SERVER_NAME);
        put_fixed(&mut buffer, self.boot_filename.as_bytes(), SIZE_BOOT_FILENAME);
        buffer.put_u32(MAGIC_COOKIE);

        for (tag, value) in self.options.iter() {
            if value.is_empty() {
                buffer.put_u8(tag);
                buffer.put_u8(0);
                continue;
            }
            // RFC 3396: values longer than one length octet are split
            // into consecutive instances of the same option
            for chunk in value.chunks(MAX_OPTION_CHUNK) {
                buffer.put_u8(tag);
                buffer.put_u8(chunk.len() as u8);
                buffer.put_slice(chunk);
            }
        }
        buffer.put_u8(255); // end

        let written = capacity - buffer.remaining_mut();
        if written < required {
            buffer.put_bytes(0, required - written);
        }
        Ok(required)
    }

    fn encoded_size(&self) -> usize {
        let options: usize = self
            .options
            .iter()
            .map(|(_, value)| {
                if value.is_empty() {
                    2
                } else {
                    let chunks = (value.len() + MAX_OPTION_CHUNK - 1) / MAX_OPTION_CHUNK;
                    value.len() + 2 * chunks
                }
            })
            .sum();
        OFFSET_OPTIONS + options + 1
    }
}

fn put_fixed(buffer: &mut &mut [u8], value: &[u8], size: usize) {
    let length = value.len().min(size);
    buffer.put_slice(&value[..length]);
    buffer.put_bytes(0, size - length);
}
