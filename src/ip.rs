use std::net::Ipv4Addr;

use clap::ValueEnum;

use crate::bytes::TryFromBytes;
use crate::protocol::protocol_name;


pub const IPV4_MIN_HEADER_LENGTH: usize = 20;

// as defined in RFC791 section 3.1
const VERSION_IHL_OFFSET: usize = 0;
const PROTOCOL_OFFSET: usize = 9;
const SOURCE_ADDRESS_OFFSET: usize = 12;
const DESTINATION_ADDRESS_OFFSET: usize = 16;


#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, ValueEnum)]
pub enum HeaderLengthPolicy {
    /// Always 20 bytes; the IHL field is ignored, so options end up in the payload.
    #[default]
    Fixed,

    /// IHL field times four, so option-bearing headers are skipped correctly.
    Ihl,
}
impl HeaderLengthPolicy {
    pub fn header_length(&self, bytes: &[u8]) -> usize {
        match self {
            Self::Fixed => IPV4_MIN_HEADER_LENGTH,
            Self::Ihl => {
                let ihl_w32 = bytes.get(VERSION_IHL_OFFSET)
                    .map(|b| b & 0b0000_1111)
                    .unwrap_or(0);
                let ihl_bytes = usize::from(ihl_w32) * 4;
                if ihl_bytes < IPV4_MIN_HEADER_LENGTH {
                    // malformed; pretend there are no options
                    IPV4_MIN_HEADER_LENGTH
                } else {
                    ihl_bytes
                }
            },
        }
    }
}


#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct NetworkHeader<'a> {
    pub version: Option<u8>,
    pub header_length: usize,
    pub protocol_id: Option<u8>,
    pub protocol_name: Option<&'static str>,
    pub source: Option<Ipv4Addr>,
    pub destination: Option<Ipv4Addr>,
    pub payload: &'a [u8],
}
impl<'a> NetworkHeader<'a> {
    pub fn decode(bytes: &'a [u8], policy: HeaderLengthPolicy) -> Self {
        let version = bytes.get(VERSION_IHL_OFFSET)
            .map(|b| (b & 0b1111_0000) >> 4);
        let protocol_id = bytes.get(PROTOCOL_OFFSET).copied();
        let protocol_name = protocol_id.and_then(protocol_name);

        let (source, destination) = if bytes.len() >= IPV4_MIN_HEADER_LENGTH {
            (
                bytes.get(SOURCE_ADDRESS_OFFSET..).and_then(Ipv4Addr::try_from_bytes),
                bytes.get(DESTINATION_ADDRESS_OFFSET..).and_then(Ipv4Addr::try_from_bytes),
            )
        } else {
            (None, None)
        };

        let header_length = policy.header_length(bytes);
        let payload = bytes.get(header_length..).unwrap_or(&[]);

        Self {
            version,
            header_length,
            protocol_id,
            protocol_name,
            source,
            destination,
            payload,
        }
    }
}


// as defined in RFC1071; uncomplemented, so correct data including its checksum sums to 0xFFFF
pub fn internet_checksum<I: IntoIterator<Item = u8>>(bytes: I) -> u16 {
    let mut sum: u32 = 0;
    let mut iter = bytes.into_iter();
    loop {
        let high = match iter.next() {
            Some(b) => b,
            None => break,
        };
        let low = iter.next().unwrap_or(0);
        sum += u32::from(u16::from_be_bytes([high, low]));
    }
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}


#[cfg(test)]
mod tests {
    use super::*;

    fn header(protocol: u8) -> Vec<u8> {
        let mut bs = vec![
            0x45, 0x00, 0x00, 0x00,
            0x12, 0x34, 0x40, 0x00,
            0x40, protocol, 0x00, 0x00,
            10, 1, 0, 1,
            10, 1, 0, 10,
        ];
        let len = bs.len() as u16;
        bs[2..4].copy_from_slice(&len.to_be_bytes());
        bs
    }

    #[test]
    fn too_short_for_protocol() {
        for len in 0..10 {
            let bs = vec![0x45u8; len];
            let h = NetworkHeader::decode(&bs, HeaderLengthPolicy::Fixed);
            assert_eq!(h.protocol_id, None);
            assert_eq!(h.protocol_name, None);
            assert!(h.payload.is_empty());
        }
    }

    #[test]
    fn protocol_without_full_header() {
        let bs = &header(17)[..12];
        let h = NetworkHeader::decode(bs, HeaderLengthPolicy::Fixed);
        assert_eq!(h.protocol_id, Some(17));
        assert_eq!(h.protocol_name, Some("UDP"));
        assert_eq!(h.source, None);
        assert_eq!(h.destination, None);
        assert!(h.payload.is_empty());
    }

    #[test]
    fn header_only() {
        let bs = header(6);
        let h = NetworkHeader::decode(&bs, HeaderLengthPolicy::Fixed);
        assert_eq!(h.version, Some(4));
        assert_eq!(h.protocol_name, Some("TCP"));
        assert_eq!(h.source, Some(Ipv4Addr::new(10, 1, 0, 1)));
        assert_eq!(h.destination, Some(Ipv4Addr::new(10, 1, 0, 10)));
        assert!(h.payload.is_empty());
    }

    #[test]
    fn unassigned_protocol_has_no_name() {
        let mut bs = header(0xFF);
        bs.extend_from_slice(b"abc");
        let h = NetworkHeader::decode(&bs, HeaderLengthPolicy::Fixed);
        assert_eq!(h.protocol_id, Some(0xFF));
        assert_eq!(h.protocol_name, None);
        assert_eq!(h.payload, b"abc");
    }

    #[test]
    fn options_under_both_policies() {
        let mut bs = header(17);
        bs[0] = 0x46;
        bs.extend_from_slice(&[0x01, 0x01, 0x01, 0x00]); // NOP NOP NOP EOL
        bs.extend_from_slice(b"rest");

        let fixed = NetworkHeader::decode(&bs, HeaderLengthPolicy::Fixed);
        assert_eq!(fixed.header_length, 20);
        assert_eq!(fixed.payload, b"\x01\x01\x01\x00rest");

        let ihl = NetworkHeader::decode(&bs, HeaderLengthPolicy::Ihl);
        assert_eq!(ihl.header_length, 24);
        assert_eq!(ihl.payload, b"rest");
    }

    #[test]
    fn ihl_longer_than_unit() {
        let mut bs = header(17);
        bs[0] = 0x4F;
        let h = NetworkHeader::decode(&bs, HeaderLengthPolicy::Ihl);
        assert_eq!(h.header_length, 60);
        assert!(h.payload.is_empty());
    }

    #[test]
    fn bogus_ihl_falls_back() {
        let mut bs = header(17);
        bs[0] = 0x42;
        bs.push(0xAA);
        let h = NetworkHeader::decode(&bs, HeaderLengthPolicy::Ihl);
        assert_eq!(h.header_length, 20);
        assert_eq!(h.payload, &[0xAAu8]);
    }

    #[test]
    fn checksum_rfc1071_example() {
        let data = [0x00, 0x01, 0xF2, 0x03, 0xF4, 0xF5, 0xF6, 0xF7];
        assert_eq!(internet_checksum(data), 0xDDF2);
    }

    #[test]
    fn checksum_verifies_to_ffff() {
        let mut bs = header(17);
        let sum = !internet_checksum(bs.iter().copied());
        bs[10..12].copy_from_slice(&sum.to_be_bytes());
        assert_eq!(internet_checksum(bs.iter().copied()), 0xFFFF);
    }

    #[test]
    fn checksum_odd_length() {
        assert_eq!(internet_checksum(*b"hello"), 0x43D2);
    }
}
