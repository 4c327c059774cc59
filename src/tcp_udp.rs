use bitflags::bitflags;

use crate::bytes::read_at;
use crate::packet::PacketDissection;
use crate::protocol::{protocol_name, TransportProtocol};


pub const TCP_MIN_HEADER_LENGTH: usize = 20;
pub const UDP_HEADER_LENGTH: usize = 8;


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
// as defined in RFC9293 section 3.1
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence_number: u32,
    pub acknowledgement_number: u32,
    // offset is stored as the number of 32-bit words!
    pub data_offset: u8,
    pub flags: TcpFlags,
    pub window: u16,
    pub checksum: u16,
    pub urgent_pointer: u16,
}
impl TcpHeader {
    pub fn try_take(bytes: &[u8]) -> PacketDissection<'_, Self> {
        if bytes.len() < TCP_MIN_HEADER_LENGTH {
            return PacketDissection::TooShort;
        }

        let data_offset = (bytes[12] & 0b1111_0000) >> 4;
        let data_offset_bytes = usize::from(data_offset) * 4;
        if data_offset_bytes < TCP_MIN_HEADER_LENGTH {
            return PacketDissection::Malformed;
        }
        if bytes.len() < data_offset_bytes {
            return PacketDissection::TooShort;
        }

        match Self::read_fixed_part(bytes, data_offset) {
            Some(header) => PacketDissection::Success { header, rest: &bytes[data_offset_bytes..] },
            None => PacketDissection::TooShort,
        }
    }

    fn read_fixed_part(bytes: &[u8], data_offset: u8) -> Option<Self> {
        Some(Self {
            source_port: read_at(bytes, 0)?,
            destination_port: read_at(bytes, 2)?,
            sequence_number: read_at(bytes, 4)?,
            acknowledgement_number: read_at(bytes, 8)?,
            data_offset,
            flags: TcpFlags::from_bits_truncate(*bytes.get(13)?),
            window: read_at(bytes, 14)?,
            checksum: read_at(bytes, 16)?,
            urgent_pointer: read_at(bytes, 18)?,
        })
    }
}


bitflags! {
    #[derive(Default)]
    // managed by IANA: https://www.iana.org/assignments/tcp-parameters/tcp-parameters.xhtml (section "TCP Header Flags")
    pub struct TcpFlags: u8 {
        const FIN = 0b0000_0001;
        const SYN = 0b0000_0010;
        const RST = 0b0000_0100;
        const PSH = 0b0000_1000;
        const ACK = 0b0001_0000;
        const URG = 0b0010_0000;
        const ECE = 0b0100_0000;
        const CWR = 0b1000_0000;
    }
}


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
// as defined in RFC768, "Format" section
pub struct UdpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub length: u16,
    pub checksum: u16,
}
impl UdpHeader {
    pub fn try_take(bytes: &[u8]) -> PacketDissection<'_, Self> {
        if bytes.len() < UDP_HEADER_LENGTH {
            return PacketDissection::TooShort;
        }

        match Self::read_fixed_part(bytes) {
            Some(header) => PacketDissection::Success { header, rest: &bytes[UDP_HEADER_LENGTH..] },
            None => PacketDissection::TooShort,
        }
    }

    fn read_fixed_part(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            source_port: read_at(bytes, 0)?,
            destination_port: read_at(bytes, 2)?,
            length: read_at(bytes, 4)?,
            checksum: read_at(bytes, 6)?,
        })
    }
}


// ports only for TCP and UDP; anything else only carries its name
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TransportSegment<'a> {
    pub protocol_name: Option<&'static str>,
    pub source_port: Option<u16>,
    pub destination_port: Option<u16>,
    pub tcp_flags: Option<TcpFlags>,
    pub payload: &'a [u8],
}
impl<'a> TransportSegment<'a> {
    pub fn decode(protocol_id: Option<u8>, bytes: &'a [u8]) -> Self {
        let mut segment = Self {
            protocol_name: protocol_id.and_then(protocol_name),
            source_port: None,
            destination_port: None,
            tcp_flags: None,
            payload: &[],
        };

        let transport = match protocol_id.and_then(TransportProtocol::from_id) {
            Some(t) => t,
            None => return segment,
        };

        if let (Some(source_port), Some(destination_port)) = (read_at::<u16>(bytes, 0), read_at::<u16>(bytes, 2)) {
            segment.source_port = Some(source_port);
            segment.destination_port = Some(destination_port);
        }

        match transport {
            TransportProtocol::Udp => {
                if let PacketDissection::Success { rest, .. } = UdpHeader::try_take(bytes) {
                    segment.payload = rest;
                }
            },
            TransportProtocol::Tcp => {
                if let PacketDissection::Success { header, rest } = TcpHeader::try_take(bytes) {
                    segment.tcp_flags = Some(header.flags);
                    segment.payload = rest;
                }
            },
        }

        segment
    }
}
