use chrono::{DateTime, Utc};

use crate::ip::{HeaderLengthPolicy, NetworkHeader};
use crate::tcp_udp::TransportSegment;


#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CapturedUnit<'a> {
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
    pub data: &'a [u8],
}


#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DecodedUnit<'a> {
    pub network: NetworkHeader<'a>,
    pub transport: TransportSegment<'a>,
}
impl<'a> DecodedUnit<'a> {
    pub fn decode(bytes: &'a [u8], policy: HeaderLengthPolicy) -> Self {
        let network = NetworkHeader::decode(bytes, policy);
        let transport = TransportSegment::decode(network.protocol_id, network.payload);
        Self {
            network,
            transport,
        }
    }
}


#[derive(Debug)]
pub enum PacketDissection<'a, H> {
    Success { header: H, rest: &'a [u8] },
    TooShort,
    Malformed,
}
