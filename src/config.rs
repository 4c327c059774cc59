use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;


pub const MTU: u16 = 1500;
pub const INTERFACE_NAME: &str = "tun250413";
pub const INTERFACE_CIDR: &str = "10.1.0.10/24";

pub const UDP_PORT: u16 = 50500;
pub const INJECT_BIND_PORT: u16 = 51442;
// goes into the injector's fake header
pub const INJECT_FAKE_SOURCE_PORT: u16 = 50401;
pub const INJECT_TARGET: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(10, 1, 0, 20), UDP_PORT);


#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Ipv4Cidr {
    pub address: Ipv4Addr,
    pub prefix_length: u8,
}
impl Ipv4Cidr {
    pub fn netmask(&self) -> Ipv4Addr {
        let bits = u32::MAX
            .checked_shl(32 - u32::from(self.prefix_length))
            .unwrap_or(0);
        Ipv4Addr::from(bits)
    }
}
impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_length)
    }
}
impl FromStr for Ipv4Cidr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address_str, prefix_str) = s.split_once('/')
            .ok_or_else(|| format!("{:?} is missing a /prefix", s))?;
        let address: Ipv4Addr = address_str.parse()
            .map_err(|e| format!("invalid address {:?}: {}", address_str, e))?;
        let prefix_length: u8 = prefix_str.parse()
            .map_err(|e| format!("invalid prefix length {:?}: {}", prefix_str, e))?;
        if prefix_length > 32 {
            return Err(format!("prefix length {} is larger than 32", prefix_length));
        }
        Ok(Self {
            address,
            prefix_length,
        })
    }
}


#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InterfaceConfig {
    pub name: String,
    pub cidr: Ipv4Cidr,
    pub mtu: u16,
}
impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            name: INTERFACE_NAME.to_owned(),
            cidr: Ipv4Cidr {
                address: Ipv4Addr::new(10, 1, 0, 10),
                prefix_length: 24,
            },
            mtu: MTU,
        }
    }
}
