//! Synthetic traffic for a running listener. Test utility only: the body merely looks like a UDP
//! header followed by `hello` and is not a well-formed nested datagram.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::{INJECT_FAKE_SOURCE_PORT, UDP_PORT};
use crate::ip::internet_checksum;


pub const INJECT_PAYLOAD: &[u8] = b"hello";


#[derive(Debug, Error)]
pub enum InjectError {
    #[error("failed to bind injector socket to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect injector socket to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}


#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Injector {
    pub bind_port: u16,
    pub target: SocketAddrV4,
    pub interval: Duration,
}
impl Injector {
    pub async fn run(&self, mut stop: watch::Receiver<bool>) -> Result<u64, InjectError> {
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.bind_port));
        let socket = UdpSocket::bind(bind_addr).await
            .map_err(|source| InjectError::Bind { addr: bind_addr, source })?;
        let target = SocketAddr::V4(self.target);
        socket.connect(target).await
            .map_err(|source| InjectError::Connect { addr: target, source })?;
        info!(%bind_addr, %target, "injecting synthetic traffic");

        let blob = synthetic_blob(INJECT_PAYLOAD);
        let mut ticker = tokio::time::interval(self.interval);
        let mut seq: u64 = 0;
        loop {
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                },
                _ = ticker.tick() => {},
            }

            match socket.send(&blob).await {
                Ok(n) => info!(seq, written = n, "sent synthetic datagram"),
                Err(e) => error!(seq, "failed to send synthetic datagram: {}", e),
            }
            seq += 1;
        }

        Ok(seq)
    }
}


// fake UDP header (ports, length, checksum), then payload
pub fn synthetic_blob(payload: &[u8]) -> Vec<u8> {
    let length = u16::try_from(8 + payload.len()).unwrap_or(u16::MAX);
    let checksum = !internet_checksum(payload.iter().copied());

    let mut ret = Vec::with_capacity(8 + payload.len());
    ret.extend_from_slice(&INJECT_FAKE_SOURCE_PORT.to_be_bytes());
    ret.extend_from_slice(&UDP_PORT.to_be_bytes());
    ret.extend_from_slice(&length.to_be_bytes());
    ret.extend_from_slice(&checksum.to_be_bytes());
    ret.extend_from_slice(payload);
    ret
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_layout() {
        let blob = synthetic_blob(INJECT_PAYLOAD);
        assert_eq!(blob.len(), 13);
        assert_eq!(&blob[0..2], &50401u16.to_be_bytes());
        assert_eq!(&blob[2..4], &50500u16.to_be_bytes());
        assert_eq!(&blob[4..6], &13u16.to_be_bytes());
        assert_eq!(&blob[6..8], &(!0x43D2u16).to_be_bytes());
        assert_eq!(&blob[8..], b"hello");
    }

    #[tokio::test]
    async fn stops_when_asked() {
        let (stop_tx, stop_rx) = watch::channel(true);
        let injector = Injector {
            bind_port: 0,
            target: SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9),
            interval: Duration::from_millis(10),
        };
        let sent = injector.run(stop_rx).await.unwrap();
        assert_eq!(sent, 0);
        drop(stop_tx);
    }
}
