use std::fmt::{self, Write};
use std::net::Ipv4Addr;

use tracing::{debug, info};

use crate::packet::{CapturedUnit, DecodedUnit};


const ABSENT_PROTOCOL: &str = "unknown";


pub trait RecordSink {
    fn emit(&mut self, unit: &CapturedUnit<'_>, decoded: &DecodedUnit<'_>);
}


#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink {
    pub hexdump: bool,
}
impl RecordSink for TracingSink {
    fn emit(&mut self, unit: &CapturedUnit<'_>, decoded: &DecodedUnit<'_>) {
        let network = &decoded.network;
        let transport = &decoded.transport;
        let tcp_flags = transport.tcp_flags
            .map(|f| format!("{:?}", f))
            .unwrap_or_default();
        info!(
            seq = unit.sequence,
            captured_at = %unit.captured_at.to_rfc3339(),
            len = unit.data.len(),
            protocol = transport.protocol_name.unwrap_or(ABSENT_PROTOCOL),
            protocol_id = network.protocol_id,
            source = %Endpoint(network.source, transport.source_port),
            destination = %Endpoint(network.destination, transport.destination_port),
            tcp_flags = tcp_flags.as_str(),
            payload = %Hex(transport.payload),
            "captured unit",
        );
        if self.hexdump {
            debug!(seq = unit.sequence, "raw unit\n{}", Hexdump(unit.data));
        }
    }
}


// addr:port, addr, :port or -
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Endpoint(pub Option<Ipv4Addr>, pub Option<u16>);
impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.0, self.1) {
            (Some(addr), Some(port)) => write!(f, "{}:{}", addr, port),
            (Some(addr), None) => write!(f, "{}", addr),
            (None, Some(port)) => write!(f, ":{}", port),
            (None, None) => write!(f, "-"),
        }
    }
}


#[derive(Clone, Copy, Debug)]
pub struct Hex<'a>(pub &'a [u8]);
impl<'a> fmt::Display for Hex<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}


#[derive(Clone, Copy, Debug)]
pub struct Hexdump<'a>(pub &'a [u8]);
impl<'a> fmt::Display for Hexdump<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bs = self.0;
        let mut i = 0;

        while i < bs.len() {
            write!(f, "{:08x}  ", i)?;
            for j in 0..16 {
                if i + j < bs.len() {
                    write!(f, "{:02x} ", bs[i + j])?;
                } else {
                    f.write_str("   ")?;
                }

                if j == 7 {
                    f.write_char(' ')?;
                }
            }

            f.write_str(" |")?;

            for j in 0..16 {
                if i + j >= bs.len() {
                    break;
                }

                let b = bs[i + j];
                if b >= 0x20 && b <= 0x7E {
                    f.write_char(b as char)?;
                } else {
                    f.write_char('.')?;
                }
            }

            f.write_str("|\n")?;

            i += 16;
        }

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn hex_payload() {
        assert_eq!(Hex(b"hello").to_string(), "68656c6c6f");
        assert_eq!(Hex(&[0x00, 0x0A, 0xFF]).to_string(), "000aff");
        assert_eq!(Hex(&[]).to_string(), "");
    }

    #[test]
    fn endpoints() {
        let addr = Some(Ipv4Addr::new(10, 1, 0, 10));
        assert_eq!(Endpoint(addr, Some(50500)).to_string(), "10.1.0.10:50500");
        assert_eq!(Endpoint(addr, None).to_string(), "10.1.0.10");
        assert_eq!(Endpoint(None, Some(53)).to_string(), ":53");
        assert_eq!(Endpoint(None, None).to_string(), "-");
    }

    #[test]
    fn hexdump_layout() {
        let dump = Hexdump(b"hello, world! 0123\x00").to_string();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "00000000  68 65 6c 6c 6f 2c 20 77  6f 72 6c 64 21 20 30 31  |hello, world! 01|",
        );
        assert!(lines[1].starts_with("00000010  32 33 00 "));
        assert!(lines[1].ends_with("|23.|"));
        assert_eq!(Hexdump(&[]).to_string(), "");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);
    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn render(data: &[u8], hexdump: bool) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();

        let unit = CapturedUnit {
            sequence: 3,
            captured_at: chrono::Utc::now(),
            data,
        };
        let decoded = DecodedUnit::decode(data, Default::default());
        tracing::subscriber::with_default(subscriber, || {
            TracingSink { hexdump }.emit(&unit, &decoded);
        });

        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn udp_record_fields() {
        let data = [
            0x45u8, 0x00, 0x00, 0x21,
            0x00, 0x00, 0x00, 0x00,
            0x40, 0x11, 0x00, 0x00,
            10, 1, 0, 1,
            10, 1, 0, 10,
            0xC4, 0xE1, 0xC5, 0x44,
            0x00, 0x0D, 0x00, 0x00,
            b'h', b'e', b'l', b'l', b'o',
        ];
        let output = render(&data, false);

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 1, "{}", output);
        let line = lines[0];
        assert!(line.contains("captured unit"), "{}", line);
        assert!(line.contains("seq=3"), "{}", line);
        assert!(line.contains("len=33"), "{}", line);
        assert!(line.contains("protocol=\"UDP\""), "{}", line);
        assert!(line.contains("protocol_id=17"), "{}", line);
        assert!(line.contains("source=10.1.0.1:50401"), "{}", line);
        assert!(line.contains("destination=10.1.0.10:50500"), "{}", line);
        assert!(line.contains("tcp_flags=\"\""), "{}", line);
        assert!(line.contains("payload=68656c6c6f"), "{}", line);
    }

    #[test]
    fn short_unit_record_fields() {
        let output = render(&[0x45u8, 0x00], true);

        let line = output.lines()
            .find(|l| l.contains("captured unit"))
            .unwrap();
        assert!(line.contains("protocol=\"unknown\""), "{}", line);
        assert!(line.contains("source=- "), "{}", line);
        assert!(line.contains("destination=- "), "{}", line);
        assert!(line.contains("len=2"), "{}", line);
        assert!(line.contains("payload="), "{}", line);
        assert!(!line.contains("protocol_id"), "{}", line);

        assert!(output.contains("raw unit"), "{}", output);
        assert!(output.contains("00000000  45 00 "), "{}", output);
    }
}
