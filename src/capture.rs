use chrono::Utc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::emit::RecordSink;
use crate::ip::HeaderLengthPolicy;
use crate::packet::{CapturedUnit, DecodedUnit};


#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("giving up after {count} consecutive read failures: {last}")]
    TooManyReadErrors {
        count: u32,
        #[source]
        last: std::io::Error,
    },
}


#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CaptureStats {
    pub units: u64,
    pub read_errors: u64,
}


// failed reads are retried without backoff; a device that keeps failing makes this a busy loop
// unless max_consecutive_read_errors is set
pub struct CaptureLoop<R> {
    reader: R,
    buf: Vec<u8>,
    policy: HeaderLengthPolicy,
    stop: watch::Receiver<bool>,
    max_consecutive_read_errors: Option<u32>,
}
impl<R: AsyncRead + Unpin> CaptureLoop<R> {
    pub fn new(reader: R, mtu: u16, stop: watch::Receiver<bool>) -> Self {
        Self {
            reader,
            buf: vec![0u8; usize::from(mtu)],
            policy: HeaderLengthPolicy::default(),
            stop,
            max_consecutive_read_errors: None,
        }
    }

    pub fn header_length_policy(mut self, policy: HeaderLengthPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_consecutive_read_errors(mut self, limit: Option<u32>) -> Self {
        self.max_consecutive_read_errors = limit;
        self
    }

    pub async fn run<S: RecordSink>(mut self, sink: &mut S) -> Result<CaptureStats, CaptureError> {
        let mut stats = CaptureStats::default();
        let mut consecutive_errors: u32 = 0;

        loop {
            if *self.stop.borrow() {
                info!("stop requested");
                break;
            }

            let read_result = tokio::select! {
                biased;
                changed = self.stop.changed() => {
                    if changed.is_err() {
                        // sender gone; nobody can stop us any more, but nobody wants us either
                        info!("stop signal dropped");
                        break;
                    }
                    continue;
                },
                res = self.reader.read(&mut self.buf) => res,
            };

            let n = match read_result {
                Ok(0) => {
                    info!("device closed");
                    break;
                },
                Ok(n) => n,
                Err(e) => {
                    stats.read_errors += 1;
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    error!(consecutive = consecutive_errors, "failed to read from device: {}", e);
                    if let Some(limit) = self.max_consecutive_read_errors {
                        if consecutive_errors >= limit {
                            return Err(CaptureError::TooManyReadErrors {
                                count: consecutive_errors,
                                last: e,
                            });
                        }
                    }
                    // retry right away, but let the stop signal through
                    tokio::task::yield_now().await;
                    continue;
                },
            };
            if consecutive_errors > 0 {
                warn!(failures = consecutive_errors, "device readable again");
                consecutive_errors = 0;
            }

            let unit = CapturedUnit {
                sequence: stats.units,
                captured_at: Utc::now(),
                data: &self.buf[..n],
            };
            if n == self.buf.len() {
                debug!(seq = unit.sequence, "unit filled the whole buffer and may be truncated");
            }
            let decoded = DecodedUnit::decode(unit.data, self.policy);
            sink.emit(&unit, &decoded);
            stats.units += 1;
        }

        Ok(stats)
    }
}
