//! Upload progress mapping and the progress side-channel
//!
//! Transport progress is published in two steps: the send fraction becomes a
//! whole percentage, which is then rescaled into `[0, TRANSFER_BAND_MAX]`.
//! The remaining band up to 100 stands for server-side processing, which has
//! no signal of its own; 100 is only published once the response is in.

use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Upper bound of the measured progress band
pub const TRANSFER_BAND_MAX: u8 = 70;

/// Progress published once the full response has arrived
pub const COMPLETE_PERCENT: u8 = 100;

/// `round(sent / total * 100)`, half rounding up, `None` when total is unknown
pub fn send_percent(sent: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let sent = sent.min(total) as u128;
    let total = total as u128;
    Some(((sent * 100 + total / 2) / total) as u8)
}

/// `round(send_percent * 0.70)`, half rounding up
pub fn scale_to_band(send_percent: u8) -> u8 {
    let percent = send_percent.min(100) as u16;
    ((percent * TRANSFER_BAND_MAX as u16 + 50) / 100) as u8
}

/// Percentage to publish for `sent` of `total` bytes
pub fn published_percent(sent: u64, total: u64) -> Option<u8> {
    send_percent(sent, total).map(scale_to_band)
}

/// One published progress value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub sent_bytes: u64,
    pub total_bytes: u64,
    /// Published percentage, always within the transfer band
    pub percent: u8,
}

/// Producer half, owned by the transport
///
/// Only changes in the published percentage are forwarded.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ProgressUpdate>,
    total_bytes: u64,
    last_percent: Option<u8>,
}

impl ProgressReporter {
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Record the cumulative number of bytes handed to the transport
    pub fn record(&mut self, sent_bytes: u64) {
        let Some(percent) = published_percent(sent_bytes, self.total_bytes) else {
            return;
        };
        if self.last_percent == Some(percent) {
            return;
        }
        self.last_percent = Some(percent);
        // A dropped consumer just means nobody is watching.
        let _ = self.tx.send(ProgressUpdate {
            sent_bytes: sent_bytes.min(self.total_bytes),
            total_bytes: self.total_bytes,
            percent,
        });
    }
}

/// Consumer half: a finite stream of updates
///
/// Ends once the matching [`ProgressReporter`] is dropped. It is consumed by
/// value, so a transfer's progress can only be observed once.
pub struct ProgressStream {
    inner: UnboundedReceiverStream<ProgressUpdate>,
}

impl Stream for ProgressStream {
    type Item = ProgressUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Create a linked reporter/stream pair for a payload of `total_bytes`
pub fn channel(total_bytes: u64) -> (ProgressReporter, ProgressStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ProgressReporter {
            tx,
            total_bytes,
            last_percent: None,
        },
        ProgressStream {
            inner: UnboundedReceiverStream::new(rx),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_band_endpoints() {
        assert_eq!(published_percent(0, 1000), Some(0));
        assert_eq!(published_percent(500, 1000), Some(35));
        assert_eq!(published_percent(1000, 1000), Some(70));
    }

    #[test]
    fn test_matches_round_of_fraction_times_seventy() {
        // Fractions where both rounding paths agree.
        for (sent, total, expected) in [(1, 4, 18), (3, 4, 53), (1, 10, 7), (9, 10, 63), (1, 3, 23)] {
            assert_eq!(published_percent(sent, total), Some(expected), "{}/{}", sent, total);
        }
    }

    #[test]
    fn test_two_phase_rounding() {
        // 0.5% send progress rounds to 1%, then to 1 in the band.
        assert_eq!(send_percent(5, 1000), Some(1));
        assert_eq!(scale_to_band(1), 1);
        assert_eq!(scale_to_band(100), 70);
    }

    #[test]
    fn test_always_within_band() {
        let total = 977;
        for sent in 0..=total {
            let percent = published_percent(sent, total).unwrap();
            assert!(percent <= TRANSFER_BAND_MAX);
        }
        // Overshoot is clamped.
        assert_eq!(published_percent(5000, 977), Some(70));
    }

    #[test]
    fn test_unknown_total_publishes_nothing() {
        assert_eq!(published_percent(10, 0), None);
    }

    #[tokio::test]
    async fn test_stream_deduplicates_and_ends_with_reporter() {
        let (mut reporter, stream) = channel(1000);
        reporter.record(0);
        reporter.record(1);
        reporter.record(500);
        reporter.record(501);
        reporter.record(1000);
        drop(reporter);

        let percents: Vec<u8> = stream.map(|u| u.percent).collect().await;
        assert_eq!(percents, vec![0, 35, 70]);
    }

    #[tokio::test]
    async fn test_empty_payload_yields_empty_stream() {
        let (mut reporter, stream) = channel(0);
        reporter.record(0);
        drop(reporter);

        assert_eq!(stream.count().await, 0);
    }
}
