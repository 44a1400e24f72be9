//! Heartbeat scheduler.
//!
//! Sends a ping packet on a fixed cadence so the collector can tell a live
//! agent from a silently dead one, whether or not commands are flowing.

use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::MAX_HEARTBEAT_INTERVAL;
use crate::protocol::{Compression, Packet};
use crate::writer::FrameWriter;

/// Run the heartbeat until `cancel` fires.
///
/// The first ping goes out one full `period` after start. `period` is capped
/// at [`MAX_HEARTBEAT_INTERVAL`]. Write failures are logged and the loop keeps
/// ticking; a dead connection is reported by the read loop, not here.
/// Returns the number of pings written.
pub async fn run_heartbeat_loop(
    writer: FrameWriter,
    period: Duration,
    cancel: CancellationToken,
) -> u64 {
    let period = period.min(MAX_HEARTBEAT_INTERVAL);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let packet = Packet::ping();
    let mut sent = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // A write racing with cancellation must not hold teardown up.
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = writer.write_packet(&packet, Compression::None) => result,
        };

        match result {
            Ok(()) => {
                sent += 1;
                tracing::trace!(sent, "Heartbeat sent");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Heartbeat write failed");
            }
        }
    }

    tracing::debug!(sent, "Heartbeat stopped");
    sent
}
