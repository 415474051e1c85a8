//! Real-time pacing: drip frames out at their nominal interval and catch up
//! without bursting when the source runs ahead, mirroring the teacher's
//! `sleep`/`Instant`-based timing idioms rather than a plain fixed-rate
//! `tokio::time::interval` (which would burst to catch up after a stall).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::error::Result;
use crate::packetizer::{h264::H264Packetizer, opus::OpusPacketizer, MediaSink, Packetizer};

/// 20ms per Opus frame at the session's fixed frame size.
pub const AUDIO_FRAME_INTERVAL: Duration = Duration::from_millis(20);

/// Lets a caller pause and resume a running pacer loop (e.g. while the
/// source buffers, or the user mutes). Time spent paused doesn't count
/// against the pacer's catch-up accounting.
#[derive(Default)]
pub struct PauseControl {
    paused: AtomicBool,
    resume: Notify,
}

impl PauseControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.resume.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    async fn wait_while_paused(&self, paused_duration: &mut Duration) {
        if !self.is_paused() {
            return;
        }
        let start = Instant::now();
        loop {
            // Register as a waiter before re-checking the flag, so a
            // `resume()` that lands between the check and the `.await`
            // still wakes this task instead of being missed.
            let notified = self.resume.notified();
            if !self.is_paused() {
                break;
            }
            notified.await;
        }
        *paused_duration += start.elapsed();
    }
}

/// Pull frames from `next` at `interval`, sending each through `send_one`.
/// When the source falls behind by more than a second, warns instead of
/// silently bursting packets to catch up.
async fn run_paced<F>(
    mut next: impl FnMut() -> Option<F>,
    mut send_one: impl FnMut(&F) -> Result<()>,
    interval: Duration,
    pause: Option<Arc<PauseControl>>,
) -> Result<()> {
    let mut start: Option<Instant> = None;
    let mut paused_duration = Duration::ZERO;
    let mut loops: u32 = 0;

    while let Some(frame) = next() {
        let start = *start.get_or_insert_with(Instant::now);
        loops += 1;

        if let Some(pause) = &pause {
            pause.wait_while_paused(&mut paused_duration).await;
        }

        send_one(&frame)?;

        let deadline = (start + interval.saturating_mul(loops)).checked_sub(paused_duration).unwrap_or(start);
        let now = Instant::now();

        if deadline > now {
            tokio::time::sleep(deadline - now).await;
        } else {
            let behind_by = now - deadline;
            if behind_by > Duration::from_secs(1) {
                tracing::warn!(
                    behind_by_ms = behind_by.as_millis(),
                    "stream is lagging, experiencing poor connection"
                );
            }
        }
    }

    Ok(())
}

/// Pace encoded Opus frames out through `packetizer` at one frame per 20ms.
pub async fn pace_audio(
    mut next_frame: impl FnMut() -> Option<Vec<u8>>,
    packetizer: &mut OpusPacketizer,
    sink: &dyn MediaSink,
    pause: Option<Arc<PauseControl>>,
) -> Result<()> {
    run_paced(
        &mut next_frame,
        |frame| packetizer.send_frame(frame, sink),
        AUDIO_FRAME_INTERVAL,
        pause,
    )
    .await
}

/// Pace access units out through `packetizer` at one per `1/fps` seconds.
pub async fn pace_video(
    mut next_access_unit: impl FnMut() -> Option<Vec<Vec<u8>>>,
    packetizer: &mut H264Packetizer,
    sink: &dyn MediaSink,
    fps: u32,
    pause: Option<Arc<PauseControl>>,
) -> Result<()> {
    let interval = Duration::from_secs_f64(1.0 / fps as f64);
    run_paced(
        &mut next_access_unit,
        |frame| packetizer.send_frame(frame, sink),
        interval,
        pause,
    )
    .await
}
