//! Progress events and terminal progress display
//!
//! The downloader and archive extractor emit transient [`ProgressEvent`]s
//! through a caller-supplied sink. Emission is throttled by
//! [`ProgressTracker`] so the sink is not flooded once per chunk, and
//! `bytes_done` is non-decreasing within one operation.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

/// Minimum time between two progress emissions
const EMIT_INTERVAL: Duration = Duration::from_millis(100);

/// Byte delta that forces an emission even inside the time window
const EMIT_BYTE_DELTA: u64 = 1024 * 1024;

/// Which phase of a fetch operation a progress event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Download,
    Extract,
}

/// A transient progress snapshot; streamed to a sink, never stored
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub bytes_done: u64,
    pub bytes_total: Option<u64>,
    pub percent: Option<f64>,
    pub speed_bytes_per_sec: Option<f64>,
    pub eta_seconds: Option<u64>,
}

/// Caller-supplied progress sink
pub type ProgressSink<'a> = &'a mut dyn FnMut(&ProgressEvent);

/// Builds throttled, monotonic progress events for one operation
pub struct ProgressTracker {
    phase: ProgressPhase,
    bytes_total: Option<u64>,
    started: Instant,
    last_emit: Option<Instant>,
    last_emit_bytes: u64,
    high_water: u64,
}

impl ProgressTracker {
    pub fn new(phase: ProgressPhase, bytes_total: Option<u64>) -> Self {
        ProgressTracker {
            phase,
            bytes_total,
            started: Instant::now(),
            last_emit: None,
            last_emit_bytes: 0,
            high_water: 0,
        }
    }

    /// Record progress; returns an event only when the emission gate opens.
    pub fn update(&mut self, bytes_done: u64) -> Option<ProgressEvent> {
        // bytes_done never goes backwards even if a caller misreports
        self.high_water = self.high_water.max(bytes_done);

        let now = Instant::now();
        let time_due = match self.last_emit {
            None => true,
            Some(at) => now.duration_since(at) >= EMIT_INTERVAL,
        };
        let bytes_due = self.high_water.saturating_sub(self.last_emit_bytes) >= EMIT_BYTE_DELTA;

        if !time_due && !bytes_due {
            return None;
        }

        self.last_emit = Some(now);
        self.last_emit_bytes = self.high_water;
        Some(self.snapshot())
    }

    /// Final event for the operation, always emitted.
    pub fn finish(&mut self, bytes_done: u64) -> ProgressEvent {
        self.high_water = self.high_water.max(bytes_done);
        self.last_emit = Some(Instant::now());
        self.last_emit_bytes = self.high_water;
        self.snapshot()
    }

    fn snapshot(&self) -> ProgressEvent {
        let elapsed = self.started.elapsed().as_secs_f64();
        let speed = if elapsed > 0.0 {
            Some(self.high_water as f64 / elapsed)
        } else {
            None
        };

        let (percent, eta_seconds) = match self.bytes_total {
            Some(total) if total > 0 => {
                let percent = (self.high_water as f64 / total as f64) * 100.0;
                let eta = speed.filter(|s| *s > 0.0).map(|s| {
                    let remaining = total.saturating_sub(self.high_water) as f64;
                    (remaining / s).ceil() as u64
                });
                (Some(percent.min(100.0)), eta)
            }
            _ => (None, None),
        };

        ProgressEvent {
            phase: self.phase,
            bytes_done: self.high_water,
            bytes_total: self.bytes_total,
            percent,
            speed_bytes_per_sec: speed,
            eta_seconds,
        }
    }
}

/// Terminal progress display for template fetch operations
pub struct ProgressDisplay {
    pb: ProgressBar,
    phase: Option<ProgressPhase>,
}

impl ProgressDisplay {
    pub fn new() -> Self {
        ProgressDisplay {
            pb: ProgressBar::hidden(),
            phase: None,
        }
    }

    /// Route one progress event to the bar, switching style on phase change.
    pub fn handle(&mut self, event: &ProgressEvent) {
        if self.phase != Some(event.phase) {
            self.phase = Some(event.phase);
            self.pb.finish_and_clear();
            self.pb = match event.bytes_total {
                Some(total) => {
                    let pb = ProgressBar::new(total);
                    pb.set_style(
                        ProgressStyle::default_bar()
                            .template(
                                "{msg:>9} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, eta {eta})",
                            )
                            .unwrap_or_else(|_| ProgressStyle::default_bar())
                            .progress_chars("#>-"),
                    );
                    pb
                }
                None => {
                    let pb = ProgressBar::new_spinner();
                    pb.set_style(
                        ProgressStyle::default_spinner()
                            .template("{msg:>9} {spinner:.green} {bytes} ({bytes_per_sec})")
                            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                    );
                    pb
                }
            };
            self.pb.set_message(match event.phase {
                ProgressPhase::Download => "download",
                ProgressPhase::Extract => "extract",
            });
        }
        self.pb.set_position(event.bytes_done);
    }

    /// Finish and clear the bar once the operation completes.
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }

    /// Abandon on error, leaving the bar at its last position.
    pub fn abandon(&self) {
        self.pb.abandon();
    }
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self::new()
    }
}
