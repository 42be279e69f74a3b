//! Progress reporting and cancellation.
//!
//! The pipeline reports coarse progress (per row or per column batch) to a
//! caller-owned sink and checks a shared cancellation token at the same
//! granularity. Reporting is one-directional and best-effort: sink
//! implementations must return promptly and never block the conversion;
//! a slow consumer should drop or coalesce events on its own side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Pipeline stage identifier attached to every progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Per-pixel color matching / dithering
    Quantize,
    /// Height column synthesis
    Synthesize,
    /// Height compression search
    Compress,
    /// Support bridging
    Bridge,
    /// Serialization to an output format
    Export,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Quantize => write!(f, "quantize"),
            Stage::Synthesize => write!(f, "synthesize"),
            Stage::Compress => write!(f, "compress"),
            Stage::Bridge => write!(f, "bridge"),
            Stage::Export => write!(f, "export"),
        }
    }
}

/// Receiver for progress events.
pub trait ProgressSink: Send + Sync {
    /// Report progress for a stage. `fraction` is in `[0, 1]`.
    fn report(&self, stage: Stage, fraction: f32);
}

/// A sink that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressSink for NullProgress {
    fn report(&self, _stage: Stage, _fraction: f32) {}
}

/// A sink that records every event; mainly useful in tests.
#[derive(Debug, Default)]
pub struct CollectingProgress {
    events: Mutex<Vec<(Stage, f32)>>,
}

impl CollectingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Stage, f32)> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for CollectingProgress {
    fn report(&self, stage: Stage, fraction: f32) {
        self.events.lock().unwrap().push((stage, fraction));
    }
}

/// Shared cancellation flag.
///
/// Cloning is cheap; all clones observe the same flag. Cancellation is
/// checked between rows, columns and search iterations, so a conversion
/// stops at the next checkpoint after the flag is raised. Results already
/// returned to the caller stay valid.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
