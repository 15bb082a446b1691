use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use shoal_core::TickSummary;

/// JSON report produced by a headless run.
#[derive(Debug, Clone, Serialize)]
pub struct HeadlessReport {
    pub capacity: usize,
    pub initial: FrameStats,
    pub frames: Vec<FrameStats>,
    pub summary: ReportSummary,
}

impl HeadlessReport {
    #[must_use]
    pub fn new(capacity: usize, initial: FrameStats) -> Self {
        Self {
            capacity,
            initial,
            frames: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    pub fn record(&mut self, summary: &TickSummary) {
        self.frames.push(FrameStats::from(summary));
    }

    pub fn finalize(&mut self) {
        self.summary = ReportSummary::from(&self.initial, &self.frames);
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("failed to create report {}", path.display()))?;
        serde_json::to_writer_pretty(file, self).context("failed to serialize headless report")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct FrameStats {
    pub tick: u64,
    pub time: f64,
    pub active: usize,
    pub pooled: usize,
    pub pending_spawns: usize,
    pub spawned: usize,
    pub caught: usize,
    pub forced_releases: usize,
    pub fleeing: usize,
    pub grabbed: usize,
    pub recovering: usize,
    pub next_timer_due: Option<f64>,
}

impl From<&TickSummary> for FrameStats {
    fn from(summary: &TickSummary) -> Self {
        Self {
            tick: summary.tick.0,
            time: summary.time,
            active: summary.active,
            pooled: summary.pooled,
            pending_spawns: summary.pending_spawns,
            spawned: summary.spawned,
            caught: summary.caught,
            forced_releases: summary.forced_releases,
            fleeing: summary.fleeing,
            grabbed: summary.grabbed,
            recovering: summary.recovering,
            next_timer_due: summary.next_timer_due,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ReportSummary {
    pub frame_count: usize,
    pub ticks_simulated: u64,
    pub final_time: f64,
    pub final_active: usize,
    pub peak_active: usize,
    pub total_spawned: usize,
    pub total_caught: usize,
    pub total_forced_releases: usize,
    pub peak_fleeing: usize,
}

impl ReportSummary {
    fn from(initial: &FrameStats, frames: &[FrameStats]) -> Self {
        let Some(last) = frames.last() else {
            return Self {
                final_time: initial.time,
                final_active: initial.active,
                peak_active: initial.active,
                total_spawned: initial.spawned,
                ..Self::default()
            };
        };
        Self {
            frame_count: frames.len(),
            ticks_simulated: last.tick.saturating_sub(initial.tick),
            final_time: last.time,
            final_active: last.active,
            peak_active: frames
                .iter()
                .map(|frame| frame.active)
                .max()
                .unwrap_or(0)
                .max(initial.active),
            total_spawned: initial.spawned + frames.iter().map(|frame| frame.spawned).sum::<usize>(),
            total_caught: frames.iter().map(|frame| frame.caught).sum(),
            total_forced_releases: frames.iter().map(|frame| frame.forced_releases).sum(),
            peak_fleeing: frames.iter().map(|frame| frame.fleeing).max().unwrap_or(0),
        }
    }
}
