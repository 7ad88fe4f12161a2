//! Progress reporting for registration runs.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Snapshot of one optimizer iteration.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Zero-based pyramid level.
    pub level: usize,
    pub iteration: usize,
    pub total_iterations: usize,
    /// Metric value at the parameters before the step.
    pub value: f64,
    pub learning_rate: f64,
    pub convergence_value: f64,
    pub elapsed: Duration,
}

impl ProgressInfo {
    pub fn progress_percent(&self) -> f64 {
        if self.total_iterations == 0 {
            return 100.0;
        }
        self.iteration as f64 / self.total_iterations as f64 * 100.0
    }
}

/// Observer of registration progress.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, info: &ProgressInfo);

    fn on_level_start(&self, _level: usize, _shape: &[usize]) {}

    fn on_level_complete(&self, _level: usize, _stop_condition: &str) {}
}

/// Logs through `tracing` every `log_interval` iterations.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    pub log_interval: usize,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self { log_interval: 10 }
    }
}

impl ConsoleProgressCallback {
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.iteration % self.log_interval == 0 || info.iteration + 1 == info.total_iterations {
            tracing::info!(
                "Level {} iter {}/{} ({:.0}%) | Metric: {:.6} | LR: {:.3e} | Elapsed: {:.2}s",
                info.level,
                info.iteration,
                info.total_iterations,
                info.progress_percent(),
                info.value,
                info.learning_rate,
                info.elapsed.as_secs_f64()
            );
        }
    }

    fn on_level_start(&self, level: usize, shape: &[usize]) {
        tracing::info!("Starting level {} on grid {:?}", level, shape);
    }

    fn on_level_complete(&self, level: usize, stop_condition: &str) {
        tracing::info!("Level {} finished: {}", level, stop_condition);
    }
}

/// Records every progress event; shared handles see the same history.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl HistoryCallback {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ProgressInfo>> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn history(&self) -> Vec<ProgressInfo> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        self.lock().push(info.clone());
    }
}

/// Fans progress out to a set of callbacks and keeps the run clock.
pub struct ProgressTracker {
    callbacks: Vec<Box<dyn ProgressCallback>>,
    start: Instant,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
            start: Instant::now(),
        }
    }

    pub fn add_callback(&mut self, callback: Box<dyn ProgressCallback>) {
        self.callbacks.push(callback);
    }

    pub fn restart(&mut self) {
        self.start = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn report(&self, info: &ProgressInfo) {
        for callback in &self.callbacks {
            callback.on_progress(info);
        }
    }

    pub fn level_start(&self, level: usize, shape: &[usize]) {
        for callback in &self.callbacks {
            callback.on_level_start(level, shape);
        }
    }

    pub fn level_complete(&self, level: usize, stop_condition: &str) {
        for callback in &self.callbacks {
            callback.on_level_complete(level, stop_condition);
        }
    }
}
