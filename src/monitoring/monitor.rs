//! Shared run counters and the live monitoring handle.

use crate::events::{names, EventPublisher};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, OnceLock};
use tracing::info;
use uuid::Uuid;

/// Outcome of one committed batch, folded into the shared counters.
#[derive(Debug, Default, Clone)]
pub struct BatchTally {
    pub successes: u64,
    pub failures: u64,
    pub last_error: Option<ErrorInfo>,
}

/// The most recent recorded failure.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub message: String,
    pub entry_id: String,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>, entry_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            entry_id: entry_id.into(),
        }
    }
}

/// Serializable snapshot of a run's progress.
#[derive(Debug, Clone, Serialize)]
pub struct BatchProgress {
    pub run_id: Uuid,
    pub process_name: String,
    pub total_estimated: Option<u64>,
    pub successes: u64,
    pub failures: u64,
    pub processed: u64,
    /// Percent complete in `0.0..=100.0`, or `None` when the estimate is
    /// unknown or has been overrun.
    pub percent_complete: Option<f64>,
    pub rate_per_second: Option<f64>,
    pub current_entry_id: Option<String>,
    pub last_error: Option<String>,
    pub last_error_entry_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
}

#[derive(Debug, Default)]
struct MonitorState {
    total_estimated: Option<u64>,
    current_entry_id: Option<String>,
    successes: u64,
    failures: u64,
    last_error: Option<ErrorInfo>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    cancelled: bool,
}

#[derive(Debug)]
struct MonitorInner {
    run_id: Uuid,
    process_name: String,
    progress_interval: u64,
    events: OnceLock<EventPublisher>,
    state: Mutex<MonitorState>,
}

#[derive(Clone, Copy)]
enum Counter {
    Success,
    Failure,
}

/// Cloneable live handle onto a run's counters.
///
/// Batch outcomes are folded in batch-atomically: a batch's successes and
/// failures land in one critical section, and progress is reported each time
/// the combined processed count crosses a multiple of the progress interval.
#[derive(Debug, Clone)]
pub struct BatchMonitor {
    inner: Arc<MonitorInner>,
}

impl BatchMonitor {
    pub fn new(process_name: impl Into<String>, progress_interval: u64) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                run_id: Uuid::new_v4(),
                process_name: process_name.into(),
                progress_interval: progress_interval.max(1),
                events: OnceLock::new(),
                state: Mutex::new(MonitorState::default()),
            }),
        }
    }

    /// Wire a publisher for progress events. Only the first call takes effect.
    pub fn attach_events(&self, publisher: EventPublisher) {
        let _ = self.inner.events.set(publisher);
    }

    pub fn run_id(&self) -> Uuid {
        self.inner.run_id
    }

    pub fn process_name(&self) -> &str {
        &self.inner.process_name
    }

    /// Mark the run as started with the provider's size estimate.
    pub fn start(&self, total_estimated: Option<u64>) {
        let mut state = self.inner.state.lock();
        state.total_estimated = total_estimated;
        state.started_at = Some(Utc::now());
    }

    /// Record the entry a batch is currently positioned on.
    pub fn set_current_entry(&self, entry_id: impl Into<String>) {
        self.inner.state.lock().current_entry_id = Some(entry_id.into());
    }

    /// Fold one batch's outcome into the shared counters.
    ///
    /// Failures fold first, then successes, stepping the combined count
    /// through each crossed progress interval so long-running jobs report at
    /// a steady cadence no matter how outcomes cluster per batch.
    pub fn record_batch(&self, tally: BatchTally) {
        let mut state = self.inner.state.lock();
        self.fold(&mut state, tally.failures, Counter::Failure);
        self.fold(&mut state, tally.successes, Counter::Success);
        if let Some(error) = tally.last_error {
            state.last_error = Some(error);
        }
    }

    /// Emit the final progress report and stamp the end time.
    pub fn finish(&self) {
        let mut state = self.inner.state.lock();
        self.report_progress(&state, true);
        if state.finished_at.is_none() {
            state.finished_at = Some(Utc::now());
        }
    }

    pub fn mark_cancelled(&self) {
        self.inner.state.lock().cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cancelled
    }

    pub fn successes(&self) -> u64 {
        self.inner.state.lock().successes
    }

    pub fn failures(&self) -> u64 {
        self.inner.state.lock().failures
    }

    pub fn processed(&self) -> u64 {
        let state = self.inner.state.lock();
        state.successes + state.failures
    }

    pub fn total_estimated(&self) -> Option<u64> {
        self.inner.state.lock().total_estimated
    }

    pub fn current_entry_id(&self) -> Option<String> {
        self.inner.state.lock().current_entry_id.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .last_error
            .as_ref()
            .map(|e| e.message.clone())
    }

    pub fn last_error_entry_id(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .last_error
            .as_ref()
            .map(|e| e.entry_id.clone())
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().finished_at
    }

    /// Percent complete in `0.0..=100.0`.
    ///
    /// `None` when no estimate exists or the processed count has overrun it,
    /// at which point the estimate says nothing useful.
    pub fn percent_complete(&self) -> Option<f64> {
        let state = self.inner.state.lock();
        Self::percent_of(state.successes + state.failures, state.total_estimated)
    }

    /// Average processing rate over the run so far.
    pub fn rate_per_second(&self) -> Option<f64> {
        let state = self.inner.state.lock();
        Self::rate_of(&state)
    }

    pub fn snapshot(&self) -> BatchProgress {
        let state = self.inner.state.lock();
        let processed = state.successes + state.failures;
        BatchProgress {
            run_id: self.inner.run_id,
            process_name: self.inner.process_name.clone(),
            total_estimated: state.total_estimated,
            successes: state.successes,
            failures: state.failures,
            processed,
            percent_complete: Self::percent_of(processed, state.total_estimated),
            rate_per_second: Self::rate_of(&state),
            current_entry_id: state.current_entry_id.clone(),
            last_error: state.last_error.as_ref().map(|e| e.message.clone()),
            last_error_entry_id: state.last_error.as_ref().map(|e| e.entry_id.clone()),
            started_at: state.started_at,
            finished_at: state.finished_at,
            cancelled: state.cancelled,
        }
    }

    fn fold(&self, state: &mut MonitorState, count: u64, counter: Counter) {
        if count == 0 {
            return;
        }
        let interval = self.inner.progress_interval;
        let processed = state.successes + state.failures;
        let current_increment = processed % interval;
        let target = Self::counter(state, counter) + count;

        // Step through every progress interval this batch crosses.
        let intervals = (count + current_increment) / interval;
        if intervals > 0 {
            *Self::counter_mut(state, counter) += interval - current_increment;
            self.report_progress(state, false);
            for _ in 1..intervals {
                *Self::counter_mut(state, counter) += interval;
                self.report_progress(state, false);
            }
        }
        *Self::counter_mut(state, counter) = target;
    }

    fn counter(state: &MonitorState, counter: Counter) -> u64 {
        match counter {
            Counter::Success => state.successes,
            Counter::Failure => state.failures,
        }
    }

    fn counter_mut(state: &mut MonitorState, counter: Counter) -> &mut u64 {
        match counter {
            Counter::Success => &mut state.successes,
            Counter::Failure => &mut state.failures,
        }
    }

    /// Reports progress exactly on interval crossings, plus once at the end
    /// when the final count is off the interval.
    fn report_progress(&self, state: &MonitorState, last: bool) {
        let processed = state.successes + state.failures;
        if (processed % self.inner.progress_interval == 0) != last {
            let percent = Self::percent_of(processed, state.total_estimated);
            let rate = Self::rate_of(state);
            info!(
                process = %self.inner.process_name,
                processed,
                total = ?state.total_estimated,
                percent = ?percent,
                rate_per_second = ?rate,
                failures = state.failures,
                "processed entries"
            );
            if let Some(events) = self.inner.events.get() {
                events.publish_now(
                    names::BATCH_PROGRESS,
                    self.inner.run_id,
                    &self.inner.process_name,
                    json!({
                        "processed": processed,
                        "total_estimated": state.total_estimated,
                        "percent_complete": percent,
                        "failures": state.failures,
                    }),
                );
            }
        }
    }

    fn percent_of(processed: u64, total: Option<u64>) -> Option<f64> {
        let total = total?;
        if processed > total {
            return None;
        }
        if total == 0 {
            return Some(100.0);
        }
        Some(processed as f64 / total as f64 * 100.0)
    }

    fn rate_of(state: &MonitorState) -> Option<f64> {
        let started = state.started_at?;
        let end = state.finished_at.unwrap_or_else(Utc::now);
        let elapsed_ms = (end - started).num_milliseconds();
        if elapsed_ms <= 0 {
            return None;
        }
        let processed = state.successes + state.failures;
        Some(processed as f64 * 1000.0 / elapsed_ms as f64)
    }
}
