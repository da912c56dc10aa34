// ─── Progress Aggregator ───
// Fan-in point for byte, step and log events of a multi-target download.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::sink::{ByteProgressSink, LogLine, ProgressSinks};

pub const DEFAULT_LOG_WINDOW: Duration = Duration::from_millis(300);
const EVENT_CAPACITY: usize = 256;

/// Overall progress across the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepProgress {
    pub current: u32,
    pub total: u32,
    pub percent: f64,
}

impl StepProgress {
    pub fn new(current: u32, total: u32) -> Self {
        let percent = if total == 0 {
            0.0
        } else {
            current as f64 / total as f64 * 100.0
        };
        Self {
            current,
            total,
            percent,
        }
    }
}

/// All log lines received during one window, joined with newlines.
#[derive(Debug, Clone, Serialize)]
pub struct LogBatch {
    pub text: String,
    pub lines: usize,
}

/// Merges byte progress, step progress and two log sources into
/// three subscribable channels.
pub struct ProgressAggregator {
    bytes: watch::Sender<f64>,
    steps: broadcast::Sender<StepProgress>,
    logs: broadcast::Sender<LogBatch>,
    lines: mpsc::UnboundedSender<LogLine>,
}

impl ProgressAggregator {
    /// Create the aggregator and start its log window task on the current runtime.
    pub fn spawn(window: Duration) -> Arc<Self> {
        let (bytes, _) = watch::channel(0.0);
        let (steps, _) = broadcast::channel(EVENT_CAPACITY);
        let (logs, _) = broadcast::channel(EVENT_CAPACITY);
        let (lines, line_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_log_window(line_rx, logs.clone(), window));

        Arc::new(Self {
            bytes,
            steps,
            logs,
            lines,
        })
    }

    pub fn sinks(&self) -> ProgressSinks {
        ProgressSinks::new(ByteProgressSink::new(self.bytes.clone()), self.lines.clone())
    }

    pub fn subscribe_bytes(&self) -> watch::Receiver<f64> {
        self.bytes.subscribe()
    }

    pub fn subscribe_steps(&self) -> broadcast::Receiver<StepProgress> {
        self.steps.subscribe()
    }

    pub fn subscribe_log(&self) -> broadcast::Receiver<LogBatch> {
        self.logs.subscribe()
    }

    /// Step progress is driven by the orchestrator, never derived from sub-events.
    pub fn publish_step(&self, current: u32, total: u32) {
        let progress = StepProgress::new(current, total);
        debug!(
            "Step progress {}/{} ({:.1}%)",
            progress.current, progress.total, progress.percent
        );
        let _ = self.steps.send(progress);
    }
}

async fn run_log_window(
    mut rx: mpsc::UnboundedReceiver<LogLine>,
    tx: broadcast::Sender<LogBatch>,
    window: Duration,
) {
    let mut ticker = tokio::time::interval(window);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut pending: Vec<String> = Vec::new();
    loop {
        tokio::select! {
            line = rx.recv() => match line {
                Some(line) => pending.push(line.text),
                None => {
                    flush(&mut pending, &tx);
                    break;
                }
            },
            _ = ticker.tick() => flush(&mut pending, &tx),
        }
    }
}

fn flush(pending: &mut Vec<String>, tx: &broadcast::Sender<LogBatch>) {
    if pending.is_empty() {
        return;
    }
    let lines = pending.len();
    let text = pending.join("\n");
    pending.clear();
    let _ = tx.send(LogBatch { text, lines });
}
