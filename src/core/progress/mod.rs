pub mod aggregator;
pub mod sink;

pub use aggregator::{LogBatch, ProgressAggregator, StepProgress, DEFAULT_LOG_WINDOW};
pub use sink::{ByteProgressSink, FileKind, FileProgress, LogLine, LogSource, ProgressSinks};
