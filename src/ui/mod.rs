pub mod format;
pub mod sink;

pub use sink::{BuildLogFile, BuildLogger, ConsoleSink, LogLevel, LogSink, MemorySink, TeeSink};
