pub mod checkpoint;
pub mod pipeline;
pub mod progress;

pub use checkpoint::CheckpointStore;
pub use pipeline::BuildContext;
pub use progress::ProgressTracker;
