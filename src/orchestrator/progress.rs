use crate::stage::PassMode;

/// Counts logical sub-tasks across all stages.
///
/// The counting pass grows `total`; the executing pass advances `completed`,
/// which starts at 1 so that the first reported task reads "1 of N".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressTracker {
    total: u32,
    completed: u32,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            total: 0,
            completed: 1,
        }
    }

    /// Record one sub-task.
    ///
    /// Returns the `(K, N)` pair to display when executing, `None` while
    /// counting. K can exceed N if a stage reports more tasks than it counted;
    /// that is only a display defect.
    pub fn record(&mut self, mode: PassMode) -> Option<(u32, u32)> {
        match mode {
            PassMode::Counting => {
                self.total += 1;
                None
            }
            PassMode::Executing => {
                let shown = (self.completed, self.total);
                self.completed += 1;
                Some(shown)
            }
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Next task number to display; `1 + tasks executed so far`.
    pub fn completed(&self) -> u32 {
        self.completed
    }
}
