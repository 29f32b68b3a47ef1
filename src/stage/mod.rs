//! The stage contract and the standard bake stages.
//!
//! Every stage is built from the [`BuildLayout`] alone and exposes a single
//! `execute`. The orchestrator calls it twice per build: once in
//! [`PassMode::Counting`] so that tasks can be counted, once in
//! [`PassMode::Executing`] to do the work.
//!
//! | Stage          | Purpose                                           |
//! |----------------|---------------------------------------------------|
//! | `Copy`         | copy upstream sources into the build directory    |
//! | `UpstreamLint` | run the upstream lint tool over each source       |
//! | `Build`        | produce font binaries from the sources            |
//! | `Metadata`     | generate `METADATA.json`                          |
//! | `MetadataLint` | check the generated metadata                      |
//! | `FontCoverage` | write a character coverage report per binary      |
//!
//! The standard stages only do discovery while counting: they may record what
//! they found in the configuration but never copy files or spawn tools.

pub mod build;
pub mod command;
pub mod copy;
pub mod coverage;
pub mod metadata;
pub mod metadata_lint;
pub mod upstream_lint;

use std::fmt;

use crate::config::BakeConfig;
use crate::errors::StageError;
use crate::layout::BuildLayout;
use crate::orchestrator::ProgressTracker;
use crate::ui::BuildLogger;

pub use build::BuildStage;
pub use copy::CopyStage;
pub use coverage::FontCoverageStage;
pub use metadata::MetadataStage;
pub use metadata_lint::MetadataLintStage;
pub use upstream_lint::UpstreamLintStage;

/// Which of the two passes is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    Counting,
    Executing,
}

impl PassMode {
    pub fn is_counting(self) -> bool {
        self == Self::Counting
    }
}

impl fmt::Display for PassMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counting => write!(f, "counting"),
            Self::Executing => write!(f, "executing"),
        }
    }
}

/// One processing unit of the pipeline.
pub trait Stage {
    fn name(&self) -> &'static str;

    /// Run the stage. `config` is exclusively borrowed for this turn only.
    fn execute(
        &mut self,
        mode: PassMode,
        ctx: &mut StageContext<'_>,
        config: &mut BakeConfig,
    ) -> Result<(), StageError>;
}

/// Builds a fresh stage instance for one pass.
pub type StageConstructor = Box<dyn Fn(&BuildLayout) -> Box<dyn Stage>>;

/// What a stage may call back into while it runs.
pub struct StageContext<'a> {
    mode: PassMode,
    layout: &'a BuildLayout,
    progress: &'a mut ProgressTracker,
    logger: &'a mut BuildLogger,
    interactive: bool,
}

impl<'a> StageContext<'a> {
    pub(crate) fn new(
        mode: PassMode,
        layout: &'a BuildLayout,
        progress: &'a mut ProgressTracker,
        logger: &'a mut BuildLogger,
        interactive: bool,
    ) -> Self {
        Self {
            mode,
            layout,
            progress,
            logger,
            interactive,
        }
    }

    /// Directories of the build being run. External tools run in its build
    /// directory.
    pub fn layout(&self) -> &BuildLayout {
        self.layout
    }

    /// Whether the user should be asked before an automatic fix is applied.
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Report one logical sub-task. Counted while counting, printed as
    /// `### (K of N) message` while executing.
    pub fn task(&mut self, message: &str) {
        if let Some((completed, total)) = self.progress.record(self.mode) {
            self.logger.task(completed, total, message);
        }
    }

    /// Log an externally invoked command line.
    pub fn command(&mut self, command_line: &str) {
        self.logger.command(command_line);
    }

    /// Log a banner or tool output verbatim.
    pub fn raw(&mut self, message: &str) {
        self.logger.raw(message);
    }
}

/// The closed set of standard stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Copy,
    UpstreamLint,
    Build,
    Metadata,
    MetadataLint,
    FontCoverage,
}

impl StageKind {
    pub const STANDARD: [StageKind; 6] = [
        StageKind::Copy,
        StageKind::UpstreamLint,
        StageKind::Build,
        StageKind::Metadata,
        StageKind::MetadataLint,
        StageKind::FontCoverage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::UpstreamLint => "upstream-lint",
            Self::Build => "build",
            Self::Metadata => "metadata",
            Self::MetadataLint => "metadata-lint",
            Self::FontCoverage => "font-coverage",
        }
    }

    pub fn construct(self, layout: &BuildLayout) -> Box<dyn Stage> {
        match self {
            Self::Copy => Box::new(CopyStage::new(layout)),
            Self::UpstreamLint => Box::new(UpstreamLintStage::new(layout)),
            Self::Build => Box::new(BuildStage::new(layout)),
            Self::Metadata => Box::new(MetadataStage::new(layout)),
            Self::MetadataLint => Box::new(MetadataLintStage::new(layout)),
            Self::FontCoverage => Box::new(FontCoverageStage::new(layout)),
        }
    }

    pub fn constructor(self) -> StageConstructor {
        Box::new(move |layout| self.construct(layout))
    }

    /// Constructors for the standard bake, in order.
    pub fn standard() -> Vec<StageConstructor> {
        Self::STANDARD.iter().map(|kind| kind.constructor()).collect()
    }
}

/// A command template from the configuration; blank or null means "not set".
pub(crate) fn configured_command(config: &BakeConfig, key: &str) -> Option<String> {
    config
        .get_str(key)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Build-relative path as stored in the configuration (always `/`-separated).
pub(crate) fn config_path(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::ui::MemorySink;
    use std::path::Path;
    use tempfile::TempDir;

    /// A throwaway build root with an empty `project/` directory.
    pub(crate) struct Harness {
        pub layout: BuildLayout,
        pub progress: ProgressTracker,
        pub log: MemorySink,
        pub interactive: bool,
        logger: BuildLogger,
        _dir: TempDir,
    }

    impl Harness {
        pub fn new() -> Self {
            let dir = TempDir::new().expect("failed to create temp dir");
            let layout = BuildLayout::with_defaults(dir.path(), "project").unwrap();
            std::fs::create_dir_all(layout.project_root()).unwrap();
            std::fs::create_dir_all(layout.build_dir()).unwrap();
            let log = MemorySink::new();
            let logger = BuildLogger::with_cwd(Box::new(log.clone()), None);
            Self {
                layout,
                progress: ProgressTracker::new(),
                log,
                interactive: false,
                logger,
                _dir: dir,
            }
        }

        pub fn write_project_file(&self, rel: &str, content: &[u8]) {
            write_file(&self.layout.project_root().join(rel), content);
        }

        pub fn write_build_file(&self, rel: &str, content: &[u8]) {
            write_file(&self.layout.build_dir().join(rel), content);
        }

        pub fn run(
            &mut self,
            stage: &mut dyn Stage,
            mode: PassMode,
            config: &mut BakeConfig,
        ) -> Result<(), StageError> {
            let mut ctx = StageContext::new(
                mode,
                &self.layout,
                &mut self.progress,
                &mut self.logger,
                self.interactive,
            );
            stage.execute(mode, &mut ctx, config)
        }

        /// Counting pass then executing pass, each with a fresh stage.
        pub fn run_both(
            &mut self,
            kind: StageKind,
            config: &mut BakeConfig,
        ) -> Result<(), StageError> {
            let mut counting = kind.construct(&self.layout);
            self.run(counting.as_mut(), PassMode::Counting, config)?;
            let mut executing = kind.construct(&self.layout);
            self.run(executing.as_mut(), PassMode::Executing, config)
        }
    }

    fn write_file(path: &Path, content: &[u8]) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}
