//! The two-pass build run.
//!
//! `BuildContext::run` walks the stage list twice. The counting pass lets
//! every stage report its tasks so progress can be shown as "K of N"; the
//! executing pass does the work and writes a checkpoint after each stage.
//! The first failing stage stops the build after a checkpoint is written.

use std::fs;
use std::path::Path;

use crate::config::{BakeConfig, ConfigLoad, ConfigSource, load_config};
use crate::errors::{CheckpointError, ConfigError, OrchestratorError};
use crate::layout::BuildLayout;
use crate::stage::{PassMode, StageConstructor, StageContext, StageKind};
use crate::ui::{BuildLogFile, BuildLogger, LogSink};

use super::checkpoint::CheckpointStore;
use super::progress::ProgressTracker;

/// Run state for one build of one project.
pub struct BuildContext {
    layout: BuildLayout,
    config: BakeConfig,
    stages: Vec<StageConstructor>,
    progress: ProgressTracker,
    logger: BuildLogger,
    checkpoint: CheckpointStore,
    interactive: bool,
    checkpoint_writes: usize,
}

impl BuildContext {
    pub fn new(
        layout: BuildLayout,
        stages: Vec<StageConstructor>,
        sink: Box<dyn LogSink>,
    ) -> Self {
        Self::with_logger(layout, stages, BuildLogger::new(sink))
    }

    pub fn with_logger(
        layout: BuildLayout,
        stages: Vec<StageConstructor>,
        logger: BuildLogger,
    ) -> Self {
        let checkpoint = CheckpointStore::for_layout(&layout);
        Self {
            layout,
            config: BakeConfig::new(),
            stages,
            progress: ProgressTracker::new(),
            logger,
            checkpoint,
            interactive: false,
            checkpoint_writes: 0,
        }
    }

    /// A context running the standard bake stages.
    pub fn standard(layout: BuildLayout, sink: Box<dyn LogSink>) -> Self {
        Self::new(layout, StageKind::standard(), sink)
    }

    /// Also send build output to `<build_dir>/buildlog.txt`.
    pub fn open_build_log(&mut self) -> Result<(), OrchestratorError> {
        let path = self.layout.build_log_path();
        let file = BuildLogFile::open(&path)
            .map_err(|source| OrchestratorError::BuildLogOpenFailed { path, source })?;
        self.logger.attach(Box::new(file));
        Ok(())
    }

    /// Replace the configuration. An unreadable path falls back to the
    /// bundled defaults and logs an error line saying so.
    pub fn load_config(&mut self, source: impl Into<ConfigSource>) -> Result<(), ConfigError> {
        let ConfigLoad { config, warning } = load_config(source.into())?;
        if let Some(warning) = warning {
            self.logger.error(&warning);
        }
        self.config = config;
        Ok(())
    }

    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn layout(&self) -> &BuildLayout {
        &self.layout
    }

    pub fn config(&self) -> &BakeConfig {
        &self.config
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn checkpoint_path(&self) -> &Path {
        self.checkpoint.path()
    }

    /// Successful checkpoint writes since construction.
    pub fn checkpoint_writes(&self) -> usize {
        self.checkpoint_writes
    }

    /// Write an `Error: <message>` line to the build output.
    pub fn report_error(&mut self, message: &str) {
        self.logger.error(message);
    }

    /// Count every stage's tasks, then execute every stage in order.
    pub fn run(&mut self) -> Result<&BakeConfig, OrchestratorError> {
        self.progress = ProgressTracker::new();

        let build_dir = self.layout.build_dir();
        fs::create_dir_all(build_dir).map_err(|source| OrchestratorError::BuildDirFailed {
            path: build_dir.to_path_buf(),
            source,
        })?;

        self.logger.raw("\n\n\n# Bake Begins!\n");
        tracing::info!(
            project = %self.layout.project_root().display(),
            stages = self.stages.len(),
            "bake started"
        );

        // Whatever stages record while counting is discarded: the executing
        // pass starts from the loaded configuration again.
        let loaded = self.config.clone();
        self.run_pass(PassMode::Counting)?;
        tracing::debug!(total = self.progress.total(), "counting pass finished");
        self.config = loaded;
        self.run_pass(PassMode::Executing)?;

        tracing::info!(
            tasks = self.progress.total(),
            checkpoints = self.checkpoint_writes,
            "bake finished"
        );
        Ok(&self.config)
    }

    fn run_pass(&mut self, mode: PassMode) -> Result<(), OrchestratorError> {
        for index in 0..self.stages.len() {
            let mut stage = (self.stages[index])(&self.layout);
            let name = stage.name();
            tracing::debug!(stage = name, %mode, "stage starting");

            let result = {
                let mut ctx = StageContext::new(
                    mode,
                    &self.layout,
                    &mut self.progress,
                    &mut self.logger,
                    self.interactive,
                );
                stage.execute(mode, &mut ctx, &mut self.config)
            };

            match result {
                Ok(()) => {
                    tracing::debug!(stage = name, %mode, "stage finished");
                    if mode == PassMode::Executing {
                        self.save_checkpoint()?;
                    }
                }
                Err(err) => {
                    tracing::debug!(stage = name, %mode, error = %err, "stage failed");
                    if let Err(checkpoint_err) = self.save_checkpoint() {
                        tracing::error!(
                            stage = name,
                            error = %err,
                            "stage failed and the checkpoint could not be written"
                        );
                        return Err(checkpoint_err.into());
                    }
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    fn save_checkpoint(&mut self) -> Result<(), CheckpointError> {
        self.checkpoint.save(&self.config)?;
        self.checkpoint_writes += 1;
        tracing::debug!(
            path = %self.checkpoint.path().display(),
            writes = self.checkpoint_writes,
            "checkpoint written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FALLBACK_WARNING, default_config};
    use crate::errors::StageError;
    use crate::stage::Stage;
    use crate::ui::MemorySink;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    type Trace = Rc<RefCell<Vec<String>>>;

    /// Reports `tasks` tasks and optionally fails in one pass.
    struct ScriptedStage {
        name: &'static str,
        tasks: u32,
        fail_in: Option<PassMode>,
        trace: Trace,
    }

    impl Stage for ScriptedStage {
        fn name(&self) -> &'static str {
            self.name
        }

        fn execute(
            &mut self,
            mode: PassMode,
            ctx: &mut StageContext<'_>,
            config: &mut BakeConfig,
        ) -> Result<(), StageError> {
            self.trace.borrow_mut().push(format!("{}:{}", self.name, mode));
            for i in 0..self.tasks {
                ctx.task(&format!("{} task {}", self.name, i + 1));
            }
            if self.fail_in == Some(mode) {
                return Err(StageError::CommandFailed {
                    command: format!("{} tool", self.name),
                    code: 1,
                });
            }
            if mode == PassMode::Executing {
                config.set(self.name, "done");
            }
            Ok(())
        }
    }

    fn scripted(
        name: &'static str,
        tasks: u32,
        fail_in: Option<PassMode>,
        trace: &Trace,
    ) -> StageConstructor {
        let trace = Rc::clone(trace);
        Box::new(move |_layout: &BuildLayout| -> Box<dyn Stage> {
            Box::new(ScriptedStage {
                name,
                tasks,
                fail_in,
                trace: Rc::clone(&trace),
            })
        })
    }

    fn context(stages: Vec<StageConstructor>) -> (BuildContext, MemorySink, TempDir) {
        let dir = TempDir::new().unwrap();
        let layout = BuildLayout::with_defaults(dir.path(), "project").unwrap();
        let log = MemorySink::new();
        let logger = BuildLogger::with_cwd(Box::new(log.clone()), None);
        (BuildContext::with_logger(layout, stages, logger), log, dir)
    }

    #[test]
    fn test_totals_and_one_checkpoint_per_stage() {
        let trace = Trace::default();
        let (mut ctx, log, _dir) = context(vec![
            scripted("a", 2, None, &trace),
            scripted("b", 0, None, &trace),
            scripted("c", 3, None, &trace),
        ]);

        let config = ctx.run().unwrap();
        assert_eq!(config.get_str("c"), Some("done"));
        assert_eq!(ctx.progress().total(), 5);
        assert_eq!(ctx.progress().completed(), 6);
        assert_eq!(ctx.checkpoint_writes(), 3);
        assert_eq!(
            *trace.borrow(),
            vec![
                "a:counting",
                "b:counting",
                "c:counting",
                "a:executing",
                "b:executing",
                "c:executing"
            ]
        );

        let text = log.text();
        assert!(text.starts_with("\n\n\n# Bake Begins!"));
        assert!(text.contains("### (1 of 5) a task 1"));
        assert!(text.contains("### (5 of 5) c task 3"));
    }

    #[test]
    fn test_failure_in_second_of_three_stages() {
        let trace = Trace::default();
        let (mut ctx, _log, _dir) = context(vec![
            scripted("a", 1, None, &trace),
            scripted("b", 1, Some(PassMode::Executing), &trace),
            scripted("c", 1, None, &trace),
        ]);

        let err = ctx.run().unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Stage(StageError::CommandFailed { ref command, .. }) if command == "b tool"
        ));
        assert_eq!(ctx.checkpoint_writes(), 2);
        assert!(!trace.borrow().contains(&"c:executing".to_string()));

        let saved = CheckpointStore::new(ctx.checkpoint_path().to_path_buf())
            .load()
            .unwrap()
            .unwrap();
        assert_eq!(saved.get_str("a"), Some("done"));
        assert!(!saved.contains_key("b"));
    }

    #[test]
    fn test_checkpoint_after_failure_omits_keys_recorded_while_counting() {
        let trace = Trace::default();
        let (mut ctx, _log, dir) = context(vec![
            StageKind::Copy.constructor(),
            scripted("lint", 1, Some(PassMode::Executing), &trace),
            StageKind::Build.constructor(),
        ]);
        let project = dir.path().join("project");
        fs::create_dir_all(&project).unwrap();
        fs::write(project.join("A-Regular.ttf"), b"font").unwrap();

        assert!(ctx.run().is_err());
        assert!(!ctx.config().contains_key("binaries"));

        let saved = CheckpointStore::new(ctx.checkpoint_path().to_path_buf())
            .load()
            .unwrap()
            .unwrap();
        assert_eq!(saved.get_str_list("sources"), vec!["sources/A-Regular.ttf"]);
        assert!(!saved.contains_key("binaries"));
        assert!(!ctx.layout().build_dir().join("A-Regular.ttf").exists());
    }

    #[test]
    fn test_counting_failure_stops_before_executing() {
        let trace = Trace::default();
        let (mut ctx, log, _dir) = context(vec![
            scripted("a", 1, Some(PassMode::Counting), &trace),
            scripted("b", 1, None, &trace),
        ]);

        assert!(ctx.run().is_err());
        assert_eq!(*trace.borrow(), vec!["a:counting"]);
        assert_eq!(ctx.checkpoint_writes(), 1);
        assert!(!log.text().contains("###"));
    }

    #[test]
    fn test_empty_pipeline_writes_no_checkpoint() {
        let (mut ctx, _log, _dir) = context(Vec::new());
        ctx.run().unwrap();
        assert_eq!(ctx.progress().total(), 0);
        assert_eq!(ctx.checkpoint_writes(), 0);
        assert!(!ctx.checkpoint_path().exists());
    }

    #[test]
    fn test_checkpoint_failure_wins_over_stage_failure() {
        let trace = Trace::default();
        let (mut ctx, _log, _dir) =
            context(vec![scripted("a", 1, Some(PassMode::Executing), &trace)]);
        fs::create_dir_all(ctx.checkpoint_path()).unwrap();

        let err = ctx.run().unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Checkpoint(CheckpointError::WriteFailed { .. })
        ));
        assert_eq!(ctx.checkpoint_writes(), 0);
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let (mut ctx, log, dir) = context(Vec::new());
        ctx.load_config(dir.path().join("nope.yaml")).unwrap();
        assert_eq!(ctx.config(), &default_config().unwrap());
        assert!(log.text().contains(&format!("Error: {}", FALLBACK_WARNING)));
    }

    #[test]
    fn test_rerun_resets_progress() {
        let trace = Trace::default();
        let (mut ctx, _log, _dir) = context(vec![scripted("a", 2, None, &trace)]);
        ctx.run().unwrap();
        ctx.run().unwrap();
        assert_eq!(ctx.progress().total(), 2);
        assert_eq!(ctx.checkpoint_writes(), 2);
    }

    #[test]
    fn test_interactive_flag_reaches_stages() {
        struct Recorder(Rc<RefCell<Option<bool>>>);
        impl Stage for Recorder {
            fn name(&self) -> &'static str {
                "recorder"
            }
            fn execute(
                &mut self,
                _mode: PassMode,
                ctx: &mut StageContext<'_>,
                _config: &mut BakeConfig,
            ) -> Result<(), StageError> {
                *self.0.borrow_mut() = Some(ctx.is_interactive());
                Ok(())
            }
        }

        let seen = Rc::new(RefCell::new(None));
        let recorder = Rc::clone(&seen);
        let constructor: StageConstructor = Box::new(move |_: &BuildLayout| -> Box<dyn Stage> {
            Box::new(Recorder(Rc::clone(&recorder)))
        });
        let (mut ctx, _log, _dir) = context(vec![constructor]);
        ctx.set_interactive(true);
        ctx.run().unwrap();
        assert_eq!(*seen.borrow(), Some(true));
    }

    #[test]
    fn test_build_log_receives_output() {
        let trace = Trace::default();
        let (mut ctx, _log, _dir) = context(vec![scripted("a", 1, None, &trace)]);
        ctx.open_build_log().unwrap();
        ctx.run().unwrap();
        ctx.report_error("it broke");

        let text = fs::read_to_string(ctx.layout().build_log_path()).unwrap();
        assert!(text.contains("# Bake Begins!"));
        assert!(text.contains("### (1 of 1) a task 1"));
        assert!(text.contains("Error: it broke"));
    }
}
