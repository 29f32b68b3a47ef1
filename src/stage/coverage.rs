use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::config::BakeConfig;
use crate::errors::StageError;
use crate::layout::BuildLayout;

use super::command::{render, run_shell};
use super::{PassMode, Stage, StageContext, configured_command};

pub const COVERAGE_REPORT: &str = "coverage.txt";

/// Runs `coverage_command` once per binary and collects its output in
/// `coverage.txt`. Skipped when no command is configured.
pub struct FontCoverageStage {
    build_dir: PathBuf,
    project_dir: PathBuf,
}

impl FontCoverageStage {
    pub fn new(layout: &BuildLayout) -> Self {
        Self {
            build_dir: layout.build_dir().to_path_buf(),
            project_dir: layout.project_root().to_path_buf(),
        }
    }

    fn append(&self, binary: &str, stdout: &str) -> Result<(), StageError> {
        let path = self.build_dir.join(COVERAGE_REPORT);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StageError::io(&path, e))?;
        writeln!(file, "## {}\n{}", binary, stdout.trim_end()).map_err(|e| StageError::io(&path, e))
    }
}

impl Stage for FontCoverageStage {
    fn name(&self) -> &'static str {
        "font-coverage"
    }

    fn execute(
        &mut self,
        mode: PassMode,
        ctx: &mut StageContext<'_>,
        config: &mut BakeConfig,
    ) -> Result<(), StageError> {
        let Some(template) = configured_command(config, "coverage_command") else {
            tracing::debug!("coverage_command not set, skipping font coverage");
            return Ok(());
        };
        let binaries = config.get_str_list("binaries");

        if mode == PassMode::Executing {
            ctx.raw("## Font coverage");
            let report = self.build_dir.join(COVERAGE_REPORT);
            fs::write(&report, "").map_err(|e| StageError::io(&report, e))?;
        }

        let build_dir = self.build_dir.to_string_lossy().into_owned();
        let project_dir = self.project_dir.to_string_lossy().into_owned();
        for binary in &binaries {
            ctx.task(&format!("Coverage {}", binary));
            if mode.is_counting() {
                continue;
            }
            let file = self.build_dir.join(binary).to_string_lossy().into_owned();
            let line = render(
                &template,
                &[
                    ("file", file.as_str()),
                    ("output", file.as_str()),
                    ("build_dir", build_dir.as_str()),
                    ("project_dir", project_dir.as_str()),
                ],
            );
            let output = run_shell(ctx, &line)?.require_success()?;
            self.append(binary, &output.stdout)?;
        }

        if mode == PassMode::Executing {
            config.set("coverage_report", COVERAGE_REPORT);
        }
        Ok(())
    }
}
