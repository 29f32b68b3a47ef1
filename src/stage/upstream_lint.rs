use std::path::PathBuf;

use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use serde_yaml::{Mapping, Value};

use crate::config::BakeConfig;
use crate::errors::StageError;
use crate::layout::BuildLayout;

use super::command::{render, run_shell};
use super::{PassMode, Stage, StageContext, configured_command};

/// Lints every copied source with `upstream_lint_command`.
///
/// Lint failures are recorded under `upstream_lint.<source>` and do not stop
/// the build. When `upstream_fix_command` is set, a failing source is fixed
/// after confirmation (interactive builds) or when `autofix` is true.
pub struct UpstreamLintStage {
    build_dir: PathBuf,
    project_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LintOutcome {
    Passed,
    Failed,
    Fixed,
}

impl LintOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Fixed => "fixed",
        }
    }
}

impl UpstreamLintStage {
    pub fn new(layout: &BuildLayout) -> Self {
        Self {
            build_dir: layout.build_dir().to_path_buf(),
            project_dir: layout.project_root().to_path_buf(),
        }
    }

    fn render_for(&self, template: &str, source: &str) -> String {
        let file = self.build_dir.join(source).to_string_lossy().into_owned();
        let build_dir = self.build_dir.to_string_lossy().into_owned();
        let project_dir = self.project_dir.to_string_lossy().into_owned();
        render(
            template,
            &[
                ("file", file.as_str()),
                ("output", file.as_str()),
                ("build_dir", build_dir.as_str()),
                ("project_dir", project_dir.as_str()),
            ],
        )
    }

    fn should_fix(
        ctx: &StageContext<'_>,
        config: &BakeConfig,
        source: &str,
    ) -> Result<bool, StageError> {
        if ctx.is_interactive() {
            let answer = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(format!("Apply autofix to {}?", source))
                .default(false)
                .interact()?;
            return Ok(answer);
        }
        Ok(config.get_bool("autofix").unwrap_or(false))
    }

    fn lint_one(
        &self,
        ctx: &mut StageContext<'_>,
        config: &BakeConfig,
        lint: &str,
        fix: Option<&str>,
        source: &str,
    ) -> Result<LintOutcome, StageError> {
        let output = run_shell(ctx, &self.render_for(lint, source))?;
        if output.success() {
            return Ok(LintOutcome::Passed);
        }

        let Some(fix) = fix else {
            return Ok(LintOutcome::Failed);
        };
        if !Self::should_fix(ctx, config, source)? {
            return Ok(LintOutcome::Failed);
        }

        let fixed = run_shell(ctx, &self.render_for(fix, source))?;
        Ok(if fixed.success() {
            LintOutcome::Fixed
        } else {
            LintOutcome::Failed
        })
    }
}

impl Stage for UpstreamLintStage {
    fn name(&self) -> &'static str {
        "upstream-lint"
    }

    fn execute(
        &mut self,
        mode: PassMode,
        ctx: &mut StageContext<'_>,
        config: &mut BakeConfig,
    ) -> Result<(), StageError> {
        let Some(lint) = configured_command(config, "upstream_lint_command") else {
            tracing::debug!("upstream_lint_command not set, skipping upstream lint");
            return Ok(());
        };
        let fix = configured_command(config, "upstream_fix_command");
        let sources = config.get_str_list("sources");

        if mode == PassMode::Executing {
            ctx.raw("## Upstream lint");
        }

        let mut results = Mapping::new();
        for source in &sources {
            ctx.task(&format!("Lint {}", source));
            if mode.is_counting() {
                continue;
            }
            let outcome = self.lint_one(ctx, config, &lint, fix.as_deref(), source)?;
            results.insert(Value::from(source.as_str()), Value::from(outcome.as_str()));
        }

        if mode == PassMode::Executing {
            config.set("upstream_lint", results);
        }
        Ok(())
    }
}
