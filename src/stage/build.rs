use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::config::BakeConfig;
use crate::errors::StageError;
use crate::layout::BuildLayout;

use super::command::{render, run_shell};
use super::{PassMode, Stage, StageContext, configured_command};

/// Produces one font binary per source in the build directory.
///
/// `Lobster-Regular.sfd` becomes `Lobster-Regular.ttf`; `.otf` sources keep
/// their extension. The binary list is deterministic, so `binaries` is
/// recorded in both passes.
pub struct BuildStage {
    build_dir: PathBuf,
    project_dir: PathBuf,
}

struct BuildTarget {
    source: String,
    output: String,
    is_binary: bool,
}

impl BuildStage {
    pub fn new(layout: &BuildLayout) -> Self {
        Self {
            build_dir: layout.build_dir().to_path_buf(),
            project_dir: layout.project_root().to_path_buf(),
        }
    }

    fn targets(config: &BakeConfig) -> Vec<BuildTarget> {
        config
            .get_str_list("sources")
            .into_iter()
            .map(|source| {
                let path = Path::new(&source);
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| source.clone());
                let ext = path
                    .extension()
                    .map(|e| e.to_string_lossy().to_ascii_lowercase())
                    .unwrap_or_default();
                let (output, is_binary) = match ext.as_str() {
                    "otf" => (format!("{}.otf", stem), true),
                    "ttf" => (format!("{}.ttf", stem), true),
                    _ => (format!("{}.ttf", stem), false),
                };
                BuildTarget {
                    source,
                    output,
                    is_binary,
                }
            })
            .collect()
    }

    fn build_with_command(
        &self,
        ctx: &mut StageContext<'_>,
        template: &str,
        target: &BuildTarget,
    ) -> Result<(), StageError> {
        let file = self.build_dir.join(&target.source).to_string_lossy().into_owned();
        let output = self.build_dir.join(&target.output).to_string_lossy().into_owned();
        let build_dir = self.build_dir.to_string_lossy().into_owned();
        let project_dir = self.project_dir.to_string_lossy().into_owned();
        let line = render(
            template,
            &[
                ("file", file.as_str()),
                ("output", output.as_str()),
                ("build_dir", build_dir.as_str()),
                ("project_dir", project_dir.as_str()),
            ],
        );
        run_shell(ctx, &line)?.require_success()?;
        Ok(())
    }

    fn copy_binary(
        &self,
        ctx: &mut StageContext<'_>,
        target: &BuildTarget,
    ) -> Result<(), StageError> {
        let from = self.build_dir.join(&target.source);
        let to = self.build_dir.join(&target.output);
        ctx.command(&format!("cp {} {}", from.display(), to.display()));
        fs::copy(&from, &to).map_err(|e| StageError::io(&from, e))?;
        Ok(())
    }
}

impl Stage for BuildStage {
    fn name(&self) -> &'static str {
        "build"
    }

    fn execute(
        &mut self,
        mode: PassMode,
        ctx: &mut StageContext<'_>,
        config: &mut BakeConfig,
    ) -> Result<(), StageError> {
        let command = configured_command(config, "build_command");
        let targets = Self::targets(config);

        if command.is_none()
            && let Some(target) = targets.iter().find(|t| !t.is_binary)
        {
            return Err(StageError::NoBuilder {
                file: target.source.clone(),
            });
        }

        if mode == PassMode::Executing {
            ctx.raw("## Build");
        }

        for target in &targets {
            ctx.task(&format!("Build {}", target.output));
            if mode.is_counting() {
                continue;
            }
            match &command {
                Some(template) => self.build_with_command(ctx, template, target)?,
                None => self.copy_binary(ctx, target)?,
            }
        }

        let binaries: Vec<Value> = targets.into_iter().map(|t| Value::from(t.output)).collect();
        config.set("binaries", binaries);
        Ok(())
    }
}
