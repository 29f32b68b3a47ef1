use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde_yaml::Value;
use walkdir::WalkDir;

use crate::config::BakeConfig;
use crate::errors::StageError;
use crate::layout::{BuildLayout, SOURCES_DIR};

use super::{PassMode, Stage, StageContext, config_path};

/// Extensions picked up when `process_files` is empty.
pub const FONT_SOURCE_EXTENSIONS: [&str; 4] = ["ttf", "otf", "sfd", "ttx"];

/// Copies the upstream sources into `<build_dir>/sources/`.
///
/// Records `sources` (build-relative paths) in both passes. One task per
/// source file and one for the license file when it exists.
pub struct CopyStage {
    project_root: PathBuf,
    build_dir: PathBuf,
    sources_dir: PathBuf,
}

impl CopyStage {
    pub fn new(layout: &BuildLayout) -> Self {
        Self {
            project_root: layout.project_root().to_path_buf(),
            build_dir: layout.build_dir().to_path_buf(),
            sources_dir: layout.sources_dir(),
        }
    }

    /// Source files relative to the project root, sorted by path.
    fn discover(&self, config: &BakeConfig) -> Result<Vec<PathBuf>, StageError> {
        let patterns = config
            .get_str_list("process_files")
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| StageError::InvalidConfig {
                    key: "process_files".to_string(),
                    message: format!("{}: {}", p, e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut found = Vec::new();
        let walker = WalkDir::new(&self.project_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git" && !e.path().starts_with(&self.build_dir));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.project_root.clone());
                StageError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.project_root) else {
                continue;
            };
            let selected = if patterns.is_empty() {
                is_font_source(rel)
            } else {
                patterns.iter().any(|p| p.matches_path(rel))
            };
            if selected {
                found.push(rel.to_path_buf());
            }
        }

        if found.is_empty() {
            return Err(StageError::NoSources {
                project_root: self.project_root.clone(),
            });
        }
        Ok(found)
    }

    fn copy_file(from: &Path, to: &Path) -> Result<(), StageError> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| StageError::io(parent, e))?;
        }
        fs::copy(from, to).map_err(|e| StageError::io(from, e))?;
        Ok(())
    }
}

impl Stage for CopyStage {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn execute(
        &mut self,
        mode: PassMode,
        ctx: &mut StageContext<'_>,
        config: &mut BakeConfig,
    ) -> Result<(), StageError> {
        if mode == PassMode::Executing {
            ctx.raw("## Copy sources");
        }

        let sources = self.discover(config)?;
        let mut recorded = Vec::with_capacity(sources.len());
        for rel in &sources {
            let display = config_path(rel);
            ctx.task(&format!("Copy {}", display));
            if mode == PassMode::Executing {
                let from = self.project_root.join(rel);
                let to = self.sources_dir.join(rel);
                ctx.command(&format!("cp {} {}", from.display(), to.display()));
                Self::copy_file(&from, &to)?;
            }
            recorded.push(Value::from(format!("{}/{}", SOURCES_DIR, display)));
        }
        config.set("sources", recorded);

        if let Some(license) = config.get_str("license_file").map(str::to_string) {
            let from = self.project_root.join(&license);
            if from.is_file() {
                ctx.task(&format!("Copy {}", license));
                if mode == PassMode::Executing {
                    let to = self.build_dir.join(&license);
                    ctx.command(&format!("cp {} {}", from.display(), to.display()));
                    Self::copy_file(&from, &to)?;
                }
            }
        }

        Ok(())
    }
}

fn is_font_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            FONT_SOURCE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(e))
        })
        .unwrap_or(false)
}
