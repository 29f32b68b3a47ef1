//! Directory layout of a single build.
//!
//! ```text
//! <root>/
//! ├── <project_subdir>/               # upstream project being baked
//! └── <builds_subdir>/
//!     └── <build_subdir>/             # this build
//!         ├── sources/                # copied upstream sources
//!         ├── build.state.yaml        # checkpoint
//!         └── buildlog.txt            # build log
//! ```

use std::path::{Component, Path, PathBuf};

use crate::errors::LayoutError;

pub const CHECKPOINT_FILE: &str = "build.state.yaml";
pub const BUILD_LOG_FILE: &str = "buildlog.txt";
pub const SOURCES_DIR: &str = "sources";

/// Absolute paths of one build, all derived from a single root.
///
/// Every path is a subpath of `root_path`; construction rejects subdirectories
/// that are absolute or climb out of the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    root_path: PathBuf,
    project_root: PathBuf,
    builds_dir: PathBuf,
    build_dir: PathBuf,
}

impl BuildLayout {
    /// Derive the layout.
    ///
    /// `root` is made absolute against the current directory without resolving
    /// symlinks. An empty `builds_subdir` places builds directly under the root.
    pub fn new(
        root: impl AsRef<Path>,
        project_subdir: impl AsRef<Path>,
        builds_subdir: impl AsRef<Path>,
        build_subdir: impl AsRef<Path>,
    ) -> Result<Self, LayoutError> {
        let root = root.as_ref();
        let root_path = std::path::absolute(root).map_err(|source| LayoutError::RootUnresolved {
            path: root.to_path_buf(),
            source,
        })?;

        let project_subdir = checked_subdir("project_subdir", project_subdir.as_ref())?;
        let builds_subdir = checked_subdir("builds_subdir", builds_subdir.as_ref())?;
        let build_subdir = checked_subdir("build_subdir", build_subdir.as_ref())?;

        let builds_dir = root_path.join(builds_subdir);
        let build_dir = builds_dir.join(build_subdir);
        let project_root = root_path.join(project_subdir);

        Ok(Self {
            root_path,
            project_root,
            builds_dir,
            build_dir,
        })
    }

    /// Layout with the default `build` directory placed directly under the root.
    pub fn with_defaults(
        root: impl AsRef<Path>,
        project_subdir: impl AsRef<Path>,
    ) -> Result<Self, LayoutError> {
        Self::new(root, project_subdir, "", "build")
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn builds_dir(&self) -> &Path {
        &self.builds_dir
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.build_dir.join(CHECKPOINT_FILE)
    }

    pub fn build_log_path(&self) -> PathBuf {
        self.build_dir.join(BUILD_LOG_FILE)
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.build_dir.join(SOURCES_DIR)
    }
}

fn checked_subdir<'a>(name: &'static str, subdir: &'a Path) -> Result<&'a Path, LayoutError> {
    for component in subdir.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(LayoutError::AbsoluteSubdir {
                    name,
                    value: subdir.to_path_buf(),
                });
            }
            Component::ParentDir => {
                return Err(LayoutError::EscapesRoot {
                    name,
                    value: subdir.to_path_buf(),
                });
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(subdir)
}
