//! CLI command implementations.
//!
//! | Module  | Commands handled |
//! |---------|------------------|
//! | `run`   | `Run`            |
//! | `state` | `State`          |
//! | `init`  | `Init`           |

pub mod init;
pub mod run;
pub mod state;

pub use init::cmd_init;
pub use run::cmd_run;
pub use state::cmd_state;

use anyhow::{Context, Result};
use std::path::Path;

use bakery::layout::BuildLayout;

use super::LayoutArgs;

/// Resolve the build layout for `args` under `root`.
pub fn layout_for(root: &Path, args: &LayoutArgs) -> Result<BuildLayout> {
    let builds_dir = args.builds_dir.as_deref().unwrap_or(Path::new(""));
    BuildLayout::new(root, &args.project, builds_dir, &args.build_dir)
        .context("Invalid build layout")
}
