//! `bake init`: seed a project with the bundled default configuration.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use bakery::config::{PROJECT_CONFIG_FILE, default_config_text};

pub fn cmd_init(root: &Path, project: &Path, force: bool) -> Result<()> {
    let project_dir = root.join(project);
    if !project_dir.is_dir() {
        anyhow::bail!("Project directory {} does not exist", project_dir.display());
    }

    let target = project_dir.join(PROJECT_CONFIG_FILE);
    if target.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            target.display()
        );
    }

    let defaults = default_config_text()?;
    fs::write(&target, defaults.as_ref())
        .with_context(|| format!("Failed to write {}", target.display()))?;

    println!("Wrote default configuration to {}", target.display());
    println!();
    println!("Next steps:");
    println!("  1. Set build_command and the lint commands in {}", PROJECT_CONFIG_FILE);
    println!("  2. Run `bake run {}`", project.display());
    Ok(())
}
