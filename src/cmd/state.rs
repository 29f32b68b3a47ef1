//! `bake state`: show the last checkpoint of a build.

use anyhow::{Context, Result};
use std::path::Path;

use bakery::orchestrator::CheckpointStore;

use super::super::LayoutArgs;
use super::layout_for;

pub fn cmd_state(root: &Path, args: &LayoutArgs) -> Result<()> {
    let layout = layout_for(root, args)?;
    let store = CheckpointStore::for_layout(&layout);

    match store.load()? {
        Some(config) => {
            let yaml = config
                .to_yaml()
                .context("Failed to serialize build state")?;
            println!("# {}", store.path().display());
            print!("{}", yaml);
        }
        None => {
            println!("No build state found at {}", store.path().display());
            println!("Run `bake run {}` first.", args.project.display());
        }
    }
    Ok(())
}
