//! `bake run`: the full two-pass build.

use anyhow::Result;
use console::style;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bakery::config::PROJECT_CONFIG_FILE;
use bakery::errors::OrchestratorError;
use bakery::orchestrator::BuildContext;
use bakery::ui::ConsoleSink;

use super::super::LayoutArgs;
use super::layout_for;

/// Errors before the build context exists propagate; build failures are
/// reported through the build output and turn into a failing exit code.
pub fn cmd_run(
    root: &Path,
    args: &LayoutArgs,
    config: Option<&Path>,
    interactive: bool,
) -> Result<ExitCode> {
    let layout = layout_for(root, args)?;
    let config_path = config
        .map(Path::to_path_buf)
        .unwrap_or_else(|| layout.project_root().join(PROJECT_CONFIG_FILE));

    let mut ctx = BuildContext::standard(layout, Box::new(ConsoleSink));
    ctx.set_interactive(interactive);

    match bake(&mut ctx, config_path) {
        Ok(()) => {
            println!();
            println!(
                "{} {} tasks, state saved to {}",
                style("Bake finished:").green().bold(),
                ctx.progress().total(),
                ctx.checkpoint_path().display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            ctx.report_error(&e.to_string());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn bake(ctx: &mut BuildContext, config_path: PathBuf) -> Result<(), OrchestratorError> {
    ctx.open_build_log()?;
    ctx.load_config(config_path)?;
    ctx.run()?;
    Ok(())
}
