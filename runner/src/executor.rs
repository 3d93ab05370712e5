use std::io::Write;

use lightbulb::{Action, Block, Runbook};
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::{ExecutionError, RunError};
use crate::{file, shell};

/// What a completed run did.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Blocks that ran and succeeded.
    pub completed: usize,
    /// Blocks left out by the tag filters.
    pub skipped: usize,
    /// Failures of blocks marked `exitOnError:false`; the run went on past them.
    pub tolerated: Vec<RunError>,
}

/// Run every selected block in order, stopping at the first failure of a
/// block that has `exit_on_error` set.
///
/// Script output is relayed into `output` as it is produced.
pub fn run(
    runbook: &Runbook,
    config: &RunConfig,
    output: &mut dyn Write,
) -> Result<RunSummary, RunError> {
    info!(blocks = runbook.blocks.len(), "running all blocks");
    debug!(?config, "run configuration");

    let mut summary = RunSummary::default();

    for (index, block) in runbook.blocks.iter().enumerate() {
        if !config.selects(block) {
            info!(name = %block.name, tags = ?block.tags, "skipping block");
            summary.skipped += 1;
            continue;
        }

        let Err(error) = execute_block(block, config, output) else {
            summary.completed += 1;
            continue;
        };

        let failure = RunError {
            index,
            name: block.name.clone(),
            span: block.span.clone(),
            source_id: runbook.source_id,
            error,
        };
        if block.exit_on_error {
            return Err(failure);
        }
        warn!(name = %block.name, error = %failure.error, "block failed, continuing (exitOnError is false)");
        summary.tolerated.push(failure);
    }

    Ok(summary)
}

/// Perform one block's side effect.
pub fn execute_block(
    block: &Block,
    config: &RunConfig,
    output: &mut dyn Write,
) -> Result<(), ExecutionError> {
    info!(name = %block.name, action = %block.action, "running block");
    debug!(?block, "block");

    match block.action {
        Action::CreateFile => {
            let path = block
                .path
                .as_deref()
                .ok_or_else(|| ExecutionError::MissingPath(block.name.clone()))?;
            file::create_file(block, path, &config.work_dir)
        }
        Action::RunShell => shell::run_shell(block, config, output),
        Action::SetEnvironmentVars => {
            if config.interactive && block.prompt {
                info!(keys = ?block.keys, "interactive prompts are not supported yet, leaving keys unset");
            }
            warn!(name = %block.name, "setEnvironmentVars is not implemented yet, skipping");
            Ok(())
        }
    }
}
