use super::{BlockChange, EditError};
use crate::blocks::{expand, Block, BlockType, Issue};
use crate::consts::AIR;
use crate::system::Configuration;
use crate::value::Value;
use tracing::info;

/// Applies `changes` to a copy of `blocks` and re-expands it.
///
/// Returns the new blocks only when expansion has no fatal issue; the
/// input is never touched.
pub fn apply_changes(blocks: &[Block], changes: &[BlockChange]) -> Result<Vec<Block>, EditError> {
    let mut next = blocks.to_vec();
    for change in changes {
        apply_one(&mut next, change)?;
    }

    let expansion = expand(&next);
    if expansion.has_fatal() {
        let fatal: Vec<Issue> = expansion.fatal_issues().cloned().collect();
        return Err(EditError::Rejected(fatal));
    }
    Ok(next)
}

/// Commits `changes` onto the configuration's canonical blocks.
pub fn apply_to_configuration(
    config: &mut Configuration,
    changes: &[BlockChange],
) -> Result<(), EditError> {
    let blocks = apply_changes(&config.blocks, changes)?;
    config.blocks = blocks;
    info!(config = %config.id, changes = changes.len(), "block changes applied");
    Ok(())
}

fn apply_one(blocks: &mut Vec<Block>, change: &BlockChange) -> Result<(), EditError> {
    if let BlockChange::CreateGap {
        after_block_id,
        block_id,
    } = change
    {
        let idx = position(blocks, after_block_id)?;
        let gap = Block::new(block_id.clone(), BlockType::Gap)
            .with_param("thickness", 0.0)
            .with_param("material", AIR);
        blocks.insert(idx + 1, gap);
        return Ok(());
    }

    let idx = position(blocks, change.block_id())?;
    let block = &mut blocks[idx];
    match change {
        BlockChange::Parameter {
            variable,
            new_value,
            ..
        } => block.set_value_of(variable, new_value.clone()),
        BlockChange::ApertureSemidia { role, new_value, .. } => {
            block.set_value_of(&format!("aperture.{role}"), new_value.clone())
        }
        BlockChange::OptimizeMode { variable, mode, .. } => block.set_optimize_mode(variable, *mode),
        BlockChange::CreateGap { .. } => {}
    }
    Ok(())
}

fn position(blocks: &[Block], block_id: &str) -> Result<usize, EditError> {
    blocks
        .iter()
        .position(|b| b.block_id == block_id)
        .ok_or_else(|| EditError::BlockNotFound(block_id.to_string()))
}
