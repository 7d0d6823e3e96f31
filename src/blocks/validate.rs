use super::{Block, BlockType};
use serde::Serialize;
use std::collections::HashSet;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Fatal,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Validate,
    Expand,
    Resolve,
    Apply,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub severity: Severity,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface_index: Option<usize>,
    pub message: String,
}

impl Issue {
    pub fn fatal(phase: Phase, block_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Fatal,
            phase,
            block_id: block_id.map(str::to_string),
            surface_index: None,
            message: message.into(),
        }
    }

    pub fn warning(phase: Phase, block_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            phase,
            block_id: block_id.map(str::to_string),
            surface_index: None,
            message: message.into(),
        }
    }

    pub fn at_surface(mut self, index: usize) -> Self {
        self.surface_index = Some(index);
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

/// Ordering and identity checks that do not look at parameter values.
pub fn validate_structure(blocks: &[Block]) -> Vec<Issue> {
    let mut issues = Vec::new();

    if blocks.is_empty() {
        issues.push(Issue::fatal(Phase::Validate, None, "configuration has no blocks"));
        return issues;
    }

    let mut seen = HashSet::new();
    for block in blocks {
        if block.block_id.trim().is_empty() {
            issues.push(Issue::fatal(Phase::Validate, None, "block with empty blockId"));
        } else if !seen.insert(block.block_id.as_str()) {
            issues.push(Issue::fatal(
                Phase::Validate,
                Some(block.block_id.as_str()),
                format!("duplicate blockId '{}'", block.block_id),
            ));
        }
    }

    check_singleton(blocks, BlockType::ObjectPlane, 0, "first", &mut issues);
    check_singleton(blocks, BlockType::ImagePlane, blocks.len() - 1, "last", &mut issues);

    issues
}

fn check_singleton(
    blocks: &[Block],
    block_type: BlockType,
    expected_index: usize,
    place: &str,
    issues: &mut Vec<Issue>,
) {
    let positions: Vec<usize> = blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| b.block_type == block_type)
        .map(|(i, _)| i)
        .collect();

    match positions.as_slice() {
        [] => issues.push(Issue::fatal(
            Phase::Validate,
            None,
            format!("missing {block_type} block"),
        )),
        [only] if *only != expected_index => {
            let id = &blocks[*only].block_id;
            issues.push(Issue::fatal(
                Phase::Validate,
                Some(id.as_str()),
                format!("{block_type} must be the {place} block"),
            ));
        }
        [_] => {}
        [_, rest @ ..] => {
            for &i in rest {
                let id = &blocks[i].block_id;
                issues.push(Issue::fatal(
                    Phase::Validate,
                    Some(id.as_str()),
                    format!("duplicate {block_type} block"),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(types: &[BlockType]) -> Vec<Block> {
        types
            .iter()
            .enumerate()
            .map(|(i, t)| Block::new(format!("B{i}"), *t))
            .collect()
    }

    #[test]
    fn test_valid_sequence() {
        let blocks = seq(&[BlockType::ObjectPlane, BlockType::Lens, BlockType::ImagePlane]);
        assert!(validate_structure(&blocks).is_empty());
    }

    #[test]
    fn test_misplaced_image_plane() {
        let blocks = seq(&[
            BlockType::ObjectPlane,
            BlockType::ImagePlane,
            BlockType::Lens,
        ]);
        let issues = validate_structure(&blocks);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_fatal());
        assert_eq!(issues[0].block_id.as_deref(), Some("B1"));
    }

    #[test]
    fn test_duplicate_ids() {
        let mut blocks = seq(&[BlockType::ObjectPlane, BlockType::Gap, BlockType::ImagePlane]);
        blocks[1].block_id = "B0".into();
        let issues = validate_structure(&blocks);
        assert!(issues.iter().any(|i| i.message.contains("duplicate blockId")));
    }
}
