use super::{BlockChange, EditError, SurfaceEdit};
use crate::blocks::schema::{element_param_name, surface_param_name, BACK_THICKNESS};
use crate::blocks::{Block, BlockType};
use crate::surface::{OptimizeMode, SurfaceField, SurfaceRole, SurfaceRow, SurfaceType};
use crate::value::Value;
use tracing::debug;

/// Where a surface column lives on the canonical blocks.
#[derive(Debug, Clone, PartialEq)]
enum Target {
    Param(String),
    Aperture(SurfaceRole),
    /// `thickness` or `material` of the Gap after the owning block.
    FollowingGap(&'static str),
}

/// Mapping table over `(blockType, role, field)`.
fn target_for(block_type: BlockType, role: SurfaceRole, field: SurfaceField) -> Option<Target> {
    use SurfaceField as F;

    let param = |name: &str| Some(Target::Param(name.to_string()));
    match block_type {
        BlockType::Lens | BlockType::Doublet | BlockType::Triplet => {
            let last = is_last_surface(block_type, role);
            match field {
                F::Radius => surface_param_name(block_type, role, "Radius").map(Target::Param),
                F::SurfType => surface_param_name(block_type, role, "SurfType").map(Target::Param),
                F::Conic => surface_param_name(block_type, role, "Conic").map(Target::Param),
                F::Coef(k) => surface_param_name(block_type, role, &format!("Coef{k}")).map(Target::Param),
                F::Thickness | F::Material => {
                    let column = if field == F::Thickness { "thickness" } else { "material" };
                    match element_param_name(block_type, role, column) {
                        Some(name) => Some(Target::Param(name)),
                        None if last => Some(Target::FollowingGap(column)),
                        None => None,
                    }
                }
                F::SemiDia => Some(Target::Aperture(role)),
                _ => None,
            }
        }
        BlockType::Stop => match field {
            F::SemiDia => param("semiDiameter"),
            F::Thickness => Some(Target::FollowingGap("thickness")),
            F::Material => Some(Target::FollowingGap("material")),
            _ => None,
        },
        BlockType::Gap => match field {
            F::Thickness => param("thickness"),
            F::Material => param("material"),
            _ => None,
        },
        BlockType::ObjectPlane => match field {
            F::Thickness => param("objectDistance"),
            F::Material => param("material"),
            _ => None,
        },
        BlockType::ImagePlane => match field {
            F::Radius => param("radius"),
            F::SemiDia => Some(Target::Aperture(SurfaceRole::Image)),
            _ => None,
        },
    }
}

fn is_last_surface(block_type: BlockType, role: SurfaceRole) -> bool {
    match (block_type, role) {
        (BlockType::Lens, SurfaceRole::Back) => true,
        (BlockType::Doublet | BlockType::Triplet, SurfaceRole::Element(n)) => {
            n as usize == block_type.surface_count()
        }
        _ => false,
    }
}

/// Turns a surface-table edit into ordered block changes.
///
/// `blocks` are the canonical blocks the row was expanded from.
pub fn map_surface_edit(
    blocks: &[Block],
    row: &SurfaceRow,
    edit: &SurfaceEdit,
) -> Result<Vec<BlockChange>, EditError> {
    check_value(row, edit)?;

    let block_id = row
        .provenance
        .block_id
        .as_deref()
        .ok_or(EditError::NoProvenance(row.id))?;
    let role = row.role().ok_or(EditError::NoProvenance(row.id))?;
    let owner_idx = blocks
        .iter()
        .position(|b| b.block_id == block_id)
        .ok_or_else(|| EditError::BlockNotFound(block_id.to_string()))?;
    let owner = &blocks[owner_idx];
    let following_gap = blocks
        .get(owner_idx + 1)
        .filter(|b| b.block_type == BlockType::Gap);

    let unmapped = || EditError::Unmapped {
        block_type: owner.block_type,
        role,
        field: edit.field,
    };
    let mut target =
        target_for(owner.block_type, role, edit.field.governed_field()).ok_or_else(unmapped)?;
    // Without a Gap the block's own back thickness, when set, carries the column.
    if target == Target::FollowingGap("thickness")
        && following_gap.is_none()
        && !owner.param(BACK_THICKNESS).is_auto()
    {
        target = Target::Param(BACK_THICKNESS.to_string());
    }

    let mut changes = Vec::new();

    if edit.field.is_optimize_flag() {
        let mode = OptimizeMode::parse(&edit.new_value)
            .ok_or_else(|| EditError::InvalidFlag(edit.new_value.clone()))?;
        let (gap_owner, variable) = match target {
            Target::Param(name) => (owner.block_id.clone(), name),
            Target::Aperture(role) => (owner.block_id.clone(), format!("aperture.{role}")),
            Target::FollowingGap(column) => {
                let gap = following_gap.ok_or_else(unmapped)?;
                (gap.block_id.clone(), column.to_string())
            }
        };
        changes.push(BlockChange::OptimizeMode {
            block_id: gap_owner,
            variable,
            mode,
        });
        return Ok(changes);
    }

    match target {
        Target::Param(variable) => {
            if matches!(edit.field, SurfaceField::Conic | SurfaceField::Coef(_)) {
                if let Some(change) = companion_surf_type(owner, role, row) {
                    changes.push(change);
                }
            }
            changes.push(BlockChange::Parameter {
                block_id: owner.block_id.clone(),
                variable,
                new_value: edit.new_value.clone(),
            });
        }
        Target::Aperture(role) => changes.push(BlockChange::ApertureSemidia {
            block_id: owner.block_id.clone(),
            role,
            new_value: edit.new_value.clone(),
        }),
        Target::FollowingGap(column) => {
            let gap_id = match following_gap {
                Some(gap) => gap.block_id.clone(),
                None => {
                    let id = new_gap_id(blocks, &owner.block_id);
                    changes.push(BlockChange::CreateGap {
                        after_block_id: owner.block_id.clone(),
                        block_id: id.clone(),
                    });
                    id
                }
            };
            changes.push(BlockChange::Parameter {
                block_id: gap_id,
                variable: column.to_string(),
                new_value: edit.new_value.clone(),
            });
        }
    }

    debug!(row = row.id, field = %edit.field, changes = changes.len(), "mapped surface edit");
    Ok(changes)
}

fn check_value(row: &SurfaceRow, edit: &SurfaceEdit) -> Result<(), EditError> {
    if edit.field.is_optimize_flag() {
        let old = OptimizeMode::parse(&edit.old_value);
        return match OptimizeMode::parse(&edit.new_value) {
            None => Err(EditError::InvalidFlag(edit.new_value.clone())),
            Some(new) if Some(new) == old => Err(EditError::Unchanged),
            Some(_) => Ok(()),
        };
    }
    if edit.new_value == edit.old_value {
        return Err(EditError::Unchanged);
    }
    if edit.new_value.is_auto() {
        return Err(EditError::Blank(edit.field));
    }
    let inf_allowed = edit.field == SurfaceField::Radius
        || (edit.field == SurfaceField::Thickness && row.is_object());
    if edit.new_value.is_inf() && !inf_allowed {
        return Err(EditError::InfNotAllowed(edit.field));
    }
    Ok(())
}

/// Sets the surface type first when the block leaves it blank, so the
/// new conic or coefficient is not dropped on expansion.
fn companion_surf_type(owner: &Block, role: SurfaceRole, row: &SurfaceRow) -> Option<BlockChange> {
    let name = surface_param_name(owner.block_type, role, "SurfType")?;
    if !owner.param(&name).is_auto() {
        return None;
    }
    let surf_type = if row.surf_type.is_aspheric() {
        row.surf_type
    } else {
        SurfaceType::AsphericEven
    };
    Some(BlockChange::Parameter {
        block_id: owner.block_id.clone(),
        variable: name,
        new_value: Value::Text(surf_type.to_string()),
    })
}

fn new_gap_id(blocks: &[Block], owner_id: &str) -> String {
    let taken = |id: &str| blocks.iter().any(|b| b.block_id == id);
    let base = format!("{owner_id}_gap");
    if !taken(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{base}{n}"))
        .find(|id| !taken(id))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lens_back_goes_to_gap() {
        assert_eq!(
            target_for(BlockType::Lens, SurfaceRole::Back, SurfaceField::Thickness),
            Some(Target::FollowingGap("thickness"))
        );
        assert_eq!(
            target_for(BlockType::Lens, SurfaceRole::Front, SurfaceField::Thickness),
            Some(Target::Param("centerThickness".into()))
        );
    }

    #[test]
    fn test_table_cemented_roles() {
        let t = |role, field| target_for(BlockType::Triplet, role, field);
        assert_eq!(
            t(SurfaceRole::Element(3), SurfaceField::Material),
            Some(Target::Param("material3".into()))
        );
        assert_eq!(
            t(SurfaceRole::Element(4), SurfaceField::Material),
            Some(Target::FollowingGap("material"))
        );
        assert_eq!(
            t(SurfaceRole::Element(2), SurfaceField::Coef(7)),
            Some(Target::Param("surf2Coef7".into()))
        );
        assert_eq!(
            t(SurfaceRole::Element(1), SurfaceField::Radius),
            Some(Target::Param("radius1".into()))
        );
    }

    #[test]
    fn test_table_singletons() {
        assert_eq!(
            target_for(BlockType::ObjectPlane, SurfaceRole::Object, SurfaceField::Thickness),
            Some(Target::Param("objectDistance".into()))
        );
        assert_eq!(
            target_for(BlockType::Stop, SurfaceRole::Stop, SurfaceField::SemiDia),
            Some(Target::Param("semiDiameter".into()))
        );
        assert_eq!(
            target_for(BlockType::ImagePlane, SurfaceRole::Image, SurfaceField::Thickness),
            None
        );
    }

    #[test]
    fn test_new_gap_id_avoids_collisions() {
        let blocks = vec![
            Block::new("L1", BlockType::Lens),
            Block::new("L1_gap", BlockType::Gap),
        ];
        assert_eq!(new_gap_id(&blocks, "L1"), "L1_gap2");
        assert_eq!(new_gap_id(&blocks, "L2"), "L2_gap");
    }
}
