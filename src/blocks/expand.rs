use super::schema::{BlockSpec, SurfaceParams, BACK_THICKNESS};
use super::validate::{validate_structure, Issue, Phase};
use super::{Block, BlockType};
use crate::consts::{AIR, COEF_COUNT};
use crate::error::{LensForgeError, LfResult};
use crate::surface::{OptimizeMode, Provenance, SurfaceRole, SurfaceRow, SurfaceType};
use crate::value::Value;
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Expansion {
    pub rows: Vec<SurfaceRow>,
    pub issues: Vec<Issue>,
}

impl Expansion {
    pub fn has_fatal(&self) -> bool {
        self.issues.iter().any(Issue::is_fatal)
    }

    pub fn fatal_issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.is_fatal())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| !i.is_fatal())
    }

    /// Rows, or a validation error listing every fatal issue.
    pub fn into_rows(self) -> LfResult<Vec<SurfaceRow>> {
        if self.has_fatal() {
            let joined = self.fatal_issues().map(|i| i.message.as_str()).join("; ");
            return Err(LensForgeError::Validation(joined));
        }
        Ok(self.rows)
    }
}

/// Expands design-intent blocks into ordered surface rows.
///
/// Pure: the same blocks always give the same rows. Fatal issues leave
/// `rows` empty.
pub fn expand(blocks: &[Block]) -> Expansion {
    let mut issues = validate_structure(blocks);
    if issues.iter().any(Issue::is_fatal) {
        return Expansion { rows: Vec::new(), issues };
    }

    let specs: Vec<BlockSpec> = blocks
        .iter()
        .map(|b| BlockSpec::parse(b, &mut issues))
        .collect();
    if issues.iter().any(Issue::is_fatal) {
        return Expansion { rows: Vec::new(), issues };
    }

    let mut emitter = RowEmitter {
        rows: Vec::new(),
        issues,
    };

    for (i, (block, spec)) in blocks.iter().zip(&specs).enumerate() {
        let next = blocks.get(i + 1).zip(specs.get(i + 1));
        let following_gap = match next {
            Some((gap_block, BlockSpec::Gap(gap))) => Some((gap_block, gap)),
            _ => None,
        };
        let tail = Tail::after(block, spec, following_gap);

        match spec {
            BlockSpec::ObjectPlane(p) => {
                let mut row = emitter.row(block, SurfaceRole::Object);
                row.radius = Value::Inf;
                row.thickness = p.object_distance.clone();
                row.material = p.material.clone();
                row.optimize_t = block.optimize_mode("objectDistance");
                emitter.push(row);
            }
            BlockSpec::Gap(p) => {
                let absorbed = i > 0 && blocks[i - 1].block_type.absorbs_following_gap();
                if absorbed {
                    continue;
                }
                let mut row = emitter.row(block, SurfaceRole::Gap);
                row.radius = Value::Inf;
                row.thickness = p.thickness.clone();
                row.material = p.material.clone();
                row.optimize_t = block.optimize_mode("thickness");
                row.optimize_material = block.optimize_mode("material");
                emitter.push(row);
            }
            BlockSpec::Stop(p) => {
                let mut row = emitter.row(block, SurfaceRole::Stop);
                row.surf_type = SurfaceType::Stop;
                row.radius = Value::Inf;
                row.semidia = Value::Number(p.semi_diameter);
                row.optimize_semi_dia = block.optimize_mode("semiDiameter");
                tail.apply(&mut row);
                emitter.push(row);
            }
            BlockSpec::Lens(_) | BlockSpec::Doublet(_) | BlockSpec::Triplet(_) => {
                for (surface, element) in spec.lens_surfaces() {
                    let mut row = emitter.row(block, surface.role);
                    emitter.profile(&mut row, block, surface);
                    row.optimize_r = block.optimize_mode(&radius_param(block.block_type, surface.role));
                    match element {
                        Some(el) => {
                            row.thickness = el.thickness.clone();
                            row.material = el.material.clone();
                            let (t_name, m_name) = element_names(block.block_type, surface.role);
                            row.optimize_t = block.optimize_mode(&t_name);
                            row.optimize_material = block.optimize_mode(&m_name);
                        }
                        None => tail.apply(&mut row),
                    }
                    row.semidia = block.aperture_for(&surface.role.to_string());
                    row.optimize_semi_dia =
                        block.optimize_mode(&format!("aperture.{}", surface.role));
                    emitter.push(row);
                }
            }
            BlockSpec::ImagePlane(p) => {
                let mut row = emitter.row(block, SurfaceRole::Image);
                row.surf_type = SurfaceType::Image;
                row.radius = p.radius.clone();
                row.thickness = Value::Number(0.0);
                row.material = Value::Auto;
                row.semidia = block.aperture_for("image");
                row.optimize_r = block.optimize_mode("radius");
                row.optimize_semi_dia = block.optimize_mode("aperture.image");
                emitter.push(row);
            }
        }
    }

    debug!(
        blocks = blocks.len(),
        rows = emitter.rows.len(),
        "expanded block sequence"
    );
    Expansion {
        rows: emitter.rows,
        issues: emitter.issues,
    }
}

/// Thickness and medium after a block's last surface.
struct Tail {
    thickness: Value,
    material: Value,
    optimize_t: OptimizeMode,
    optimize_material: OptimizeMode,
}

impl Tail {
    /// A following Gap wins, then the owner's `backThickness`, then 0 in air.
    fn after(
        owner: &Block,
        spec: &BlockSpec,
        gap: Option<(&Block, &super::schema::GapParams)>,
    ) -> Self {
        match (gap, spec.back_thickness()) {
            (Some((block, p)), _) => Self {
                thickness: p.thickness.clone(),
                material: p.material.clone(),
                optimize_t: block.optimize_mode("thickness"),
                optimize_material: block.optimize_mode("material"),
            },
            (None, Some(back)) => Self {
                thickness: back.clone(),
                material: Value::Text(AIR.to_string()),
                optimize_t: owner.optimize_mode(BACK_THICKNESS),
                optimize_material: OptimizeMode::F,
            },
            (None, None) => Self {
                thickness: Value::Number(0.0),
                material: Value::Text(AIR.to_string()),
                optimize_t: OptimizeMode::F,
                optimize_material: OptimizeMode::F,
            },
        }
    }

    fn apply(&self, row: &mut SurfaceRow) {
        row.thickness = self.thickness.clone();
        row.material = self.material.clone();
        row.optimize_t = self.optimize_t;
        row.optimize_material = self.optimize_material;
    }
}

struct RowEmitter {
    rows: Vec<SurfaceRow>,
    issues: Vec<Issue>,
}

impl RowEmitter {
    fn row(&self, block: &Block, role: SurfaceRole) -> SurfaceRow {
        let mut row = SurfaceRow::blank(self.rows.len() + 1);
        row.provenance = Provenance::new(&block.block_id, block.block_type, role);
        row
    }

    fn push(&mut self, row: SurfaceRow) {
        self.rows.push(row);
    }

    /// Resolves surface type and polynomial terms.
    fn profile(&mut self, row: &mut SurfaceRow, block: &Block, surface: &SurfaceParams) {
        row.radius = surface.radius.clone();
        row.conic = surface.conic.clone();

        let surf_type = match surface.surf_type {
            Some(t) => t,
            None if surface.has_profile_terms() => {
                let message = format!(
                    "{} surface has conic/coefficients but no type; using {}",
                    surface.role,
                    SurfaceType::AsphericEven
                );
                warn!(block = %block.block_id, "{message}");
                self.issues.push(
                    Issue::warning(Phase::Expand, Some(block.block_id.as_str()), message)
                        .at_surface(row.surface_number()),
                );
                SurfaceType::AsphericEven
            }
            None => SurfaceType::Spherical,
        };
        row.surf_type = surf_type;

        row.coefs = if surf_type.is_aspheric() {
            surface.coefs.clone()
        } else {
            std::array::from_fn::<Value, COEF_COUNT, _>(|_| Value::Auto)
        };
    }
}

fn radius_param(block_type: BlockType, role: SurfaceRole) -> String {
    super::schema::surface_param_name(block_type, role, "Radius").unwrap_or_default()
}

fn element_names(block_type: BlockType, role: SurfaceRole) -> (String, String) {
    let name = |field| super::schema::element_param_name(block_type, role, field).unwrap_or_default();
    (name("thickness"), name("material"))
}
