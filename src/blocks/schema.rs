use super::validate::{Issue, Phase};
use super::{Block, BlockType};
use crate::consts::{AIR, COEF_COUNT, DEFAULT_STOP_SEMIDIA};
use crate::surface::{SurfaceRole, SurfaceType};
use crate::value::Value;
use tracing::warn;

/// Profile of one refracting surface inside a lens group.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceParams {
    pub role: SurfaceRole,
    pub radius: Value,
    /// `None` when the block leaves the type blank.
    pub surf_type: Option<SurfaceType>,
    pub conic: Value,
    pub coefs: [Value; COEF_COUNT],
}

impl SurfaceParams {
    pub fn has_profile_terms(&self) -> bool {
        self.conic.is_nonzero() || self.coefs.iter().any(Value::is_nonzero)
    }
}

/// Glass between two consecutive surfaces of a group.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementParams {
    pub thickness: Value,
    pub material: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPlaneParams {
    pub object_distance: Value,
    pub material: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopParams {
    pub semi_diameter: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LensParams {
    pub front: SurfaceParams,
    pub back: SurfaceParams,
    pub element: ElementParams,
    /// Air after the back surface when no Gap follows.
    pub back_thickness: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CementedParams {
    pub surfaces: Vec<SurfaceParams>,
    pub elements: Vec<ElementParams>,
    pub back_thickness: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GapParams {
    pub thickness: Value,
    pub material: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlaneParams {
    pub radius: Value,
}

/// Typed view of a block, one record per block type.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockSpec {
    ObjectPlane(ObjectPlaneParams),
    Stop(StopParams),
    Lens(LensParams),
    Doublet(CementedParams),
    Triplet(CementedParams),
    Gap(GapParams),
    ImagePlane(ImagePlaneParams),
}

impl BlockSpec {
    /// Reads the block's loose parameters. Problems are appended to `issues`;
    /// the returned spec is only meaningful when none of them is fatal.
    pub fn parse(block: &Block, issues: &mut Vec<Issue>) -> BlockSpec {
        let mut reader = ParamReader { block, issues };
        match block.block_type {
            BlockType::ObjectPlane => BlockSpec::ObjectPlane(ObjectPlaneParams {
                object_distance: reader.distance("objectDistance"),
                material: reader.material("material"),
            }),
            BlockType::Stop => BlockSpec::Stop(StopParams {
                semi_diameter: reader.semi_diameter("semiDiameter"),
            }),
            BlockType::Lens => BlockSpec::Lens(LensParams {
                front: reader.surface(SurfaceRole::Front),
                back: reader.surface(SurfaceRole::Back),
                element: ElementParams {
                    thickness: reader.thickness("centerThickness"),
                    material: reader.material("material"),
                },
                back_thickness: reader.optional_thickness(BACK_THICKNESS),
            }),
            BlockType::Doublet => BlockSpec::Doublet(reader.cemented(2)),
            BlockType::Triplet => BlockSpec::Triplet(reader.cemented(3)),
            BlockType::Gap => BlockSpec::Gap(GapParams {
                thickness: reader.thickness("thickness"),
                material: reader.material("material"),
            }),
            BlockType::ImagePlane => BlockSpec::ImagePlane(ImagePlaneParams {
                radius: reader.radius("radius"),
            }),
        }
    }

    /// Surfaces in emission order, each paired with the element that follows
    /// it (`None` after the last surface).
    pub fn lens_surfaces(&self) -> Vec<(&SurfaceParams, Option<&ElementParams>)> {
        match self {
            BlockSpec::Lens(p) => vec![(&p.front, Some(&p.element)), (&p.back, None)],
            BlockSpec::Doublet(p) | BlockSpec::Triplet(p) => p
                .surfaces
                .iter()
                .enumerate()
                .map(|(i, s)| (s, p.elements.get(i)))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The block's own `backThickness`, for lens groups that set one.
    pub fn back_thickness(&self) -> Option<&Value> {
        match self {
            BlockSpec::Lens(p) => p.back_thickness.as_ref(),
            BlockSpec::Doublet(p) | BlockSpec::Triplet(p) => p.back_thickness.as_ref(),
            _ => None,
        }
    }
}

/// Lens-group parameter giving the thickness after the last surface.
pub const BACK_THICKNESS: &str = "backThickness";

/// Name of a per-surface parameter such as `frontConic` or `surf2Coef4`.
/// `suffix` is one of `Radius`, `SurfType`, `Conic`, `CoefK`.
pub fn surface_param_name(block_type: BlockType, role: SurfaceRole, suffix: &str) -> Option<String> {
    match (block_type, role) {
        (BlockType::Lens, SurfaceRole::Front) => Some(format!("front{suffix}")),
        (BlockType::Lens, SurfaceRole::Back) => Some(format!("back{suffix}")),
        (BlockType::Doublet | BlockType::Triplet, SurfaceRole::Element(n))
            if (n as usize) <= block_type.surface_count() =>
        {
            if suffix == "Radius" {
                Some(format!("radius{n}"))
            } else {
                Some(format!("surf{n}{suffix}"))
            }
        }
        _ => None,
    }
}

/// Thickness/material parameter of the element behind `role`, if the block
/// owns one. The last surface of a group has none.
pub fn element_param_name(block_type: BlockType, role: SurfaceRole, field: &str) -> Option<String> {
    match (block_type, role) {
        (BlockType::Lens, SurfaceRole::Front) => Some(match field {
            "thickness" => "centerThickness".to_string(),
            other => other.to_string(),
        }),
        (BlockType::Doublet | BlockType::Triplet, SurfaceRole::Element(n))
            if (n as usize) <= block_type.element_count() =>
        {
            Some(format!("{field}{n}"))
        }
        _ => None,
    }
}

struct ParamReader<'a> {
    block: &'a Block,
    issues: &'a mut Vec<Issue>,
}

impl ParamReader<'_> {
    fn id(&self) -> Option<&str> {
        Some(self.block.block_id.as_str())
    }

    fn fatal(&mut self, message: String) {
        let issue = Issue::fatal(Phase::Validate, self.id(), message);
        self.issues.push(issue);
    }

    fn warn(&mut self, message: String) {
        warn!(block = %self.block.block_id, "{message}");
        let issue = Issue::warning(Phase::Validate, self.id(), message);
        self.issues.push(issue);
    }

    fn thickness(&mut self, name: &str) -> Value {
        match self.block.param(name) {
            Value::Auto => Value::Number(0.0),
            Value::Number(v) if v.is_finite() && v >= 0.0 => Value::Number(v),
            Value::Number(v) => {
                self.fatal(format!("{name} must be >= 0 (got {v})"));
                Value::Number(0.0)
            }
            Value::Inf => {
                self.fatal(format!("{name} must be finite"));
                Value::Number(0.0)
            }
            Value::Text(s) => {
                self.fatal(format!("{name} is not a number: '{s}'"));
                Value::Number(0.0)
            }
        }
    }

    /// Blank stays `None`; anything else is checked like a thickness.
    fn optional_thickness(&mut self, name: &str) -> Option<Value> {
        if self.block.param(name).is_auto() {
            None
        } else {
            Some(self.thickness(name))
        }
    }

    fn distance(&mut self, name: &str) -> Value {
        match self.block.param(name) {
            Value::Auto | Value::Inf => Value::Inf,
            Value::Number(v) if v >= 0.0 => Value::Number(v),
            Value::Number(v) => {
                self.fatal(format!("{name} must be >= 0 (got {v})"));
                Value::Inf
            }
            Value::Text(s) => {
                self.fatal(format!("{name} is not a number: '{s}'"));
                Value::Inf
            }
        }
    }

    fn radius(&mut self, name: &str) -> Value {
        match self.block.param(name) {
            Value::Auto | Value::Inf => Value::Inf,
            Value::Number(v) => Value::Number(v),
            Value::Text(s) => {
                self.fatal(format!("{name} is not a number: '{s}'"));
                Value::Inf
            }
        }
    }

    fn coefficient(&mut self, name: &str) -> Value {
        match self.block.param(name) {
            Value::Auto => Value::Auto,
            Value::Number(v) => Value::Number(v),
            other => {
                self.fatal(format!("{name} must be numeric (got '{other}')"));
                Value::Auto
            }
        }
    }

    fn material(&mut self, name: &str) -> Value {
        match self.block.param(name) {
            Value::Auto => Value::Text(AIR.to_string()),
            Value::Number(n) => {
                self.warn(format!("{name} holds a numeric refractive index ({n})"));
                Value::Number(n)
            }
            Value::Inf => {
                self.fatal(format!("{name} cannot be INF"));
                Value::Text(AIR.to_string())
            }
            Value::Text(s) => Value::Text(s),
        }
    }

    fn semi_diameter(&mut self, name: &str) -> f64 {
        match self.block.param(name) {
            Value::Auto => DEFAULT_STOP_SEMIDIA,
            Value::Number(v) if v > 0.0 => v,
            other => {
                self.fatal(format!("{name} must be > 0 (got '{other}')"));
                DEFAULT_STOP_SEMIDIA
            }
        }
    }

    fn surf_type(&mut self, name: &str) -> Option<SurfaceType> {
        match SurfaceType::from_value(&self.block.param(name))? {
            Ok(t) => Some(t),
            Err(raw) => {
                self.warn(format!("{name} has unknown surface type '{raw}', treated as blank"));
                None
            }
        }
    }

    fn surface(&mut self, role: SurfaceRole) -> SurfaceParams {
        let bt = self.block.block_type;
        let name = |suffix: &str| surface_param_name(bt, role, suffix).unwrap_or_default();
        let mut coefs: [Value; COEF_COUNT] = Default::default();
        for (k, slot) in coefs.iter_mut().enumerate() {
            *slot = self.coefficient(&name(&format!("Coef{}", k + 1)));
        }
        SurfaceParams {
            role,
            radius: self.radius(&name("Radius")),
            surf_type: self.surf_type(&name("SurfType")),
            conic: self.coefficient(&name("Conic")),
            coefs,
        }
    }

    fn cemented(&mut self, elements: usize) -> CementedParams {
        let surfaces = (1..=elements + 1)
            .map(|n| self.surface(SurfaceRole::Element(n as u8)))
            .collect();
        let elements = (1..=elements)
            .map(|n| ElementParams {
                thickness: self.thickness(&format!("thickness{n}")),
                material: self.material(&format!("material{n}")),
            })
            .collect();
        CementedParams {
            surfaces,
            elements,
            back_thickness: self.optional_thickness(BACK_THICKNESS),
        }
    }
}
