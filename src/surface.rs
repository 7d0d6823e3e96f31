use crate::blocks::BlockType;
use crate::consts::COEF_COUNT;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum SurfaceType {
    #[default]
    #[serde(rename = "Spherical")]
    #[strum(to_string = "Spherical", serialize = "Standard")]
    Spherical,
    #[serde(rename = "Aspheric even")]
    #[strum(to_string = "Aspheric even", serialize = "Even asphere")]
    AsphericEven,
    #[serde(rename = "Aspheric odd")]
    #[strum(to_string = "Aspheric odd", serialize = "Odd asphere")]
    AsphericOdd,
    #[serde(rename = "Coordinate transform", alias = "Coordinate break")]
    #[strum(to_string = "Coordinate transform", serialize = "Coordinate break")]
    CoordinateTransform,
    Stop,
    Image,
}

impl SurfaceType {
    pub fn is_aspheric(self) -> bool {
        matches!(self, SurfaceType::AsphericEven | SurfaceType::AsphericOdd)
    }

    pub fn is_coordinate_transform(self) -> bool {
        self == SurfaceType::CoordinateTransform
    }

    /// Accepts editor text; `None` for blank.
    pub fn from_value(value: &Value) -> Option<Result<Self, String>> {
        match value {
            Value::Auto => None,
            Value::Text(s) => Some(s.trim().parse().map_err(|_| s.clone())),
            other => Some(Err(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
pub enum OptimizeMode {
    #[default]
    F,
    V,
}

impl OptimizeMode {
    pub fn parse(value: &Value) -> Option<Self> {
        match value.as_text().map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("v") => Some(OptimizeMode::V),
            Some(s) if s.eq_ignore_ascii_case("f") => Some(OptimizeMode::F),
            _ => None,
        }
    }

    pub fn is_variable(self) -> bool {
        self == OptimizeMode::V
    }
}

/// Which surface of its block a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SurfaceRole {
    Object,
    Stop,
    Gap,
    Image,
    Front,
    Back,
    /// `s1`..`sN` on cemented groups.
    Element(u8),
}

impl SurfaceRole {
    pub fn element_number(self) -> Option<usize> {
        match self {
            SurfaceRole::Element(n) => Some(n as usize),
            _ => None,
        }
    }
}

impl fmt::Display for SurfaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceRole::Object => f.write_str("object"),
            SurfaceRole::Stop => f.write_str("stop"),
            SurfaceRole::Gap => f.write_str("gap"),
            SurfaceRole::Image => f.write_str("image"),
            SurfaceRole::Front => f.write_str("front"),
            SurfaceRole::Back => f.write_str("back"),
            SurfaceRole::Element(n) => write!(f, "s{n}"),
        }
    }
}

impl FromStr for SurfaceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "object" => Ok(SurfaceRole::Object),
            "stop" => Ok(SurfaceRole::Stop),
            "gap" => Ok(SurfaceRole::Gap),
            "image" => Ok(SurfaceRole::Image),
            "front" => Ok(SurfaceRole::Front),
            "back" => Ok(SurfaceRole::Back),
            _ => lower
                .strip_prefix('s')
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|n| *n >= 1)
                .map(SurfaceRole::Element)
                .ok_or_else(|| format!("unknown surface role '{s}'")),
        }
    }
}

impl TryFrom<String> for SurfaceRole {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SurfaceRole> for String {
    fn from(role: SurfaceRole) -> Self {
        role.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(rename = "_blockId", default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
    #[serde(rename = "_blockType", default, skip_serializing_if = "Option::is_none")]
    pub block_type: Option<BlockType>,
    #[serde(rename = "_surfaceRole", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<SurfaceRole>,
}

impl Provenance {
    pub fn new(block_id: &str, block_type: BlockType, role: SurfaceRole) -> Self {
        Self {
            block_id: Some(block_id.to_string()),
            block_type: Some(block_type),
            role: Some(role),
        }
    }

    pub fn matches(&self, block_id: &str, role: SurfaceRole) -> bool {
        self.block_id.as_deref() == Some(block_id) && self.role == Some(role)
    }
}

/// One expanded sequential surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceRow {
    pub id: usize,
    #[serde(default)]
    pub surf_type: SurfaceType,
    #[serde(default)]
    pub radius: Value,
    #[serde(default)]
    pub thickness: Value,
    #[serde(default)]
    pub material: Value,
    #[serde(default)]
    pub conic: Value,
    /// `coef1`..`coef10` on the wire.
    #[serde(flatten, with = "coef_columns")]
    pub coefs: [Value; COEF_COUNT],
    #[serde(default)]
    pub semidia: Value,
    #[serde(default)]
    pub optimize_r: OptimizeMode,
    #[serde(default)]
    pub optimize_t: OptimizeMode,
    #[serde(default)]
    pub optimize_material: OptimizeMode,
    #[serde(default)]
    pub optimize_semi_dia: OptimizeMode,
    #[serde(flatten)]
    pub provenance: Provenance,
}

mod coef_columns {
    use crate::consts::COEF_COUNT;
    use crate::value::Value;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize, Default)]
    #[serde(default)]
    struct Columns {
        coef1: Value,
        coef2: Value,
        coef3: Value,
        coef4: Value,
        coef5: Value,
        coef6: Value,
        coef7: Value,
        coef8: Value,
        coef9: Value,
        coef10: Value,
    }

    pub fn serialize<S: Serializer>(
        coefs: &[Value; COEF_COUNT],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let [coef1, coef2, coef3, coef4, coef5, coef6, coef7, coef8, coef9, coef10] =
            coefs.clone();
        Columns {
            coef1,
            coef2,
            coef3,
            coef4,
            coef5,
            coef6,
            coef7,
            coef8,
            coef9,
            coef10,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[Value; COEF_COUNT], D::Error> {
        let c = Columns::deserialize(deserializer)?;
        Ok([
            c.coef1, c.coef2, c.coef3, c.coef4, c.coef5, c.coef6, c.coef7, c.coef8, c.coef9,
            c.coef10,
        ])
    }
}

impl SurfaceRow {
    pub fn blank(id: usize) -> Self {
        Self {
            id,
            surf_type: SurfaceType::Spherical,
            radius: Value::Inf,
            thickness: Value::Number(0.0),
            material: Value::Auto,
            conic: Value::Auto,
            coefs: Default::default(),
            semidia: Value::Auto,
            optimize_r: OptimizeMode::F,
            optimize_t: OptimizeMode::F,
            optimize_material: OptimizeMode::F,
            optimize_semi_dia: OptimizeMode::F,
            provenance: Provenance::default(),
        }
    }

    /// Surface number; 0 is the object.
    pub fn surface_number(&self) -> usize {
        self.id.saturating_sub(1)
    }

    pub fn role(&self) -> Option<SurfaceRole> {
        self.provenance.role
    }

    pub fn is_object(&self) -> bool {
        self.role() == Some(SurfaceRole::Object) || self.id == 1
    }

    pub fn is_image(&self) -> bool {
        self.surf_type == SurfaceType::Image || self.role() == Some(SurfaceRole::Image)
    }

    pub fn get(&self, field: SurfaceField) -> Value {
        match field {
            SurfaceField::Radius => self.radius.clone(),
            SurfaceField::Thickness => self.thickness.clone(),
            SurfaceField::Material => self.material.clone(),
            SurfaceField::SurfType => Value::Text(self.surf_type.to_string()),
            SurfaceField::Conic => self.conic.clone(),
            SurfaceField::Coef(k) => self
                .coefs
                .get((k as usize).wrapping_sub(1))
                .cloned()
                .unwrap_or_default(),
            SurfaceField::SemiDia => self.semidia.clone(),
            SurfaceField::OptimizeR => Value::Text(self.optimize_r.to_string()),
            SurfaceField::OptimizeT => Value::Text(self.optimize_t.to_string()),
            SurfaceField::OptimizeMaterial => Value::Text(self.optimize_material.to_string()),
            SurfaceField::OptimizeSemiDia => Value::Text(self.optimize_semi_dia.to_string()),
        }
    }
}

/// Editable columns of a surface row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceField {
    Radius,
    Thickness,
    Material,
    SurfType,
    Conic,
    /// 1-based polynomial coefficient.
    Coef(u8),
    SemiDia,
    OptimizeR,
    OptimizeT,
    OptimizeMaterial,
    OptimizeSemiDia,
}

impl SurfaceField {
    pub fn is_optimize_flag(self) -> bool {
        matches!(
            self,
            SurfaceField::OptimizeR
                | SurfaceField::OptimizeT
                | SurfaceField::OptimizeMaterial
                | SurfaceField::OptimizeSemiDia
        )
    }

    /// The value column an optimize flag governs.
    pub fn governed_field(self) -> SurfaceField {
        match self {
            SurfaceField::OptimizeR => SurfaceField::Radius,
            SurfaceField::OptimizeT => SurfaceField::Thickness,
            SurfaceField::OptimizeMaterial => SurfaceField::Material,
            SurfaceField::OptimizeSemiDia => SurfaceField::SemiDia,
            other => other,
        }
    }
}

impl fmt::Display for SurfaceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceField::Radius => f.write_str("radius"),
            SurfaceField::Thickness => f.write_str("thickness"),
            SurfaceField::Material => f.write_str("material"),
            SurfaceField::SurfType => f.write_str("surfType"),
            SurfaceField::Conic => f.write_str("conic"),
            SurfaceField::Coef(k) => write!(f, "coef{k}"),
            SurfaceField::SemiDia => f.write_str("semidia"),
            SurfaceField::OptimizeR => f.write_str("optimizeR"),
            SurfaceField::OptimizeT => f.write_str("optimizeT"),
            SurfaceField::OptimizeMaterial => f.write_str("optimizeMaterial"),
            SurfaceField::OptimizeSemiDia => f.write_str("optimizeSemiDia"),
        }
    }
}

impl FromStr for SurfaceField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let field = match lower.as_str() {
            "radius" => SurfaceField::Radius,
            "thickness" => SurfaceField::Thickness,
            "material" => SurfaceField::Material,
            "surftype" => SurfaceField::SurfType,
            "conic" => SurfaceField::Conic,
            "semidia" | "semidiameter" => SurfaceField::SemiDia,
            "optimizer" => SurfaceField::OptimizeR,
            "optimizet" => SurfaceField::OptimizeT,
            "optimizematerial" => SurfaceField::OptimizeMaterial,
            "optimizesemidia" => SurfaceField::OptimizeSemiDia,
            _ => {
                let k = lower
                    .strip_prefix("coef")
                    .and_then(|n| n.parse::<u8>().ok())
                    .filter(|k| (1..=COEF_COUNT as u8).contains(k))
                    .ok_or_else(|| format!("unknown surface field '{s}'"))?;
                SurfaceField::Coef(k)
            }
        };
        Ok(field)
    }
}
