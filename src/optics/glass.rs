use crate::consts::{C_LINE_UM, D_LINE_UM, F_LINE_UM};
use crate::error::{EvalFault, EvalResult, LensForgeError, LfResult};
use crate::value::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Three-term Sellmeier dispersion, wavelengths in µm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sellmeier {
    pub b: [f64; 3],
    pub c: [f64; 3],
}

impl Sellmeier {
    pub fn index(&self, wavelength_um: f64) -> f64 {
        let l2 = wavelength_um * wavelength_um;
        let n2 = 1.0
            + self
                .b
                .iter()
                .zip(&self.c)
                .map(|(b, c)| b * l2 / (l2 - c))
                .sum::<f64>();
        n2.sqrt()
    }
}

/// Dispersion of a glass known only by `nd` and `vd`: a two-term Cauchy
/// curve through `nd` with `nF - nC = (nd - 1) / vd`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Abbe {
    pub nd: f64,
    pub vd: f64,
}

impl Abbe {
    pub fn index(&self, wavelength_um: f64) -> f64 {
        let inv2 = |l: f64| 1.0 / (l * l);
        let b = (self.nd - 1.0) / self.vd / (inv2(F_LINE_UM) - inv2(C_LINE_UM));
        let a = self.nd - b * inv2(D_LINE_UM);
        a + b * inv2(wavelength_um)
    }

    /// `1.5168/64.17` or `1.5168:64.17`.
    pub fn parse(text: &str) -> Option<Self> {
        let (nd, vd) = text.split_once(['/', ':'])?;
        let nd: f64 = nd.trim().parse().ok()?;
        let vd: f64 = vd.trim().parse().ok()?;
        (nd.is_finite() && nd > 1.0 && vd.is_finite() && vd > 0.0).then_some(Self { nd, vd })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dispersion {
    Sellmeier(Sellmeier),
    Abbe(Abbe),
}

impl Dispersion {
    pub fn index(&self, wavelength_um: f64) -> f64 {
        match self {
            Dispersion::Sellmeier(g) => g.index(wavelength_um),
            Dispersion::Abbe(g) => g.index(wavelength_um),
        }
    }
}

const fn glass(b: [f64; 3], c: [f64; 3]) -> Sellmeier {
    Sellmeier { b, c }
}

/// Schott and common crystal data. Names are matched after stripping
/// punctuation, so `NBK7`, `n-bk7` and `N_BK7` are the same glass.
static CATALOG: &[(&str, Sellmeier)] = &[
    (
        "NBK7",
        glass(
            [1.03961212, 0.231792344, 1.01046945],
            [0.00600069867, 0.0200179144, 103.560653],
        ),
    ),
    (
        "NSF11",
        glass(
            [1.73759695, 0.313747346, 1.89878101],
            [0.013188707, 0.0623068142, 155.23629],
        ),
    ),
    (
        "F2",
        glass(
            [1.34533359, 0.209073176, 0.937357162],
            [0.00997743871, 0.0470450767, 111.886764],
        ),
    ),
    (
        "NSF5",
        glass(
            [1.52481889, 0.187085527, 1.42729015],
            [0.011254756, 0.0588995392, 129.141675],
        ),
    ),
    (
        "NSF6",
        glass(
            [1.77931763, 0.338149866, 2.08734474],
            [0.0133714182, 0.0617533621, 174.01759],
        ),
    ),
    (
        "NSK16",
        glass(
            [1.34317774, 0.241144399, 0.994317969],
            [0.00704687339, 0.0229005, 92.7508526],
        ),
    ),
    (
        "NBAF10",
        glass(
            [1.5851495, 0.143559385, 1.08521269],
            [0.00926681282, 0.0424489805, 105.613573],
        ),
    ),
    (
        "NLAK9",
        glass(
            [1.46231905, 0.344399589, 1.15508372],
            [0.00724270156, 0.0243353131, 85.4686868],
        ),
    ),
    (
        "FUSEDSILICA",
        glass(
            [0.6961663, 0.4079426, 0.8974794],
            [0.004679148, 0.01351206, 97.934],
        ),
    ),
    (
        "CAF2",
        glass(
            [0.5675888, 0.4710914, 3.8484723],
            [0.00252643, 0.01007833, 1200.5560],
        ),
    ),
];

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

pub fn lookup(name: &str) -> Option<&'static Sellmeier> {
    let key = normalize_name(name);
    let key = match key.as_str() {
        "BK7" => "NBK7".to_string(),
        "SILICA" | "FUSEDSILICA" | "SIO2" => "FUSEDSILICA".to_string(),
        _ => key,
    };
    CATALOG.iter().find(|(n, _)| *n == key).map(|(_, g)| g)
}

pub fn is_air(name: &str) -> bool {
    let key = normalize_name(name);
    key == "AIR" || key == "VACUUM"
}

/// Glasses loaded from AGF files. Lookups fall through to the built-in
/// table, then to an `nd/vd` pair written in the material cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlassCatalog {
    glasses: HashMap<String, Dispersion>,
}

impl GlassCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.glasses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glasses.is_empty()
    }

    pub fn insert(&mut self, name: &str, dispersion: Dispersion) {
        self.glasses.insert(normalize_name(name), dispersion);
    }

    /// Merges another catalog; its entries win.
    pub fn extend(&mut self, other: GlassCatalog) {
        self.glasses.extend(other.glasses);
    }

    pub fn get(&self, name: &str) -> Option<Dispersion> {
        self.glasses
            .get(&normalize_name(name))
            .copied()
            .or_else(|| lookup(name).copied().map(Dispersion::Sellmeier))
            .or_else(|| Abbe::parse(name).map(Dispersion::Abbe))
    }

    pub fn load_agf<P: AsRef<Path>>(path: P) -> LfResult<Self> {
        let bytes = fs::read(path.as_ref())?;
        let catalog = Self::parse_agf(&String::from_utf8_lossy(&bytes))?;
        debug!(path = %path.as_ref().display(), glasses = catalog.len(), "loaded AGF catalog");
        Ok(catalog)
    }

    /// Reads Zemax AGF text. `NM` opens a glass (name, formula, MIL, nd, vd);
    /// a following `CD` line with formula 2 gives Sellmeier K1 L1 K2 L2 K3 L3.
    /// A glass without usable Sellmeier terms keeps its nd/vd.
    pub fn parse_agf(text: &str) -> LfResult<Self> {
        let mut catalog = Self::new();
        let mut pending: Option<AgfEntry> = None;

        for (lineno, line) in text.lines().enumerate() {
            let mut parts = line.split_whitespace();
            match parts.next() {
                Some("NM") => {
                    if let Some(entry) = pending.take() {
                        entry.commit(&mut catalog);
                    }
                    let fields: Vec<&str> = parts.collect();
                    pending = AgfEntry::from_nm(&fields);
                    if pending.is_none() {
                        warn!(line = lineno + 1, "skipping malformed AGF NM line");
                    }
                }
                Some("CD") => {
                    if let Some(entry) = pending.as_mut() {
                        let coefs: Vec<f64> = parts.filter_map(|p| p.parse().ok()).collect();
                        entry.cd = Some(coefs);
                    }
                }
                _ => {}
            }
        }
        if let Some(entry) = pending.take() {
            entry.commit(&mut catalog);
        }

        if catalog.is_empty() {
            return Err(LensForgeError::Validation(
                "AGF text holds no usable glass".to_string(),
            ));
        }
        Ok(catalog)
    }

    /// Refractive index of a material cell. Blank means air.
    pub fn refractive_index(&self, material: &Value, wavelength_um: f64) -> EvalResult<f64> {
        match material {
            Value::Auto => Ok(1.0),
            Value::Number(n) if n.is_finite() && *n > 0.0 => Ok(*n),
            Value::Text(name) if is_air(name) => Ok(1.0),
            Value::Text(name) => self
                .get(name)
                .map(|g| g.index(wavelength_um))
                .filter(|n| n.is_finite() && *n > 0.0)
                .ok_or_else(|| EvalFault::invalid_input(format!("unknown glass '{name}'"))),
            other => Err(EvalFault::invalid_input(format!(
                "material '{other}' is not a medium"
            ))),
        }
    }
}

struct AgfEntry {
    name: String,
    formula: Option<u32>,
    abbe: Option<Abbe>,
    cd: Option<Vec<f64>>,
}

impl AgfEntry {
    fn from_nm(fields: &[&str]) -> Option<Self> {
        let name = fields.first()?.to_string();
        let num = |i: usize| fields.get(i).and_then(|f| f.parse::<f64>().ok());
        let abbe = match (num(3), num(4)) {
            (Some(nd), Some(vd)) if nd > 1.0 && vd > 0.0 => Some(Abbe { nd, vd }),
            _ => None,
        };
        Some(Self {
            name,
            formula: fields.get(1).and_then(|f| f.parse::<f64>().ok()).map(|f| f as u32),
            abbe,
            cd: None,
        })
    }

    fn commit(self, catalog: &mut GlassCatalog) {
        let sellmeier = match (self.formula, self.cd.as_deref()) {
            (Some(2), Some([k1, l1, k2, l2, k3, l3, ..])) => Some(Sellmeier {
                b: [*k1, *k2, *k3],
                c: [*l1, *l2, *l3],
            }),
            _ => None,
        };
        match (sellmeier, self.abbe) {
            (Some(g), _) => catalog.insert(&self.name, Dispersion::Sellmeier(g)),
            (None, Some(a)) => catalog.insert(&self.name, Dispersion::Abbe(a)),
            (None, None) => warn!(glass = %self.name, "AGF glass has neither Sellmeier terms nor nd/vd"),
        }
    }
}

/// Refractive index from the built-in catalog only.
pub fn refractive_index(material: &Value, wavelength_um: f64) -> EvalResult<f64> {
    GlassCatalog::new().refractive_index(material, wavelength_um)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::D_LINE_UM;

    #[test]
    fn test_nbk7_d_line() {
        let n = refractive_index(&Value::Text("N-BK7".into()), D_LINE_UM).unwrap();
        assert!((n - 1.5168).abs() < 1e-4, "n = {n}");
    }

    #[test]
    fn test_dispersion_is_normal() {
        let g = lookup("n_bk7").unwrap();
        assert!(g.index(0.4861327) > g.index(0.6562725));
    }

    #[test]
    fn test_air_and_numeric() {
        assert_eq!(refractive_index(&Value::Auto, 0.5).unwrap(), 1.0);
        assert_eq!(refractive_index(&Value::Text("air".into()), 0.5).unwrap(), 1.0);
        assert_eq!(refractive_index(&Value::Number(1.6), 0.5).unwrap(), 1.6);
        assert!(refractive_index(&Value::Text("UNOBTAINIUM".into()), 0.5).is_err());
    }

    const AGF: &str = "\
CC Test catalog
NM N-BK7 2 517642.251 1.5168 64.17 0 1 0
ED 7.1 -30 70 2.51 0
CD 1.03961212 0.00600069867 0.231792344 0.0200179144 1.01046945 103.560653 0 0 0 0
LD 0.3 2.5
NM OLD-CROWN 1 0 1.5230 58.6 0 0 0
CD 2.27 -0.0101 0.0106 0.000222 0 0
NM BROKEN 2 0 x y
";

    #[test]
    fn test_agf_sellmeier_and_abbe_entries() {
        let catalog = GlassCatalog::parse_agf(AGF).unwrap();
        assert_eq!(catalog.len(), 2);

        let nbk7 = catalog.refractive_index(&Value::Text("n-bk7".into()), D_LINE_UM).unwrap();
        let builtin = refractive_index(&Value::Text("N-BK7".into()), D_LINE_UM).unwrap();
        assert!((nbk7 - builtin).abs() < 1e-12);

        // Formula 1 is not Sellmeier, so the glass falls back to nd/vd.
        let Some(Dispersion::Abbe(crown)) = catalog.get("OLD-CROWN") else {
            panic!("expected an nd/vd glass");
        };
        assert_eq!(crown.nd, 1.5230);
        assert!(catalog.get("BROKEN").is_none());
    }

    #[test]
    fn test_abbe_model_hits_nd_and_vd() {
        let g = Abbe { nd: 1.62, vd: 36.4 };
        assert!((g.index(D_LINE_UM) - 1.62).abs() < 1e-12);
        let vd = (g.index(D_LINE_UM) - 1.0) / (g.index(F_LINE_UM) - g.index(C_LINE_UM));
        assert!((vd - 36.4).abs() < 1e-9);
    }

    #[test]
    fn test_nd_vd_material_text() {
        let n = refractive_index(&Value::Text("1.5168/64.17".into()), D_LINE_UM).unwrap();
        assert!((n - 1.5168).abs() < 1e-12);
        let blue = refractive_index(&Value::Text("1.5168:64.17".into()), F_LINE_UM).unwrap();
        assert!(blue > n);
        assert!(refractive_index(&Value::Text("0.9/50".into()), D_LINE_UM).is_err());
    }

    #[test]
    fn test_loaded_glass_overrides_builtin() {
        let mut catalog = GlassCatalog::new();
        catalog.insert("F2", Dispersion::Abbe(Abbe { nd: 1.7, vd: 30.0 }));
        let n = catalog.refractive_index(&Value::Text("F2".into()), D_LINE_UM).unwrap();
        assert!((n - 1.7).abs() < 1e-12);
        assert!(GlassCatalog::parse_agf("CC nothing here\n").is_err());
    }

    #[test]
    fn test_load_agf_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.agf");
        std::fs::write(&path, AGF).unwrap();
        let catalog = GlassCatalog::load_agf(&path).unwrap();
        assert!(catalog.get("N-BK7").is_some());
        assert!(GlassCatalog::load_agf(dir.path().join("missing.agf")).is_err());
    }
}
