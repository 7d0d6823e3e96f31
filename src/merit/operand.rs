use crate::optics::paraxial::PrimaryMetric;
use crate::optics::seidel::SeidelTerm;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Operand identifiers as they appear in the merit editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
pub enum OperandKind {
    #[strum(serialize = "FL")]
    Fl,
    #[strum(serialize = "EFL")]
    Efl,
    #[strum(serialize = "BFL")]
    Bfl,
    #[strum(serialize = "IMD")]
    Imd,
    #[strum(serialize = "OBJD")]
    Objd,
    #[strum(serialize = "TSL")]
    Tsl,
    #[strum(serialize = "BEXP")]
    Bexp,
    #[strum(serialize = "EXPD")]
    Expd,
    #[strum(serialize = "EXPP")]
    Expp,
    #[strum(serialize = "ENPD")]
    Enpd,
    #[strum(serialize = "ENPP")]
    Enpp,
    #[strum(serialize = "ENPM")]
    Enpm,
    #[strum(serialize = "PMAG")]
    Pmag,
    #[strum(serialize = "FNO_OBJ")]
    FnoObj,
    #[strum(serialize = "FNO_IMG")]
    FnoImg,
    #[strum(serialize = "FNO_WRK")]
    FnoWrk,
    #[strum(serialize = "NA_OBJ")]
    NaObj,
    #[strum(serialize = "NA_IMG")]
    NaImg,
    #[strum(serialize = "EFFL")]
    Effl,
    #[strum(serialize = "TOT3_SPH")]
    Tot3Sph,
    #[strum(serialize = "TOT3_COMA")]
    Tot3Coma,
    #[strum(serialize = "TOT3_ASTI")]
    Tot3Asti,
    #[strum(serialize = "TOT3_FCUR")]
    Tot3Fcur,
    #[strum(serialize = "TOT3_DIST")]
    Tot3Dist,
    #[strum(serialize = "TOT_LCA")]
    TotLca,
    #[strum(serialize = "TOT_TCA")]
    TotTca,
    #[strum(serialize = "SPOT_SIZE_ANNULAR")]
    SpotSizeAnnular,
    #[strum(serialize = "SPOT_SIZE_RECT")]
    SpotSizeRect,
    #[strum(serialize = "SPOT_SIZE_CURRENT")]
    SpotSizeCurrent,
    #[strum(serialize = "LA_RMS_UM")]
    LaRmsUm,
    #[strum(serialize = "ZERN_COEFF")]
    ZernCoeff,
    #[strum(serialize = "CLRH")]
    Clrh,
    // Kept so old merit files still load; always 0.
    #[strum(serialize = "REAY")]
    Reay,
    #[strum(serialize = "RSCE")]
    Rsce,
    #[strum(serialize = "TRAC")]
    Trac,
    #[strum(serialize = "DIST")]
    Dist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotVariant {
    Annular,
    Rect,
    Current,
}

/// Which kernel evaluates an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandFamily {
    Primary(PrimaryMetric),
    Effl,
    Seidel(SeidelTerm),
    Spot(SpotVariant),
    LongitudinalRms,
    Zernike,
    Clearance,
    Deprecated,
}

impl OperandKind {
    pub fn parse(id: &str) -> Option<Self> {
        id.trim().to_ascii_uppercase().parse().ok()
    }

    pub fn family(self) -> OperandFamily {
        use OperandKind::*;
        match self {
            Fl => OperandFamily::Primary(PrimaryMetric::Fl),
            Efl => OperandFamily::Primary(PrimaryMetric::Efl),
            Bfl => OperandFamily::Primary(PrimaryMetric::Bfl),
            Imd => OperandFamily::Primary(PrimaryMetric::Imd),
            Objd => OperandFamily::Primary(PrimaryMetric::Objd),
            Tsl => OperandFamily::Primary(PrimaryMetric::Tsl),
            Bexp => OperandFamily::Primary(PrimaryMetric::Bexp),
            Expd => OperandFamily::Primary(PrimaryMetric::Expd),
            Expp => OperandFamily::Primary(PrimaryMetric::Expp),
            Enpd => OperandFamily::Primary(PrimaryMetric::Enpd),
            Enpp => OperandFamily::Primary(PrimaryMetric::Enpp),
            Enpm => OperandFamily::Primary(PrimaryMetric::Enpm),
            Pmag => OperandFamily::Primary(PrimaryMetric::Pmag),
            FnoObj => OperandFamily::Primary(PrimaryMetric::FnoObj),
            FnoImg => OperandFamily::Primary(PrimaryMetric::FnoImg),
            FnoWrk => OperandFamily::Primary(PrimaryMetric::FnoWrk),
            NaObj => OperandFamily::Primary(PrimaryMetric::NaObj),
            NaImg => OperandFamily::Primary(PrimaryMetric::NaImg),
            Effl => OperandFamily::Effl,
            Tot3Sph => OperandFamily::Seidel(SeidelTerm::Sph),
            Tot3Coma => OperandFamily::Seidel(SeidelTerm::Coma),
            Tot3Asti => OperandFamily::Seidel(SeidelTerm::Asti),
            Tot3Fcur => OperandFamily::Seidel(SeidelTerm::Fcur),
            Tot3Dist => OperandFamily::Seidel(SeidelTerm::Dist),
            TotLca => OperandFamily::Seidel(SeidelTerm::Lca),
            TotTca => OperandFamily::Seidel(SeidelTerm::Tca),
            SpotSizeAnnular => OperandFamily::Spot(SpotVariant::Annular),
            SpotSizeRect => OperandFamily::Spot(SpotVariant::Rect),
            SpotSizeCurrent => OperandFamily::Spot(SpotVariant::Current),
            LaRmsUm => OperandFamily::LongitudinalRms,
            ZernCoeff => OperandFamily::Zernike,
            Clrh => OperandFamily::Clearance,
            Reay | Rsce | Trac | Dist => OperandFamily::Deprecated,
        }
    }

    pub fn is_deprecated(self) -> bool {
        self.family() == OperandFamily::Deprecated
    }

    /// One-line meaning for reports.
    pub fn describe(self) -> &'static str {
        match self.family() {
            OperandFamily::Primary(_) => "paraxial first-order",
            OperandFamily::Effl => "subsystem focal length",
            OperandFamily::Seidel(SeidelTerm::Lca | SeidelTerm::Tca) => "chromatic total",
            OperandFamily::Seidel(_) => "third-order total",
            OperandFamily::Spot(_) => "geometric spot (µm)",
            OperandFamily::LongitudinalRms => "longitudinal aberration (µm)",
            OperandFamily::Zernike => "wavefront term",
            OperandFamily::Clearance => "aperture clearance",
            OperandFamily::Deprecated => "deprecated",
        }
    }
}
