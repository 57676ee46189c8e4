//! Internal unit system and the physical-unit symbol table.
//!
//! The internal system follows the usual high-energy-physics convention:
//! millimetre, nanosecond, MeV and radian are all exactly 1. Configuration
//! values are written as expressions such as `10*keV` or `2.5*cm`; the
//! expression evaluator resolves identifiers through [`UnitTable`], which
//! is a fixed list that cannot be extended at run time.

// Length
/// One millimetre (the internal length unit).
pub const MILLIMETER: f64 = 1.0;
/// One centimetre.
pub const CENTIMETER: f64 = 10.0 * MILLIMETER;
/// One metre.
pub const METER: f64 = 1000.0 * MILLIMETER;
/// One kilometre.
pub const KILOMETER: f64 = 1000.0 * METER;
/// One micrometre.
pub const MICROMETER: f64 = 1e-3 * MILLIMETER;
/// One nanometre.
pub const NANOMETER: f64 = 1e-6 * MILLIMETER;
/// One angstrom.
pub const ANGSTROM: f64 = 1e-7 * MILLIMETER;
/// One fermi.
pub const FERMI: f64 = 1e-12 * MILLIMETER;

// Angle
/// One radian (the internal angle unit).
pub const RADIAN: f64 = 1.0;
/// One milliradian.
pub const MILLIRADIAN: f64 = 1e-3 * RADIAN;
/// One degree.
pub const DEGREE: f64 = core::f64::consts::PI / 180.0 * RADIAN;
/// One steradian.
pub const STERADIAN: f64 = 1.0;

// Time
/// One nanosecond (the internal time unit).
pub const NANOSECOND: f64 = 1.0;
/// One second.
pub const SECOND: f64 = 1e9 * NANOSECOND;
/// One millisecond.
pub const MILLISECOND: f64 = 1e-3 * SECOND;
/// One microsecond.
pub const MICROSECOND: f64 = 1e-6 * SECOND;
/// One picosecond.
pub const PICOSECOND: f64 = 1e-12 * SECOND;

// Energy
/// One MeV (the internal energy unit).
pub const MEV: f64 = 1.0;
/// One electronvolt.
pub const EV: f64 = 1e-6 * MEV;
/// One keV.
pub const KEV: f64 = 1e-3 * MEV;
/// One GeV.
pub const GEV: f64 = 1e3 * MEV;
/// One TeV.
pub const TEV: f64 = 1e6 * MEV;
/// One PeV.
pub const PEV: f64 = 1e9 * MEV;
/// Elementary charge in coulomb.
pub const E_SI: f64 = 1.602_176_634e-19;
/// One joule.
pub const JOULE: f64 = EV / E_SI;

// Electromagnetic
/// One volt (MeV per unit charge).
pub const VOLT: f64 = 1e-6 * MEV;
/// One tesla.
pub const TESLA: f64 = VOLT * SECOND / (METER * METER);
/// One gauss.
pub const GAUSS: f64 = 1e-4 * TESLA;

// Physical constants
/// Speed of light in mm/ns.
pub const C_LIGHT: f64 = 299.792_458 * MILLIMETER / NANOSECOND;
/// Electron rest energy.
pub const ELECTRON_MASS_C2: f64 = 0.510_998_950 * MEV;
/// Proton rest energy.
pub const PROTON_MASS_C2: f64 = 938.272_088_16 * MEV;
/// Planck constant in MeV·ns.
pub const H_PLANCK: f64 = 6.626_070_15e-34 * JOULE * SECOND;

/// Every symbol an expression may reference, with its value in internal units.
const SYMBOLS: &[(&str, f64)] = &[
    ("millimeter", MILLIMETER),
    ("mm", MILLIMETER),
    ("centimeter", CENTIMETER),
    ("cm", CENTIMETER),
    ("meter", METER),
    ("m", METER),
    ("kilometer", KILOMETER),
    ("km", KILOMETER),
    ("micrometer", MICROMETER),
    ("um", MICROMETER),
    ("nanometer", NANOMETER),
    ("nm", NANOMETER),
    ("angstrom", ANGSTROM),
    ("fermi", FERMI),
    ("radian", RADIAN),
    ("rad", RADIAN),
    ("milliradian", MILLIRADIAN),
    ("mrad", MILLIRADIAN),
    ("degree", DEGREE),
    ("deg", DEGREE),
    ("steradian", STERADIAN),
    ("sr", STERADIAN),
    ("nanosecond", NANOSECOND),
    ("ns", NANOSECOND),
    ("second", SECOND),
    ("s", SECOND),
    ("millisecond", MILLISECOND),
    ("ms", MILLISECOND),
    ("microsecond", MICROSECOND),
    ("us", MICROSECOND),
    ("picosecond", PICOSECOND),
    ("ps", PICOSECOND),
    ("megaelectronvolt", MEV),
    ("MeV", MEV),
    ("electronvolt", EV),
    ("eV", EV),
    ("kiloelectronvolt", KEV),
    ("keV", KEV),
    ("gigaelectronvolt", GEV),
    ("GeV", GEV),
    ("teraelectronvolt", TEV),
    ("TeV", TEV),
    ("petaelectronvolt", PEV),
    ("PeV", PEV),
    ("joule", JOULE),
    ("e_SI", E_SI),
    ("volt", VOLT),
    ("tesla", TESLA),
    ("gauss", GAUSS),
    ("c_light", C_LIGHT),
    ("electron_mass_c2", ELECTRON_MASS_C2),
    ("proton_mass_c2", PROTON_MASS_C2),
    ("h_Planck", H_PLANCK),
    ("pi", core::f64::consts::PI),
    ("twopi", core::f64::consts::TAU),
    ("halfpi", core::f64::consts::FRAC_PI_2),
];

/// Read-only lookup over the fixed physical-unit symbol table.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitTable;

impl UnitTable {
    /// Create a handle to the unit table.
    pub const fn new() -> Self {
        Self
    }

    /// Resolve a symbol to its value in internal units.
    pub fn lookup(&self, name: &str) -> Option<f64> {
        SYMBOLS
            .iter()
            .find(|(symbol, _)| *symbol == name)
            .map(|&(_, value)| value)
    }

    /// Iterate over every known symbol name.
    pub fn symbols(&self) -> impl Iterator<Item = &'static str> {
        SYMBOLS.iter().map(|&(symbol, _)| symbol)
    }
}
