use nalgebra::Point3;
use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Chemical elements recognized in structure files.
///
/// The set covers the first five periods, which is what small-molecule
/// structure files contain in practice. Query atoms (`A`, `Q`, `*`, `R#`)
/// are not elements and fail to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Element {
    H = 1,
    He,
    Li,
    Be,
    B,
    C,
    N,
    O,
    F,
    Ne,
    Na,
    Mg,
    Al,
    Si,
    P,
    S,
    Cl,
    Ar,
    K,
    Ca,
    Sc,
    Ti,
    V,
    Cr,
    Mn,
    Fe,
    Co,
    Ni,
    Cu,
    Zn,
    Ga,
    Ge,
    As,
    Se,
    Br,
    Kr,
    Rb,
    Sr,
    Y,
    Zr,
    Nb,
    Mo,
    Tc,
    Ru,
    Rh,
    Pd,
    Ag,
    Cd,
    In,
    Sn,
    Sb,
    Te,
    I,
    Xe,
}

static ELEMENT_SYMBOLS: Map<&'static str, Element> = phf_map! {
    "H" => Element::H, "He" => Element::He, "Li" => Element::Li, "Be" => Element::Be,
    "B" => Element::B, "C" => Element::C, "N" => Element::N, "O" => Element::O,
    "F" => Element::F, "Ne" => Element::Ne, "Na" => Element::Na, "Mg" => Element::Mg,
    "Al" => Element::Al, "Si" => Element::Si, "P" => Element::P, "S" => Element::S,
    "Cl" => Element::Cl, "Ar" => Element::Ar, "K" => Element::K, "Ca" => Element::Ca,
    "Sc" => Element::Sc, "Ti" => Element::Ti, "V" => Element::V, "Cr" => Element::Cr,
    "Mn" => Element::Mn, "Fe" => Element::Fe, "Co" => Element::Co, "Ni" => Element::Ni,
    "Cu" => Element::Cu, "Zn" => Element::Zn, "Ga" => Element::Ga, "Ge" => Element::Ge,
    "As" => Element::As, "Se" => Element::Se, "Br" => Element::Br, "Kr" => Element::Kr,
    "Rb" => Element::Rb, "Sr" => Element::Sr, "Y" => Element::Y, "Zr" => Element::Zr,
    "Nb" => Element::Nb, "Mo" => Element::Mo, "Tc" => Element::Tc, "Ru" => Element::Ru,
    "Rh" => Element::Rh, "Pd" => Element::Pd, "Ag" => Element::Ag, "Cd" => Element::Cd,
    "In" => Element::In, "Sn" => Element::Sn, "Sb" => Element::Sb, "Te" => Element::Te,
    "I" => Element::I, "Xe" => Element::Xe,
};

// Indexed by atomic number - 1.
const SYMBOLS: [&str; 54] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid or unsupported element symbol: '{0}'")]
pub struct ParseElementError(pub String);

impl Element {
    pub fn atomic_number(&self) -> u8 {
        *self as u8
    }

    pub fn symbol(&self) -> &'static str {
        SYMBOLS[(*self as u8 - 1) as usize]
    }

    pub fn is_hydrogen(&self) -> bool {
        matches!(self, Element::H)
    }

    /// Allowed neutral valences in ascending order, or an empty slice when the
    /// element has no default valence model (metals, noble gases).
    pub fn default_valences(&self) -> &'static [u8] {
        match self {
            Element::H => &[1],
            Element::B => &[3],
            Element::C => &[4],
            Element::N => &[3],
            Element::O => &[2],
            Element::F | Element::Cl | Element::Br | Element::I => &[1],
            Element::Si | Element::Ge | Element::Sn => &[4],
            Element::P | Element::As | Element::Sb => &[3, 5],
            Element::S | Element::Se | Element::Te => &[2, 4, 6],
            _ => &[],
        }
    }

    /// Number of valence electrons for main-group elements; used to shift the
    /// valence model of charged atoms.
    pub fn valence_electrons(&self) -> Option<u8> {
        match self {
            Element::H | Element::Li | Element::Na | Element::K | Element::Rb => Some(1),
            Element::Be | Element::Mg | Element::Ca | Element::Sr => Some(2),
            Element::B | Element::Al | Element::Ga | Element::In => Some(3),
            Element::C | Element::Si | Element::Ge | Element::Sn => Some(4),
            Element::N | Element::P | Element::As | Element::Sb => Some(5),
            Element::O | Element::S | Element::Se | Element::Te => Some(6),
            Element::F | Element::Cl | Element::Br | Element::I => Some(7),
            _ => None,
        }
    }

    /// Covalent radius in Angstroms (single-bond values).
    pub fn covalent_radius(&self) -> f64 {
        match self {
            Element::H => 0.31,
            Element::B => 0.84,
            Element::C => 0.76,
            Element::N => 0.71,
            Element::O => 0.66,
            Element::F => 0.57,
            Element::Si => 1.11,
            Element::P => 1.07,
            Element::S => 1.05,
            Element::Cl => 1.02,
            Element::Se => 1.20,
            Element::Br => 1.20,
            Element::I => 1.39,
            _ => 1.50,
        }
    }

    /// Van der Waals radius in Angstroms (Bondi).
    pub fn vdw_radius(&self) -> f64 {
        match self {
            Element::H => 1.20,
            Element::B => 1.92,
            Element::C => 1.70,
            Element::N => 1.55,
            Element::O => 1.52,
            Element::F => 1.47,
            Element::Si => 2.10,
            Element::P => 1.80,
            Element::S => 1.80,
            Element::Cl => 1.75,
            Element::Se => 1.90,
            Element::Br => 1.85,
            Element::I => 1.98,
            _ => 2.00,
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Element {
    type Err = ParseElementError;

    /// Parses an element symbol. Lookup is exact first, then tolerant of
    /// upper-case two-letter symbols such as `CL` written by some exporters.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(&element) = ELEMENT_SYMBOLS.get(trimmed) {
            return Ok(element);
        }
        let mut chars = trimmed.chars();
        let normalized: String = match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars.flat_map(|c| c.to_lowercase()))
                .collect(),
            None => return Err(ParseElementError(s.to_string())),
        };
        ELEMENT_SYMBOLS
            .get(normalized.as_str())
            .copied()
            .ok_or_else(|| ParseElementError(s.to_string()))
    }
}

/// An atom of a molecule record as read from a structure file.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The chemical element.
    pub element: Element,
    /// Formal charge in elementary charge units.
    pub formal_charge: i8,
    /// Mass difference column of the atom block, kept verbatim for output.
    pub mass_difference: i8,
    /// Explicit isotope mass number from an `M  ISO` line.
    pub isotope: Option<u16>,
    /// Stereo parity column of the atom block (0 = none).
    pub stereo_parity: u8,
    /// Coordinates from the input record in Angstroms.
    pub position: Point3<f64>,
}

impl Atom {
    pub fn new(element: Element, position: Point3<f64>) -> Self {
        Self {
            element,
            formal_charge: 0,
            mass_difference: 0,
            isotope: None,
            stereo_parity: 0,
            position,
        }
    }

    pub fn with_charge(mut self, charge: i8) -> Self {
        self.formal_charge = charge;
        self
    }

    pub fn is_hydrogen(&self) -> bool {
        self.element.is_hydrogen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_from_str_parses_exact_symbols() {
        assert_eq!("C".parse::<Element>().unwrap(), Element::C);
        assert_eq!("Cl".parse::<Element>().unwrap(), Element::Cl);
        assert_eq!(" Br ".parse::<Element>().unwrap(), Element::Br);
    }

    #[test]
    fn element_from_str_normalizes_case() {
        assert_eq!("CL".parse::<Element>().unwrap(), Element::Cl);
        assert_eq!("o".parse::<Element>().unwrap(), Element::O);
    }

    #[test]
    fn element_from_str_rejects_query_atoms() {
        assert!("A".parse::<Element>().is_err());
        assert!("*".parse::<Element>().is_err());
        assert!("R#".parse::<Element>().is_err());
        assert!("".parse::<Element>().is_err());
    }

    #[test]
    fn symbol_and_atomic_number_are_consistent() {
        for symbol in SYMBOLS {
            let element: Element = symbol.parse().unwrap();
            assert_eq!(element.symbol(), symbol);
            assert_eq!(SYMBOLS[(element.atomic_number() - 1) as usize], symbol);
        }
        assert_eq!(Element::Xe.atomic_number(), 54);
    }

    #[test]
    fn metals_have_no_default_valence() {
        assert!(Element::Fe.default_valences().is_empty());
        assert_eq!(Element::S.default_valences(), &[2, 4, 6]);
    }

    #[test]
    fn atom_new_starts_neutral_without_isotope() {
        let atom = Atom::new(Element::N, Point3::origin()).with_charge(1);
        assert_eq!(atom.formal_charge, 1);
        assert_eq!(atom.isotope, None);
        assert!(!atom.is_hydrogen());
    }
}
