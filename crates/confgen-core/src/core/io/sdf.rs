use crate::core::chem::valence;
use crate::core::io::traits::{StructureFile, StructureWriter};
use crate::core::models::atom::{Atom, Element};
use crate::core::models::conformer::ConformerId;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::{Bond, BondOrder};
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;
use tracing::trace;

const RECORD_TERMINATOR: &str = "$$$$";
const PROGRAM_LINE: &str = "     confgen        3D";
const MAX_V2000_COUNT: usize = 999;
const MAX_ENTRIES_PER_PROPERTY_LINE: usize = 8;

#[derive(Debug, Error)]
pub enum SdfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: SdfParseErrorKind },
    #[error("Unsupported record: {0}")]
    Unsupported(String),
    #[error(
        "Explicit valence {valence} for atom {serial} ({element}) is greater than permitted"
    )]
    Valence {
        serial: usize,
        element: Element,
        valence: f64,
    },
    #[error("Conformer {0} not found on molecule")]
    MissingConformer(ConformerId),
}

#[derive(Debug, Error)]
pub enum SdfParseErrorKind {
    #[error("Record ended before the {0} was complete")]
    Truncated(&'static str),
    #[error("Invalid counts line (value: '{0}')")]
    InvalidCounts(String),
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Unknown element symbol '{0}'")]
    UnknownElement(String),
    #[error("Bond references atom {index} outside the declared range 1-{atom_count}")]
    BondOutOfRange { index: usize, atom_count: usize },
    #[error("Unsupported bond type {0}")]
    InvalidBondType(u8),
    #[error("Duplicate or self-referencing bond {0}-{1}")]
    InvalidBond(usize, usize),
}

/// Decodes one raw line without its terminator. Bytes that are not valid
/// UTF-8 (Latin-1 data items, for instance) are replaced rather than failing
/// the whole file.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn parse_err(line: usize, kind: SdfParseErrorKind) -> SdfError {
    SdfError::Parse { line, kind }
}

fn parse_fixed_f64(line: &str, line_no: usize, start: usize, end: usize) -> Result<f64, SdfError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| {
        parse_err(
            line_no,
            SdfParseErrorKind::InvalidFloat {
                columns: format!("{}-{}", start + 1, end),
                value: value.into(),
            },
        )
    })
}

fn parse_fixed_int(
    line: &str,
    line_no: usize,
    start: usize,
    end: usize,
    default: i32,
) -> Result<i32, SdfError> {
    let value = slice_and_trim(line, start, end);
    if value.is_empty() {
        return Ok(default);
    }
    value.parse().map_err(|_| {
        parse_err(
            line_no,
            SdfParseErrorKind::InvalidInt {
                columns: format!("{}-{}", start + 1, end),
                value: value.into(),
            },
        )
    })
}

/// Atom-block charge codes of the V2000 format (code 4 is a doublet radical).
fn charge_from_code(code: i32) -> i8 {
    match code {
        1 => 3,
        2 => 2,
        3 => 1,
        5 => -1,
        6 => -2,
        7 => -3,
        _ => 0,
    }
}

fn code_from_charge(charge: i8) -> u8 {
    match charge {
        3 => 1,
        2 => 2,
        1 => 3,
        -1 => 5,
        -2 => 6,
        -3 => 7,
        _ => 0,
    }
}

/// The V2000 structure-data file format (`.sdf`, `.mol`).
pub struct SdfFile;

pub type SdfWriter = StructureWriter<SdfFile>;

impl StructureFile for SdfFile {
    type Error = SdfError;

    fn read_from(
        reader: &mut impl BufRead,
    ) -> Result<Vec<Result<Molecule, Self::Error>>, Self::Error> {
        let mut records = Vec::new();
        let mut block: Vec<(usize, String)> = Vec::new();

        let mut buf = Vec::new();
        let mut line_num = 0;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line_num += 1;
            let line = decode_line(&buf);
            if line.trim_end() == RECORD_TERMINATOR {
                records.push(parse_record(&block));
                block.clear();
            } else {
                block.push((line_num, line));
            }
        }
        if block.iter().any(|(_, l)| !l.trim().is_empty()) {
            records.push(parse_record(&block));
        }
        Ok(records)
    }

    fn write_to(
        molecule: &Molecule,
        conformer: Option<ConformerId>,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        let positions = match conformer {
            Some(id) => {
                molecule
                    .conformer(id)
                    .ok_or(SdfError::MissingConformer(id))?
                    .positions
                    .clone()
            }
            None => molecule.input_positions(),
        };
        if molecule.atom_count() > MAX_V2000_COUNT || molecule.bond_count() > MAX_V2000_COUNT {
            return Err(SdfError::Unsupported(format!(
                "{} atoms / {} bonds exceed the V2000 limit of {}",
                molecule.atom_count(),
                molecule.bond_count(),
                MAX_V2000_COUNT
            )));
        }

        writeln!(writer, "{}", molecule.name)?;
        writeln!(writer, "{}", PROGRAM_LINE)?;
        writeln!(writer, "{}", molecule.comment)?;
        writeln!(
            writer,
            "{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000",
            molecule.atom_count(),
            molecule.bond_count()
        )?;

        for (atom, pos) in molecule.atoms().iter().zip(&positions) {
            writeln!(
                writer,
                "{:>10.4}{:>10.4}{:>10.4} {:<3}{:>2}{:>3}{:>3}  0  0  0  0  0  0  0  0  0",
                pos.x,
                pos.y,
                pos.z,
                atom.element.symbol(),
                atom.mass_difference,
                code_from_charge(atom.formal_charge),
                atom.stereo_parity
            )?;
        }

        for bond in molecule.bonds() {
            writeln!(
                writer,
                "{:>3}{:>3}{:>3}{:>3}",
                bond.atom1 + 1,
                bond.atom2 + 1,
                bond.order.ctfile_code(),
                bond.stereo
            )?;
        }

        let charged: Vec<(usize, i32)> = molecule
            .atoms()
            .iter()
            .enumerate()
            .filter(|(_, a)| a.formal_charge != 0)
            .map(|(i, a)| (i + 1, a.formal_charge as i32))
            .collect();
        write_property_lines(writer, "CHG", &charged)?;

        let isotopes: Vec<(usize, i32)> = molecule
            .atoms()
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.isotope.map(|iso| (i + 1, iso as i32)))
            .collect();
        write_property_lines(writer, "ISO", &isotopes)?;

        writeln!(writer, "M  END")?;
        for (name, value) in &molecule.properties {
            writeln!(writer, ">  <{}>", name)?;
            writeln!(writer, "{}", value)?;
            writeln!(writer)?;
        }
        writeln!(writer, "{}", RECORD_TERMINATOR)?;
        Ok(())
    }
}

fn write_property_lines(
    writer: &mut impl Write,
    tag: &str,
    entries: &[(usize, i32)],
) -> io::Result<()> {
    for chunk in entries.chunks(MAX_ENTRIES_PER_PROPERTY_LINE) {
        write!(writer, "M  {}{:>3}", tag, chunk.len())?;
        for (serial, value) in chunk {
            write!(writer, " {:>3} {:>3}", serial, value)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn parse_record(lines: &[(usize, String)]) -> Result<Molecule, SdfError> {
    if lines.len() < 4 {
        return Err(parse_err(
            lines.last().map_or(1, |(ln, _)| *ln),
            SdfParseErrorKind::Truncated("header"),
        ));
    }

    let mut molecule = Molecule::new(lines[0].1.trim_end());
    molecule.comment = lines[2].1.trim_end().to_string();
    let dimension = slice_and_trim(&lines[1].1, 20, 22);

    let (counts_line_no, counts_line) = (&lines[3].0, &lines[3].1);
    if counts_line.contains("V3000") {
        return Err(SdfError::Unsupported("V3000 records are not supported".into()));
    }
    let (atom_count, bond_count) = parse_counts(counts_line, *counts_line_no)?;

    let atom_start = 4;
    let bond_start = atom_start + atom_count;
    let props_start = bond_start + bond_count;
    if lines.len() < props_start {
        return Err(parse_err(
            lines.last().map_or(*counts_line_no, |(ln, _)| *ln),
            SdfParseErrorKind::Truncated(if lines.len() < bond_start {
                "atom block"
            } else {
                "bond block"
            }),
        ));
    }

    for (ln, raw) in &lines[atom_start..bond_start] {
        molecule.add_atom(parse_atom_line(raw, *ln)?);
    }
    for (ln, raw) in &lines[bond_start..props_start] {
        let bond = parse_bond_line(raw, *ln, atom_count)?;
        if molecule.push_bond(bond).is_none() {
            return Err(parse_err(
                *ln,
                SdfParseErrorKind::InvalidBond(bond.atom1 + 1, bond.atom2 + 1),
            ));
        }
    }

    let data_start = parse_property_block(&mut molecule, &lines[props_start..])?;
    molecule.properties = parse_data_items(&lines[props_start + data_start..]);

    molecule.is_3d = match dimension {
        "3D" => true,
        "2D" => false,
        _ => molecule.atoms().iter().any(|a| a.position.z.abs() > 1e-4),
    };

    if let Some((index, valence)) = valence::find_valence_violation(&molecule) {
        let element = molecule.atoms()[index].element;
        return Err(SdfError::Valence {
            serial: index + 1,
            element,
            valence,
        });
    }

    trace!(
        name = %molecule.name,
        atoms = atom_count,
        bonds = bond_count,
        "Parsed SDF record."
    );
    Ok(molecule)
}

fn parse_counts(line: &str, line_no: usize) -> Result<(usize, usize), SdfError> {
    let invalid = || parse_err(line_no, SdfParseErrorKind::InvalidCounts(line.into()));
    let fixed = (
        slice_and_trim(line, 0, 3).parse::<usize>(),
        slice_and_trim(line, 3, 6).parse::<usize>(),
    );
    let (atoms, bonds) = if let (Ok(atoms), Ok(bonds)) = fixed {
        (atoms, bonds)
    } else {
        let tokens: Vec<_> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [a, b, ..] => match (a.parse(), b.parse()) {
                (Ok(atoms), Ok(bonds)) => (atoms, bonds),
                _ => return Err(invalid()),
            },
            _ => return Err(invalid()),
        }
    };
    if atoms > MAX_V2000_COUNT || bonds > MAX_V2000_COUNT {
        return Err(invalid());
    }
    Ok((atoms, bonds))
}

fn parse_atom_line(line: &str, line_no: usize) -> Result<Atom, SdfError> {
    if line.trim().is_empty() {
        return Err(parse_err(line_no, SdfParseErrorKind::Truncated("atom block")));
    }
    let x = parse_fixed_f64(line, line_no, 0, 10)?;
    let y = parse_fixed_f64(line, line_no, 10, 20)?;
    let z = parse_fixed_f64(line, line_no, 20, 30)?;
    let symbol = slice_and_trim(line, 31, 34);
    let element: Element = symbol
        .parse()
        .map_err(|_| parse_err(line_no, SdfParseErrorKind::UnknownElement(symbol.into())))?;
    let mass_difference = parse_fixed_int(line, line_no, 34, 36, 0)?;
    let charge_code = parse_fixed_int(line, line_no, 36, 39, 0)?;
    let parity = parse_fixed_int(line, line_no, 39, 42, 0)?;

    let mut atom = Atom::new(element, Point3::new(x, y, z)).with_charge(charge_from_code(charge_code));
    atom.mass_difference = mass_difference.clamp(i8::MIN as i32, i8::MAX as i32) as i8;
    atom.stereo_parity = parity.clamp(0, 3) as u8;
    Ok(atom)
}

fn parse_bond_line(line: &str, line_no: usize, atom_count: usize) -> Result<Bond, SdfError> {
    let fixed = (
        slice_and_trim(line, 0, 3).parse::<usize>(),
        slice_and_trim(line, 3, 6).parse::<usize>(),
        slice_and_trim(line, 6, 9).parse::<u8>(),
    );
    let (a1, a2, code, stereo) = match fixed {
        (Ok(a1), Ok(a2), Ok(code)) => {
            let stereo = parse_fixed_int(line, line_no, 9, 12, 0)?;
            (a1, a2, code, stereo)
        }
        _ => {
            let tokens: Vec<_> = line.split_whitespace().collect();
            let field = |i: usize| -> Result<i32, SdfError> {
                let value = tokens.get(i).copied().unwrap_or("");
                value.parse().map_err(|_| {
                    parse_err(
                        line_no,
                        SdfParseErrorKind::InvalidInt {
                            columns: format!("field {}", i + 1),
                            value: value.into(),
                        },
                    )
                })
            };
            let stereo = if tokens.len() > 3 { field(3)? } else { 0 };
            (
                field(0)?.max(0) as usize,
                field(1)?.max(0) as usize,
                field(2)?.clamp(0, u8::MAX as i32) as u8,
                stereo,
            )
        }
    };

    for index in [a1, a2] {
        if index == 0 || index > atom_count {
            return Err(parse_err(
                line_no,
                SdfParseErrorKind::BondOutOfRange { index, atom_count },
            ));
        }
    }
    let order = BondOrder::from_ctfile_code(code)
        .ok_or_else(|| parse_err(line_no, SdfParseErrorKind::InvalidBondType(code)))?;

    let mut bond = Bond::new(a1 - 1, a2 - 1, order);
    bond.stereo = stereo.clamp(0, u8::MAX as i32) as u8;
    Ok(bond)
}

/// Applies `M  CHG` / `M  ISO` lines and returns the offset just past `M  END`
/// (or the end of the slice if the record has no `M  END`).
fn parse_property_block(
    molecule: &mut Molecule,
    lines: &[(usize, String)],
) -> Result<usize, SdfError> {
    let mut charges_reset = false;
    for (offset, (ln, raw)) in lines.iter().enumerate() {
        let line = raw.trim_end();
        if line == "M  END" {
            return Ok(offset + 1);
        }
        if line.starts_with('>') {
            return Ok(offset);
        }
        let tag = slice_and_trim(line, 0, 6);
        if tag != "M  CHG" && tag != "M  ISO" {
            continue;
        }
        let tokens: Vec<_> = line.split_whitespace().skip(2).collect();
        let entries = tokens.get(0).and_then(|n| n.parse::<usize>().ok()).unwrap_or(0);
        for pair in tokens[1.min(tokens.len())..].chunks_exact(2).take(entries) {
            let (Ok(serial), Ok(value)) = (pair[0].parse::<usize>(), pair[1].parse::<i32>()) else {
                return Err(parse_err(
                    *ln,
                    SdfParseErrorKind::InvalidInt {
                        columns: tag.into(),
                        value: pair.join(" "),
                    },
                ));
            };
            if serial == 0 || serial > molecule.atom_count() {
                return Err(parse_err(
                    *ln,
                    SdfParseErrorKind::BondOutOfRange {
                        index: serial,
                        atom_count: molecule.atom_count(),
                    },
                ));
            }
            if tag == "M  CHG" && !charges_reset {
                // The first CHG line supersedes every atom-block charge.
                for i in 0..molecule.atom_count() {
                    if let Some(atom) = molecule.atom_mut(i) {
                        atom.formal_charge = 0;
                    }
                }
                charges_reset = true;
            }
            if let Some(atom) = molecule.atom_mut(serial - 1) {
                if tag == "M  CHG" {
                    atom.formal_charge = value.clamp(i8::MIN as i32, i8::MAX as i32) as i8;
                } else {
                    atom.isotope = u16::try_from(value).ok();
                }
            }
        }
    }
    Ok(lines.len())
}

fn parse_data_items(lines: &[(usize, String)]) -> Vec<(String, String)> {
    let mut items = Vec::new();
    let mut iter = lines.iter().map(|(_, l)| l.trim_end()).peekable();
    while let Some(line) = iter.next() {
        if !line.starts_with('>') {
            continue;
        }
        let name = match (line.find('<'), line.rfind('>')) {
            (Some(open), Some(close)) if close > open => line[open + 1..close].to_string(),
            _ => continue,
        };
        let mut value_lines = Vec::new();
        while let Some(&next) = iter.peek() {
            if next.is_empty() || next.starts_with('>') {
                break;
            }
            value_lines.push(next.to_string());
            iter.next();
        }
        items.push((name, value_lines.join("\n")));
    }
    items
}
