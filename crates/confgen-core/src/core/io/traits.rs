use crate::core::models::conformer::ConformerId;
use crate::core::models::molecule::Molecule;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;

/// Defines the interface for multi-record molecular structure file formats.
///
/// A structure file holds any number of molecule records. Reading yields one
/// result per record so that a malformed record can be skipped without losing
/// the rest of the file; only I/O failures abort the read as a whole.
pub trait StructureFile {
    /// The error type for I/O and parse failures.
    type Error: Error + From<io::Error>;

    /// Reads every record from a buffered reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - The buffered reader to read from.
    ///
    /// # Return
    ///
    /// One entry per record, in file order. An entry is `Err` if that record
    /// could not be parsed into a molecule.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reader fails.
    fn read_from(
        reader: &mut impl BufRead,
    ) -> Result<Vec<Result<Molecule, Self::Error>>, Self::Error>;

    /// Serializes one molecule record.
    ///
    /// # Arguments
    ///
    /// * `molecule` - The molecule whose graph and data items are written.
    /// * `conformer` - Which conformer supplies the coordinates; `None` writes
    ///   the record's own input coordinates.
    /// * `writer` - The writer to output to.
    ///
    /// # Errors
    ///
    /// Returns an error if the conformer does not exist, the molecule cannot be
    /// represented in the format, or writing fails.
    fn write_to(
        molecule: &Molecule,
        conformer: Option<ConformerId>,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error>;

    /// Reads every record from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    fn read_from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<Vec<Result<Molecule, Self::Error>>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }
}

/// An output resource scoped to a single structure file.
///
/// The file is created (or truncated) on [`StructureWriter::create`], each
/// [`StructureWriter::write`] appends one record, and [`StructureWriter::close`]
/// flushes buffered data and syncs it to disk. Records appear in the file in
/// the order they were written.
pub struct StructureWriter<F: StructureFile> {
    writer: BufWriter<File>,
    records_written: usize,
    _format: PhantomData<F>,
}

impl<F: StructureFile> StructureWriter<F> {
    /// Opens a fresh output file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, F::Error> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            records_written: 0,
            _format: PhantomData,
        })
    }

    /// Appends one `(molecule, conformer)` record.
    pub fn write(
        &mut self,
        molecule: &Molecule,
        conformer: Option<ConformerId>,
    ) -> Result<(), F::Error> {
        F::write_to(molecule, conformer, &mut self.writer)?;
        self.records_written += 1;
        Ok(())
    }

    /// Flushes and finalizes the file, returning the number of records written.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or syncing fails.
    pub fn close(mut self) -> Result<usize, F::Error> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(self.records_written)
    }
}
