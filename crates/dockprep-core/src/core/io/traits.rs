use crate::core::models::setup::MoleculeSetup;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading molecules from a file format.
///
/// Implementors parse every record of a stream into the molecule type of the
/// toolkit they belong to.
pub trait MoleculeReader {
    /// The molecule type produced for each record.
    type Molecule;

    /// The error type for I/O and parse failures.
    type Error: Error + From<io::Error>;

    /// Reads all molecules from a buffered reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - The buffered reader to read from.
    ///
    /// # Return
    ///
    /// Returns the molecules in file order.
    ///
    /// # Errors
    ///
    /// Returns an error if any record fails to parse or reading fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Self::Molecule>, Self::Error>;

    /// Reads all molecules from an in-memory string.
    fn read_from_str(text: &str) -> Result<Vec<Self::Molecule>, Self::Error> {
        let mut reader = io::Cursor::new(text.as_bytes());
        Self::read_from(&mut reader)
    }

    /// Reads all molecules from a file path.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the file to read.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Self::Molecule>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }
}

/// Defines the interface for serializing a prepared molecule setup.
pub trait SetupWriter {
    /// Format-specific output switches.
    type Options: Default;

    /// The error type for write failures.
    type Error: Error + From<io::Error>;

    /// Writes a setup to a writer.
    ///
    /// # Arguments
    ///
    /// * `setup` - The setup to serialize; it must carry a flexibility tree.
    /// * `options` - Output switches.
    /// * `writer` - The writer to output to.
    ///
    /// # Return
    ///
    /// Returns `Ok(())` on success.
    ///
    /// # Errors
    ///
    /// Returns an error if the setup cannot be represented in the format or
    /// writing fails.
    fn write_to(
        setup: &MoleculeSetup,
        options: &Self::Options,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error>;

    /// Serializes a setup into a string.
    fn write_string(setup: &MoleculeSetup, options: &Self::Options) -> Result<String, Self::Error> {
        let mut buffer: Vec<u8> = Vec::new();
        Self::write_to(setup, options, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Writes a setup to a file path.
    ///
    /// # Arguments
    ///
    /// * `setup` - The setup to serialize.
    /// * `options` - Output switches.
    /// * `path` - The path to the file to write.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(
        setup: &MoleculeSetup,
        options: &Self::Options,
        path: P,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(setup, options, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
