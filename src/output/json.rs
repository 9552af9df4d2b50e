use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::DrawError;

/// Write any serializable value (curve, records, settings) as pretty JSON.
pub fn write<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DrawError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

pub fn read<T: DeserializeOwned>(path: &Path) -> Result<T, DrawError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
