//! CSV regulation tables.

use std::io::Read;
use std::path::Path;

use plot_gfa_regulation::RawTable;

use crate::{IngestError, io_error};

/// Reads a CSV file into a [`RawTable`] named after the file stem.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened, is not valid CSV,
/// or has rows with a different number of cells than the header.
pub fn read_table(path: &Path) -> Result<RawTable, IngestError> {
    let file = std::fs::File::open(path).map_err(io_error(path))?;
    let name = path
        .file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());

    let table = parse_table(&name, file)?;
    log::info!(
        "Read table '{}' from {}: {} rows, {} columns",
        table.name,
        path.display(),
        table.rows.len(),
        table.headers.len()
    );
    Ok(table)
}

/// Parses CSV from `reader`. Headers and cells are trimmed; blank lines
/// are skipped.
///
/// # Errors
///
/// Returns [`IngestError`] if the input is not valid CSV or a row has a
/// different number of cells than the header.
pub fn parse_table(name: &str, reader: impl Read) -> Result<RawTable, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
    let mut table = RawTable::new(name, headers);

    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        table.rows.push(record.iter().map(str::to_owned).collect());
    }

    table.check_shape()?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_trimmed_cells_and_skips_blank_rows() {
        let csv = "Layer , Zone, GPR\nheight, h1 , 2.8\n,,\ncentral,c1;c2,\n";
        let table = parse_table("area", csv.as_bytes()).unwrap();

        assert_eq!(table.name, "area");
        assert_eq!(table.headers, ["Layer", "Zone", "GPR"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], ["height", "h1", "2.8"]);
        assert_eq!(table.rows[1], ["central", "c1;c2", ""]);
    }

    #[test]
    fn ragged_rows_fail() {
        let csv = "a,b\n1,2\n3\n";
        assert!(matches!(
            parse_table("t", csv.as_bytes()),
            Err(IngestError::Table(_))
        ));
    }
}
