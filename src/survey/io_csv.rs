// Primitives for reading CSV exports.

use crate::survey::*;

/// Reads a local CSV file whose first line is the header. The sheet identifier is
/// the path of the file.
pub struct CsvReader {}

impl SheetSource for CsvReader {
    fn fetch_rows(&self, sheet_id: &str) -> Result<Vec<RawRow>, SourceError> {
        read_csv_file(sheet_id)
    }
}

fn read_csv_cell(s: &str) -> CellValue {
    if s.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(s.to_string())
    }
}

pub fn read_csv_file(path: &str) -> Result<Vec<RawRow>, SourceError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(OpeningCsvSnafu { path })?;
    let header: Vec<CellValue> = rdr
        .headers()
        .context(OpeningCsvSnafu { path })?
        .iter()
        .map(read_csv_cell)
        .collect();
    debug!("read_csv_file: header: {:?}", header);

    let mut body: Vec<Vec<CellValue>> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // Line 1 is the header.
        let lineno = (idx + 2) as u64;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        body.push(line.iter().map(read_csv_cell).collect());
    }
    rows_from_grid(&header, body)
}
