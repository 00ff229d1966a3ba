// Reading survey exports saved as Excel workbooks.

use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::survey::*;

/// Reads the first worksheet of a local `.xlsx` file. The sheet identifier is the
/// path of the file.
pub struct XlsxReader {}

impl SheetSource for XlsxReader {
    fn fetch_rows(&self, sheet_id: &str) -> Result<Vec<RawRow>, SourceError> {
        read_excel_file(sheet_id)
    }
}

pub fn read_excel_file(path: &str) -> Result<Vec<RawRow>, SourceError> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningWorkbookSnafu { path })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptyWorkbookSnafu { path })?
        .context(OpeningWorkbookSnafu { path })?;

    let mut iter = wrange.rows();
    let header: Vec<CellValue> = match iter.next() {
        Some(cells) => cells.iter().map(read_cell_calamine).collect(),
        // A worksheet without any cell has no record.
        None => return Ok(Vec::new()),
    };
    debug!("read_excel_file: header: {:?}", header);

    let body = iter.map(|cells| cells.iter().map(read_cell_calamine).collect::<Vec<_>>());
    let rows = rows_from_grid(&header, body)?;
    debug!("read_excel_file: {} rows in {:?}", rows.len(), path);
    Ok(rows)
}

fn read_cell_calamine(cell: &DataType) -> CellValue {
    match cell {
        DataType::Empty => CellValue::Empty,
        DataType::String(s) => CellValue::Text(s.clone()),
        DataType::Int(i) => CellValue::Int(*i),
        DataType::Float(f) => CellValue::Float(*f),
        DataType::Bool(b) => CellValue::Bool(*b),
        // Dates, durations and error cells are kept as their displayed text.
        other => CellValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_workbook_is_an_opening_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.xlsx");
        let res = XlsxReader {}.fetch_rows(path.to_str().unwrap());
        assert!(matches!(res, Err(SourceError::OpeningWorkbook { .. })));
    }

    #[test]
    fn calamine_cells() {
        assert_eq!(read_cell_calamine(&DataType::Empty), CellValue::Empty);
        assert_eq!(read_cell_calamine(&DataType::Int(9)), CellValue::Int(9));
        assert_eq!(read_cell_calamine(&DataType::Float(7.0)), CellValue::Float(7.0));
        assert_eq!(
            read_cell_calamine(&DataType::String("Wave 1".to_string())),
            CellValue::Text("Wave 1".to_string())
        );
    }
}
