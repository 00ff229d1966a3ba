// Primitives shared by the spreadsheet providers.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::io::Write;

use serde::Serialize;

use crate::survey::*;

/// A cell of a spreadsheet, as loosely typed as the source.
#[derive(PartialEq, Debug, Clone)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl CellValue {
    /// Empty cells and blank strings carry no answer.
    pub fn is_null(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// The textual form of the cell. Whole floats render without a fractional part,
    /// the way spreadsheets display them.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => "".to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", *f as i64)
            }
            CellValue::Float(f) => f.to_string(),
            CellValue::Bool(b) => b.to_string(),
        }
    }

    /// The cell as a whole number, if it holds one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            CellValue::Int(i) => Some(*i),
            CellValue::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            CellValue::Text(s) => {
                let t = s.trim();
                match t.parse::<i64>() {
                    Ok(i) => Some(i),
                    Err(_) => t
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && f.fract() == 0.0)
                        .map(|f| f as i64),
                }
            }
            CellValue::Float(_) | CellValue::Empty | CellValue::Bool(_) => None,
        }
    }
}

/// One row of the first worksheet: column name -> cell.
pub type RawRow = BTreeMap<String, CellValue>;

/// The read capability of a spreadsheet service.
pub trait SheetSource {
    /// All the records of the first worksheet of the given sheet, in row order.
    fn fetch_rows(&self, sheet_id: &str) -> Result<Vec<RawRow>, SourceError>;
}

/// Finds the sheet identifier in a locator.
///
/// URLs, with or without a scheme, must hold the identifier in the path segment
/// following `/d/`. Anything else is already an identifier (or a file path for the
/// local providers).
pub fn resolve_locator(locator: &str) -> PResult<String> {
    let trimmed = locator.trim();
    if trimmed.contains("://") || trimmed.contains("/d/") {
        let (_, after) = trimmed
            .split_once("/d/")
            .context(InvalidLocatorSnafu { locator })?;
        let id = after
            .split(|c| c == '/' || c == '?' || c == '#')
            .next()
            .unwrap_or("");
        ensure!(!id.is_empty(), InvalidLocatorSnafu { locator });
        Ok(id.to_string())
    } else {
        ensure!(!trimmed.is_empty(), InvalidLocatorSnafu { locator });
        Ok(trimmed.to_string())
    }
}

/// Turns a header row and the rows below it into records.
///
/// Columns with a blank header are skipped. Cells missing at the end of a short row
/// are `Empty`, so that every record holds every column of the header.
pub fn rows_from_grid<I>(header: &[CellValue], body: I) -> Result<Vec<RawRow>, SourceError>
where
    I: IntoIterator<Item = Vec<CellValue>>,
{
    let mut columns: Vec<(usize, String)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for (idx, cell) in header.iter().enumerate() {
        if cell.is_null() {
            continue;
        }
        let name = cell.as_text();
        if !seen.insert(name.clone()) {
            return DuplicateHeaderSnafu { column: name }.fail();
        }
        columns.push((idx, name));
    }
    debug!("rows_from_grid: columns: {:?}", columns);

    let mut res: Vec<RawRow> = Vec::new();
    for cells in body {
        let row: RawRow = columns
            .iter()
            .map(|(idx, name)| {
                let v = cells.get(*idx).cloned().unwrap_or(CellValue::Empty);
                (name.clone(), v)
            })
            .collect();
        res.push(row);
    }
    Ok(res)
}

/// Writes a value as pretty JSON, all or nothing: the content goes to a temporary
/// file next to the target, which is then renamed over it.
pub fn write_json_atomic<T: Serialize>(value: &T, path: &str) -> PResult<()> {
    let content = serde_json::to_string_pretty(value).context(SerializingArtifactSnafu { path })?;
    let target = Path::new(path);
    let tmp_name = format!(
        ".{}.tmp",
        target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string())
    );
    let tmp = target.with_file_name(tmp_name);
    let write_tmp = || -> std::io::Result<()> {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(content.as_bytes())?;
        f.write_all(b"\n")?;
        f.sync_all()?;
        fs::rename(&tmp, target)
    };
    if let Err(e) = write_tmp() {
        let _ = fs::remove_file(&tmp);
        return Err(e).context(WritingArtifactSnafu { path });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_from_url() {
        assert_eq!(
            resolve_locator("https://docs.google.com/spreadsheets/d/1AbC-xyz_9/edit#gid=0")
                .unwrap(),
            "1AbC-xyz_9"
        );
        assert_eq!(
            resolve_locator("https://docs.google.com/spreadsheets/d/1AbC?usp=sharing").unwrap(),
            "1AbC"
        );
        assert_eq!(
            resolve_locator("https://docs.google.com/spreadsheets/d/1AbC").unwrap(),
            "1AbC"
        );
    }

    #[test]
    fn locator_from_url_without_scheme() {
        assert_eq!(
            resolve_locator("docs.google.com/spreadsheets/d/abc123/edit").unwrap(),
            "abc123"
        );
        assert!(matches!(
            resolve_locator("docs.google.com/spreadsheets/d//edit"),
            Err(PipelineError::InvalidLocator { .. })
        ));
    }

    #[test]
    fn locator_without_identifier() {
        for bad in [
            "https://docs.google.com/spreadsheets/",
            "https://docs.google.com/spreadsheets/d/",
            "https://docs.google.com/spreadsheets/d//edit",
            "   ",
        ] {
            match resolve_locator(bad) {
                Err(PipelineError::InvalidLocator { locator }) => assert_eq!(locator, bad),
                x => panic!("{:?} resolved to {:?}", bad, x),
            }
        }
    }

    #[test]
    fn opaque_locator_is_kept() {
        assert_eq!(resolve_locator(" 1AbC ").unwrap(), "1AbC");
        assert_eq!(resolve_locator("data/survey.xlsx").unwrap(), "data/survey.xlsx");
    }

    #[test]
    fn cell_forms() {
        assert!(CellValue::Text("  ".to_string()).is_null());
        assert!(!CellValue::Int(0).is_null());
        assert_eq!(CellValue::Float(9.0).as_text(), "9");
        assert_eq!(CellValue::Float(9.5).as_text(), "9.5");
        assert_eq!(CellValue::Text(" 8 ".to_string()).as_integer(), Some(8));
        assert_eq!(CellValue::Text("8.0".to_string()).as_integer(), Some(8));
        assert_eq!(CellValue::Text("eight".to_string()).as_integer(), None);
        assert_eq!(CellValue::Float(7.5).as_integer(), None);
        assert_eq!(CellValue::Bool(true).as_integer(), None);
    }

    #[test]
    fn grid_pads_short_rows_and_skips_blank_headers() {
        let header = vec![
            CellValue::Text("A".to_string()),
            CellValue::Empty,
            CellValue::Text("C".to_string()),
        ];
        let body = vec![
            vec![CellValue::Int(1)],
            vec![CellValue::Int(2), CellValue::Int(3), CellValue::Int(4)],
        ];
        let rows = rows_from_grid(&header, body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("A"), Some(&CellValue::Int(1)));
        assert_eq!(rows[0].get("C"), Some(&CellValue::Empty));
        assert_eq!(rows[1].get("C"), Some(&CellValue::Int(4)));
        assert_eq!(rows[1].len(), 2);
    }

    #[test]
    fn grid_rejects_duplicate_headers() {
        let header = vec![
            CellValue::Text("A".to_string()),
            CellValue::Text("A".to_string()),
        ];
        assert!(matches!(
            rows_from_grid(&header, Vec::new()),
            Err(SourceError::DuplicateHeader { .. })
        ));
    }

    #[test]
    fn atomic_write_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let p = path.to_str().unwrap();
        write_json_atomic(&vec![1, 2], p).unwrap();
        write_json_atomic(&vec![3], p).unwrap();
        let back: Vec<i32> = serde_json::from_str(&fs::read_to_string(p).unwrap()).unwrap();
        assert_eq!(back, vec![3]);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn atomic_write_into_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");
        let res = write_json_atomic(&vec![1], path.to_str().unwrap());
        assert!(matches!(res, Err(PipelineError::WritingArtifact { .. })));
        assert!(!path.exists());
    }
}
