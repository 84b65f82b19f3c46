use std::collections::{HashMap, HashSet};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{LoadError, SchemaError};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Text rendering of the cell. Integral numbers drop the fraction, so a
    /// workbook `5` reads the same as the CSV text `5`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(text) => Some(text.clone()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Bool(true) => Some("True".to_string()),
            Cell::Bool(false) => Some("False".to_string()),
        }
    }

    /// Numeric coercion. Anything that is not a finite number becomes missing.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n).filter(|n| n.is_finite()),
            Cell::Text(text) => coerce_numeric(text),
            Cell::Empty | Cell::Bool(_) => None,
        }
    }
}

pub fn coerce_numeric(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::String(s) if s.trim().is_empty() => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// Every physical row of the first worksheet, before any header handling.
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub source_name: String,
    pub rows: Vec<Vec<Cell>>,
}

/// A sheet split into labelled columns and the data rows beneath the header.
#[derive(Debug, Clone)]
pub struct Table {
    pub source_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawSheet {
    pub fn from_rows(source_name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            source_name: source_name.into(),
            rows,
        }
    }

    pub fn read(path: &Path) -> Result<Self, LoadError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => Self::read_csv(path),
            Some("xlsx" | "xlsm" | "xls" | "xlsb" | "ods") => Self::read_workbook(path),
            _ => Err(LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    fn read_workbook(path: &Path) -> Result<Self, LoadError> {
        let read_error = |message: String| LoadError::Read {
            path: path.to_path_buf(),
            message,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| read_error(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| read_error("workbook has no worksheets".to_string()))?
            .map_err(|e| read_error(e.to_string()))?;

        // calamine ranges begin at the first used cell; pad back to physical positions.
        let (first_row, first_col) = range.start().unwrap_or((0, 0));
        let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); first_row as usize];
        for row in range.rows() {
            let mut cells = vec![Cell::Empty; first_col as usize];
            cells.extend(row.iter().map(Cell::from));
            rows.push(cells);
        }

        Ok(Self::from_rows(path.display().to_string(), rows))
    }

    fn read_csv(path: &Path) -> Result<Self, LoadError> {
        let read_error = |e: csv::Error| LoadError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(read_error)?;

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(read_error)?;
            rows.push(
                record
                    .iter()
                    .map(|field| {
                        if field.trim().is_empty() {
                            Cell::Empty
                        } else {
                            Cell::Text(field.to_string())
                        }
                    })
                    .collect(),
            );
        }

        Ok(Self::from_rows(path.display().to_string(), rows))
    }

    /// Splits the sheet at `header_row`. Labels are trimmed, blanks become
    /// `Unnamed: <n>`, and repeats get `.1`, `.2`, ... suffixes.
    pub fn table(&self, header_row: usize) -> Result<Table, SchemaError> {
        let header = self.rows.get(header_row).ok_or_else(|| SchemaError::MissingHeader {
            source_name: self.source_name.clone(),
            row: header_row + 1,
        })?;

        let width = self.rows[header_row..]
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0);

        let labels = (0..width)
            .map(|idx| {
                header
                    .get(idx)
                    .and_then(Cell::to_text)
                    .map(|label| label.trim().to_string())
                    .filter(|label| !label.is_empty())
                    .unwrap_or_else(|| format!("Unnamed: {idx}"))
            })
            .collect();

        let rows = self.rows[header_row + 1..]
            .iter()
            .map(|row| {
                let mut cells = row.clone();
                cells.resize(width, Cell::Empty);
                cells
            })
            .collect();

        Ok(Table {
            source_name: self.source_name.clone(),
            columns: dedupe_labels(labels),
            rows,
        })
    }
}

impl Table {
    pub fn column(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == label)
    }

    pub fn has_column(&self, label: &str) -> bool {
        self.column(label).is_some()
    }
}

fn dedupe_labels(labels: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(labels.len());

    for label in labels {
        if !taken.contains(&label) {
            taken.insert(label.clone());
            out.push(label);
            continue;
        }

        let suffix = next_suffix.entry(label.clone()).or_insert(1);
        let mut candidate = format!("{label}.{suffix}");
        while taken.contains(&candidate) {
            *suffix += 1;
            candidate = format!("{label}.{suffix}");
        }
        *suffix += 1;
        taken.insert(candidate.clone());
        out.push(candidate);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn repeated_labels_get_numbered() {
        let labels = ["No", "Nama", "A", "B", "A", "B", "A"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            dedupe_labels(labels),
            vec!["No", "Nama", "A", "B", "A.1", "B.1", "A.2"]
        );
    }

    #[test]
    fn dedupe_skips_labels_already_taken() {
        let labels = ["A", "A.1", "A"].iter().map(|s| s.to_string()).collect();
        assert_eq!(dedupe_labels(labels), vec!["A", "A.1", "A.2"]);

        let labels = ["B", "B", "B.1", "B"].iter().map(|s| s.to_string()).collect();
        assert_eq!(dedupe_labels(labels), vec!["B", "B.1", "B.1.1", "B.2"]);
    }

    #[test]
    fn header_is_taken_from_third_row() {
        let sheet = RawSheet::from_rows(
            "memory",
            vec![
                vec![text("SUPERVISI")],
                vec![],
                vec![text(" No "), Cell::Empty, text("A"), text("A")],
                vec![Cell::Number(1.0), text("Budi"), Cell::Number(3.0), text("x"), text("extra")],
            ],
        );
        let table = sheet.table(2).unwrap();
        assert_eq!(table.columns, vec!["No", "Unnamed: 1", "A", "A.1", "Unnamed: 4"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.column("A.1"), Some(3));
    }

    #[test]
    fn short_sheet_has_no_header() {
        let sheet = RawSheet::from_rows("tiny", vec![vec![text("x")]]);
        assert!(matches!(sheet.table(2), Err(SchemaError::MissingHeader { row: 3, .. })));
    }

    #[test]
    fn coercion_is_idempotent_and_never_fails() {
        assert_eq!(text(" 3.5 ").to_number(), Some(3.5));
        assert_eq!(Cell::Number(3.5).to_number(), Some(3.5));
        let once = text("4").to_number().unwrap();
        assert_eq!(Cell::Number(once).to_number(), Some(once));
        assert_eq!(text("n/a").to_number(), None);
        assert_eq!(text("NaN").to_number(), None);
        assert_eq!(Cell::Bool(true).to_number(), None);
        assert_eq!(Cell::Empty.to_number(), None);
    }

    #[test]
    fn numbers_render_like_labels() {
        assert_eq!(Cell::Number(0.25).to_text().as_deref(), Some("0.25"));
        assert_eq!(Cell::Number(1.0).to_text().as_deref(), Some("1"));
        assert_eq!(Cell::Number(-25.0).to_text().as_deref(), Some("-25"));
        assert_eq!(Cell::Empty.to_text(), None);
    }

    #[test]
    fn reads_csv_without_header_inference() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "title,,\n,,\nNo,Nama Guru,A\n1,\"Budi, S.Pd\",3").unwrap();

        let sheet = RawSheet::read(file.path()).unwrap();
        assert_eq!(sheet.rows.len(), 4);
        assert_eq!(sheet.rows[1], vec![Cell::Empty, Cell::Empty, Cell::Empty]);
        assert_eq!(sheet.rows[3][1], text("Budi, S.Pd"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = RawSheet::read(Path::new("scores.txt")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat { .. }));
    }
}
