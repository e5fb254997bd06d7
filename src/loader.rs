use crate::error::{EmptyInputSnafu, LoadError, NotFoundSnafu, ParseSnafu};
use crate::util::parse_count;
use csv::{ReaderBuilder, Trim};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// How cells of a delimited table are tokenized and read as counts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub delimiter: u8,
    pub decimal: char,
    pub thousands: Option<char>,
    pub missing_token: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            delimiter: b',',
            decimal: '.',
            thousands: None,
            missing_token: "-".to_string(),
        }
    }
}

impl ParseOptions {
    /// Decimal comma, thousands dot (`1.234,5`).
    pub fn locale_es() -> Self {
        ParseOptions {
            decimal: ',',
            thousands: Some('.'),
            ..ParseOptions::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Count(u64),
    Text(String),
}

impl Cell {
    fn classify(raw: &str, opts: &ParseOptions) -> Cell {
        match parse_count(raw, opts.decimal, opts.thousands, &opts.missing_token) {
            Some(v) => Cell::Count(v),
            None => Cell::Text(raw.trim().to_string()),
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            Cell::Count(v) => Some(*v),
            Cell::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Cell::Count(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub path: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers.iter().position(|h| h.trim() == name)
    }
}

/// Read a delimited table. The file handle lives only inside this call.
pub fn load(path: &Path, opts: &ParseOptions) -> Result<Table, LoadError> {
    if !path.exists() {
        return NotFoundSnafu { path }.fail();
    }
    let mut rdr = ReaderBuilder::new()
        .delimiter(opts.delimiter)
        .has_headers(true)
        .flexible(false)
        .trim(Trim::Headers)
        .from_path(path)
        .map_err(|e| csv_to_load_error(path, e))?;

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| csv_to_load_error(path, e))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return EmptyInputSnafu { path }.fail();
    }

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| csv_to_load_error(path, e))?;
        // A line of only delimiters carries no data.
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        debug!("{}: {:?}", path.display(), record);
        rows.push(record.iter().map(|f| Cell::classify(f, opts)).collect());
    }
    if rows.is_empty() {
        return EmptyInputSnafu { path }.fail();
    }
    Ok(Table {
        path: path.to_path_buf(),
        headers,
        rows,
    })
}

fn csv_to_load_error(path: &Path, err: csv::Error) -> LoadError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    match err.into_kind() {
        csv::ErrorKind::Io(source) if source.kind() == std::io::ErrorKind::NotFound => {
            LoadError::NotFound {
                path: path.to_path_buf(),
            }
        }
        csv::ErrorKind::Io(source) => LoadError::Read {
            path: path.to_path_buf(),
            source,
        },
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => ParseSnafu {
            path,
            line: pos.map(|p| p.line()).unwrap_or(line),
            reason: format!("expected {} fields, found {}", expected_len, len),
        }
        .build(),
        csv::ErrorKind::Utf8 { pos, err } => ParseSnafu {
            path,
            line: pos.map(|p| p.line()).unwrap_or(line),
            reason: err.to_string(),
        }
        .build(),
        other => ParseSnafu {
            path,
            line,
            reason: format!("{:?}", other),
        }
        .build(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, body).expect("write fixture");
        p
    }

    #[test]
    fn loads_counts_and_text() {
        let dir = tempdir().expect("tempdir");
        let p = write(
            dir.path(),
            "loc.csv",
            "Localidad,Departamento,A,B\nAndacollo,Minas,10,-\nHuinganco,Minas,3,4\n",
        );
        let t = load(&p, &ParseOptions::default()).expect("load");
        assert_eq!(t.headers, vec!["Localidad", "Departamento", "A", "B"]);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0][0], Cell::Text("Andacollo".to_string()));
        assert_eq!(t.rows[0][2], Cell::Count(10));
        assert_eq!(t.rows[0][3], Cell::Count(0));
        assert_eq!(t.column_index("B"), Some(3));
        assert_eq!(t.column_index("C"), None);
    }

    #[test]
    fn locale_options_read_thousands_dot() {
        let dir = tempdir().expect("tempdir");
        let p = write(
            dir.path(),
            "pres.csv",
            "Departamento,Massa,Milei\nMinas,\"1.234\",\"2.000,0\"\n",
        );
        let t = load(&p, &ParseOptions::locale_es()).expect("load");
        assert_eq!(t.rows[0][1], Cell::Count(1234));
        assert_eq!(t.rows[0][2], Cell::Count(2000));
    }

    #[test]
    fn semicolon_delimiter_is_honored() {
        let dir = tempdir().expect("tempdir");
        let p = write(dir.path(), "d.csv", "Candidato;Minas\nX;5\n");
        let opts = ParseOptions {
            delimiter: b';',
            ..ParseOptions::default()
        };
        let t = load(&p, &opts).expect("load");
        assert_eq!(t.headers, vec!["Candidato", "Minas"]);
        assert_eq!(t.rows[0][1], Cell::Count(5));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let err = load(&dir.path().join("nope.csv"), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }

    #[test]
    fn header_only_is_empty_input() {
        let dir = tempdir().expect("tempdir");
        let p = write(dir.path(), "h.csv", "Candidato,Minas\n");
        let err = load(&p, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::EmptyInput { .. }));

        let p = write(dir.path(), "blank.csv", "");
        let err = load(&p, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::EmptyInput { .. }));
    }

    #[test]
    fn ragged_row_is_parse_error() {
        let dir = tempdir().expect("tempdir");
        let p = write(dir.path(), "r.csv", "Candidato,Minas,Loncopue\nX,1,2\nY,3\n");
        let err = load(&p, &ParseOptions::default()).unwrap_err();
        match err {
            LoadError::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected {:?}", other),
        }
    }
}
