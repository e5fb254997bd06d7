// Error types and the diagnostic taxonomy.
//
// Loader, reshape and geo errors are typed here and converted into a
// `Diagnostic` at the pipeline boundary. Only `OutputError` is allowed to
// stop the binary.
use serde::Serialize;
use snafu::Snafu;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LoadError {
    #[snafu(display("input file not found: {}", path.display()))]
    NotFound { path: PathBuf },

    #[snafu(display("input file {} has no data rows", path.display()))]
    EmptyInput { path: PathBuf },

    #[snafu(display("cannot parse {} at line {line}: {reason}", path.display()))]
    Parse {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[snafu(display("cannot read {}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl LoadError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            LoadError::NotFound { .. } => DiagnosticKind::NotFound,
            LoadError::EmptyInput { .. } => DiagnosticKind::EmptyInput,
            LoadError::Parse { .. } => DiagnosticKind::ParseError,
            LoadError::Read { .. } => DiagnosticKind::Io,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ReshapeError {
    #[snafu(display("column {column:?} is missing from the table"))]
    MissingColumn { column: String },

    #[snafu(display("vote count for {entity:?} / {candidate:?} is not a whole number: {value:?}"))]
    NonNumeric {
        entity: String,
        candidate: String,
        value: String,
    },

    #[snafu(display("vote totals for {entity:?} exceed the supported range"))]
    Overflow { entity: String },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum OutputError {
    #[snafu(display("cannot create directory {}", path.display()))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot write {}", path.display()))]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot serialize JSON for {}", path.display()))]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("cannot write CSV {}", path.display()))]
    Csv { path: PathBuf, source: csv::Error },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("cannot read config {}", path.display()))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("invalid config {}", path.display()))]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Recoverable conditions surfaced in the log and in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    NotFound,
    EmptyInput,
    ParseError,
    JoinMiss,
    DegenerateRange,
    MissingLocality,
    /// The target candidate has no column in a vote table.
    MissingCandidate,
    /// Repeated (entity, candidate) pairs, or entities sharing a join key.
    DuplicateEntry,
    /// A vote table was read but could not be reshaped.
    InvalidTable,
    Io,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
        }
    }

    pub fn from_load(context: &str, err: &LoadError) -> Self {
        Diagnostic::new(err.kind(), format!("{}: {}", context, err))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_errors_map_to_their_diagnostic_kind() {
        let err = LoadError::NotFound {
            path: PathBuf::from("missing.csv"),
        };
        assert_eq!(err.kind(), DiagnosticKind::NotFound);
        let diag = Diagnostic::from_load("localidades", &err);
        assert_eq!(diag.kind, DiagnosticKind::NotFound);
        assert!(diag.message.starts_with("localidades: input file not found"));
        assert!(diag.message.contains("missing.csv"));
    }

    #[test]
    fn parse_error_display_carries_line() {
        let err = LoadError::Parse {
            path: PathBuf::from("t.csv"),
            line: 4,
            reason: "found record with 2 fields".to_string(),
        };
        assert_eq!(err.kind(), DiagnosticKind::ParseError);
        assert_eq!(
            err.to_string(),
            "cannot parse t.csv at line 4: found record with 2 fields"
        );
    }
}
