use crate::util::format_int;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// One (entity, candidate) cell of a wide vote table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub entity_name: String,
    pub candidate: String,
    pub votes: u64,
}

impl VoteRecord {
    pub fn new(entity_name: impl Into<String>, candidate: impl Into<String>, votes: u64) -> Self {
        VoteRecord {
            entity_name: entity_name.into(),
            candidate: candidate.into(),
            votes,
        }
    }
}

/// Per-entity aggregate. Candidates keep first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityTotals {
    pub entity_name: String,
    pub total_votes: u64,
    pub per_candidate: Vec<(String, u64)>,
}

impl EntityTotals {
    /// Zero totals for an entity that has no vote data.
    pub fn zero(entity_name: impl Into<String>) -> Self {
        EntityTotals {
            entity_name: entity_name.into(),
            total_votes: 0,
            per_candidate: Vec::new(),
        }
    }
}

/// A boundary feature read from a GeoJSON file. `feature_name` is raw; it is
/// normalized only for the join.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoFeature {
    pub feature_name: String,
    pub source: String,
    pub geometry: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorStop {
    pub threshold: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorScale {
    pub min_value: f64,
    pub mid_value: f64,
    pub max_value: f64,
    pub stops: Vec<ColorStop>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityWinner {
    NoWinner,
    Single { candidate: String, votes: u64 },
    Tied { candidates: Vec<String>, votes: u64 },
}

impl EntityWinner {
    pub fn includes(&self, candidate: &str) -> bool {
        match self {
            EntityWinner::NoWinner => false,
            EntityWinner::Single { candidate: c, .. } => c == candidate,
            EntityWinner::Tied { candidates, .. } => candidates.iter().any(|c| c == candidate),
        }
    }

    /// Short label for tables: `"Y (15)"`, `"A / B (10)"` or `"-"`.
    pub fn label(&self) -> String {
        match self {
            EntityWinner::NoWinner => "-".to_string(),
            EntityWinner::Single { candidate, votes } => format!("{} ({})", candidate, votes),
            EntityWinner::Tied { candidates, votes } => {
                format!("{} ({})", candidates.join(" / "), votes)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WinnerSummary {
    pub target_candidate: String,
    pub won: Vec<String>,
    pub lost: Vec<String>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DepartmentTotalsRow {
    #[serde(rename = "Departamento")]
    #[tabled(rename = "Departamento")]
    pub department: String,
    #[serde(rename = "TotalVotos")]
    #[tabled(rename = "TotalVotos", display_with = "display_votes")]
    pub total_votes: u64,
    #[serde(rename = "Ganador")]
    #[tabled(rename = "Ganador")]
    pub winner: String,
}

/// Grouped count for the console preview; the CSV keeps the raw number.
fn display_votes(votes: &u64) -> String {
    format_int(*votes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_row_groups_only_for_display() {
        let row = DepartmentTotalsRow {
            department: "Minas".to_string(),
            total_votes: 1234,
            winner: "-".to_string(),
        };
        assert_eq!(row.fields()[1], "1.234");

        let mut w = csv::Writer::from_writer(Vec::new());
        w.serialize(&row).unwrap();
        let text = String::from_utf8(w.into_inner().unwrap()).unwrap();
        assert_eq!(text, "Departamento,TotalVotos,Ganador\nMinas,1234,-\n");
    }
}
