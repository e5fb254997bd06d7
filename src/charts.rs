// Declarative bar-chart models.
//
// A `ChartSpec` carries everything the chart renderer needs (categories,
// one series per candidate, titles, layout policy) and nothing it has to
// compute. All charts share `ChartLayout::standard()`.
use crate::types::VoteRecord;
use serde::Serialize;
use std::collections::HashMap;

/// D3 "category10", assigned to candidates in first-seen order.
pub const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

pub const VOTES_AXIS_TITLE: &str = "Cantidad de Votos";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BarMode {
    Group,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Margins {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartLayout {
    pub legend_orientation: &'static str,
    pub legend_y: f64,
    pub margins: Margins,
    pub tick_angle: i32,
    pub text_position: &'static str,
    pub bar_opacity: f64,
    pub autosize: bool,
}

impl ChartLayout {
    pub fn standard() -> Self {
        ChartLayout {
            legend_orientation: "v",
            legend_y: 1.0,
            margins: Margins {
                left: 60,
                right: 30,
                top: 60,
                bottom: 120,
            },
            tick_angle: 90,
            text_position: "outside",
            bar_opacity: 0.7,
            autosize: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub color: String,
    /// Aligned with `ChartSpec::categories`; `None` where the pair is absent.
    pub values: Vec<Option<u64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub id: String,
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub bar_mode: BarMode,
    pub categories: Vec<String>,
    pub series: Vec<Series>,
    pub layout: ChartLayout,
    pub empty: bool,
}

impl ChartSpec {
    pub fn total_votes(&self) -> u64 {
        self.series
            .iter()
            .flat_map(|s| s.values.iter())
            .fold(0u64, |acc, v| acc.saturating_add(v.unwrap_or(0)))
    }
}

/// What goes on the x axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryAxis {
    /// Entities on x, grouped bars per candidate.
    Entity { title: String },
    /// Candidates on x; each candidate's series has a single bar.
    Candidate,
}

pub fn build_chart(id: &str, title: &str, records: &[VoteRecord], axis: CategoryAxis) -> ChartSpec {
    let mut candidates: Vec<&str> = Vec::new();
    let mut cand_idx: HashMap<&str, usize> = HashMap::new();
    for r in records {
        if !cand_idx.contains_key(r.candidate.as_str()) {
            cand_idx.insert(r.candidate.as_str(), candidates.len());
            candidates.push(r.candidate.as_str());
        }
    }

    let (x_title, categories): (String, Vec<String>) = match &axis {
        CategoryAxis::Entity { title } => {
            let mut entities: Vec<String> = Vec::new();
            for r in records {
                if !entities.iter().any(|e| *e == r.entity_name) {
                    entities.push(r.entity_name.clone());
                }
            }
            (title.clone(), entities)
        }
        CategoryAxis::Candidate => (
            "Candidato".to_string(),
            candidates.iter().map(|c| c.to_string()).collect(),
        ),
    };
    let cat_idx: HashMap<&str, usize> = categories
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let mut series: Vec<Series> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| Series {
            name: c.to_string(),
            color: PALETTE[i % PALETTE.len()].to_string(),
            values: vec![None; categories.len()],
        })
        .collect();
    for r in records {
        let si = cand_idx[r.candidate.as_str()];
        let category = match axis {
            CategoryAxis::Entity { .. } => r.entity_name.as_str(),
            CategoryAxis::Candidate => r.candidate.as_str(),
        };
        let ci = cat_idx[category];
        let slot = &mut series[si].values[ci];
        *slot = Some(slot.unwrap_or(0).saturating_add(r.votes));
    }

    let mut spec = ChartSpec {
        id: id.to_string(),
        title: title.to_string(),
        x_title,
        y_title: VOTES_AXIS_TITLE.to_string(),
        bar_mode: BarMode::Group,
        categories,
        series,
        layout: ChartLayout::standard(),
        empty: false,
    };
    spec.empty = spec.total_votes() == 0;
    spec
}
