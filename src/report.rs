// Report content model and its assembler.
//
// The assembler owns the section layout: the five required sections always
// appear, always in the same order, whatever happened upstream. Sections
// whose inputs failed carry a `SectionError` instead of content.
use crate::charts::ChartSpec;
use crate::error::Diagnostic;
use crate::types::WinnerSummary;
use log::warn;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionId {
    DepartmentOverview,
    TotalsOverview,
    LocalityBreakdown,
    PresidentialOverview,
    WinnerSummary,
}

impl SectionId {
    pub const REQUIRED: [SectionId; 5] = [
        SectionId::DepartmentOverview,
        SectionId::TotalsOverview,
        SectionId::LocalityBreakdown,
        SectionId::PresidentialOverview,
        SectionId::WinnerSummary,
    ];

    pub fn title(self) -> &'static str {
        match self {
            SectionId::DepartmentOverview => "Resultados por departamento",
            SectionId::TotalsOverview => "Resultados en la zona norte",
            SectionId::LocalityBreakdown => "Resultados por localidad",
            SectionId::PresidentialOverview => "Resultados presidenciales por departamento",
            SectionId::WinnerSummary => "Resumen de resultados por localidad",
        }
    }

    pub fn tab(self) -> Tab {
        match self {
            SectionId::PresidentialOverview => Tab::Presidente,
            _ => Tab::Gobernador,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Tab {
    Gobernador,
    Presidente,
}

impl Tab {
    pub fn dom_id(self) -> &'static str {
        match self {
            Tab::Gobernador => "Gobernador",
            Tab::Presidente => "Presidente",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tab::Gobernador => "Resultados elecciones 2023-Gobernador Provincial",
            Tab::Presidente => "Resultados elecciones Presidente",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapReference {
    pub src: String,
    pub height_px: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateImage {
    pub candidate: String,
    pub src: String,
    pub placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageManifest {
    pub images: Vec<CandidateImage>,
}

impl ImageManifest {
    /// One image per candidate, in the given order. Candidates that `lookup`
    /// does not know get `placeholder`.
    pub fn resolve<F>(candidates: &[String], lookup: F, placeholder: &str) -> ImageManifest
    where
        F: Fn(&str) -> Option<String>,
    {
        let images = candidates
            .iter()
            .map(|c| match lookup(c) {
                Some(src) => CandidateImage {
                    candidate: c.clone(),
                    src,
                    placeholder: false,
                },
                None => {
                    warn!("no image for candidate {:?}, using placeholder", c);
                    CandidateImage {
                        candidate: c.clone(),
                        src: placeholder.to_string(),
                        placeholder: true,
                    }
                }
            })
            .collect();
        ImageManifest { images }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryBlock {
    pub summary: WinnerSummary,
    /// Plural noun for the entities listed, e.g. "localidades".
    pub entity_plural: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ContentBlock {
    Heading(String),
    Chart(ChartSpec),
    Map(MapReference),
    Images(ImageManifest),
    Summary(SummaryBlock),
    /// Warning text shown to the reader.
    Notice(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionError {
    pub message: String,
}

impl SectionError {
    pub fn new(message: impl Into<String>) -> Self {
        SectionError {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SectionBody {
    Content { blocks: Vec<ContentBlock> },
    Error(SectionError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub id: SectionId,
    pub title: String,
    pub tab: Tab,
    pub body: SectionBody,
}

impl Section {
    pub fn is_error(&self) -> bool {
        matches!(self.body, SectionBody::Error(_))
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        match &self.body {
            SectionBody::Content { blocks } => blocks,
            SectionBody::Error(_) => &[],
        }
    }
}

/// What an upstream stage produced for one section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionInput {
    pub id: SectionId,
    pub body: Result<Vec<ContentBlock>, SectionError>,
}

impl SectionInput {
    pub fn ok(id: SectionId, blocks: Vec<ContentBlock>) -> Self {
        SectionInput { id, body: Ok(blocks) }
    }

    pub fn failed(id: SectionId, message: impl Into<String>) -> Self {
        SectionInput {
            id,
            body: Err(SectionError::new(message)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Complete,
    Degraded { warnings: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportContentModel {
    pub title: String,
    pub status: RunStatus,
    pub sections: Vec<Section>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReportContentModel {
    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Tabs in first-appearance order.
    pub fn tabs(&self) -> Vec<Tab> {
        let mut tabs: Vec<Tab> = Vec::new();
        for s in &self.sections {
            if !tabs.contains(&s.tab) {
                tabs.push(s.tab);
            }
        }
        tabs
    }
}

pub const NO_DATA_MESSAGE: &str = "No hay datos disponibles.";
const NOT_PRODUCED_MESSAGE: &str = "Esta sección no pudo generarse.";

/// Lay out the required sections in their fixed order.
///
/// `fatal` marks the run `Failed` (the report is still complete). With no
/// inputs at all every section reports that no data is available.
pub fn assemble(
    title: &str,
    inputs: Vec<SectionInput>,
    diagnostics: Vec<Diagnostic>,
    fatal: Option<String>,
) -> ReportContentModel {
    let no_inputs = inputs.is_empty();
    let mut inputs: Vec<Option<SectionInput>> = inputs.into_iter().map(Some).collect();

    let sections: Vec<Section> = SectionId::REQUIRED
        .iter()
        .map(|&id| {
            let found = inputs
                .iter_mut()
                .find(|i| i.as_ref().map(|i| i.id) == Some(id))
                .and_then(Option::take);
            let body = match found {
                Some(SectionInput { body: Ok(blocks), .. }) => SectionBody::Content { blocks },
                Some(SectionInput { body: Err(e), .. }) => SectionBody::Error(e),
                None if no_inputs => SectionBody::Error(SectionError::new(NO_DATA_MESSAGE)),
                None => {
                    warn!("section {:?} was not produced", id);
                    SectionBody::Error(SectionError::new(NOT_PRODUCED_MESSAGE))
                }
            };
            Section {
                id,
                title: id.title().to_string(),
                tab: id.tab(),
                body,
            }
        })
        .collect();

    let leftovers = inputs.iter().flatten().count();
    if leftovers > 0 {
        warn!("{} duplicate section input(s) ignored", leftovers);
    }

    let status = match fatal {
        Some(reason) => RunStatus::Failed { reason },
        None if no_inputs => RunStatus::Failed {
            reason: NO_DATA_MESSAGE.to_string(),
        },
        None => {
            let errors = sections.iter().filter(|s| s.is_error()).count();
            if diagnostics.is_empty() && errors == 0 {
                RunStatus::Complete
            } else {
                RunStatus::Degraded {
                    warnings: diagnostics.len().max(errors),
                }
            }
        }
    };

    ReportContentModel {
        title: title.to_string(),
        status,
        sections,
        diagnostics,
    }
}
