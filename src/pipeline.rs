// One full run: load, aggregate, join, chart, assemble, render.
//
// Every stage runs to completion before the next one starts. Failures of a
// single input are recorded as diagnostics and turned into placeholder
// content here; only the department table is primary.
use crate::aggregate::{
    aggregate_totals, candidate_totals, find_entity_winner, reshape_wide_to_long, winner_summary,
    Orientation, TotalsTable, WideLayout,
};
use crate::charts::{build_chart, CategoryAxis};
use crate::config::ReportConfig;
use crate::error::{Diagnostic, DiagnosticKind, LoadError, OutputError, ReshapeError};
use crate::geo::{build_color_scale, build_map, join, load_features, MapArtifact};
use crate::loader::{load, Table};
use crate::output::{ensure_dir, write_csv, write_json, write_text};
use crate::render::{render_map, render_report};
use crate::report::{
    assemble, ContentBlock, ImageManifest, MapReference, ReportContentModel, RunStatus, SectionId,
    SectionInput, SummaryBlock,
};
use crate::types::{DepartmentTotalsRow, EntityWinner, GeoFeature, VoteRecord, WinnerSummary};
use crate::util::{normalize_name, slug};
use chrono::{DateTime, Local};
use log::{info, warn};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    LoadInputs,
    Aggregate,
    GeoJoin,
    BuildCharts,
    AssembleReport,
    Render,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::LoadInputs => "load-inputs",
            Stage::Aggregate => "aggregate",
            Stage::GeoJoin => "geo-join",
            Stage::BuildCharts => "build-charts",
            Stage::AssembleReport => "assemble-report",
            Stage::Render => "render",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

fn enter(stage: Stage) {
    info!("stage: {}", stage);
}

#[derive(Default)]
struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Log and keep a diagnostic raised at this boundary.
    fn record(&mut self, d: Diagnostic) {
        warn!("{}", d);
        self.items.push(d);
    }

    /// Keep diagnostics that were already logged where they occurred.
    fn absorb(&mut self, ds: Vec<Diagnostic>) {
        self.items.extend(ds);
    }
}

const DEPARTMENT_LABEL: &str = "departamentos";
const LOCALITY_LABEL: &str = "localidades";
const PRESIDENTIAL_LABEL: &str = "presidente";

/// User-facing (Spanish) description of a load failure.
fn describe_load_error(label: &str, err: &LoadError) -> String {
    match err {
        LoadError::NotFound { path } => format!(
            "El archivo de {} no se encontró en la ruta: {}",
            label,
            path.display()
        ),
        LoadError::EmptyInput { path } => format!(
            "El archivo de {} no contiene datos ({}).",
            label,
            path.display()
        ),
        LoadError::Parse { line, reason, .. } => format!(
            "El archivo de {} tiene una fila ilegible (línea {}): {}",
            label, line, reason
        ),
        LoadError::Read { path, source } => format!(
            "No se pudo leer el archivo de {} ({}): {}",
            label,
            path.display(),
            source
        ),
    }
}

fn describe_reshape_error(label: &str, err: &ReshapeError) -> String {
    format!(
        "Ocurrió un error al procesar el archivo de {}: {}",
        label, err
    )
}

/// Long-form records of one table plus the notices its sections should
/// show, or the message that replaces those sections.
struct TableRecords {
    records: Vec<VoteRecord>,
    notices: Vec<String>,
}

type Records = Result<TableRecords, String>;

/// Record shared join keys and return the notices describing them.
fn collision_notices(label: &str, totals: &TotalsTable, diags: &mut Diagnostics) -> Vec<String> {
    let mut notices = Vec::new();
    for (kept, shadowed) in totals.key_collisions() {
        diags.record(Diagnostic::new(
            DiagnosticKind::DuplicateEntry,
            format!("{}: {:?} and {:?} share a join key", label, kept, shadowed),
        ));
        notices.push(format!(
            "En el archivo de {}, {} y {} se consideran la misma entidad; se usa {}.",
            label, kept, shadowed, kept
        ));
    }
    notices
}

fn to_records(
    label: &str,
    table: Result<Table, LoadError>,
    layout: &WideLayout,
    diags: &mut Diagnostics,
) -> Records {
    let table = match table {
        Ok(t) => t,
        Err(e) => {
            diags.record(Diagnostic::from_load(label, &e));
            return Err(describe_load_error(label, &e));
        }
    };
    match reshape_wide_to_long(&table, layout) {
        Ok(reshaped) => {
            info!(
                "{}: {} records from {} rows",
                label,
                reshaped.records.len(),
                table.rows.len()
            );
            let mut notices = Vec::new();
            for (entity, candidate) in &reshaped.repeated {
                diags.record(Diagnostic::new(
                    DiagnosticKind::DuplicateEntry,
                    format!("{}: repeated entry for {} / {}, summed", label, entity, candidate),
                ));
                notices.push(format!(
                    "El archivo de {} repite {} / {}; los votos se sumaron.",
                    label, entity, candidate
                ));
            }
            Ok(TableRecords {
                records: reshaped.records,
                notices,
            })
        }
        Err(e) => {
            diags.record(Diagnostic::new(
                DiagnosticKind::InvalidTable,
                format!("{}: {}", label, e),
            ));
            Err(describe_reshape_error(label, &e))
        }
    }
}

/// Everything a run produced, before anything is written.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub model: ReportContentModel,
    pub map: Option<MapArtifact>,
    pub department_totals: TotalsTable,
    pub locality_summary: Option<WinnerSummary>,
}

pub fn run(cfg: &ReportConfig) -> RunOutcome {
    enter(Stage::Start);
    let mut diags = Diagnostics::default();

    enter(Stage::LoadInputs);
    let department_table = load(
        &cfg.input_path(&cfg.department_table),
        &cfg.department_options,
    );
    let locality_table = load(&cfg.input_path(&cfg.locality_table), &cfg.locality_options);
    let presidential_table = load(
        &cfg.input_path(&cfg.presidential_table),
        &cfg.presidential_options,
    );
    let mut features: Vec<GeoFeature> = Vec::new();
    let mut geo_notices: Vec<String> = Vec::new();
    for src in &cfg.geo_sources {
        match load_features(&cfg.geo_path(&src.file), &src.department, &cfg.name_property) {
            Ok(mut fs) => features.append(&mut fs),
            Err(e) => {
                diags.record(Diagnostic::from_load("mapas", &e));
                geo_notices.push(describe_load_error("límites", &e));
            }
        }
    }

    enter(Stage::Aggregate);
    let candidate_ids = vec!["Candidato".to_string()];
    let department_records = to_records(
        DEPARTMENT_LABEL,
        department_table,
        &WideLayout {
            id_columns: &candidate_ids,
            key_column: "Candidato",
            orientation: Orientation::RowsAreCandidates,
            value_columns: None,
        },
        &mut diags,
    );
    let locality_ids = vec!["Localidad".to_string(), "Departamento".to_string()];
    let locality_records = to_records(
        LOCALITY_LABEL,
        locality_table,
        &WideLayout {
            id_columns: &locality_ids,
            key_column: "Localidad",
            orientation: Orientation::RowsAreEntities,
            value_columns: None,
        },
        &mut diags,
    );
    let presidential_ids = vec!["Departamento".to_string()];
    let presidential_records = to_records(
        PRESIDENTIAL_LABEL,
        presidential_table,
        &WideLayout {
            id_columns: &presidential_ids,
            key_column: "Departamento",
            orientation: Orientation::RowsAreEntities,
            value_columns: (!cfg.presidential_candidates.is_empty())
                .then_some(cfg.presidential_candidates.as_slice()),
        },
        &mut diags,
    );
    let department_totals = department_records
        .as_ref()
        .map(|t| aggregate_totals(&t.records))
        .unwrap_or_default();
    let locality_totals = locality_records
        .as_ref()
        .map(|t| aggregate_totals(&t.records))
        .unwrap_or_default();
    geo_notices.extend(collision_notices(
        DEPARTMENT_LABEL,
        &department_totals,
        &mut diags,
    ));
    let locality_collisions = collision_notices(LOCALITY_LABEL, &locality_totals, &mut diags);

    enter(Stage::GeoJoin);
    let map = if features.is_empty() {
        warn!("no boundary features loaded; the map is skipped");
        None
    } else {
        let (scale, degenerate) = build_color_scale(&department_totals.total_values());
        if let Some(d) = degenerate {
            geo_notices.push(format!("Escala de colores: {}", d.message));
            diags.record(d);
        }
        let joined = join(&features, &department_totals);
        for d in &joined.diagnostics {
            geo_notices.push(d.message.clone());
        }
        diags.absorb(joined.diagnostics);
        Some(build_map(&joined.joined, &scale, "Votos Totales"))
    };

    enter(Stage::BuildCharts);
    let mut inputs: Vec<SectionInput> = Vec::new();
    let mut locality_summary = None;

    match &department_records {
        Ok(TableRecords { records, notices }) => {
            let chart = build_chart(
                "chart-departamentos",
                "Resultados Electorales por Departamento y Candidato",
                records,
                CategoryAxis::Entity {
                    title: "Departamento".to_string(),
                },
            );
            let candidates: Vec<String> =
                candidate_totals(records).into_iter().map(|(c, _)| c).collect();
            let images = ImageManifest::resolve(
                &candidates,
                |c| cfg.image_src(&cfg.governor_images, c),
                &cfg.placeholder_image,
            );
            let mut blocks = vec![ContentBlock::Chart(chart), ContentBlock::Images(images)];
            blocks.extend(notices.iter().cloned().map(ContentBlock::Notice));
            inputs.push(SectionInput::ok(SectionId::DepartmentOverview, blocks));

            let totals_records: Vec<VoteRecord> = candidate_totals(records)
                .into_iter()
                .map(|(c, v)| VoteRecord::new("Total", c, v))
                .collect();
            let mut blocks = vec![
                ContentBlock::Chart(build_chart(
                    "chart-totales",
                    "Resultados electorales en la zona norte",
                    &totals_records,
                    CategoryAxis::Candidate,
                )),
                ContentBlock::Heading("Votos por departamento Norte Neuquino".to_string()),
            ];
            if map.is_some() {
                blocks.push(ContentBlock::Map(MapReference {
                    src: cfg.map_file.clone(),
                    height_px: cfg.map_height_px,
                }));
            } else {
                blocks.push(ContentBlock::Notice(
                    "El mapa no está disponible: no se pudo cargar ningún archivo de límites."
                        .to_string(),
                ));
            }
            blocks.extend(geo_notices.iter().cloned().map(ContentBlock::Notice));
            inputs.push(SectionInput::ok(SectionId::TotalsOverview, blocks));
        }
        Err(message) => {
            inputs.push(SectionInput::failed(SectionId::DepartmentOverview, message.clone()));
            inputs.push(SectionInput::failed(SectionId::TotalsOverview, message.clone()));
        }
    }

    match &locality_records {
        Ok(TableRecords { records, notices }) => {
            let order: Vec<String> = if cfg.localities.is_empty() {
                locality_totals
                    .entries()
                    .iter()
                    .map(|e| e.entity_name.clone())
                    .collect()
            } else {
                cfg.localities.clone()
            };
            let mut blocks: Vec<ContentBlock> = notices
                .iter()
                .chain(&locality_collisions)
                .cloned()
                .map(ContentBlock::Notice)
                .collect();
            for name in &order {
                let key = normalize_name(name);
                let scoped: Vec<VoteRecord> = records
                    .iter()
                    .filter(|r| normalize_name(&r.entity_name) == key)
                    .cloned()
                    .collect();
                if scoped.is_empty() {
                    diags.record(Diagnostic::new(
                        DiagnosticKind::MissingLocality,
                        format!("locality {:?} not found in the locality table", name),
                    ));
                    blocks.push(ContentBlock::Notice(format!(
                        "Localidad {} no encontrada en el archivo de localidades.",
                        name
                    )));
                    continue;
                }
                info!("chart for locality {}", name);
                blocks.push(ContentBlock::Chart(build_chart(
                    &format!("chart-localidad-{}", slug(name)),
                    &format!("Resultados Electorales en {}", name),
                    &scoped,
                    CategoryAxis::Candidate,
                )));
            }
            inputs.push(SectionInput::ok(SectionId::LocalityBreakdown, blocks));

            let summary = winner_summary(&cfg.target_candidate, &locality_totals);
            let mut blocks = Vec::new();
            if !records.iter().any(|r| r.candidate == cfg.target_candidate) {
                diags.record(Diagnostic::new(
                    DiagnosticKind::MissingCandidate,
                    format!(
                        "candidate {:?} has no column in the locality table",
                        cfg.target_candidate
                    ),
                ));
                blocks.push(ContentBlock::Notice(format!(
                    "El candidato {} no figura en el archivo de localidades.",
                    cfg.target_candidate
                )));
            }
            blocks.push(ContentBlock::Summary(SummaryBlock {
                summary: summary.clone(),
                entity_plural: "localidades".to_string(),
            }));
            inputs.push(SectionInput::ok(SectionId::WinnerSummary, blocks));
            locality_summary = Some(summary);
        }
        Err(message) => {
            inputs.push(SectionInput::failed(SectionId::LocalityBreakdown, message.clone()));
            inputs.push(SectionInput::failed(SectionId::WinnerSummary, message.clone()));
        }
    }

    match &presidential_records {
        Ok(TableRecords { records, notices }) => {
            let chart = build_chart(
                "chart-presidente",
                "Resultados Electorales Presidenciales por Departamento",
                records,
                CategoryAxis::Entity {
                    title: "Departamento".to_string(),
                },
            );
            let candidates: Vec<String> = if cfg.presidential_candidates.is_empty() {
                candidate_totals(records).into_iter().map(|(c, _)| c).collect()
            } else {
                cfg.presidential_candidates.clone()
            };
            let images = ImageManifest::resolve(
                &candidates,
                |c| cfg.image_src(&cfg.presidential_images, c),
                &cfg.placeholder_image,
            );
            let mut blocks = vec![ContentBlock::Chart(chart), ContentBlock::Images(images)];
            blocks.extend(notices.iter().cloned().map(ContentBlock::Notice));
            inputs.push(SectionInput::ok(SectionId::PresidentialOverview, blocks));
        }
        Err(message) => {
            inputs.push(SectionInput::failed(
                SectionId::PresidentialOverview,
                message.clone(),
            ));
        }
    }

    enter(Stage::AssembleReport);
    let fatal = department_records
        .as_ref()
        .err()
        .map(|m| format!("sin datos de departamentos. {}", m));
    let model = assemble(&cfg.report_title, inputs, diags.items, fatal);
    match &model.status {
        RunStatus::Complete => info!("report assembled"),
        RunStatus::Degraded { warnings } => warn!("report assembled with {} warning(s)", warnings),
        RunStatus::Failed { reason } => warn!("report assembled as failed: {}", reason),
    }

    RunOutcome {
        model,
        map,
        department_totals,
        locality_summary,
    }
}

#[derive(Debug, Serialize)]
pub struct DepartmentSummary {
    pub department: String,
    pub total_votes: u64,
    pub winner: EntityWinner,
}

/// Contents of the JSON run summary.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub generated_at: DateTime<Local>,
    pub status: &'a RunStatus,
    pub departments: Vec<DepartmentSummary>,
    pub locality_summary: Option<&'a WinnerSummary>,
    pub diagnostics: &'a [Diagnostic],
}

pub fn department_rows(totals: &TotalsTable) -> Vec<DepartmentTotalsRow> {
    totals
        .entries()
        .iter()
        .map(|e| DepartmentTotalsRow {
            department: e.entity_name.clone(),
            total_votes: e.total_votes,
            winner: find_entity_winner(e).label(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub report: PathBuf,
    pub map: Option<PathBuf>,
    pub summary: PathBuf,
    pub totals_csv: PathBuf,
}

/// Render and write every output file under `cfg.output_dir`.
pub fn write_outputs(
    cfg: &ReportConfig,
    outcome: &RunOutcome,
    generated_at: DateTime<Local>,
) -> Result<WrittenFiles, OutputError> {
    enter(Stage::Render);
    ensure_dir(&cfg.output_dir)?;

    let stamp = generated_at.format("%d/%m/%Y %H:%M").to_string();
    let report = cfg.output_path(&cfg.report_file);
    write_text(&report, &render_report(&outcome.model, &stamp))?;
    info!("report written to {}", report.display());

    let map = match &outcome.map {
        Some(artifact) => {
            let path = cfg.output_path(&cfg.map_file);
            write_text(&path, &render_map(artifact, cfg.map_center, cfg.map_zoom))?;
            info!("map written to {}", path.display());
            Some(path)
        }
        None => None,
    };

    let summary = cfg.output_path(&cfg.summary_file);
    let departments = outcome
        .department_totals
        .entries()
        .iter()
        .map(|e| DepartmentSummary {
            department: e.entity_name.clone(),
            total_votes: e.total_votes,
            winner: find_entity_winner(e),
        })
        .collect();
    write_json(
        &summary,
        &RunSummary {
            generated_at,
            status: &outcome.model.status,
            departments,
            locality_summary: outcome.locality_summary.as_ref(),
            diagnostics: &outcome.model.diagnostics,
        },
    )?;

    let totals_csv = cfg.output_path(&cfg.totals_csv_file);
    write_csv(&totals_csv, &department_rows(&outcome.department_totals))?;

    enter(Stage::Done);
    Ok(WrittenFiles {
        report,
        map,
        summary,
        totals_csv,
    })
}
