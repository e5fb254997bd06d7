// Run configuration.
//
// Every field has a built-in default matching the northern Neuquén data
// set. An optional `elecciones.json` next to the binary's working directory
// overrides any subset of fields.
use crate::error::{ConfigError, ConfigParseSnafu, ConfigReadSnafu};
use crate::loader::ParseOptions;
use log::{info, warn};
use once_cell::sync::Lazy;
use serde::Deserialize;
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "elecciones.json";

/// One boundary file and the department it draws.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeoSource {
    pub file: String,
    pub department: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,

    pub department_table: String,
    pub department_options: ParseOptions,
    pub locality_table: String,
    pub locality_options: ParseOptions,
    pub presidential_table: String,
    pub presidential_options: ParseOptions,

    pub geo_dir: String,
    pub geo_sources: Vec<GeoSource>,
    pub name_property: String,

    pub report_file: String,
    pub map_file: String,
    pub summary_file: String,
    pub totals_csv_file: String,

    pub report_title: String,
    pub target_candidate: String,
    /// Display order of the per-locality charts. Empty means file order.
    pub localities: Vec<String>,
    /// Presidential columns to chart. Empty means every candidate column.
    pub presidential_candidates: Vec<String>,

    pub images_dir: String,
    pub placeholder_image: String,
    pub governor_images: BTreeMap<String, String>,
    pub presidential_images: BTreeMap<String, String>,

    pub map_center: [f64; 2],
    pub map_zoom: u8,
    pub map_height_px: u32,
}

pub static DEFAULT_CONFIG: Lazy<ReportConfig> = Lazy::new(builtin);

impl Default for ReportConfig {
    fn default() -> Self {
        DEFAULT_CONFIG.clone()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn manifest(items: &[(&str, &str)]) -> BTreeMap<String, String> {
    items
        .iter()
        .map(|(c, f)| (c.to_string(), f.to_string()))
        .collect()
}

fn builtin() -> ReportConfig {
    ReportConfig {
        input_dir: PathBuf::from("."),
        output_dir: PathBuf::from("."),
        department_table: "Datos_Norte_NQN - departamentos.csv".to_string(),
        department_options: ParseOptions::default(),
        locality_table: "Datos_Norte_NQN - localidades.csv".to_string(),
        locality_options: ParseOptions::default(),
        presidential_table: "Datos_Norte_NQN - Copia de presidente.csv".to_string(),
        presidential_options: ParseOptions::locale_es(),
        geo_dir: "mapas".to_string(),
        geo_sources: [
            ("minasg.geojson", "Minas"),
            ("chosmalal.geojson", "Chos malal"),
            ("pehuenches.geojson", "Pehuenches"),
            ("ñorquin.geojson", "Ñorquin"),
            ("loncopue.geojson", "Loncopue"),
        ]
        .iter()
        .map(|(f, d)| GeoSource {
            file: f.to_string(),
            department: d.to_string(),
        })
        .collect(),
        name_property: "name".to_string(),
        report_file: "grafico_elecciones.html".to_string(),
        map_file: "mapa_minas.html".to_string(),
        summary_file: "resumen.json".to_string(),
        totals_csv_file: "totales_departamentos.csv".to_string(),
        report_title: "Análisis de elecciones en el Norte de la Provincia de Neuquén".to_string(),
        target_candidate: "Rolando Figueroa".to_string(),
        localities: strings(&[
            "Huinganco",
            "Andacollo",
            "Los Miches",
            "Villa del Nahueve",
            "Las Ovejas",
            "Manzano Amargo",
            "Varvarco-Invernada Vieja",
            "Guañacos",
            "Colipilli",
            "El Huecu",
            "El Cholar",
            "Taquimilán",
            "Naunauco",
            "Tralaitue",
            "Caviahue-Copahue",
            "Coyuco-Cochico",
            "Cajón del Curí Leuvú",
            "Villa Curí Leuvú",
            "Chapua",
            "Chos Malal Fuera de Radio",
            "Chos Malal",
            "Chorriaca",
            "Huncal",
            "Quintuco",
            "Huarenchenque",
            "Cajón De Almaza",
            "Loncopué",
            "Buta Ranquil",
            "Barrancas",
            "Huantraico",
            "Rincón De Los Sauces",
            "Octavio Pico",
        ]),
        presidential_candidates: strings(&[
            "Sergio Massa",
            "Javier Milei",
            "Patricia Bullrich",
            "Juan Schiaretti",
            "Myriam Bregman",
        ]),
        images_dir: "image".to_string(),
        placeholder_image: "https://placehold.co/100x100?text=Sin+foto".to_string(),
        governor_images: manifest(&[
            ("Rolando Figueroa", "rolando figueroa.png"),
            ("Marcos Koopmann", "marcos koopmann.png"),
            ("Ramon Rioseco", "ramon rioseco.png"),
            ("Mario Pablo Cervi", "mario pablo cervi.png"),
            ("Carlos Eguia", "carlos eguia.png"),
            ("Patricia Jure", "patricia jure.png"),
        ]),
        presidential_images: manifest(&[
            ("Sergio Massa", "sergio massa.png"),
            ("Javier Milei", "javier milei.png"),
            ("Patricia Bullrich", "patricia.png"),
            ("Juan Schiaretti", "juan.png"),
            ("Myriam Bregman", "miryam.png"),
        ]),
        map_center: [-37.37, -70.56],
        map_zoom: 9,
        map_height_px: 400,
    }
}

impl ReportConfig {
    pub fn load(path: &Path) -> Result<ReportConfig, ConfigError> {
        let text = fs::read_to_string(path).context(ConfigReadSnafu { path })?;
        serde_json::from_str(&text).context(ConfigParseSnafu { path })
    }

    /// Use `path` when it exists and parses; fall back to the defaults
    /// otherwise.
    pub fn load_or_default(path: &Path) -> ReportConfig {
        if !path.exists() {
            info!("no {} found, using built-in configuration", path.display());
            return ReportConfig::default();
        }
        match ReportConfig::load(path) {
            Ok(cfg) => {
                info!("configuration read from {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("{}; using built-in configuration", e);
                ReportConfig::default()
            }
        }
    }

    pub fn input_path(&self, file: &str) -> PathBuf {
        self.input_dir.join(file)
    }

    pub fn geo_path(&self, file: &str) -> PathBuf {
        self.input_dir.join(&self.geo_dir).join(file)
    }

    pub fn output_path(&self, file: &str) -> PathBuf {
        self.output_dir.join(file)
    }

    /// `image/<file>` for candidates listed in `manifest`.
    pub fn image_src(&self, manifest: &BTreeMap<String, String>, candidate: &str) -> Option<String> {
        manifest
            .get(candidate)
            .map(|file| format!("{}/{}", self.images_dir, file))
    }
}
