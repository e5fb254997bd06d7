// Boundary loading, the vote/boundary join and the choropleth color scale.
use crate::aggregate::TotalsTable;
use crate::error::{
    Diagnostic, DiagnosticKind, EmptyInputSnafu, LoadError, NotFoundSnafu, ParseSnafu, ReadSnafu,
};
use crate::types::{ColorScale, ColorStop, EntityTotals, GeoFeature};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use snafu::ResultExt;
use std::fs;
use std::path::Path;

/// Low, middle and high colors of the choropleth.
pub const SCALE_COLORS: [&str; 3] = ["#f0f0f0", "#e31a1c", "#800026"];

const FALLBACK_NAME_PROPERTY: &str = "nombre";

/// Read a GeoJSON `FeatureCollection` (or a lone `Feature`).
///
/// The feature name comes from `name_property`, then `nombre`, then the
/// configured label of the file.
pub fn load_features(
    path: &Path,
    source_label: &str,
    name_property: &str,
) -> Result<Vec<GeoFeature>, LoadError> {
    if !path.exists() {
        return NotFoundSnafu { path }.fail();
    }
    let text = fs::read_to_string(path).context(ReadSnafu { path })?;
    if text.trim().is_empty() {
        return EmptyInputSnafu { path }.fail();
    }
    let doc: Value = serde_json::from_str(&text).map_err(|e| {
        ParseSnafu {
            path,
            line: e.line() as u64,
            reason: e.to_string(),
        }
        .build()
    })?;

    let raw_features: Vec<&Value> = match doc.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => doc
            .get("features")
            .and_then(Value::as_array)
            .map(|a| a.iter().collect())
            .unwrap_or_default(),
        Some("Feature") => vec![&doc],
        other => {
            return ParseSnafu {
                path,
                line: 1u64,
                reason: format!("expected a GeoJSON FeatureCollection, found type {:?}", other),
            }
            .fail()
        }
    };

    let mut features = Vec::with_capacity(raw_features.len());
    for f in raw_features {
        let props = f.get("properties");
        let prop_name = |key: &str| {
            props
                .and_then(|p| p.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let feature_name = prop_name(name_property)
            .or_else(|| prop_name(FALLBACK_NAME_PROPERTY))
            .unwrap_or_else(|| source_label.to_string());
        debug!("{}: feature {:?}", path.display(), feature_name);
        features.push(GeoFeature {
            feature_name,
            source: source_label.to_string(),
            geometry: f.get("geometry").cloned().unwrap_or(Value::Null),
        });
    }
    if features.is_empty() {
        return EmptyInputSnafu { path }.fail();
    }
    Ok(features)
}

/// Three-stop scale over the value range. A collapsed range is widened to
/// `min..min + 1` and reported.
pub fn build_color_scale(values: &[f64]) -> (ColorScale, Option<Diagnostic>) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let mut diagnostic = None;
    let (min, mut max) = if finite.is_empty() {
        diagnostic = Some(Diagnostic::new(
            DiagnosticKind::DegenerateRange,
            "no values for the color scale; using 0..1",
        ));
        (0.0, 0.0)
    } else {
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (min, max)
    };
    if max <= min {
        if diagnostic.is_none() {
            diagnostic = Some(Diagnostic::new(
                DiagnosticKind::DegenerateRange,
                format!("all totals equal {}; widening scale to {}..{}", min, min, min + 1.0),
            ));
        }
        max = min + 1.0;
    }
    let mid = (min + max) / 2.0;
    let scale = ColorScale {
        min_value: min,
        mid_value: mid,
        max_value: max,
        stops: vec![
            ColorStop {
                threshold: min,
                color: SCALE_COLORS[0].to_string(),
            },
            ColorStop {
                threshold: mid,
                color: SCALE_COLORS[1].to_string(),
            },
            ColorStop {
                threshold: max,
                color: SCALE_COLORS[2].to_string(),
            },
        ],
    };
    (scale, diagnostic)
}

/// Linear RGB interpolation between the bracketing stops, clamped at both
/// ends.
pub fn color_for(scale: &ColorScale, value: f64) -> String {
    let stops = &scale.stops;
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return SCALE_COLORS[0].to_string();
    };
    if !value.is_finite() || value <= first.threshold {
        return first.color.clone();
    }
    if value >= last.threshold {
        return last.color.clone();
    }
    for pair in stops.windows(2) {
        let (lo, hi) = (&pair[0], &pair[1]);
        if value >= lo.threshold && value <= hi.threshold {
            let span = hi.threshold - lo.threshold;
            let t = if span > 0.0 {
                (value - lo.threshold) / span
            } else {
                0.0
            };
            return lerp_hex(&lo.color, &hi.color, t);
        }
    }
    last.color.clone()
}

fn hex_rgb(s: &str) -> Option<(u8, u8, u8)> {
    let h = s.strip_prefix('#')?;
    if h.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&h[0..2], 16).ok()?;
    let g = u8::from_str_radix(&h[2..4], 16).ok()?;
    let b = u8::from_str_radix(&h[4..6], 16).ok()?;
    Some((r, g, b))
}

fn lerp_hex(a: &str, b: &str, t: f64) -> String {
    let (ar, ag, ab) = hex_rgb(a).unwrap_or((0, 0, 0));
    let (br, bg, bb) = hex_rgb(b).unwrap_or((0, 0, 0));
    let mix = |x: u8, y: u8| -> u8 {
        let v = x as f64 + (y as f64 - x as f64) * t;
        v.round().clamp(0.0, 255.0) as u8
    };
    format!("#{:02x}{:02x}{:02x}", mix(ar, br), mix(ag, bg), mix(ab, bb))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedFeature {
    pub feature: GeoFeature,
    pub totals: EntityTotals,
    pub matched: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinOutcome {
    pub joined: Vec<JoinedFeature>,
    pub diagnostics: Vec<Diagnostic>,
}

/// One output per input feature, in input order. Features without vote
/// data get zero totals and a `JoinMiss` diagnostic.
pub fn join(features: &[GeoFeature], totals: &TotalsTable) -> JoinOutcome {
    let mut out = JoinOutcome::default();
    for f in features {
        match totals.get_normalized(&f.feature_name) {
            Some(t) => out.joined.push(JoinedFeature {
                feature: f.clone(),
                totals: t.clone(),
                matched: true,
            }),
            None => {
                let msg = format!(
                    "boundary {:?} from {} has no vote data; shown with zero votes",
                    f.feature_name, f.source
                );
                warn!("{}", msg);
                out.diagnostics
                    .push(Diagnostic::new(DiagnosticKind::JoinMiss, msg));
                out.joined.push(JoinedFeature {
                    feature: f.clone(),
                    totals: EntityTotals::zero(f.feature_name.trim()),
                    matched: false,
                });
            }
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Popup {
    pub title: String,
    pub available: bool,
    pub total_votes: u64,
    pub per_candidate: Vec<(String, u64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLayer {
    pub name: String,
    pub fill_color: String,
    pub total_votes: u64,
    pub popup: Popup,
    pub geometry: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub caption: String,
    pub min: f64,
    pub mid: f64,
    pub max: f64,
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapArtifact {
    pub layers: Vec<MapLayer>,
    pub legend: Legend,
}

pub fn build_map(joined: &[JoinedFeature], scale: &ColorScale, caption: &str) -> MapArtifact {
    let layers = joined
        .iter()
        .map(|j| MapLayer {
            name: j.totals.entity_name.clone(),
            fill_color: color_for(scale, j.totals.total_votes as f64),
            total_votes: j.totals.total_votes,
            popup: Popup {
                title: j.totals.entity_name.clone(),
                available: j.matched,
                total_votes: j.totals.total_votes,
                per_candidate: j.totals.per_candidate.clone(),
            },
            geometry: j.feature.geometry.clone(),
        })
        .collect();
    MapArtifact {
        layers,
        legend: Legend {
            caption: caption.to_string(),
            min: scale.min_value,
            mid: scale.mid_value,
            max: scale.max_value,
            colors: scale.stops.iter().map(|s| s.color.clone()).collect(),
        },
    }
}
