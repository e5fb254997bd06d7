// HTML rendering of the content model and the choropleth map.
//
// Both pages load their charting/mapping library from a CDN and receive
// plain JSON. Output is a pure function of the inputs: the report's
// `generated_at` footer is the only varying text.
use crate::charts::ChartSpec;
use crate::geo::{MapArtifact, MapLayer};
use crate::report::{
    ContentBlock, ImageManifest, MapReference, ReportContentModel, RunStatus, Section,
    SectionBody, SummaryBlock,
};
use crate::util::{capitalize_first, escape_html, format_int};
use serde_json::{json, Value};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.27.0.min.js";
const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";

// Minimal writer with deterministic push order.
struct Html {
    buf: String,
}

impl Html {
    fn new() -> Self {
        Html {
            buf: String::with_capacity(64 * 1024),
        }
    }
    fn push<S: AsRef<str>>(&mut self, s: S) {
        self.buf.push_str(s.as_ref());
    }
    fn finish(self) -> String {
        self.buf
    }
}

/// JSON safe to inline inside a `<script>` element.
fn embed_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

/// Plotly `{data, layout, config}` for one chart.
pub fn chart_json(spec: &ChartSpec) -> Value {
    let l = &spec.layout;
    let data: Vec<Value> = spec
        .series
        .iter()
        .map(|s| {
            json!({
                "type": "bar",
                "name": s.name,
                "x": spec.categories,
                "y": s.values,
                "text": s.values,
                "textposition": l.text_position,
                "textangle": 0,
                "opacity": l.bar_opacity,
                "marker": { "color": s.color },
                "hovertemplate": "%{x}<br>%{fullData.name}: %{y}<extra></extra>",
            })
        })
        .collect();
    json!({
        "data": data,
        "layout": {
            "title": { "text": spec.title },
            "barmode": spec.bar_mode,
            "xaxis": { "title": { "text": spec.x_title }, "tickangle": l.tick_angle },
            "yaxis": { "title": { "text": spec.y_title } },
            "legend": { "orientation": l.legend_orientation, "y": l.legend_y },
            "margin": {
                "l": l.margins.left,
                "r": l.margins.right,
                "t": l.margins.top,
                "b": l.margins.bottom,
            },
            "autosize": l.autosize,
        },
        "config": { "responsive": true },
    })
}

pub fn render_report(model: &ReportContentModel, generated_at: &str) -> String {
    let mut w = Html::new();
    let mut charts: Vec<&ChartSpec> = Vec::new();

    w.push("<!DOCTYPE html>\n<html lang=\"es\">\n<head>\n<title>Resultados Electorales</title>\n");
    w.push("<meta charset=\"UTF-8\">\n");
    w.push("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    w.push(format!(
        "<script src=\"{}\" charset=\"utf-8\"></script>\n",
        PLOTLY_CDN
    ));
    w.push("<style>");
    w.push(REPORT_CSS);
    w.push("</style>\n</head>\n<body>\n");

    w.push(format!("<h2>{}</h2>\n", escape_html(&model.title)));
    if let RunStatus::Failed { reason } = &model.status {
        w.push(format!(
            "<div class=\"run-failed\">No fue posible generar el informe completo: {}</div>\n",
            escape_html(reason)
        ));
    }

    w.push("<div class=\"main-content-wrapper\">\n<div class=\"tab-container\">\n");
    let tabs = model.tabs();
    for (i, tab) in tabs.iter().enumerate() {
        let active = if i == 0 { " active" } else { "" };
        w.push(format!(
            "<button class=\"tablinks{}\" onclick=\"openTab(event, '{}')\">{}</button>\n",
            active,
            tab.dom_id(),
            escape_html(tab.label())
        ));
    }
    w.push("</div>\n");

    for (i, tab) in tabs.iter().enumerate() {
        let display = if i == 0 { "block" } else { "none" };
        w.push(format!(
            "<div id=\"{}\" class=\"tabcontent\" style=\"display: {};\">\n",
            tab.dom_id(),
            display
        ));
        for section in model.sections.iter().filter(|s| s.tab == *tab) {
            render_section(&mut w, section, &mut charts);
        }
        w.push("</div>\n");
    }
    w.push("</div>\n");

    if !model.diagnostics.is_empty() {
        w.push(format!(
            "<details class=\"diagnostics\"><summary>Avisos ({})</summary><ul>\n",
            model.diagnostics.len()
        ));
        for d in &model.diagnostics {
            w.push(format!("<li>{}</li>\n", escape_html(&d.message)));
        }
        w.push("</ul></details>\n");
    }
    w.push(format!(
        "<footer>Generado el {}</footer>\n",
        escape_html(generated_at)
    ));

    w.push("<script>");
    w.push(TAB_JS);
    w.push("</script>\n<script>\n");
    for spec in charts {
        w.push(format!(
            "(function(){{var c={};Plotly.newPlot('{}',c.data,c.layout,c.config);}})();\n",
            embed_json(&chart_json(spec)),
            escape_html(&spec.id)
        ));
    }
    w.push("</script>\n</body>\n</html>\n");
    w.finish()
}

fn render_section<'a>(w: &mut Html, section: &'a Section, charts: &mut Vec<&'a ChartSpec>) {
    w.push(format!(
        "<section class=\"report-section\" id=\"sec-{}\">\n<h3 class=\"section-title\">{}</h3>\n",
        serde_json::to_value(section.id)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default(),
        escape_html(&section.title)
    ));
    match &section.body {
        SectionBody::Error(e) => {
            w.push(format!(
                "<p class=\"section-error\">Error: {}</p>\n",
                escape_html(&e.message)
            ));
        }
        SectionBody::Content { blocks } => {
            for block in blocks {
                match block {
                    ContentBlock::Heading(text) => w.push(format!(
                        "<h3 class=\"block-heading\"><b>{}</b></h3>\n",
                        escape_html(text)
                    )),
                    ContentBlock::Chart(spec) if spec.empty => w.push(format!(
                        "<div class=\"plotly-graph-container chart-empty\"><p>{}: sin votos registrados.</p></div>\n",
                        escape_html(&spec.title)
                    )),
                    ContentBlock::Chart(spec) => {
                        w.push(format!(
                            "<div class=\"plotly-graph-container\"><div id=\"{}\" class=\"chart\"></div></div>\n",
                            escape_html(&spec.id)
                        ));
                        charts.push(spec);
                    }
                    ContentBlock::Map(map) => render_map_reference(w, map),
                    ContentBlock::Images(images) => render_images(w, images),
                    ContentBlock::Summary(summary) => render_summary(w, summary),
                    ContentBlock::Notice(text) => {
                        w.push(format!("<p class=\"notice\">{}</p>\n", escape_html(text)))
                    }
                }
            }
        }
    }
    w.push("</section>\n");
}

fn render_map_reference(w: &mut Html, map: &MapReference) {
    w.push(format!(
        "<div class=\"map-frame\"><iframe src=\"{}\" width=\"100%\" height=\"{}px\" frameborder=\"0\"></iframe></div>\n",
        escape_html(&map.src),
        map.height_px
    ));
}

fn render_images(w: &mut Html, images: &ImageManifest) {
    w.push("<div class=\"candidate-images-container\">\n");
    for img in &images.images {
        let class = if img.placeholder {
            "candidate-image placeholder"
        } else {
            "candidate-image"
        };
        w.push(format!(
            "<div class=\"candidate-image-item\"><img src=\"{}\" alt=\"{}\" class=\"{}\"><p class=\"candidate-name\">{}</p></div>\n",
            escape_html(&img.src),
            escape_html(&img.candidate),
            class,
            escape_html(&img.candidate)
        ));
    }
    w.push("</div>\n");
}

fn render_summary(w: &mut Html, block: &SummaryBlock) {
    let s = &block.summary;
    let who = escape_html(&s.target_candidate);
    let plural = escape_html(&capitalize_first(&block.entity_plural));
    w.push(format!(
        "<hr><h2 class=\"summary-title\">Resumen de Resultados para {} por {}</h2>\n",
        who,
        escape_html(&block.entity_plural)
    ));
    w.push(format!("<h3>{} donde {} ganó:</h3>\n", plural, who));
    push_list(
        w,
        &s.won,
        &format!("No ganó en ninguna {}.", singular(&block.entity_plural)),
    );
    w.push(format!("<h3>{} donde {} perdió:</h3>\n", plural, who));
    push_list(
        w,
        &s.lost,
        &format!("Ganó en todas las {}.", escape_html(&block.entity_plural)),
    );
}

fn singular(plural: &str) -> String {
    let trimmed = plural.strip_suffix("es").unwrap_or(plural);
    escape_html(trimmed)
}

fn push_list(w: &mut Html, items: &[String], empty_text: &str) {
    if items.is_empty() {
        w.push(format!("<p>{}</p>\n", empty_text));
        return;
    }
    w.push("<ul>\n");
    for item in items {
        w.push(format!("<li>{}</li>\n", escape_html(item)));
    }
    w.push("</ul>\n");
}

fn popup_html(layer: &MapLayer) -> String {
    let p = &layer.popup;
    if !p.available {
        return format!(
            "<h3>{}</h3><p>Datos no disponibles.</p>",
            escape_html(&p.title)
        );
    }
    let mut out = format!(
        "<h3>Departamento: {}</h3><p><b>Votos Totales:</b> {}</p><p><b>Votos por Candidato:</b></p><ul>",
        escape_html(&p.title),
        format_int(p.total_votes)
    );
    for (candidate, votes) in &p.per_candidate {
        out.push_str(&format!(
            "<li>{}: {}</li>",
            escape_html(candidate),
            format_int(*votes)
        ));
    }
    out.push_str("</ul>");
    out
}

/// GeoJSON handed to Leaflet; each feature carries its fill color and popup.
pub fn map_geojson(map: &MapArtifact) -> Value {
    let features: Vec<Value> = map
        .layers
        .iter()
        .map(|layer| {
            json!({
                "type": "Feature",
                "geometry": layer.geometry,
                "properties": {
                    "name": layer.name,
                    "total_votes": layer.total_votes,
                    "fill_color": layer.fill_color,
                    "popup_html": popup_html(layer),
                },
            })
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

pub fn render_map(map: &MapArtifact, center: [f64; 2], zoom: u8) -> String {
    let mut w = Html::new();
    w.push("<!DOCTYPE html>\n<html lang=\"es\">\n<head>\n<meta charset=\"UTF-8\">\n");
    w.push("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    w.push(format!("<link rel=\"stylesheet\" href=\"{}\">\n", LEAFLET_CSS));
    w.push(format!("<script src=\"{}\"></script>\n", LEAFLET_JS));
    w.push("<style>html, body, #map { height: 100%; margin: 0; }</style>\n</head>\n<body>\n");
    w.push("<div id=\"map\"></div>\n");

    let legend = &map.legend;
    let gradient: Vec<&str> = legend.colors.iter().rev().map(String::as_str).collect();
    w.push(format!(
        "<div class=\"legend\" style=\"position: fixed; bottom: 50%; right: 10px; transform: translateY(50%); z-index: 9999; font-size: 14px; background-color: rgba(255, 255, 255, 0.8); padding: 10px; border: 1px solid #ced4da; border-radius: 5px; color: #343a40;\">\
&nbsp; <b>{}</b><br>\
&nbsp; <i style=\"background: linear-gradient(to top, {}); display: inline-block; width: 20px; height: 80px; vertical-align: middle;\"></i>\
<span style=\"vertical-align: middle;\">{:.0}<br>{:.0}<br>{:.0}</span></div>\n",
        escape_html(&legend.caption),
        gradient.join(", "),
        legend.max,
        legend.mid,
        legend.min
    ));

    w.push("<script>\n");
    w.push(format!("var DATA = {};\n", embed_json(&map_geojson(map))));
    w.push(format!(
        "var map = L.map('map').setView([{}, {}], {});\n",
        center[0], center[1], zoom
    ));
    w.push(MAP_JS);
    w.push("</script>\n</body>\n</html>\n");
    w.finish()
}

const MAP_JS: &str = r#"L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
    attribution: '&copy; OpenStreetMap contributors'
}).addTo(map);
var layer = L.geoJSON(DATA, {
    style: function (f) {
        return { fillColor: f.properties.fill_color, color: 'black', weight: 1, fillOpacity: 0.6 };
    },
    onEachFeature: function (f, l) {
        l.bindPopup(f.properties.popup_html, { maxWidth: 300 });
    }
}).addTo(map);
if (layer.getLayers().length > 0 && layer.getBounds().isValid()) {
    map.fitBounds(layer.getBounds());
}
"#;

const TAB_JS: &str = r#"
function openTab(evt, tabName) {
    var i, tabcontent, tablinks;
    tabcontent = document.getElementsByClassName("tabcontent");
    for (i = 0; i < tabcontent.length; i++) {
        tabcontent[i].style.display = "none";
    }
    tablinks = document.getElementsByClassName("tablinks");
    for (i = 0; i < tablinks.length; i++) {
        tablinks[i].className = tablinks[i].className.replace(" active", "");
    }
    document.getElementById(tabName).style.display = "block";
    evt.currentTarget.className += " active";
    window.dispatchEvent(new Event('resize'));
}
"#;

const REPORT_CSS: &str = r#"
body { font-family: 'Inter', sans-serif; margin: 0; background-color: #f0f2f5; color: #343a40; }
h2 { text-align: center; color: #000000; padding: 20px 0; margin-bottom: 0; }
.main-content-wrapper { max-width: 1200px; margin: 20px auto; background-color: #ffffff; border-radius: 12px; box-shadow: 0 8px 16px rgba(0, 0, 0, 0.1); overflow: hidden; }
.tab-container { display: flex; border-bottom: 2px solid #dee2e6; background-color: #f8f9fa; padding: 0 20px; }
.tab-container button { background-color: transparent; border: none; outline: none; cursor: pointer; padding: 15px 25px; font-size: 16px; font-weight: bold; color: #6c757d; border-bottom: 3px solid transparent; margin-right: 5px; }
.tab-container button:hover { background-color: #e2e6ea; color: #0056b3; }
.tab-container button.active { background-color: #ffffff; color: #007bff; border-bottom: 3px solid #007bff; margin-bottom: -2px; }
.tabcontent { padding: 20px; width: 100%; box-sizing: border-box; }
.section-title, .block-heading, .summary-title { text-align: center; color: #0056b3; }
.plotly-graph-container { width: 100%; margin: 30px auto; box-shadow: 0 6px 12px rgba(0,0,0,0.1); border-radius: 10px; overflow: hidden; border: 1px solid #e0e0e0; background-color: #ffffff; padding: 5px; box-sizing: border-box; }
.chart-empty p { text-align: center; color: #6c757d; padding: 40px 0; }
.map-frame { text-align: center; }
iframe { border-radius: 10px; box-shadow: 0 6px 12px rgba(0,0,0,0.1); border: 1px solid #e0e0e0; }
.candidate-images-container { display: flex; flex-wrap: wrap; justify-content: center; gap: 20px; margin-top: 30px; padding: 20px; background-color: #f8f9fa; border-radius: 10px; }
.candidate-image-item { display: flex; flex-direction: column; align-items: center; text-align: center; width: 100%; max-width: 120px; }
.candidate-image { width: 100px; height: 100px; border-radius: 50%; object-fit: cover; border: 3px solid #007bff; }
.candidate-image.placeholder { border-color: #ced4da; }
.candidate-name { margin-top: 10px; font-weight: bold; font-size: 0.9em; }
.notice { background-color: #fff3cd; border: 1px solid #ffe69c; border-radius: 6px; padding: 8px 12px; }
.section-error, .run-failed { background-color: #f8d7da; border: 1px solid #f1aeb5; border-radius: 6px; padding: 8px 12px; color: #842029; }
.run-failed { max-width: 1200px; margin: 10px auto; }
.diagnostics { max-width: 1200px; margin: 10px auto; }
footer { text-align: center; color: #6c757d; font-size: 0.85em; padding: 20px 0; }
@media (max-width: 768px) {
  .tab-container { flex-direction: column; padding: 0; }
  .tab-container button { margin-right: 0; width: 100%; }
  .main-content-wrapper { margin: 10px; border-radius: 0; box-shadow: none; }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_totals;
    use crate::charts::{build_chart, CategoryAxis};
    use crate::geo::{build_color_scale, build_map, join};
    use crate::report::{assemble, SectionId, SectionInput};
    use crate::types::{GeoFeature, VoteRecord, WinnerSummary};

    fn chart(votes: u64) -> ChartSpec {
        build_chart(
            "chart-deptos",
            "Resultados </script>",
            &[VoteRecord::new("Minas", "Ana", votes)],
            CategoryAxis::Entity {
                title: "Departamento".to_string(),
            },
        )
    }

    #[test]
    fn chart_json_has_one_trace_per_series() {
        let v = chart_json(&chart(12));
        assert_eq!(v["data"].as_array().unwrap().len(), 1);
        assert_eq!(v["data"][0]["y"][0], 12);
        assert_eq!(v["data"][0]["textposition"], "outside");
        assert_eq!(v["layout"]["barmode"], "group");
        assert_eq!(v["layout"]["xaxis"]["tickangle"], 90);
    }

    #[test]
    fn report_places_sections_in_tabs_and_escapes_scripts() {
        let inputs = vec![
            SectionInput::ok(SectionId::DepartmentOverview, vec![ContentBlock::Chart(chart(3))]),
            SectionInput::ok(
                SectionId::LocalityBreakdown,
                vec![ContentBlock::Chart(chart(0))],
            ),
            SectionInput::ok(
                SectionId::WinnerSummary,
                vec![ContentBlock::Summary(SummaryBlock {
                    summary: WinnerSummary {
                        target_candidate: "Ana".to_string(),
                        won: vec![],
                        lost: vec!["Minas".to_string()],
                    },
                    entity_plural: "localidades".to_string(),
                })],
            ),
        ];
        let model = assemble("Título", inputs, vec![], None);
        let html = render_report(&model, "16/10/2026 10:00");
        assert!(html.contains("id=\"Gobernador\""));
        assert!(html.contains("id=\"Presidente\""));
        assert!(html.contains("Plotly.newPlot('chart-deptos'"));
        assert!(!html.contains("Resultados </script>"));
        assert!(html.contains("sin votos registrados"));
        assert!(html.contains("No ganó en ninguna localidad."));
        assert!(html.contains("<li>Minas</li>"));
        assert!(html.contains("class=\"section-error\""));
        assert!(html.contains("Generado el 16/10/2026 10:00"));
        // The empty chart is not plotted.
        assert_eq!(html.matches("Plotly.newPlot(").count(), 1);
    }

    #[test]
    fn failed_report_shows_banner() {
        let model = assemble("T", vec![], vec![], None);
        let html = render_report(&model, "x");
        assert!(html.contains("run-failed"));
        assert!(html.contains("No hay datos disponibles."));
    }

    #[test]
    fn map_page_embeds_colors_and_popups() {
        let totals = aggregate_totals(&[
            VoteRecord::new("Minas", "Ana", 10),
            VoteRecord::new("Minas", "Beto", 5),
            VoteRecord::new("Loncopue", "Ana", 30),
        ]);
        let features = vec![
            GeoFeature {
                feature_name: "minas".to_string(),
                source: "minasg.geojson".to_string(),
                geometry: json!({"type": "Point", "coordinates": [-70.5, -37.1]}),
            },
            GeoFeature {
                feature_name: "Atlantis".to_string(),
                source: "x.geojson".to_string(),
                geometry: Value::Null,
            },
        ];
        let (scale, _) = build_color_scale(&totals.total_values());
        let map = build_map(&join(&features, &totals).joined, &scale, "Votos Totales");
        let gj = map_geojson(&map);
        assert_eq!(gj["features"].as_array().unwrap().len(), 2);
        assert_eq!(gj["features"][0]["properties"]["fill_color"], "#f0f0f0");
        let popup = gj["features"][0]["properties"]["popup_html"].as_str().unwrap();
        assert!(popup.contains("Departamento: Minas"));
        assert!(popup.contains("<li>Beto: 5</li>"));
        let missing = gj["features"][1]["properties"]["popup_html"].as_str().unwrap();
        assert!(missing.contains("Datos no disponibles."));

        let html = render_map(&map, [-37.37, -70.56], 9);
        assert!(html.contains("L.geoJSON(DATA"));
        assert!(html.contains("setView([-37.37, -70.56], 9)"));
        assert!(html.contains("Votos Totales"));
    }
}
