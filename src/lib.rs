// Static election report generator.
//
// Reads department, locality and presidential vote tables plus department
// boundary files, and writes a tabbed HTML report with bar charts, a
// choropleth map and a won/lost summary for one candidate.
pub mod aggregate;
pub mod charts;
pub mod config;
pub mod error;
pub mod geo;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod types;
pub mod util;
