use crate::error::{CreateDirSnafu, CsvSnafu, JsonSnafu, OutputError, WriteSnafu};
use serde::Serialize;
use snafu::ResultExt;
use std::fs;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

/// Create `dir` and its parents; succeeds when it already exists.
pub fn ensure_dir(dir: &Path) -> Result<(), OutputError> {
    fs::create_dir_all(dir).context(CreateDirSnafu { path: dir })
}

pub fn write_text(path: &Path, contents: &str) -> Result<(), OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).context(WriteSnafu { path })
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path).context(CsvSnafu { path })?;
    for r in rows {
        wtr.serialize(r).context(CsvSnafu { path })?;
    }
    wtr.flush().context(WriteSnafu { path })?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), OutputError> {
    let s = serde_json::to_string_pretty(value).context(JsonSnafu { path })?;
    write_text(path, &s)
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
