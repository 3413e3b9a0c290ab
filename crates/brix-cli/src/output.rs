use crate::cli::OutputFormat;
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

/// Prints `value` as pretty JSON or as a flattened two-column table.
pub fn print_value<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let value = serde_json::to_value(value)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&value)?),
        OutputFormat::Table => print_as_table(&value),
    }
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

fn print_as_table(value: &Value) {
    let mut rows = Vec::new();
    flatten("", value, &mut rows);
    if rows.is_empty() {
        println!("(empty)");
        return;
    }

    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (field, value) in rows {
        builder.push_record([field, value]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

/// Flattens nested objects into dotted paths, e.g. `cache.keys.total`.
fn flatten(prefix: &str, value: &Value, rows: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&path, child, rows);
            }
        }
        Value::Null => rows.push((prefix.to_string(), "-".to_string())),
        Value::String(s) => rows.push((prefix.to_string(), s.clone())),
        other => rows.push((prefix.to_string(), other.to_string())),
    }
}
