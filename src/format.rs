//! Output rendering for the command surface.
//!
//! Structured formats (json, csv, md, xml) render generically from the
//! serialized records; `text` stays with each command, which knows how a
//! human wants to read its output. [`render_records`] returns `None` for
//! text to signal that.

use std::str::FromStr;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
    Md,
    Xml,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "md" => Ok(Self::Md),
            "xml" => Ok(Self::Xml),
            _ => Err(format!("unknown format: {s} (text|json|csv|md|xml)")),
        }
    }
}

/// Render records in a structured format, or `None` for text.
pub fn render_records(records: &[Value], format: OutputFormat) -> Option<String> {
    match format {
        OutputFormat::Text => None,
        OutputFormat::Json => Some(
            serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string()),
        ),
        OutputFormat::Csv => Some(render_csv(records)),
        OutputFormat::Md => Some(render_md(records)),
        OutputFormat::Xml => Some(render_xml(records)),
    }
}

/// Render one object in a structured format, or `None` for text.
pub fn render_record(record: &Value, format: OutputFormat) -> Option<String> {
    match format {
        OutputFormat::Text => None,
        OutputFormat::Json => {
            Some(serde_json::to_string_pretty(record).unwrap_or_else(|_| "{}".to_string()))
        }
        OutputFormat::Csv | OutputFormat::Md | OutputFormat::Xml => {
            render_records(std::slice::from_ref(record), format)
        }
    }
}

fn columns(records: &[Value]) -> Vec<String> {
    records
        .first()
        .and_then(|v| v.as_object())
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default()
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn render_csv(records: &[Value]) -> String {
    let cols = columns(records);
    if cols.is_empty() {
        return String::new();
    }

    let mut out = cols.join(",");
    out.push('\n');
    for record in records {
        let row: Vec<String> = cols
            .iter()
            .map(|col| csv_escape(&cell(&record[col.as_str()])))
            .collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn render_md(records: &[Value]) -> String {
    let cols = columns(records);
    if cols.is_empty() {
        return String::new();
    }

    let mut out = format!("| {} |\n", cols.join(" | "));
    out.push_str(&format!(
        "|{}\n",
        cols.iter().map(|_| "---|").collect::<String>()
    ));
    for record in records {
        let row: Vec<String> = cols
            .iter()
            .map(|col| cell(&record[col.as_str()]).replace('|', "\\|").replace('\n', " "))
            .collect();
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}

fn render_xml(records: &[Value]) -> String {
    let mut out = String::from("<records>\n");
    for record in records {
        out.push_str("  <record>\n");
        if let Some(obj) = record.as_object() {
            for (key, value) in obj {
                out.push_str(&format!(
                    "    <{key}>{}</{key}>\n",
                    xml_escape(&cell(value))
                ));
            }
        }
        out.push_str("  </record>\n");
    }
    out.push_str("</records>\n");
    out
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<Value> {
        vec![
            json!({"name": "a.md", "score": 0.9}),
            json!({"name": "b,c.md", "score": 0.5}),
        ]
    }

    #[test]
    fn format_parses_all_names() {
        for (name, expected) in [
            ("text", OutputFormat::Text),
            ("json", OutputFormat::Json),
            ("csv", OutputFormat::Csv),
            ("md", OutputFormat::Md),
            ("xml", OutputFormat::Xml),
        ] {
            assert_eq!(OutputFormat::from_str(name).unwrap(), expected);
        }
        assert!(OutputFormat::from_str("yaml").is_err());
    }

    #[test]
    fn text_returns_none() {
        assert!(render_records(&records(), OutputFormat::Text).is_none());
    }

    #[test]
    fn json_is_pretty_array() {
        let out = render_records(&records(), OutputFormat::Json).unwrap();
        assert!(out.starts_with('['));
        assert!(out.contains("\"name\": \"a.md\""));
    }

    #[test]
    fn csv_has_header_and_escaping() {
        let out = render_records(&records(), OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "name,score");
        assert_eq!(lines[1], "a.md,0.9");
        assert_eq!(lines[2], "\"b,c.md\",0.5");
    }

    #[test]
    fn md_renders_pipe_table() {
        let out = render_records(&records(), OutputFormat::Md).unwrap();
        assert!(out.starts_with("| name | score |"));
        assert!(out.contains("|---|---|"));
        assert!(out.contains("| a.md | 0.9 |"));
    }

    #[test]
    fn xml_escapes_content() {
        let recs = vec![json!({"body": "a < b & c"})];
        let out = render_records(&recs, OutputFormat::Xml).unwrap();
        assert!(out.contains("<body>a &lt; b &amp; c</body>"));
    }

    #[test]
    fn empty_records_render_empty() {
        assert_eq!(render_records(&[], OutputFormat::Csv).unwrap(), "");
        let json = render_records(&[], OutputFormat::Json).unwrap();
        assert_eq!(json, "[]");
    }
}
