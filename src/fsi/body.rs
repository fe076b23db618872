//! CSV encoding for tabular bodies.
//!
//! A tabular body is a JSON array of rows, each an array of scalars. Column
//! types come from the structure's schema when it declares them
//! (`items.items[*].type`). Untyped cells are inferred; strings that would
//! otherwise read back as another type are quoted on write.

use serde_json::{Number, Value};

use crate::dataset::Structure;

/// Whether the structure asks for a header row.
pub fn has_header_row(structure: Option<&Structure>) -> bool {
    structure
        .and_then(|st| st.format_config.as_ref())
        .and_then(|config| config.get("headerRow"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn schema_columns(structure: Option<&Structure>) -> Vec<&Value> {
    structure
        .and_then(|st| st.schema.as_ref())
        .and_then(|schema| schema.get("items"))
        .and_then(|items| items.get("items"))
        .and_then(Value::as_array)
        .map(|columns| columns.iter().collect())
        .unwrap_or_default()
}

/// Column titles declared by the schema.
pub fn column_titles(structure: Option<&Structure>) -> Vec<String> {
    schema_columns(structure)
        .into_iter()
        .map(|col| {
            col.get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

fn column_types(structure: Option<&Structure>) -> Vec<Option<String>> {
    schema_columns(structure)
        .into_iter()
        .map(|col| col.get("type").and_then(Value::as_str).map(str::to_string))
        .collect()
}

// =============================================================================
// Encode
// =============================================================================

/// Encode a tabular body as CSV text.
pub fn encode_csv(body: &Value, structure: Option<&Structure>) -> Result<String, String> {
    let rows = body
        .as_array()
        .ok_or("CSV bodies must be an array of rows")?;

    let mut out = String::new();
    if has_header_row(structure) {
        let titles = column_titles(structure);
        let cells: Vec<String> = titles.iter().map(|t| encode_text(t)).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }

    for (i, row) in rows.iter().enumerate() {
        let cells = row
            .as_array()
            .ok_or_else(|| format!("row {} is not an array", i))?;
        let encoded: Vec<String> = cells.iter().map(encode_cell).collect();
        out.push_str(&encoded.join(","));
        out.push('\n');
    }
    Ok(out)
}

fn encode_cell(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => encode_text(s),
        nested => quote(&nested.to_string()),
    }
}

/// Quote text only when it would not read back as the same string.
fn encode_text(s: &str) -> String {
    if infer_cell(s).is_string() && !needs_quotes(s) {
        s.to_string()
    } else {
        quote(s)
    }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.contains([',', '"', '\n', '\r'])
        || s.starts_with(char::is_whitespace)
        || s.ends_with(char::is_whitespace)
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

// =============================================================================
// Decode
// =============================================================================

/// A raw CSV cell and whether it was quoted.
struct Cell {
    text: String,
    quoted: bool,
}

/// Decode CSV text into a tabular body.
pub fn decode_csv(text: &str, structure: Option<&Structure>) -> Result<Value, String> {
    let mut records = split_records(text)?;
    if has_header_row(structure) && !records.is_empty() {
        records.remove(0);
    }

    let types = column_types(structure);
    let mut rows = Vec::with_capacity(records.len());
    for (line, record) in records.into_iter().enumerate() {
        let mut row = Vec::with_capacity(record.len());
        for (col, cell) in record.into_iter().enumerate() {
            let declared = types.get(col).and_then(|t| t.as_deref());
            let value = typed_cell(cell, declared).map_err(|e| {
                format!("row {}, column {}: {}", line + 1, col + 1, e)
            })?;
            row.push(value);
        }
        rows.push(Value::Array(row));
    }
    Ok(Value::Array(rows))
}

fn typed_cell(cell: Cell, declared: Option<&str>) -> Result<Value, String> {
    match declared {
        Some("string") => Ok(Value::String(cell.text)),
        Some("integer") => cell
            .text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("expected an integer, found \"{}\"", cell.text)),
        Some("number") => cell
            .text
            .trim()
            .parse::<Number>()
            .map(Value::Number)
            .map_err(|_| format!("expected a number, found \"{}\"", cell.text)),
        Some("boolean") => match cell.text.trim() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            other => Err(format!("expected a boolean, found \"{}\"", other)),
        },
        _ if cell.quoted => Ok(Value::String(cell.text)),
        Some("object") | Some("array") => {
            serde_json::from_str(&cell.text).map_err(|e| e.to_string())
        }
        _ => Ok(infer_cell(&cell.text)),
    }
}

/// Type an unquoted, undeclared cell.
fn infer_cell(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    match text {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = text.parse::<Number>() {
        return Value::Number(n);
    }
    Value::String(text.to_string())
}

/// Split CSV text into records of cells, honoring quotes.
fn split_records(text: &str) -> Result<Vec<Vec<Cell>>, String> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut cell = Cell {
        text: String::new(),
        quoted: false,
    };
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();
    let mut dirty = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    cell.text.push('"');
                }
                '"' => in_quotes = false,
                other => cell.text.push(other),
            }
            continue;
        }
        match c {
            '"' if cell.text.is_empty() && !cell.quoted => {
                in_quotes = true;
                cell.quoted = true;
                dirty = true;
            }
            ',' => {
                record.push(std::mem::replace(
                    &mut cell,
                    Cell {
                        text: String::new(),
                        quoted: false,
                    },
                ));
                dirty = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                if dirty {
                    record.push(std::mem::replace(
                        &mut cell,
                        Cell {
                            text: String::new(),
                            quoted: false,
                        },
                    ));
                    records.push(std::mem::take(&mut record));
                }
                dirty = false;
            }
            other => {
                cell.text.push(other);
                dirty = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    if dirty {
        record.push(cell);
        records.push(record);
    }
    Ok(records)
}
