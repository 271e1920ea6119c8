//! CSV adapter for flat lists of records.

use std::collections::BTreeSet;

use csv::{ReaderBuilder, Terminator, WriterBuilder};
use serde_json::Value;

use super::codec::{FieldKind, FieldPath, Kind, Mapping};
use crate::error::{Error, Result};

/// Columns of a `list[Record]` whose fields are all scalars; any other
/// shape is refused before anything is encoded.
pub fn columns(kind: &Kind) -> Result<Vec<FieldKind>> {
    let Kind::Sequence(element) = kind else {
        return Err(Error::schema(
            "",
            format!("CSV holds only lists of records, got {kind}"),
        ));
    };
    let Kind::Record { name, fields } = element.as_ref() else {
        return Err(Error::schema(
            "",
            format!("CSV holds only lists of records, got list of {element}"),
        ));
    };
    let fields = fields();
    if let Some(nested) = fields.iter().find(|field| !field.kind.is_scalar()) {
        return Err(Error::schema(
            FieldPath::root().child(nested.name),
            format!("{name} field of kind {} cannot be a CSV cell", nested.kind),
        ));
    }
    Ok(fields)
}

/// Header is the declared columns present in at least one row, in
/// declaration order. Rows end in CRLF.
pub fn render(tree: &Value, columns: &[FieldKind]) -> Result<Vec<u8>> {
    let Value::Array(rows) = tree else {
        return Err(Error::schema("", format!("expected a list of rows, got {tree}")));
    };
    let mut mappings = Vec::with_capacity(rows.len());
    let mut filled = BTreeSet::new();
    for (i, row) in rows.iter().enumerate() {
        let Value::Object(map) = row else {
            return Err(Error::schema(i.to_string(), format!("expected a mapping, got {row}")));
        };
        filled.extend(map.keys().map(String::as_str));
        mappings.push(map);
    }
    let mut header: Vec<&str> = columns
        .iter()
        .map(|column| column.name)
        .filter(|name| filled.contains(name))
        .collect();
    if header.is_empty() {
        header = columns.iter().map(|column| column.name).collect();
    }

    let mut writer = WriterBuilder::new()
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(&header)?;
    for (i, map) in mappings.iter().enumerate() {
        let row = FieldPath::root().child(i.to_string());
        let cells = header
            .iter()
            .map(|name| cell(map, name, &row))
            .collect::<Result<Vec<_>>>()?;
        writer.write_record(&cells)?;
    }
    writer
        .into_inner()
        .map_err(|err| Error::Io(err.into_error()))
}

fn cell(row: &Mapping, name: &str, path: &FieldPath) -> Result<String> {
    match row.get(name) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(Error::schema(
            path.child(name),
            format!("cannot be a CSV cell: {other}"),
        )),
    }
}

/// Each row becomes a mapping of header to cell text. An empty cell is the
/// empty string in a string column, null in an optional column, and left out
/// otherwise so the field's default applies.
pub fn parse(raw: &[u8], columns: &[FieldKind]) -> Result<Value> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(raw);
    let header = reader.headers()?.clone();
    let kinds: Vec<Option<&Kind>> = header
        .iter()
        .map(|name| {
            columns
                .iter()
                .find(|column| column.name == name)
                .map(|column| &column.kind)
        })
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = Mapping::new();
        for ((name, text), kind) in header.iter().zip(record.iter()).zip(&kinds) {
            let value = match (text, kind) {
                ("", Some(Kind::String)) => Value::String(String::new()),
                ("", Some(Kind::Optional(_))) => Value::Null,
                ("", _) => continue,
                (text, _) => Value::String(text.to_string()),
            };
            row.insert(name.to_string(), value);
        }
        rows.push(Value::Object(row));
    }
    Ok(Value::Array(rows))
}
