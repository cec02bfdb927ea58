//! Exchange document (de)serialization
//!
//! Documents are JSON or YAML, chosen by file extension. A directory is
//! read as a multi-entry archive: its JSON/YAML files are merged into one
//! document in name order.

use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::{ExchangeError, Result};
use crate::model::ExchangeDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Format of `path` by extension; `None` for anything else.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(DocumentFormat::Json),
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            _ => None,
        }
    }
}

/// One named entry of an archive.
#[derive(Debug, Clone)]
pub struct DocumentEntry {
    pub name: String,
    pub format: DocumentFormat,
    pub content: String,
}

fn parse_value(content: &str, format: DocumentFormat) -> Result<Value> {
    if content.trim().is_empty() {
        return Err(ExchangeError::InvalidDocument("empty document".to_string()));
    }
    let value: Value = match format {
        DocumentFormat::Json => serde_json::from_str(content)?,
        DocumentFormat::Yaml => serde_yaml::from_str(content)?,
    };
    if !value.is_object() {
        return Err(ExchangeError::InvalidDocument(
            "document root must be an object".to_string(),
        ));
    }
    Ok(value)
}

pub fn parse_document(content: &str, format: DocumentFormat) -> Result<ExchangeDocument> {
    Ok(serde_json::from_value(parse_value(content, format)?)?)
}

pub fn serialize_document(document: &ExchangeDocument, format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::Json => Ok(serde_json::to_string_pretty(document)?),
        DocumentFormat::Yaml => Ok(serde_yaml::to_string(document)?),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Merge `next` into `acc`: objects key by key, sequences appended, later
/// non-empty scalars win.
fn merge_value(acc: &mut Value, next: Value) {
    if is_empty(&next) {
        return;
    }
    match (acc, next) {
        (Value::Object(acc), Value::Object(next)) => merge_object(acc, next),
        (Value::Array(acc), Value::Array(next)) => acc.extend(next),
        (acc, next) => *acc = next,
    }
}

fn merge_object(acc: &mut Map<String, Value>, next: Map<String, Value>) {
    for (key, value) in next {
        match acc.get_mut(&key) {
            Some(existing) => merge_value(existing, value),
            None => {
                if !is_empty(&value) {
                    acc.insert(key, value);
                }
            }
        }
    }
}

/// Merge archive entries into one document, in entry name order.
pub fn merge_entries(mut entries: Vec<DocumentEntry>) -> Result<ExchangeDocument> {
    if entries.is_empty() {
        return Err(ExchangeError::InvalidDocument("archive without entries".to_string()));
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    let mut merged = Value::Object(Map::new());
    for entry in entries {
        let value = parse_value(&entry.content, entry.format).map_err(|e| {
            ExchangeError::InvalidDocument(format!("{}: {}", entry.name, e))
        })?;
        merge_value(&mut merged, value);
    }
    Ok(serde_json::from_value(merged)?)
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| ExchangeError::File {
        path: path.display().to_string(),
        message: "failed to read document".to_string(),
        source: Some(e),
    })
}

/// Read a document file, or a directory of document files.
pub fn read_document(path: &Path) -> Result<ExchangeDocument> {
    if path.is_dir() {
        let listing = fs::read_dir(path).map_err(|e| ExchangeError::File {
            path: path.display().to_string(),
            message: "failed to list archive".to_string(),
            source: Some(e),
        })?;
        let mut entries = Vec::new();
        for item in listing {
            let item = item.map_err(|e| ExchangeError::File {
                path: path.display().to_string(),
                message: "failed to list archive".to_string(),
                source: Some(e),
            })?;
            let entry_path = item.path();
            let Some(format) = DocumentFormat::from_path(&entry_path) else {
                continue;
            };
            if !entry_path.is_file() {
                continue;
            }
            entries.push(DocumentEntry {
                name: item.file_name().to_string_lossy().into_owned(),
                format,
                content: read_text(&entry_path)?,
            });
        }
        tracing::debug!("Merging {} archive entries from {}", entries.len(), path.display());
        return merge_entries(entries);
    }

    let format = DocumentFormat::from_path(path).ok_or_else(|| {
        ExchangeError::InvalidDocument(format!("unknown document format: {}", path.display()))
    })?;
    parse_document(&read_text(path)?, format)
}

/// Write a document; the format follows the extension of `path`.
pub fn write_document(path: &Path, document: &ExchangeDocument) -> Result<()> {
    let format = DocumentFormat::from_path(path).ok_or_else(|| {
        ExchangeError::InvalidDocument(format!("unknown document format: {}", path.display()))
    })?;
    let content = serialize_document(document, format)?;
    fs::write(path, content).map_err(|e| ExchangeError::File {
        path: path.display().to_string(),
        message: "failed to write document".to_string(),
        source: Some(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(name: &str, format: DocumentFormat, content: &str) -> DocumentEntry {
        DocumentEntry {
            name: name.to_string(),
            format,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.JSON")), Some(DocumentFormat::Json));
        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")), Some(DocumentFormat::Yaml));
        assert_eq!(DocumentFormat::from_path(Path::new("a.zip")), None);
    }

    #[test]
    fn test_empty_document_rejected() {
        let err = parse_document("  \n", DocumentFormat::Json).unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidDocument(_)));
        assert!(matches!(merge_entries(Vec::new()), Err(ExchangeError::InvalidDocument(_))));
    }

    #[test]
    fn test_merge_entries_in_name_order() {
        let entries = vec![
            entry(
                "2-users.yaml",
                DocumentFormat::Yaml,
                "tenants:\n  - identifier: ACME\n    users:\n      - identifier: lucy\n",
            ),
            entry(
                "1-tenant.json",
                DocumentFormat::Json,
                r#"{"createdObjectDate": "2020-01-01T00:00:00Z", "tenants": [{"identifier": "ACME", "culture": "de-CH"}]}"#,
            ),
            entry("3-empty.json", DocumentFormat::Json, r#"{"createdObjectDate": null, "tenants": []}"#),
        ];
        let doc = merge_entries(entries).unwrap();
        assert_eq!(doc.tenants.len(), 2);
        assert_eq!(doc.tenants[0].culture.as_deref(), Some("de-CH"));
        assert_eq!(doc.tenants[1].users[0].identifier, "lucy");
        assert!(doc.created_object_date.is_some());
    }

    #[test]
    fn test_read_directory_archive_and_write() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("archive");
        std::fs::create_dir_all(&archive).unwrap();
        std::fs::write(archive.join("a.json"), r#"{"tenants": [{"identifier": "ACME"}]}"#).unwrap();
        std::fs::write(archive.join("b.yaml"), "regulationPermissions:\n  - regulationName: ACME.Base\n").unwrap();
        std::fs::write(archive.join("notes.txt"), "ignored").unwrap();

        let doc = read_document(&archive).unwrap();
        assert_eq!(doc.tenants[0].identifier, "ACME");
        assert_eq!(doc.regulation_permissions.len(), 1);

        let out = tmp.path().join("out.yaml");
        write_document(&out, &doc).unwrap();
        assert_eq!(read_document(&out).unwrap(), doc);
    }
}
