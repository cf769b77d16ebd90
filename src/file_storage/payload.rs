//! # Inline File Payloads
//!
//! Rows may carry an attachment inline: `_file_data` holds either a data
//! URL (`data:<mime>;base64,<data>`) or bare base64, `_file_name` the
//! original name and `_file_type` an optional sub-folder. These reserved
//! fields never reach a table; the write engine strips them and persists
//! the decoded bytes through the two-phase attachment write.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};

use crate::errors::{GraphError, GraphResult};

/// Encoded file content (data URL or bare base64)
pub const FILE_DATA_FIELD: &str = "_file_data";
/// Original file name
pub const FILE_NAME_FIELD: &str = "_file_name";
/// Declared file type, stored one directory deeper
pub const FILE_TYPE_FIELD: &str = "_file_type";
/// Set on read when the embedded image was re-encoded
pub const FILE_COMPRESSED_FIELD: &str = "_file_compressed";

/// Fields the write engine treats as attachment input
pub const RESERVED_FILE_FIELDS: [&str; 3] = [FILE_DATA_FIELD, FILE_NAME_FIELD, FILE_TYPE_FIELD];

const OCTET_STREAM: &str = "application/octet-stream";

/// Decoded inline attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
}

impl FilePayload {
    /// Extract the attachment carried by `row`, if any
    pub fn from_row(table: &str, row: &Map<String, Value>) -> GraphResult<Option<Self>> {
        let encoded = match row.get(FILE_DATA_FIELD) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(s)) if s.is_empty() => return Ok(None),
            Some(Value::String(s)) => s,
            Some(_) => {
                return Err(GraphError::validation(
                    table,
                    FILE_DATA_FIELD,
                    "must be a base64 string or data URL",
                ))
            }
        };

        let (declared_type, data) = split_data_url(encoded)
            .map_err(|reason| GraphError::validation(table, FILE_DATA_FIELD, reason))?;
        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| GraphError::validation(table, FILE_DATA_FIELD, format!("invalid base64: {}", e)))?;

        let content_type = match declared_type {
            Some(mime) => mime.to_string(),
            None => sniff_content_type(&bytes).to_string(),
        };

        let text_field = |name: &str| {
            row.get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(Some(Self {
            bytes,
            content_type,
            file_name: text_field(FILE_NAME_FIELD),
            file_type: text_field(FILE_TYPE_FIELD),
        }))
    }

    /// Whether the bytes decode as a known image format
    pub fn is_image(&self) -> bool {
        image::guess_format(&self.bytes).is_ok()
    }

    /// Extension of the image format the bytes decode as, if any
    pub fn sniffed_extension(&self) -> Option<&'static str> {
        image::guess_format(&self.bytes)
            .ok()
            .and_then(|format| format.extensions_str().first().copied())
    }

    /// Extension for the stored file: from the original name, else the MIME type
    pub fn extension(&self) -> String {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

        from_name.unwrap_or_else(|| extension_for(&self.content_type).to_string())
    }
}

/// Encode bytes as a self-describing data URL
pub fn to_data_url(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(bytes))
}

/// MIME type from magic bytes; octet-stream when unrecognised
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) if bytes.starts_with(b"%PDF") => "application/pdf",
        Err(_) => OCTET_STREAM,
    }
}

/// MIME type from a stored file's extension
pub fn content_type_for_path(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        _ => OCTET_STREAM,
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        "application/json" => "json",
        _ => "bin",
    }
}

/// Split `data:<mime>;base64,<data>`; bare base64 passes through
fn split_data_url(encoded: &str) -> Result<(Option<&str>, &str), String> {
    let Some(rest) = encoded.strip_prefix("data:") else {
        return Ok((None, encoded));
    };
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| "data URL has no payload".to_string())?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| "only base64 data URLs are supported".to_string())?;

    Ok(((!mime.is_empty()).then_some(mime), data))
}
