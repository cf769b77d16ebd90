//! Engine Configuration
//!
//! Column conventions, pagination bounds, attachment limits and image
//! compression defaults used by the CRUD primitive and the graph engines.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{GraphError, GraphResult};

/// Graph engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Column that marks a row as soft-deleted (default: "deleted_at")
    #[serde(default = "default_soft_delete_column")]
    pub soft_delete_column: String,

    /// Creation timestamp column (default: "created_at")
    #[serde(default = "default_created_at_column")]
    pub created_at_column: String,

    /// Modification timestamp column (default: "updated_at")
    #[serde(default = "default_updated_at_column")]
    pub updated_at_column: String,

    /// Page size used when a paginated read gives no limit (default: 10)
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Upper bound for any requested limit (default: 1000)
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Largest accepted inline attachment in bytes (default: 10 MiB)
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Sentinel written to a file-reference column before the file exists
    #[serde(default = "default_file_placeholder")]
    pub file_placeholder: String,

    /// Memoise schema lookups for the duration of one call (default: true)
    #[serde(default = "default_cache_schemas")]
    pub cache_schemas: bool,

    /// Image compression bounds for inflated reads
    #[serde(default)]
    pub compression: CompressionConfig,
}

/// Bounds for re-encoding images on read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionConfig {
    #[serde(default = "default_max_dimension")]
    pub max_width: u32,

    #[serde(default = "default_max_dimension")]
    pub max_height: u32,

    /// JPEG quality, 1-100
    #[serde(default = "default_quality")]
    pub quality: u8,
}

fn default_soft_delete_column() -> String {
    "deleted_at".to_string()
}

fn default_created_at_column() -> String {
    "created_at".to_string()
}

fn default_updated_at_column() -> String {
    "updated_at".to_string()
}

fn default_page_size() -> usize {
    10
}

fn default_max_page_size() -> usize {
    1000
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_file_placeholder() -> String {
    "__pending_upload__".to_string()
}

fn default_cache_schemas() -> bool {
    true
}

fn default_max_dimension() -> u32 {
    1280
}

fn default_quality() -> u8 {
    75
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_dimension(),
            max_height: default_max_dimension(),
            quality: default_quality(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            soft_delete_column: default_soft_delete_column(),
            created_at_column: default_created_at_column(),
            updated_at_column: default_updated_at_column(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            max_file_bytes: default_max_file_bytes(),
            file_placeholder: default_file_placeholder(),
            cache_schemas: default_cache_schemas(),
            compression: CompressionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON config; absent fields take their defaults
    pub fn from_json_str(json: &str) -> GraphResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| GraphError::InvalidPayload(format!("invalid engine config: {}", e)))
    }

    /// Load a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> GraphResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GraphError::InvalidPayload(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    /// Clamp a requested limit into `1..=max_page_size`
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}
