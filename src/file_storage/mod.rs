//! # aerograph File Storage Module
//!
//! Attachment side channel for entity models: a backend trait with a local
//! filesystem implementation, an async wrapper, inline payload decoding and
//! image compression for inflated reads.

pub mod backend;
pub mod compress;
pub mod errors;
pub mod local;
pub mod payload;
pub mod store;

pub use backend::{validate_path, StorageBackend};
pub use compress::{compress_image, CompressedImage};
pub use errors::{StorageError, StorageResult};
pub use local::LocalBackend;
pub use payload::{
    content_type_for_path, sniff_content_type, to_data_url, FilePayload, FILE_COMPRESSED_FIELD,
    FILE_DATA_FIELD, FILE_NAME_FIELD, FILE_TYPE_FIELD, RESERVED_FILE_FIELDS,
};
pub use store::FileStore;
