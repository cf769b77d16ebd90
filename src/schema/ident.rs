//! SQL identifier validation and quoting

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{GraphError, GraphResult};

fn ident_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static identifier pattern"))
}

/// Whether `name` is a plain SQL identifier
pub fn is_valid_ident(name: &str) -> bool {
    ident_pattern().is_match(name)
}

/// Validate and double-quote an identifier for splicing into SQL
pub fn quote_ident(name: &str) -> GraphResult<String> {
    if !is_valid_ident(name) {
        return Err(GraphError::InvalidPayload(format!(
            "invalid identifier: {:?}",
            name
        )));
    }
    Ok(format!("\"{}\"", name))
}
