//! Loading entity dictionaries from a line-oriented text format.
//!
//! # Format
//!
//! Each non-empty line holds one entity:
//! - A decimal entity id
//! - A tab separator
//! - The entity's tokens, separated by spaces, already normalized upstream
//!
//! # Example Format
//!
//! ```text
//! 1	10 downing street
//! 2	221b baker street
//! ```
//!
//! Tokens are taken as-is; tokenization and case folding happen before the
//! dictionary is written.

use thiserror::Error;

use super::error::Result;
use super::lookup::Lookup;
use super::types::EntityId;

/// Errors that can occur when reading dictionary files.
#[derive(Error, Debug)]
pub enum DictionaryError {
    #[error("Invalid line {line}: {reason}")]
    ParseError { line: usize, reason: String },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Parse one dictionary line into an entity id and its tokens.
fn parse_line(
    line: &[u8],
    line_no: usize,
) -> std::result::Result<(EntityId, Vec<String>), DictionaryError> {
    let parse_error = |reason: &str| DictionaryError::ParseError {
        line: line_no,
        reason: reason.to_string(),
    };

    let text = std::str::from_utf8(line).map_err(|_| parse_error("invalid UTF-8"))?;
    let text = text.trim_end_matches('\r');

    let (id_str, tokens_str) = text
        .split_once('\t')
        .ok_or_else(|| parse_error("missing tab separator"))?;

    let entity_id: EntityId = id_str
        .trim()
        .parse()
        .map_err(|_| parse_error(&format!("invalid entity id {:?}", id_str)))?;

    let tokens: Vec<String> = tokens_str.split_whitespace().map(str::to_string).collect();
    if tokens.is_empty() {
        return Err(parse_error("entity has no tokens"));
    }

    Ok((entity_id, tokens))
}

/// Load a dictionary from raw bytes.
pub fn load_entities(data: &[u8]) -> Result<Lookup> {
    let mut lookup = Lookup::new();

    for (index, line) in data.split(|&b| b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let (entity_id, tokens) = parse_line(line, index + 1)?;
        lookup.add(entity_id, tokens)?;
    }

    tracing::debug!(
        entities = lookup.len(),
        tokens = lookup.num_tokens(),
        "loaded entity dictionary"
    );
    Ok(lookup)
}

/// Load a dictionary from a file path.
pub fn load_entities_file(path: &str) -> Result<Lookup> {
    let data = std::fs::read(path).map_err(DictionaryError::from)?;
    load_entities(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::MatchError;
    use crate::core::lookup::EntityLookup;

    #[test]
    fn test_load_entities() {
        let data = b"1\t10 downing street\n2\tbaker  street\r\n\n";
        let lookup = load_entities(data).unwrap();

        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.num_tokens_for_entity(1), Some(3));
        assert_eq!(
            lookup.tokens_for_entity(2).unwrap().as_ref(),
            &["baker".to_string(), "street".to_string()]
        );
    }

    #[test]
    fn test_parse_errors_name_the_line() {
        let err = load_entities(b"1\tdowning street\nfoo bar\n").unwrap_err();
        match err {
            MatchError::Dictionary(DictionaryError::ParseError { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }

        assert!(load_entities(b"x\tdowning\n").is_err());
        assert!(load_entities(b"3\t   \n").is_err());
    }

    #[test]
    fn test_duplicate_ids_surface_lookup_error() {
        let err = load_entities(b"1\ta b\n1\tc d\n").unwrap_err();
        assert!(matches!(err, MatchError::DuplicateEntity(1)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_entities_file("/nonexistent/entities.tsv").unwrap_err();
        assert!(matches!(
            err,
            MatchError::Dictionary(DictionaryError::IoError(_))
        ));
    }
}
