//! CLI input validation functions.
//!
//! These validators are used by clap's `value_parser` attribute to validate
//! user input at parse time, providing immediate feedback for invalid values.

use crate::domain::{ObjectId, RelationshipId};

/// Maximum length of a relationship id accepted on the command line
pub const MAX_RELATIONSHIP_ID_LENGTH: usize = 128;

/// Validate a focus object id (positive integer).
pub fn validate_object_id(s: &str) -> Result<ObjectId, String> {
    s.trim().parse::<ObjectId>().map_err(|e| e.to_string())
}

/// Validate a relationship id.
///
/// Ids are opaque to the client; only blank values, whitespace and
/// overly long values are refused.
pub fn validate_relationship_id(s: &str) -> Result<RelationshipId, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Relationship ID cannot be empty".to_string());
    }
    if s.chars().any(char::is_whitespace) {
        return Err(format!("Relationship ID '{s}' cannot contain whitespace"));
    }
    if s.len() > MAX_RELATIONSHIP_ID_LENGTH {
        return Err(format!(
            "Relationship ID cannot exceed {MAX_RELATIONSHIP_ID_LENGTH} characters"
        ));
    }
    Ok(RelationshipId::new(s))
}
