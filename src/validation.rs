//! Name validation for quests and regions.
//!
//! Names end up as segments of dotted record paths (`quests.<name>`), so the
//! accepted alphabet is deliberately narrow. Invalid input is rejected with a
//! descriptive error and never truncated or rewritten, apart from lowercasing.

use std::collections::HashSet;

/// Separator between quest names in a dotted path (`main.chapter1`).
pub const PATH_SEPARATOR: char = '.';

/// Default maximum length of a quest name.
pub const DEFAULT_QUEST_NAME_MAX: usize = 32;

/// Maximum length of a region name.
pub const REGION_NAME_MAX: usize = 48;

/// Name validation errors with helpful messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("Name cannot be empty")]
    Empty,

    #[error("Name is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Name cannot start or end with whitespace")]
    InvalidWhitespace,

    #[error("Name cannot contain the path separator '.'")]
    ContainsSeparator,

    #[error("Name contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },
}

/// Name validation rules configuration
#[derive(Debug, Clone)]
pub struct NameRules {
    pub max_length: usize,
    pub allow_hyphen: bool,
}

impl NameRules {
    /// Rules for quest names, which double as record path segments.
    pub fn quest(max_length: usize) -> Self {
        NameRules {
            max_length,
            allow_hyphen: true,
        }
    }

    /// Rules for region names.
    pub fn region() -> Self {
        NameRules {
            max_length: REGION_NAME_MAX,
            allow_hyphen: true,
        }
    }
}

/// Validate a name according to the given rules, returning its lowercase form.
pub fn validate_name(name: &str, rules: &NameRules) -> Result<String, NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.trim() != name {
        return Err(NameError::InvalidWhitespace);
    }
    if name.chars().count() > rules.max_length {
        return Err(NameError::TooLong {
            max: rules.max_length,
        });
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(NameError::ContainsSeparator);
    }

    let lower = name.to_lowercase();
    let invalid: HashSet<char> = lower
        .chars()
        .filter(|&c| {
            !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || (c == '-' && rules.allow_hyphen))
        })
        .collect();

    if !invalid.is_empty() {
        let mut chars: Vec<char> = invalid.into_iter().collect();
        chars.sort_unstable();
        let chars = chars
            .into_iter()
            .map(|c| {
                if c.is_control() {
                    format!("\\u{{{:04x}}}", c as u32)
                } else {
                    c.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        return Err(NameError::InvalidCharacters { chars });
    }

    Ok(lower)
}

/// Validate a single quest name segment.
pub fn validate_quest_name(name: &str, max_length: usize) -> Result<String, NameError> {
    validate_name(name, &NameRules::quest(max_length))
}

/// Validate a region name.
pub fn validate_region_name(name: &str) -> Result<String, NameError> {
    validate_name(name, &NameRules::region())
}

/// Split a dotted quest path into its lowercase segments.
///
/// Returns `None` when any segment is empty (`"a..b"`, `".a"`).
pub fn split_quest_path(path: &str) -> Option<Vec<String>> {
    let segments: Vec<String> = path
        .split(PATH_SEPARATOR)
        .map(|s| s.to_lowercase())
        .collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    Some(segments)
}
