//! Input checks run before any backend call.

use super::entity::{DomainError, DomainResult};

pub const DEFAULT_MAX_TITLE_LEN: usize = 255;

pub const MAX_COMMENT_LEN: usize = 10_000;

/// Trimmed title, or InvalidInput when empty or longer than `max_len` chars
pub fn validate_title(title: &str, max_len: usize) -> DomainResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidInput("Title must not be empty".into()));
    }
    let len = trimmed.chars().count();
    if len > max_len {
        return Err(DomainError::InvalidInput(format!(
            "Title is {} characters, the limit is {}",
            len, max_len
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_comment(text: &str) -> DomainResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidInput("Comment must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_COMMENT_LEN {
        return Err(DomainError::InvalidInput("Comment is too long".into()));
    }
    Ok(trimmed.to_string())
}

/// Ids are opaque but never blank
pub fn require_id(id: &str, what: &str) -> DomainResult<()> {
    if id.trim().is_empty() {
        return Err(DomainError::InvalidInput(format!("{} id is required", what)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_is_trimmed() {
        assert_eq!(validate_title("  Backlog ", 255).unwrap(), "Backlog");
    }

    #[test]
    fn test_empty_title_rejected() {
        assert!(matches!(validate_title("   ", 255), Err(DomainError::InvalidInput(_))));
        assert!(matches!(validate_title("", 255), Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn test_title_limit_counts_chars() {
        assert!(validate_title("ééé", 3).is_ok());
        assert!(validate_title("éééé", 3).is_err());
    }

    #[test]
    fn test_comment_rules() {
        assert_eq!(validate_comment(" ok ").unwrap(), "ok");
        assert!(validate_comment("\n").is_err());
    }
}
