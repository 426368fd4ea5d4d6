//! Length/emptiness/format rules for string fields and numeric bounds.
//! Every check here returns `SignHubError::Validation` with a canonical
//! phrase (`XEmpty` / `XTooLong`) so callers can match on substrings.

use crate::error::{Result, SignHubError};

fn trimmed_len(s: &str) -> usize {
    s.trim().chars().count()
}

/// Validate a field that must be non-empty after trimming and no longer
/// than `max` chars. `label` is used verbatim in the canonical phrase,
/// e.g. `label = "FullName"` yields `FullNameEmpty` / `FullNameTooLong`.
pub fn require_bounded(label: &str, value: &str, max: usize) -> Result<()> {
    let len = trimmed_len(value);
    if len == 0 {
        return Err(SignHubError::validation(&format!("{label}Empty"), value));
    }
    if len > max {
        return Err(SignHubError::validation(&format!("{label}TooLong"), len));
    }
    Ok(())
}

/// Validate a field that may be empty but must not exceed `max` chars.
pub fn require_max(label: &str, value: &str, max: usize) -> Result<()> {
    let len = trimmed_len(value);
    if len > max {
        return Err(SignHubError::validation(&format!("{label}TooLong"), len));
    }
    Ok(())
}

pub fn validate_full_name(v: &str) -> Result<()> {
    require_bounded("FullName", v, 50)
}

pub fn validate_nickname(v: &str) -> Result<()> {
    require_bounded("Nickname", v, 30)
}

pub fn validate_email(v: &str) -> Result<()> {
    require_bounded("Email", v, 100)
}

pub fn validate_company_name(v: &str) -> Result<()> {
    require_bounded("CompanyName", v, 100)
}

pub fn validate_location(v: &str) -> Result<()> {
    require_bounded("Location", v, 100)
}

/// Slugs must be 1..50 chars, kebab-case (`[a-z0-9-]+` once lowercased,
/// no leading, trailing, or doubled dash). Callers may submit mixed
/// case — the server canonicalizes to lowercase, so the charset check
/// runs against the lowercased form, matching how `create_company`/
/// `update_company_profile` persist it.
pub fn validate_slug(v: &str) -> Result<()> {
    require_bounded("Slug", v, 50)?;
    let s = v.trim().to_lowercase();
    let valid = !s.starts_with('-')
        && !s.ends_with('-')
        && !s.contains("--")
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        return Err(SignHubError::validation("SlugMalformed", s));
    }
    Ok(())
}

pub fn validate_bio(v: &str) -> Result<()> {
    require_max("Bio", v, 500)
}

pub fn validate_kvk_number(v: &str) -> Result<()> {
    require_max("KvkNumber", v, 20)
}

pub fn validate_max_uses(v: u32) -> Result<()> {
    if v < 1 {
        return Err(SignHubError::validation("MaxUsesTooSmall", v));
    }
    Ok(())
}

pub fn validate_chat_text(v: &str) -> Result<()> {
    require_bounded("ChatText", v, 500)
}

pub fn validate_initial_message(v: &str) -> Result<()> {
    require_max("InitialMessage", v, 500)
}

pub fn validate_project_name(v: &str) -> Result<()> {
    require_bounded("ProjectName", v, 80)
}

pub fn validate_project_description(v: &str) -> Result<()> {
    require_max("ProjectDescription", v, 500)
}
