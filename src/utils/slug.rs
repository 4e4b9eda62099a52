//! User slug derivation.
//!
//! A slug is the display name lowercased with every whitespace character
//! replaced by a hyphen. Nothing else is stripped, so "Jane A. Doe" becomes
//! "jane-a.-doe".

/// Derives the slug for a display name
pub fn slugify(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect::<String>()
        .to_lowercase()
}

/// Suffixed variant used when `base` is already taken by another user
pub fn with_suffix(base: &str, n: u32) -> String {
    format!("{}-{}", base, n)
}
