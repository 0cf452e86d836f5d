//! Permission name normalization.
//!
//! Permission names are case-insensitive. Every entry point folds names
//! through [`normalize`] before storing or comparing them.

/// Returns the canonical (lowercase) form of a permission name.
///
/// # Example
///
/// ```
/// use permit_types::normalize;
///
/// assert_eq!(normalize("Cmd.Fly"), "cmd.fly");
/// assert_eq!(normalize("cmd.fly"), "cmd.fly");
/// ```
#[must_use]
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_case() {
        assert_eq!(normalize("WORLD.Edit"), "world.edit");
        assert_eq!(normalize(""), "");
    }
}
