//! Tag normalization.

/// Normalize a free-form tag: trim, lowercase, spaces to `-`, and a single
/// leading `#`. Returns `None` for tags that are empty after trimming.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('#').trim();
    if trimmed.is_empty() {
        return None;
    }
    let body: String = trimmed
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    Some(format!("#{}", body))
}

/// Normalize a list of tags, dropping empties and duplicates while keeping
/// first-seen order.
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in raw {
        if let Some(t) = normalize_tag(tag.as_ref()) {
            if !out.contains(&t) {
                out.push(t);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("  Machine Learning "), Some("#machine-learning".into()));
        assert_eq!(normalize_tag("#Rust"), Some("#rust".into()));
        assert_eq!(normalize_tag("##double"), Some("#double".into()));
        assert_eq!(normalize_tag("   "), None);
        assert_eq!(normalize_tag("#"), None);
    }

    #[test]
    fn test_normalize_tags_dedups_in_order() {
        let tags = normalize_tags(["b", "A", "#b", "a "]);
        assert_eq!(tags, vec!["#b", "#a"]);
    }
}
