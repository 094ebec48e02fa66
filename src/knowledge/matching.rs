use std::sync::LazyLock;

use regex::Regex;

/// Shortest fragment allowed to take part in a partial (substring) match.
pub const MIN_PARTIAL_MATCH_LEN: usize = 3;

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Lowercase, trim and collapse internal whitespace.
pub fn normalize_term(text: &str) -> String {
    RE_WHITESPACE
        .replace_all(text.trim(), " ")
        .to_lowercase()
}

/// Bidirectional substring match between a free-text reference and a name.
///
/// Returns the overlap length: the name's length when the reference contains
/// the name, the reference's length when the name contains the reference.
/// Both inputs must already be normalized. Fragments shorter than
/// [`MIN_PARTIAL_MATCH_LEN`] never match partially.
pub fn overlap_len(reference: &str, name: &str) -> Option<usize> {
    if reference.is_empty() || name.is_empty() {
        return None;
    }
    if reference == name {
        return Some(name.chars().count());
    }

    let reference_len = reference.chars().count();
    let name_len = name.chars().count();
    if reference_len.min(name_len) < MIN_PARTIAL_MATCH_LEN {
        return None;
    }

    if reference.contains(name) {
        Some(name_len)
    } else if name.contains(reference) {
        Some(reference_len)
    } else {
        None
    }
}

/// One-directional keyword test: does the free text mention the keyword?
pub fn mentions(text: &str, keyword: &str) -> bool {
    let keyword = normalize_term(keyword);
    !keyword.is_empty() && normalize_term(text).contains(&keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_term("  Piperacillin   Tazobactam\t"), "piperacillin tazobactam");
        assert_eq!(normalize_term("AMOXIL"), "amoxil");
    }

    #[test]
    fn reference_containing_name() {
        assert_eq!(overlap_len("amoxicillin 500mg", "amoxicillin"), Some(11));
    }

    #[test]
    fn name_containing_reference() {
        assert_eq!(overlap_len("vanco", "vancomycin"), Some(5));
    }

    #[test]
    fn exact_match_is_full_length() {
        assert_eq!(overlap_len("bactrim", "bactrim"), Some(7));
    }

    #[test]
    fn short_fragments_rejected() {
        assert_eq!(overlap_len("am", "amoxicillin"), None);
        assert_eq!(overlap_len("", "amoxicillin"), None);
    }

    #[test]
    fn unrelated_terms_do_not_match() {
        assert_eq!(overlap_len("ibuprofen", "amoxicillin"), None);
    }

    #[test]
    fn mentions_is_one_directional() {
        assert!(mentions("Penicillin (hives, 2019)", "penicillin"));
        assert!(!mentions("pen", "penicillin"));
    }
}
