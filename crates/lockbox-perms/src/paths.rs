//! Wildcard candidate-path materialization.
//!
//! A grant on `/prefix/*` covers every credential below `/prefix/`. Instead
//! of a tree walk, a lookup materializes the explicit list of ancestor
//! wildcard forms for the concrete path and matches them in one store
//! query. The list is small: one entry per slash.

/// Candidate path forms for a permission lookup on `path`.
///
/// The exact path first, then for every `/` in the path the prefix up to
/// and including that slash with a `*` appended. The trailing slash before
/// each `*` is part of the match key: `/a/b/c` yields
/// `["/a/b/c", "/*", "/a/*", "/a/b/*"]`.
pub fn wildcard_candidates(path: &str) -> Vec<String> {
    let mut result = Vec::with_capacity(4);
    result.push(path.to_string());

    for (i, c) in path.char_indices() {
        if c == '/' {
            result.push(format!("{}*", &path[..=i]));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_candidates_for_nested_path() {
        assert_eq!(
            wildcard_candidates("/a/b/c"),
            vec!["/a/b/c", "/*", "/a/*", "/a/b/*"]
        );
    }

    #[test]
    fn test_candidates_for_top_level_path() {
        assert_eq!(wildcard_candidates("/cred"), vec!["/cred", "/*"]);
    }

    #[test]
    fn test_candidates_keep_trailing_slash_in_wildcard() {
        // The slash belongs to the match key: a grant on "/a*" must not match.
        let candidates = wildcard_candidates("/a/b");
        assert!(candidates.contains(&"/a/*".to_string()));
        assert!(!candidates.contains(&"/a*".to_string()));
    }

    proptest! {
        #[test]
        fn prop_candidate_count_is_slashes_plus_one(
            segments in prop::collection::vec("[a-z0-9]{1,8}", 1..6)
        ) {
            let path = format!("/{}", segments.join("/"));
            let candidates = wildcard_candidates(&path);

            // Exact path plus one wildcard per slash.
            prop_assert_eq!(candidates.len(), segments.len() + 1);
            prop_assert_eq!(&candidates[0], &path);
            for candidate in &candidates[1..] {
                prop_assert!(candidate.ends_with("/*"));
                prop_assert!(path.starts_with(&candidate[..candidate.len() - 1]));
            }
        }
    }
}
