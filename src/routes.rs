/// Conversation identity from a navigation path.
///
/// Accepts either a bare id or a path like `/conversation/{id}`; the id is
/// the final non-empty path segment. Query strings and fragments are not part
/// of the id.

pub fn conversation_from_path(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let id = path.rsplit('/').find(|seg| !seg.is_empty())?;
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_id_passes_through() {
        assert_eq!(conversation_from_path("abc-123"), Some("abc-123".to_string()));
    }

    #[test]
    fn test_last_segment_wins() {
        assert_eq!(
            conversation_from_path("/conversation/abc-123"),
            Some("abc-123".to_string())
        );
        assert_eq!(conversation_from_path("a/b/c"), Some("c".to_string()));
    }

    #[test]
    fn test_trailing_slash_skips_empty_segment() {
        assert_eq!(
            conversation_from_path("/conversation/abc/"),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_empty_and_root_paths_have_no_conversation() {
        assert_eq!(conversation_from_path(""), None);
        assert_eq!(conversation_from_path("/"), None);
        assert_eq!(conversation_from_path("///"), None);
    }

    #[test]
    fn test_query_and_fragment_are_not_id_material() {
        assert_eq!(
            conversation_from_path("/conversation/abc?tab=1"),
            Some("abc".to_string())
        );
        assert_eq!(
            conversation_from_path("/conversation/abc#top"),
            Some("abc".to_string())
        );
    }
}
