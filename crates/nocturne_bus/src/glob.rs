//! Redis-style glob matching for channel patterns and key scans.

/// Matches `text` against `pattern`, where `*` matches any run of
/// characters and `?` matches exactly one.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    match_bytes(pattern.as_bytes(), text.as_bytes())
}

fn match_bytes(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'*', rest)) => (0..=text.len()).any(|skip| match_bytes(rest, &text[skip..])),
        Some((b'?', rest)) => !text.is_empty() && match_bytes(rest, &text[1..]),
        Some((&literal, rest)) => {
            text.first() == Some(&literal) && match_bytes(rest, &text[1..])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_wildcard() {
        assert!(glob_match("gateway:output", "gateway:output"));
        assert!(glob_match("zone:*:input", "zone:elysium:input"));
        assert!(glob_match("zone:*:input", "zone::input"));
        assert!(!glob_match("zone:*:input", "zone:elysium:output"));
        assert!(glob_match("server:heartbeat:*", "server:heartbeat:srv-1"));
        assert!(!glob_match("server:heartbeat:?", "server:heartbeat:srv-1"));
        assert!(glob_match("server:heartbeat:?", "server:heartbeat:a"));
    }

    #[test]
    fn star_matches_empty() {
        assert!(glob_match("*", ""));
        assert!(glob_match("a*", "a"));
    }
}
