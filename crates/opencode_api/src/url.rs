/// Origin used when no server URL is configured (`opencode serve` default port).
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:4096";

/// Normalize a configured server origin.
///
/// Normalization rules:
/// 1) blank input falls back to [`DEFAULT_SERVER_URL`]
/// 2) a missing scheme is treated as `http://`
/// 3) trailing slashes are dropped
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_SERVER_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Join a normalized origin with an absolute endpoint path.
pub fn join_endpoint(base_url: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{base_url}{path}")
    } else {
        format!("{base_url}/{path}")
    }
}

/// Percent-encode a single user-supplied path segment or query value.
pub fn encode_component(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Build `/session/{id}` style paths with every dynamic segment encoded.
pub fn session_path(session_id: &str, suffix: Option<&str>) -> String {
    let id = encode_component(session_id);
    match suffix {
        Some(suffix) => format!("/session/{id}/{suffix}"),
        None => format!("/session/{id}"),
    }
}

/// Append encoded query pairs to a path. Pairs with `None` values are skipped.
pub fn with_query(path: &str, pairs: &[(&str, Option<&str>)]) -> String {
    let query = pairs
        .iter()
        .filter_map(|(key, value)| {
            value.map(|value| format!("{}={}", encode_component(key), encode_component(value)))
        })
        .collect::<Vec<_>>()
        .join("&");

    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_base_url, session_path, with_query, DEFAULT_SERVER_URL};

    #[test]
    fn blank_base_url_uses_default() {
        assert_eq!(normalize_base_url("  "), DEFAULT_SERVER_URL);
    }

    #[test]
    fn session_path_encodes_identifier() {
        assert_eq!(session_path("a b/c", Some("fork")), "/session/a%20b%2Fc/fork");
    }

    #[test]
    fn query_skips_missing_values() {
        assert_eq!(with_query("/x", &[("limit", None)]), "/x");
        assert_eq!(
            with_query("/x", &[("a", Some("1")), ("b", None), ("c", Some("&"))]),
            "/x?a=1&c=%26"
        );
    }
}
