//! Parses the `Scheme key1="v1", key2="v2", ...` grammar shared by
//! `Authorization`, `X-UCClientAuthorisation`, and
//! `X-UCRestriction-Credentials` header values.

use std::collections::HashMap;

/// Splits a header value into its leading scheme token and a map of the
/// comma-separated `key="value"` (or bare `key=value`) pairs that follow.
pub fn parse_header(value: &str) -> (String, HashMap<String, String>) {
    let value = value.trim();
    let (scheme, rest) = match value.split_once(' ') {
        Some((s, r)) => (s.to_string(), r),
        None => (value.to_string(), ""),
    };
    let mut map = HashMap::new();
    for item in split_params(rest) {
        if let Some((k, v)) = item.split_once('=') {
            let k = k.trim().to_string();
            let v = v.trim().trim_matches('"').to_string();
            map.insert(k, v);
        }
    }
    (scheme, map)
}

fn split_params(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                if !current.trim().is_empty() {
                    out.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

/// Compares two request-target path strings by segment, ignoring query
/// strings — the `uri` check shared by C5 and C6.
pub fn paths_match(header_uri: &str, request_uri: &str) -> bool {
    let strip = |u: &str| -> Vec<&str> {
        u.split('?')
            .next()
            .unwrap_or("")
            .split('/')
            .filter(|s| !s.is_empty())
            .collect()
    };
    strip(header_uri) == strip(request_uri)
}
