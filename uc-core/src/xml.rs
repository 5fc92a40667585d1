//! XML emitter/escaper and wire-format scalar primitives (C1).

use chrono::{DateTime, Utc};

/// Escapes `<`, `>`, `&`, `"` for use inside an attribute value.
pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// Escapes `<`, `>`, `&` for use inside element text content.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            c => out.push(c),
        }
    }
    out
}

/// Renders a bool as `true`/`false` per the wire format.
pub fn render_bool(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}

/// Parses `true/false/0/1` into a bool; anything else is a syntax error.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Renders an RFC 3339 / ISO-8601 UTC timestamp (`...Z` form).
pub fn render_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Parses an ISO-8601 timestamp, accepting both `Z` and explicit offsets.
pub fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Renders a duration stored as hundred-microsecond units (per §3) as fixed
/// four-decimal seconds: the stored integer divided by 10000.
pub fn render_duration_100us(units: i64) -> String {
    format!("{:.4}", units as f64 / 10000.0)
}

/// Percent-decodes a path or query segment. Identifiers are restricted to
/// `[A-Za-z0-9._~-]` or `%HH` triples (§3); this function decodes without
/// re-validating that restriction — callers validate separately via
/// [`is_valid_identifier`].
pub fn percent_decode(s: &str) -> Result<String, crate::error::UcError> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() {
                return Err(crate::error::UcError::InvalidSyntax(
                    "truncated percent-encoding".to_string(),
                ));
            }
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            match (hi, lo) {
                (Some(hi), Some(lo)) => {
                    out.push((hi * 16 + lo) as u8);
                    i += 3;
                }
                _ => {
                    return Err(crate::error::UcError::InvalidSyntax(
                        "invalid percent-encoding".to_string(),
                    ));
                }
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out)
        .map_err(|_| crate::error::UcError::InvalidSyntax("invalid utf-8 in path".to_string()))
}

/// Validates that `s` is composed solely of `[A-Za-z0-9._~-]` (the decoded
/// form of an identifier per §3).
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '~' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_attribute_specials() {
        assert_eq!(escape_attr("a<b>&\"c"), "a&lt;b&gt;&amp;&quot;c");
    }

    #[test]
    fn escapes_text_without_quote() {
        assert_eq!(escape_text("a\"b"), "a\"b");
    }

    #[test]
    fn renders_and_parses_bool() {
        assert_eq!(render_bool(true), "true");
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn renders_duration_as_fixed_decimal() {
        assert_eq!(render_duration_100us(15000), "1.5000");
    }

    #[test]
    fn percent_decodes_triples() {
        assert_eq!(percent_decode("crid%3A%2F%2Fa").unwrap(), "crid://a");
    }

    #[test]
    fn rejects_truncated_percent_encoding() {
        assert!(percent_decode("abc%2").is_err());
    }

    #[test]
    fn validates_identifier_charset() {
        assert!(is_valid_identifier("abc-123._~"));
        assert!(!is_valid_identifier("abc/def"));
        assert!(!is_valid_identifier(""));
    }
}
