//! Response sanitization
//!
//! Some vendor APIs emit bare `NaN` tokens for missing numeric readings,
//! which is not JSON. They are rewritten to `null` before parsing. Text inside
//! string literals is left untouched.

use std::borrow::Cow;

const NAN: &str = "NaN";
const NULL: &str = "null";

/// Replace bare `NaN` tokens with `null`
///
/// ```
/// use telemetry_gateway::poll::sanitize::nan_to_null;
///
/// assert_eq!(nan_to_null(r#"{"value": NaN}"#), r#"{"value": null}"#);
/// assert_eq!(nan_to_null(r#"{"label": "NaN"}"#), r#"{"label": "NaN"}"#);
/// ```
pub fn nan_to_null(text: &str) -> Cow<'_, str> {
    if !text.contains(NAN) {
        return Cow::Borrowed(text);
    }

    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut copied_to = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            i += 1;
            continue;
        }

        match b {
            b'"' => {
                in_string = true;
                i += 1;
            }
            b'N' if text[i..].starts_with(NAN) && is_token_boundary(bytes, i, NAN.len()) => {
                out.push_str(&text[copied_to..i]);
                out.push_str(NULL);
                i += NAN.len();
                copied_to = i;
            }
            _ => i += 1,
        }
    }

    if copied_to == 0 {
        return Cow::Borrowed(text);
    }
    out.push_str(&text[copied_to..]);
    Cow::Owned(out)
}

fn is_token_boundary(bytes: &[u8], start: usize, len: usize) -> bool {
    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let before = start == 0 || !is_ident(bytes[start - 1]);
    let after = bytes.get(start + len).is_none_or(|b| !is_ident(*b));
    before && after
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_nan_value_parses_to_null() {
        let sanitized = nan_to_null(r#"{"value": NaN}"#);
        let parsed: Value = serde_json::from_str(&sanitized).unwrap();
        assert_eq!(parsed, json!({"value": null}));
    }

    #[test]
    fn test_nan_in_arrays_and_nested_objects() {
        let sanitized = nan_to_null(r#"[NaN,1,{"a":[NaN, 2.5]},NaN]"#);
        assert_eq!(sanitized, r#"[null,1,{"a":[null, 2.5]},null]"#);
        let parsed: Value = serde_json::from_str(&sanitized).unwrap();
        assert_eq!(parsed, json!([null, 1, {"a": [null, 2.5]}, null]));
    }

    #[test]
    fn test_strings_left_untouched() {
        let input = r#"{"NaN": "NaN", "note": "value was \"NaN\" today", "v": NaN}"#;
        let parsed: Value = serde_json::from_str(&nan_to_null(input)).unwrap();
        assert_eq!(
            parsed,
            json!({"NaN": "NaN", "note": "value was \"NaN\" today", "v": null})
        );
    }

    #[test]
    fn test_borrowed_when_nothing_to_replace() {
        assert!(matches!(nan_to_null(r#"{"v": 1}"#), Cow::Borrowed(_)));
        assert!(matches!(nan_to_null(r#"{"v": "NaN"}"#), Cow::Borrowed(_)));
    }

    #[test]
    fn test_only_whole_tokens_replaced() {
        // not valid JSON either way, but must not be rewritten into something else
        assert_eq!(nan_to_null("NaNa"), "NaNa");
        assert_eq!(nan_to_null("xNaN"), "xNaN");
        assert_eq!(nan_to_null("-NaN"), "-null");
    }
}
