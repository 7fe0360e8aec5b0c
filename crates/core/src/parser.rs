use std::collections::BTreeMap;

/// Stand-ins for delimiters found inside backtick spans. Private-use code
/// points, so they never collide with text the generation tool writes.
const HYPHEN_PLACEHOLDER: char = '\u{E000}';
const COLON_PLACEHOLDER: char = '\u{E001}';

/// Parse a `key:value - key:value` blob into lowercase keys and trimmed values.
///
/// Backtick spans may contain `-` and `:` without being split on. A token
/// without `:` yields an empty value; empty tokens are dropped.
pub fn parse_custom_text(text: &str) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    if text.trim().is_empty() {
        return result;
    }

    let escaped = escape_backtick_spans(text);

    for segment in escaped.split('-') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let (name, value) = match segment.split_once(':') {
            Some((name, value)) => (name, value),
            None => (segment, ""),
        };

        let name = unescape(clean(name)).to_lowercase();
        if name.is_empty() {
            continue;
        }

        result.insert(name, unescape(clean(value)));
    }

    result
}

/// Replace delimiters between matching backticks with placeholders.
/// An unterminated backtick leaves the remainder untouched.
fn escape_backtick_spans(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('`') {
        let after = &rest[start + 1..];
        let Some(len) = after.find('`') else {
            break;
        };

        out.push_str(&rest[..=start]);
        for c in after[..len].chars() {
            out.push(match c {
                '-' => HYPHEN_PLACEHOLDER,
                ':' => COLON_PLACEHOLDER,
                other => other,
            });
        }
        out.push('`');
        rest = &after[len + 1..];
    }

    out.push_str(rest);
    out
}

fn clean(raw: &str) -> &str {
    raw.trim().trim_matches('`').trim()
}

fn unescape(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            HYPHEN_PLACEHOLDER => '-',
            COLON_PLACEHOLDER => ':',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_custom_text("").is_empty());
        assert!(parse_custom_text("   ").is_empty());
    }

    #[test]
    fn test_parse_backtick_span_keeps_hyphen() {
        let parsed = parse_custom_text("`a-test`:`value-1` - seed:42");
        assert_eq!(parsed, map(&[("a-test", "value-1"), ("seed", "42")]));
    }

    #[test]
    fn test_parse_lowercases_and_trims_keys() {
        let parsed = parse_custom_text("  Sampler : euler_a -CFG:7 ");
        assert_eq!(parsed, map(&[("sampler", "euler_a"), ("cfg", "7")]));
    }

    #[test]
    fn test_parse_token_without_colon_has_empty_value() {
        let parsed = parse_custom_text("facefix - steps:20");
        assert_eq!(parsed, map(&[("facefix", ""), ("steps", "20")]));
    }

    #[test]
    fn test_parse_value_keeps_text_after_first_colon() {
        let parsed = parse_custom_text("prompt:`castle: at night`");
        assert_eq!(parsed, map(&[("prompt", "castle: at night")]));
    }

    #[test]
    fn test_parse_drops_empty_segments() {
        let parsed = parse_custom_text("seed:1 -- - steps:2 -");
        assert_eq!(parsed, map(&[("seed", "1"), ("steps", "2")]));
    }

    #[test]
    fn test_parse_unterminated_backtick_is_split_normally() {
        let parsed = parse_custom_text("note:`open - seed:5");
        assert_eq!(parsed, map(&[("note", "open"), ("seed", "5")]));
    }

    #[test]
    fn test_parse_colon_inside_backticks_in_key() {
        let parsed = parse_custom_text("`ratio:wide`:16-9");
        // The unquoted hyphen in the value still delimits.
        assert_eq!(parsed, map(&[("ratio:wide", "16"), ("9", "")]));
    }
}
