//! Reversible escaping for protocol-reserved characters.
//!
//! Two dialects are in use on the wire:
//!
//! ```text
//! ADC  (space separated tokens):  \ -> \\    ' ' -> \s    '\n' -> \n
//! NMDC (pipe separated tokens):   & -> &amp; $ -> &#36;   |  -> &#124;
//! ```
//!
//! Both directions run in a single left-to-right pass, so sequences produced
//! by the escaper are never re-escaped. Unknown escape sequences are copied
//! through untouched.

const ADC_ESCAPE: u8 = b'\\';

const NMDC_AMP: &[u8] = b"&amp;";
const NMDC_DOLLAR: &[u8] = b"&#36;";
const NMDC_PIPE: &[u8] = b"&#124;";

/// Escape a string for use inside an ADC token.
pub fn escape(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for &b in s.as_bytes() {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b' ' => out.extend_from_slice(b"\\s"),
            b'\n' => out.extend_from_slice(b"\\n"),
            _ => out.push(b),
        }
    }
    out
}

/// Reverse [`escape`].
///
/// Works on arbitrary bytes; a trailing lone backslash or an unknown escape
/// is kept as-is.
pub fn unescape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == ADC_ESCAPE && i + 1 < data.len() {
            let replacement = match data[i + 1] {
                b's' => Some(b' '),
                b'n' => Some(b'\n'),
                b'\\' => Some(b'\\'),
                _ => None,
            };
            if let Some(b) = replacement {
                out.push(b);
                i += 2;
                continue;
            }
        }
        out.push(data[i]);
        i += 1;
    }
    out
}

/// Escape a string for use inside a pipe-delimited NMDC field.
pub fn nmdc_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '$' => out.push_str("&#36;"),
            '|' => out.push_str("&#124;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse [`nmdc_escape`].
pub fn nmdc_unescape(s: &str) -> String {
    let data = s.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'&' {
            let rest = &data[i..];
            let entity = [(NMDC_AMP, b'&'), (NMDC_DOLLAR, b'$'), (NMDC_PIPE, b'|')]
                .into_iter()
                .find(|(pattern, _)| rest.starts_with(pattern));
            if let Some((pattern, b)) = entity {
                out.push(b);
                i += pattern.len();
                continue;
            }
        }
        out.push(data[i]);
        i += 1;
    }
    // Only ASCII bytes were substituted, so UTF-8 boundaries are preserved.
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_escape_reserved() {
        assert_eq!(escape("a b"), b"a\\sb");
        assert_eq!(escape("a\\b"), b"a\\\\b");
        assert_eq!(escape("line1\nline2"), b"line1\\nline2");
        assert_eq!(escape("\\s"), b"\\\\s");
    }

    #[test]
    fn test_unescape_reserved() {
        assert_eq!(unescape(b"a\\sb"), b"a b");
        assert_eq!(unescape(b"a\\\\sb"), b"a\\sb");
        assert_eq!(unescape(b"x\\ny"), b"x\ny");
    }

    #[test]
    fn test_unescape_keeps_unknown_sequences() {
        assert_eq!(unescape(b"a\\tb"), b"a\\tb");
        assert_eq!(unescape(b"trailing\\"), b"trailing\\");
    }

    #[test]
    fn test_nmdc_escape() {
        assert_eq!(nmdc_escape("A|Test"), "A&#124;Test");
        assert_eq!(nmdc_escape("$5 & up"), "&#36;5 &amp; up");
        assert_eq!(nmdc_unescape("A&#124;Test"), "A|Test");
        assert_eq!(nmdc_unescape("&amp;#124;"), "&#124;");
    }

    #[test]
    fn test_nmdc_unescape_keeps_unknown_entities() {
        assert_eq!(nmdc_unescape("&lt;&#12"), "&lt;&#12");
    }

    proptest! {
        #[test]
        fn prop_adc_roundtrip(s in any::<String>()) {
            prop_assert_eq!(unescape(&escape(&s)), s.as_bytes());
        }

        #[test]
        fn prop_adc_escaped_has_no_separators(s in any::<String>()) {
            let escaped = escape(&s);
            prop_assert!(!escaped.contains(&b' '));
            prop_assert!(!escaped.contains(&b'\n'));
        }

        #[test]
        fn prop_nmdc_roundtrip(s in any::<String>()) {
            let escaped = nmdc_escape(&s);
            prop_assert!(!escaped.contains('|'));
            prop_assert_eq!(nmdc_unescape(&escaped), s);
        }
    }
}
