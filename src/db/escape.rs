//! MySQL string escaping.
//!
//! Escaping is NOT a substitute for bound parameters. It matches the
//! client library's rules for the default SQL mode; with
//! `NO_BACKSLASH_ESCAPES` enabled on the server the output is wrong.
//!
//! The output is only safe on a UTF-8 or ASCII connection. In multi-byte
//! charsets such as gbk a lead byte can swallow the escaping backslash.

/// Escape a string for inclusion between quotes in a MySQL statement.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 8);
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out
}

/// Quote an identifier (database, table, column) with backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_quote() {
        assert_eq!(escape_string("O'Brien"), "O\\'Brien");
    }

    #[test]
    fn test_escape_specials() {
        assert_eq!(
            escape_string("a\0b\nc\rd\\e\"f\x1ag"),
            "a\\0b\\nc\\rd\\\\e\\\"f\\Zg"
        );
    }

    #[test]
    fn test_escape_plain_unchanged() {
        assert_eq!(escape_string("x"), "x");
        assert_eq!(escape_string("héllo wörld"), "héllo wörld");
        assert_eq!(escape_string(""), "");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("shop"), "`shop`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }
}
