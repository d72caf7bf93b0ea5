//! `LIKE` pattern escaping.

/// Wildcard matching any sequence of characters.
pub const MATCH_ALL: char = '%';

/// Wildcard matching exactly one character.
pub const MATCH_ONE: char = '_';

/// Escapes literal text for use in SQL `LIKE` patterns.
///
/// The result must be paired with `ESCAPE '<escape char>'` in the query.
#[derive(Debug, Clone, Copy)]
pub struct SqlLikeWildcardEscaper;

impl SqlLikeWildcardEscaper {
    /// Prefix every `escape`, `%` and `_` in `s` with `escape`.
    ///
    /// Characters are scanned once from left to right, so inserted escape
    /// characters are never escaped again.
    ///
    /// ```
    /// use trackdb_query::SqlLikeWildcardEscaper;
    ///
    /// assert_eq!(SqlLikeWildcardEscaper::apply("xx4xx%yy_yy", '4'), "xx44xx4%yy4_yy");
    /// ```
    #[must_use]
    pub fn apply(s: &str, escape: char) -> String {
        let mut escaped = String::with_capacity(s.len());
        for c in s.chars() {
            if needs_escape(c, escape) {
                escaped.push(escape);
            }
            escaped.push(c);
        }
        escaped
    }

    /// Pattern matching any text that contains `s` literally.
    #[must_use]
    pub fn contains_pattern(s: &str, escape: char) -> String {
        let mut pattern = String::with_capacity(s.len() + 2);
        pattern.push(MATCH_ALL);
        pattern.push_str(&Self::apply(s, escape));
        pattern.push(MATCH_ALL);
        pattern
    }

    /// Undo [`apply()`](Self::apply).
    ///
    /// An escape character followed by anything other than itself, `%` or
    /// `_` is kept as is.
    #[must_use]
    pub fn unescape(s: &str, escape: char) -> String {
        let mut unescaped = String::with_capacity(s.len());
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            if c == escape {
                if let Some(&next) = chars.peek() {
                    if needs_escape(next, escape) {
                        chars.next();
                        unescaped.push(next);
                        continue;
                    }
                }
            }
            unescaped.push(c);
        }
        unescaped
    }
}

fn needs_escape(c: char, escape: char) -> bool {
    c == escape || c == MATCH_ALL || c == MATCH_ONE
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_escapes_for_like() {
        assert_eq!(
            SqlLikeWildcardEscaper::apply("xx4xx%yy_yy", '4'),
            "xx44xx4%yy4_yy"
        );
        assert_eq!(SqlLikeWildcardEscaper::apply("100%", '\\'), "100\\%");
        assert_eq!(SqlLikeWildcardEscaper::apply("a\\b", '\\'), "a\\\\b");
    }

    #[test]
    fn test_inserted_escapes_are_not_rescanned() {
        // Every input character yields at most two output characters.
        assert_eq!(SqlLikeWildcardEscaper::apply("%%", '!'), "!%!%");
        assert_eq!(SqlLikeWildcardEscaper::apply("!%", '!'), "!!!%");
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(SqlLikeWildcardEscaper::apply("", '\\'), "");
        assert_eq!(SqlLikeWildcardEscaper::contains_pattern("", '\\'), "%%");
    }

    #[test]
    fn test_contains_pattern() {
        assert_eq!(
            SqlLikeWildcardEscaper::contains_pattern("50_50", '\\'),
            "%50\\_50%"
        );
    }

    #[test]
    fn test_unescape_keeps_dangling_escape() {
        assert_eq!(SqlLikeWildcardEscaper::unescape("a\\b\\", '\\'), "a\\b\\");
    }

    proptest! {
        #[test]
        fn unescape_inverts_apply(s in any::<String>(), escape in any::<char>()) {
            let escaped = SqlLikeWildcardEscaper::apply(&s, escape);
            prop_assert_eq!(SqlLikeWildcardEscaper::unescape(&escaped, escape), s);
        }

        #[test]
        fn escaped_length_grows_by_special_chars(s in "[a-z%_4]{0,32}") {
            let escaped = SqlLikeWildcardEscaper::apply(&s, '4');
            let specials = s.chars().filter(|&c| needs_escape(c, '4')).count();
            prop_assert_eq!(escaped.chars().count(), s.chars().count() + specials);
        }
    }
}
