//! String literal escaping.

use trackdb_pool::{DbConnection, SqlDialect};

/// Turns arbitrary text into SQL string literals for the dialect of a
/// connection.
///
/// Prefer bound parameters; this is for the few places where SQL text has to
/// be assembled by hand, such as `IN (...)` lists of varying length.
///
/// ```
/// use trackdb_pool::SqlDialect;
/// use trackdb_query::FieldEscaper;
///
/// let escaper = FieldEscaper::for_dialect(SqlDialect::Sqlite);
/// assert_eq!(escaper.escape_string("foobar's"), "'foobar''s'");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FieldEscaper {
    dialect: SqlDialect,
}

impl FieldEscaper {
    /// Escaper for the dialect of `connection`.
    #[must_use]
    pub fn new(connection: &DbConnection) -> Self {
        Self::for_dialect(connection.dialect())
    }

    /// Escaper for an explicit dialect.
    #[must_use]
    pub fn for_dialect(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    /// Quote `s` as a string literal, doubling embedded quote characters.
    #[must_use]
    pub fn escape_string(&self, s: &str) -> String {
        quote_with(s, self.dialect.string_quote())
    }

    /// Quote `name` as an identifier, such as a table or column name taken
    /// from user input.
    #[must_use]
    pub fn escape_identifier(&self, name: &str) -> String {
        quote_with(name, self.dialect.identifier_quote())
    }

    /// Quote every string of `values`.
    pub fn escape_strings<I>(&self, values: I) -> Vec<String>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        values
            .into_iter()
            .map(|value| self.escape_string(value.as_ref()))
            .collect()
    }

    /// Replace every string of `values` with its quoted form.
    pub fn escape_strings_in_place(&self, values: &mut [String]) {
        for value in values.iter_mut() {
            *value = self.escape_string(value);
        }
    }
}

fn quote_with(s: &str, quote: char) -> String {
    let mut escaped = String::with_capacity(s.len() + 2);
    escaped.push(quote);
    for c in s.chars() {
        if c == quote {
            escaped.push(quote);
        }
        escaped.push(c);
    }
    escaped.push(quote);
    escaped
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn escaper() -> FieldEscaper {
        FieldEscaper::for_dialect(SqlDialect::Sqlite)
    }

    #[test]
    fn test_escapes_quotes() {
        assert_eq!(escaper().escape_string("foobar"), "'foobar'");
        assert_eq!(escaper().escape_string("foobar's"), "'foobar''s'");
        assert_eq!(escaper().escape_string("''"), "''''''");
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(escaper().escape_string(""), "''");
    }

    #[test]
    fn test_escapes_identifiers() {
        assert_eq!(escaper().escape_identifier("library"), "\"library\"");
        assert_eq!(escaper().escape_identifier("play \"count\""), "\"play \"\"count\"\"\"");
        assert_eq!(escaper().escape_identifier("it's"), "\"it's\"");
    }

    #[test]
    fn test_escape_strings() {
        let escaped = escaper().escape_strings(["Daft Punk", "Guns N' Roses"]);
        assert_eq!(escaped, vec!["'Daft Punk'", "'Guns N'' Roses'"]);

        let mut values = vec!["it's".to_string(), String::new()];
        escaper().escape_strings_in_place(&mut values);
        assert_eq!(values, vec!["'it''s'", "''"]);
    }

    proptest! {
        #[test]
        fn escaped_string_is_well_formed(s in any::<String>()) {
            let escaped = escaper().escape_string(&s);
            prop_assert!(escaped.starts_with('\''));
            prop_assert!(escaped.ends_with('\''));
            prop_assert!(escaped.len() >= 2);

            let body = &escaped[1..escaped.len() - 1];
            let quotes_in = s.matches('\'').count();
            prop_assert_eq!(body.matches('\'').count(), 2 * quotes_in);
            prop_assert_eq!(body.replace("''", "'"), s);
        }
    }
}
