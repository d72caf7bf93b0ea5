//! Fuzz string literal escaping.

#![no_main]

use libfuzzer_sys::fuzz_target;
use trackdb_pool::SqlDialect;
use trackdb_query::FieldEscaper;

fuzz_target!(|text: &str| {
    let escaped = FieldEscaper::for_dialect(SqlDialect::Sqlite).escape_string(text);
    assert!(escaped.len() >= 2);
    let body = &escaped[1..escaped.len() - 1];
    assert_eq!(body.matches('\'').count(), 2 * text.matches('\'').count());
    assert_eq!(body.replace("''", "'"), text);
});
