//! Fuzz `LIKE` escaping: unescaping must restore the input and every
//! wildcard in the output must be escaped.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use trackdb_query::{MATCH_ALL, MATCH_ONE, SqlLikeWildcardEscaper};

#[derive(Debug, Arbitrary)]
struct Input {
    text: String,
    escape: char,
}

fuzz_target!(|input: Input| {
    let escaped = SqlLikeWildcardEscaper::apply(&input.text, input.escape);
    assert_eq!(
        SqlLikeWildcardEscaper::unescape(&escaped, input.escape),
        input.text
    );

    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c == input.escape {
            assert!(chars.next().is_some(), "dangling escape in {escaped:?}");
        } else {
            assert!(c != MATCH_ALL && c != MATCH_ONE, "bare wildcard in {escaped:?}");
        }
    }
});
