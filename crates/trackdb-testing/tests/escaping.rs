//! Escaped SQL text evaluated by SQLite.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use trackdb_pool::{ConnectionRef, PooledConnection};
use trackdb_query::{FieldEscaper, SqlLikeWildcardEscaper};
use trackdb_testing::TestDatabase;

const TITLES: &[&str] = &[
    "100% Pure Love",
    "100 Pure Love",
    "Under_score",
    "Underscore",
    "Back\\slash",
    "Guns N' Roses",
];

fn seed(conn: &ConnectionRef) {
    conn.execute_batch("CREATE TABLE library (id INTEGER PRIMARY KEY, title TEXT NOT NULL)")
        .unwrap();
    let mut insert = conn
        .prepare("INSERT INTO library (title) VALUES (?1)")
        .unwrap();
    for title in TITLES {
        insert.execute([*title]).unwrap();
    }
}

fn matching_titles(conn: &ConnectionRef, pattern: &str, escape: char) -> Vec<String> {
    let sql = format!(
        "SELECT title FROM library WHERE title LIKE ?1 ESCAPE '{escape}' ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql).unwrap();
    stmt.query_map([pattern], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

#[test]
fn test_field_escaper_round_trips_through_sqlite() {
    let db = TestDatabase::new().unwrap();
    let pool = db.pool("escaping");
    let handle = PooledConnection::new(&pool).unwrap();
    let conn = handle.connection();
    let escaper = FieldEscaper::new(&conn);

    for input in ["", "foobar", "foobar's", "''", "O'Neil's 'quoted'", "ünïcödé"] {
        let literal = escaper.escape_string(input);
        let value: String = conn
            .query_row(&format!("SELECT {literal}"), [], |row| row.get(0))
            .unwrap();
        assert_eq!(value, input);
    }
}

#[test]
fn test_field_escaper_builds_in_list() {
    let db = TestDatabase::new().unwrap();
    let pool = db.pool("escaping");
    let handle = PooledConnection::new(&pool).unwrap();
    let conn = handle.connection();
    seed(&conn);

    let list = FieldEscaper::new(&conn)
        .escape_strings(["Guns N' Roses", "Underscore", "missing"])
        .join(",");
    let count: i64 = conn
        .query_row(
            &format!("SELECT count(*) FROM library WHERE title IN ({list})"),
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn test_like_escaper_matches_literal_wildcards() {
    let db = TestDatabase::new().unwrap();
    let pool = db.pool("escaping");
    let handle = PooledConnection::new(&pool).unwrap();
    let conn = handle.connection();
    seed(&conn);

    // Unescaped, '%' and '_' act as wildcards.
    assert_eq!(
        matching_titles(&conn, "100%", '\\'),
        vec!["100% Pure Love", "100 Pure Love"]
    );
    assert_eq!(matching_titles(&conn, "Under_core", '\\'), vec!["Underscore"]);

    let pattern = SqlLikeWildcardEscaper::contains_pattern("100%", '\\');
    assert_eq!(matching_titles(&conn, &pattern, '\\'), vec!["100% Pure Love"]);

    let pattern = SqlLikeWildcardEscaper::apply("Under_score", '4');
    assert_eq!(matching_titles(&conn, &pattern, '4'), vec!["Under_score"]);

    let pattern = SqlLikeWildcardEscaper::contains_pattern("k\\s", '\\');
    assert_eq!(matching_titles(&conn, &pattern, '\\'), vec!["Back\\slash"]);
}

#[test]
fn test_field_escaper_quotes_identifiers() {
    let db = TestDatabase::new().unwrap();
    let pool = db.pool("escaping");
    let handle = PooledConnection::new(&pool).unwrap();
    let conn = handle.connection();
    let escaper = FieldEscaper::new(&conn);

    let table = escaper.escape_identifier("crate \"digging\" log");
    let column = escaper.escape_identifier("play count");
    conn.execute_batch(&format!(
        "CREATE TABLE {table} ({column} INTEGER); INSERT INTO {table} VALUES (3);"
    ))
    .unwrap();

    let plays: i64 = conn
        .query_row(&format!("SELECT {column} FROM {table}"), [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(plays, 3);
    let name: String = conn
        .query_row("SELECT name FROM sqlite_master WHERE type = 'table'", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(name, "crate \"digging\" log");
}
