use model_value::Value;
use pretty_assertions::assert_eq;
use query_template::{PlaceholderStyle, Sql};

fn user_by_id() -> Sql {
    Sql::new(
        vec!["SELECT * FROM users WHERE id = ".into(), " LIMIT 1".into()],
        vec![Value::Int(7).into()],
    )
}

#[test]
fn statement_formatting_per_style() {
    let sql = user_by_id();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT * FROM users WHERE id = $1 LIMIT 1"
    );
    assert_eq!(
        sql.to_statement(PlaceholderStyle::Colon),
        "SELECT * FROM users WHERE id = :1 LIMIT 1"
    );
    assert_eq!(
        sql.to_statement(PlaceholderStyle::Question),
        "SELECT * FROM users WHERE id = ? LIMIT 1"
    );
}

#[test]
fn rendering_is_memoized_per_style() {
    let sql = user_by_id();

    let first = sql.to_statement(PlaceholderStyle::Dollar) as *const str;
    let second = sql.to_statement(PlaceholderStyle::Dollar) as *const str;
    assert_eq!(first, second, "repeated renders must return the same string");

    // Another style renders independently.
    assert_eq!(
        sql.to_statement(PlaceholderStyle::Question),
        "SELECT * FROM users WHERE id = ? LIMIT 1"
    );
    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT * FROM users WHERE id = $1 LIMIT 1"
    );
}

#[test]
fn join_with_separator_prefix_and_suffix() {
    let parts = vec![
        Sql::raw("a = ").append_parameter(Value::Int(1)),
        Sql::raw("b = ").append_parameter(Value::Int(2)),
        Sql::raw("c IS NULL"),
    ];

    let joined = Sql::join_with(parts, " AND ", "(", ")");

    assert_eq!(
        joined.to_statement(PlaceholderStyle::Dollar),
        "(a = $1 AND b = $2 AND c IS NULL)"
    );
    assert_eq!(joined.parameters(), &[Value::Int(1), Value::Int(2)]);
}

#[test]
fn empty_is_identity_for_append() {
    let sql = Sql::empty().append(user_by_id()).append(Sql::empty());
    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT * FROM users WHERE id = $1 LIMIT 1"
    );

    assert!(Sql::empty().is_empty());
    assert!(!sql.is_empty());
}

#[test]
fn parameter_count_matches_placeholder_count() {
    let sql = Sql::join(
        (0..5).map(|i| Sql::raw("col = ").append_parameter(Value::Int(i))),
        " OR ",
    );

    let stmt = sql.to_statement(PlaceholderStyle::Question);
    assert_eq!(stmt.matches('?').count(), sql.parameters().len());
}
