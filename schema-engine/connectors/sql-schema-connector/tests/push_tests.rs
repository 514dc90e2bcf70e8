use async_trait::async_trait;
use model_value::Value;
use pretty_assertions::assert_eq;
use query_structure::*;
use query_template::{PlaceholderStyle, Sql};
use sql_connection::{ConnectionError, Queryable, ResultSet, SqlFamily};
use sql_schema_connector::{push, generate_ddl, PushOptions, RenameResolver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A canned SQLite driver: introspection queries answer from a fixture table
/// set, executed DDL is recorded.
struct FakeSqlite {
    responses: Vec<(&'static str, ResultSet)>,
    executed: Mutex<Vec<String>>,
}

impl FakeSqlite {
    fn empty() -> FakeSqlite {
        FakeSqlite {
            responses: Vec::new(),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// A database holding `user(id TEXT PRIMARY KEY, email TEXT)`.
    fn with_user_table() -> FakeSqlite {
        let tables = ResultSet::new(
            vec!["name".into()],
            vec![vec![Value::String("user".into())]],
        );
        let columns = ResultSet::new(
            vec![
                "cid".into(),
                "name".into(),
                "type".into(),
                "notnull".into(),
                "dflt_value".into(),
                "pk".into(),
            ],
            vec![
                vec![
                    Value::Int(0),
                    Value::String("id".into()),
                    Value::String("TEXT".into()),
                    Value::Int(1),
                    Value::Null,
                    Value::Int(1),
                ],
                vec![
                    Value::Int(1),
                    Value::String("email".into()),
                    Value::String("TEXT".into()),
                    Value::Int(1),
                    Value::Null,
                    Value::Int(0),
                ],
            ],
        );

        FakeSqlite {
            responses: vec![
                ("FROM sqlite_master", tables),
                ("PRAGMA table_info", columns),
                ("PRAGMA index_list", ResultSet::default()),
                ("PRAGMA foreign_key_list", ResultSet::default()),
            ],
            executed: Mutex::new(Vec::new()),
        }
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Queryable for FakeSqlite {
    fn sql_family(&self) -> SqlFamily {
        SqlFamily::Sqlite
    }

    async fn execute(&self, sql: &Sql) -> std::result::Result<ResultSet, ConnectionError> {
        let text = sql.to_statement(PlaceholderStyle::Question);
        for (needle, response) in &self.responses {
            if text.contains(needle) {
                return Ok(response.clone());
            }
        }
        Ok(ResultSet::default())
    }

    async fn execute_raw(&self, sql: &str, _params: &[Value]) -> std::result::Result<u64, ConnectionError> {
        self.executed.lock().unwrap().push(sql.to_owned());
        Ok(0)
    }
}

fn user_with(field_name: &str) -> ModelSet {
    let user = Model::new("User")
        .mapped("user")
        .field(Field::new("id", ScalarKind::String).id())
        .field(Field::new(field_name, ScalarKind::String));
    ModelSet::new(vec![user]).unwrap()
}

#[tokio::test]
async fn push_creates_missing_tables() {
    let conn = FakeSqlite::empty();
    let models = user_with("email");

    let result = push(&conn, &models, PushOptions::default()).await.unwrap();

    assert!(result.executed);
    let executed = conn.executed();
    assert_eq!(
        executed,
        vec!["CREATE TABLE \"user\" (\"id\" TEXT NOT NULL, \"email\" TEXT NOT NULL, PRIMARY KEY (\"id\"))".to_owned()]
    );
}

#[tokio::test]
async fn dry_run_renders_but_never_executes() {
    let conn = FakeSqlite::empty();
    let models = user_with("email");

    let result = generate_ddl(&conn, &models, PushOptions::default()).await.unwrap();

    assert!(!result.executed);
    assert_eq!(result.sql.len(), 1);
    assert!(conn.executed().is_empty());
}

#[tokio::test]
async fn strict_resolver_fails_on_ambiguity() {
    let conn = FakeSqlite::with_user_table();
    let models = user_with("email_address");

    let err = push(&conn, &models, PushOptions::default()).await.unwrap_err();

    assert!(err.to_string().contains("ambiguous"));
    assert!(conn.executed().is_empty());
}

#[tokio::test]
async fn always_rename_resolves_to_a_rename() {
    let conn = FakeSqlite::with_user_table();
    let models = user_with("email_address");

    let result = push(
        &conn,
        &models,
        PushOptions {
            resolver: RenameResolver::AlwaysRename,
            ..PushOptions::default()
        },
    )
    .await
    .unwrap();

    let statements: Vec<String> = result
        .sql
        .iter()
        .map(|s| s.to_statement(PlaceholderStyle::Question).to_owned())
        .collect();
    assert_eq!(
        statements,
        vec!["ALTER TABLE \"user\" RENAME COLUMN \"email\" TO \"email_address\"".to_owned()]
    );
    // A rename preserves data: nothing destructive, no confirmation needed.
    assert!(result.steps.iter().all(|s| !s.is_destructive()));
}

#[tokio::test]
async fn add_and_drop_requires_confirmation() {
    let conn = FakeSqlite::with_user_table();
    let models = user_with("email_address");

    // Declining the destructive prompt aborts.
    let err = push(
        &conn,
        &models,
        PushOptions {
            resolver: RenameResolver::AlwaysAddAndDrop,
            on_destructive: Some(Box::new(|_| false)),
            ..PushOptions::default()
        },
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("destructive"));
    assert!(conn.executed().is_empty());

    // The callback sees the drop described.
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in_callback = Arc::clone(&seen);
    let conn = FakeSqlite::with_user_table();
    let result = push(
        &conn,
        &models,
        PushOptions {
            resolver: RenameResolver::AlwaysAddAndDrop,
            on_destructive: Some(Box::new(move |descriptions| {
                seen_in_callback
                    .lock()
                    .unwrap()
                    .extend(descriptions.iter().cloned());
                true
            })),
            ..PushOptions::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(seen.lock().unwrap().clone(), vec!["Drop column user.email".to_owned()]);
    let statements: Vec<String> = result
        .sql
        .iter()
        .map(|s| s.to_statement(PlaceholderStyle::Question).to_owned())
        .collect();
    assert_eq!(
        statements,
        vec![
            "ALTER TABLE \"user\" ADD COLUMN \"email_address\" TEXT NOT NULL".to_owned(),
            "ALTER TABLE \"user\" DROP COLUMN \"email\"".to_owned(),
        ]
    );
}

#[tokio::test]
async fn force_skips_the_destructive_prompt() {
    let conn = FakeSqlite::with_user_table();
    let models = user_with("email_address");

    let called = Arc::new(AtomicBool::new(false));
    let called_in_callback = Arc::clone(&called);

    let result = push(
        &conn,
        &models,
        PushOptions {
            resolver: RenameResolver::AlwaysAddAndDrop,
            force: true,
            on_destructive: Some(Box::new(move |_| {
                called_in_callback.store(true, Ordering::SeqCst);
                false
            })),
            ..PushOptions::default()
        },
    )
    .await
    .unwrap();

    assert!(!called.load(Ordering::SeqCst));
    assert_eq!(conn.executed().len(), result.sql.len());
}

#[tokio::test]
async fn predefined_resolver_consults_the_lookup() {
    let conn = FakeSqlite::with_user_table();
    let models = user_with("email_address");

    let mut lookup = std::collections::HashMap::new();
    lookup.insert(
        ("email".to_owned(), "email_address".to_owned()),
        sql_schema_connector::ResolverDecision::Rename,
    );

    let result = push(
        &conn,
        &models,
        PushOptions {
            resolver: RenameResolver::Predefined(lookup),
            ..PushOptions::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(result.steps.len(), 1);
}
