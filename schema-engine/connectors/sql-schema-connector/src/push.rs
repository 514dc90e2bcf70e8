//! The push pipeline: serialize → introspect → diff → resolve → confirm →
//! render → execute. Execution stops at the first failing statement; no
//! rollback is attempted beyond what the driver's transaction provides.

use crate::destructive_check::destructive_descriptions;
use crate::error::ConnectorError;
use crate::migration::MigrationStep;
use crate::rename_resolver::{RenameResolver, ResolverDecision};
use crate::sql_renderer::render_step;
use crate::sql_schema_calculator::calculate_sql_schema;
use crate::sql_schema_differ::{diff, order_steps, AmbiguousChange, DiffResult};
use query_structure::ModelSet;
use query_template::Sql;
use sql_connection::Queryable;
use sql_dialect::dialect_for;
use tracing::debug;

type DestructiveCallback = Box<dyn Fn(&[String]) -> bool + Send + Sync>;

pub struct PushOptions {
    /// Apply destructive changes without confirmation.
    pub force: bool,
    /// Compute and render everything, execute nothing.
    pub dry_run: bool,
    pub resolver: RenameResolver,
    /// Invoked with the destructive-step descriptions; returning `false`
    /// aborts the push.
    pub on_destructive: Option<DestructiveCallback>,
}

impl Default for PushOptions {
    fn default() -> Self {
        PushOptions {
            force: false,
            dry_run: false,
            resolver: RenameResolver::default(),
            on_destructive: None,
        }
    }
}

#[derive(Debug)]
pub struct PushResult {
    pub steps: Vec<MigrationStep>,
    pub sql: Vec<Sql>,
    pub executed: bool,
}

/// Reconcile the live database with the model-defined schema.
pub async fn push(
    conn: &dyn Queryable,
    models: &ModelSet,
    options: PushOptions,
) -> Result<PushResult, ConnectorError> {
    let dialect = dialect_for(conn.sql_family());

    let desired = calculate_sql_schema(models, dialect)?;
    let current = crate::introspect(conn).await?;

    let DiffResult { mut steps, ambiguities } = diff(&current, &desired);
    debug!(steps = steps.len(), ambiguities = ambiguities.len(), "diff computed");

    let decisions = options.resolver.resolve(&ambiguities).await?;
    for (ambiguity, decision) in decisions {
        apply_decision(ambiguity, decision, &mut steps);
    }
    order_steps(&mut steps);

    let destructive = destructive_descriptions(&steps);
    if !destructive.is_empty() && !options.force {
        let approved = options
            .on_destructive
            .as_ref()
            .map(|callback| callback(&destructive))
            .unwrap_or(false);
        if !approved {
            return Err(ConnectorError::DestructiveRejected {
                operations: destructive,
            });
        }
    }

    // Render: main statements in step order, deferred statements (FKs of
    // fresh tables) trailing.
    let mut main: Vec<(Sql, String)> = Vec::new();
    let mut deferred: Vec<(Sql, String)> = Vec::new();
    for step in &steps {
        let rendered = render_step(step, dialect)?;
        let description = step.to_string();
        main.extend(rendered.statements.into_iter().map(|s| (s, description.clone())));
        deferred.extend(rendered.deferred.into_iter().map(|s| (s, description.clone())));
    }
    main.append(&mut deferred);

    if !options.dry_run {
        for (statement, description) in &main {
            debug!(statement = statement.to_statement(dialect.placeholder_style()), "executing DDL");
            conn.raw_cmd(statement.to_statement(dialect.placeholder_style()))
                .await
                .map_err(|source| ConnectorError::DdlExecution {
                    operation: description.clone(),
                    source,
                })?;
        }
    }

    let executed = !options.dry_run;
    Ok(PushResult {
        steps,
        sql: main.into_iter().map(|(sql, _)| sql).collect(),
        executed,
    })
}

/// Like [`push`] but never executes.
pub async fn generate_ddl(
    conn: &dyn Queryable,
    models: &ModelSet,
    mut options: PushOptions,
) -> Result<PushResult, ConnectorError> {
    options.dry_run = true;
    push(conn, models, options).await
}

/// Materialize a resolver decision into migration steps. A rename keeps one
/// operation; an add+drop splits into two.
fn apply_decision(ambiguity: AmbiguousChange, decision: ResolverDecision, steps: &mut Vec<MigrationStep>) {
    match (ambiguity, decision) {
        (AmbiguousChange::Column { table, from, to, .. }, ResolverDecision::Rename) => {
            steps.push(MigrationStep::RenameColumn { table, from, to });
        }
        (
            AmbiguousChange::Column {
                table,
                from,
                definition,
                ..
            },
            ResolverDecision::AddAndDrop,
        ) => {
            steps.push(MigrationStep::AddColumn {
                table: table.clone(),
                column: definition,
            });
            steps.push(MigrationStep::DropColumn {
                table,
                column: from,
            });
        }
        (AmbiguousChange::Table { from, to, .. }, ResolverDecision::Rename) => {
            steps.push(MigrationStep::RenameTable { from, to });
        }
        (AmbiguousChange::Table { from, definition, .. }, ResolverDecision::AddAndDrop) => {
            steps.push(MigrationStep::CreateTable { table: definition });
            steps.push(MigrationStep::DropTable { name: from });
        }
    }
}
