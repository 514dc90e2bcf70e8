use crate::context::Context;
use query_structure::Model;
use query_template::Sql;

/// `"alias"."column"`
pub(crate) fn column_ref(ctx: &Context<'_>, alias: &str, column: &str) -> Sql {
    Sql::raw(format!(
        "{}.{}",
        ctx.dialect.quote_ident(alias),
        ctx.dialect.quote_ident(column)
    ))
}

/// `"table" AS "alias"`
pub(crate) fn table_ref(ctx: &Context<'_>, model: &Model, alias: &str) -> Sql {
    Sql::raw(format!(
        "{} AS {}",
        ctx.dialect.quote_ident(model.db_name()),
        ctx.dialect.quote_ident(alias)
    ))
}

/// `"table"` — used by UPDATE/DELETE, which qualify columns by the table
/// name instead of an alias for cross-dialect compatibility.
pub(crate) fn table_name(ctx: &Context<'_>, model: &Model) -> Sql {
    Sql::raw(ctx.dialect.quote_ident(model.db_name()))
}
