use query_structure::ModelSet;
use sql_dialect::Dialect;
use std::cell::Cell;

/// Carried through the recursive descent: the schema, the dialect, and the
/// alias allocator. Aliases are monotonic per query (`t0`, `t1`, …) and never
/// reused within a statement.
pub struct Context<'a> {
    pub schema: &'a ModelSet,
    pub dialect: &'a dyn Dialect,
    alias_counter: Cell<u32>,
}

impl<'a> Context<'a> {
    pub fn new(schema: &'a ModelSet, dialect: &'a dyn Dialect) -> Context<'a> {
        Context {
            schema,
            dialect,
            alias_counter: Cell::new(0),
        }
    }

    pub fn next_table_alias(&self) -> String {
        let n = self.alias_counter.get();
        self.alias_counter.set(n + 1);
        format!("t{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_structure::ModelSet;
    use sql_dialect::PostgresDialect;

    #[test]
    fn aliases_are_monotonic() {
        let schema = ModelSet::new(vec![]).unwrap();
        let ctx = Context::new(&schema, &PostgresDialect);
        assert_eq!(ctx.next_table_alias(), "t0");
        assert_eq!(ctx.next_table_alias(), "t1");
        assert_eq!(ctx.next_table_alias(), "t2");
    }
}
