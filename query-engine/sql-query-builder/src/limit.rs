use query_structure::{Error, Result};
use query_template::Sql;

/// Render LIMIT/OFFSET. `take: 0` is emitted (`LIMIT 0` is valid SQL and
/// yields zero rows); `skip` without `take` is legal. Values render as
/// integer literals.
pub(crate) fn build_limit_offset(take: Option<i64>, skip: Option<i64>) -> Result<Sql> {
    if let Some(take) = take {
        if take < 0 {
            return Err(Error::shape("`take` must not be negative", &["take"]));
        }
    }
    if let Some(skip) = skip {
        if skip < 0 {
            return Err(Error::shape("`skip` must not be negative", &["skip"]));
        }
    }

    let mut sql = Sql::empty();
    if let Some(take) = take {
        sql = sql.append_raw(&format!(" LIMIT {take}"));
    }
    if let Some(skip) = skip {
        sql = sql.append_raw(&format!(" OFFSET {skip}"));
    }
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_template::PlaceholderStyle;

    #[test]
    fn take_zero_is_not_dropped() {
        let sql = build_limit_offset(Some(0), None).unwrap();
        assert_eq!(sql.to_statement(PlaceholderStyle::Dollar), " LIMIT 0");
    }

    #[test]
    fn skip_without_take_is_legal() {
        let sql = build_limit_offset(None, Some(10)).unwrap();
        assert_eq!(sql.to_statement(PlaceholderStyle::Dollar), " OFFSET 10");
    }

    #[test]
    fn negative_take_is_rejected() {
        assert!(build_limit_offset(Some(-1), None).is_err());
    }
}
