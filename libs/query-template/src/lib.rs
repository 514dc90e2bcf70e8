//! Composable parameterized-SQL fragments.
//!
//! A [`Sql`] value interleaves text fragments with bound parameters and can be
//! rendered to a statement string in any of the supported placeholder styles.
//! The statement string plus the ordered parameter slice are the only surface
//! the external driver consumes.

mod placeholder;
mod sql;

pub use placeholder::{PlaceholderFormat, PlaceholderStyle};
pub use sql::{Sql, SqlPart};
