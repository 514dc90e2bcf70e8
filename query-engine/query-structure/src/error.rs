use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// The planner-facing error taxonomy. Every variant carries enough context to
/// name the operation, model and field or relation involved; `code()` is
/// stable across releases.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("invalid payload shape at `{}`: {message}", path_display(.path))]
    Shape { message: String, path: Vec<String> },

    #[error("unknown field `{field}` on model `{model}`")]
    UnknownField { model: String, field: String },

    #[error("unknown relation `{relation}` on model `{model}`")]
    UnknownRelation { model: String, relation: String },

    #[error("filter operator `{operator}` is not supported for {kind} field `{field}`")]
    UnsupportedFilter {
        kind: &'static str,
        operator: String,
        field: String,
    },

    #[error("{feature} is not supported on this database")]
    FeatureNotSupported { feature: String },

    #[error("operation `{operation}` on `{model}` requires a unique `where`")]
    UniqueWhereRequired { model: String, operation: String },

    #[error("no record found for `{operation}` on `{model}`")]
    RecordNotFound { model: String, operation: String },

    #[error("nested write on `{}` failed: {source}", .relation_path.join("."))]
    NestedWrite {
        relation_path: Vec<String>,
        source: Box<Error>,
    },

    #[error("schema error: {message}")]
    Schema { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

fn path_display(path: &[String]) -> String {
    if path.is_empty() {
        "$".to_owned()
    } else {
        path.join(".")
    }
}

impl Error {
    pub fn shape(message: impl Into<String>, path: &[&str]) -> Error {
        Error::Shape {
            message: message.into(),
            path: path.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    pub fn schema(message: impl fmt::Display) -> Error {
        Error::Schema {
            message: message.to_string(),
        }
    }

    pub fn internal(message: impl fmt::Display) -> Error {
        Error::Internal {
            message: message.to_string(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Shape { .. } => "shape_error",
            Error::UnknownField { .. } => "unknown_field",
            Error::UnknownRelation { .. } => "unknown_relation",
            Error::UnsupportedFilter { .. } => "unsupported_filter",
            Error::FeatureNotSupported { .. } => "feature_not_supported",
            Error::UniqueWhereRequired { .. } => "unique_where_required",
            Error::RecordNotFound { .. } => "record_not_found",
            Error::NestedWrite { .. } => "nested_write_error",
            Error::Schema { .. } => "schema_error",
            Error::Internal { .. } => "internal_error",
        }
    }

    /// Wrap an error produced while planning a nested write, prepending the
    /// relation that was being traversed.
    pub fn nested(self, relation: &str) -> Error {
        match self {
            Error::NestedWrite {
                mut relation_path,
                source,
            } => {
                relation_path.insert(0, relation.to_owned());
                Error::NestedWrite {
                    relation_path,
                    source,
                }
            }
            other => Error::NestedWrite {
                relation_path: vec![relation.to_owned()],
                source: Box::new(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_wrapping_accumulates_the_relation_path() {
        let inner = Error::UnknownField {
            model: "Post".into(),
            field: "titel".into(),
        };

        let wrapped = inner.nested("posts").nested("author");

        match &wrapped {
            Error::NestedWrite { relation_path, .. } => {
                assert_eq!(relation_path, &["author".to_owned(), "posts".to_owned()]);
            }
            other => panic!("expected nested write error, got {other:?}"),
        }
        assert_eq!(wrapped.code(), "nested_write_error");
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::shape("x", &["where"]).code(), "shape_error");
        assert_eq!(
            Error::FeatureNotSupported {
                feature: "vector search".into()
            }
            .code(),
            "feature_not_supported"
        );
    }
}
