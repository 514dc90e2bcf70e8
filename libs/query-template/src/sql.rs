use crate::placeholder::PlaceholderStyle;
use model_value::Value;
use once_cell::sync::OnceCell;
use std::fmt;

/// One slot of a [`Sql::new`] construction: either a bound parameter or a
/// nested fragment whose pieces splice into the parent.
#[derive(Debug, Clone)]
pub enum SqlPart {
    Value(Value),
    Sql(Sql),
}

impl From<Value> for SqlPart {
    fn from(value: Value) -> Self {
        SqlPart::Value(value)
    }
}

impl From<Sql> for SqlPart {
    fn from(sql: Sql) -> Self {
        SqlPart::Sql(sql)
    }
}

/// An immutable interleaving of text fragments and bound parameters.
///
/// Internally `strings.len() == params.len() + 1` always holds; parameter
/// `i` sits between `strings[i]` and `strings[i + 1]`. Nested fragments
/// splice flat, so parameter order equals the left-to-right walk of the
/// composed expression.
#[derive(Clone, Default)]
pub struct Sql {
    strings: Vec<String>,
    params: Vec<Value>,
    rendered: [OnceCell<String>; 3],
}

impl Sql {
    /// The empty fragment. Appending it anywhere is a no-op.
    pub fn empty() -> Sql {
        Sql {
            strings: vec![String::new()],
            params: Vec::new(),
            rendered: Default::default(),
        }
    }

    /// A fragment of raw SQL text with no parameters. The escape hatch for
    /// keywords and identifiers; never pass user input through it.
    pub fn raw(text: impl Into<String>) -> Sql {
        Sql {
            strings: vec![text.into()],
            params: Vec::new(),
            rendered: Default::default(),
        }
    }

    /// A lone bound parameter.
    pub fn parameter(value: Value) -> Sql {
        Sql {
            strings: vec![String::new(), String::new()],
            params: vec![value],
            rendered: Default::default(),
        }
    }

    /// Construct from an alternating sequence of `values.len() + 1` literal
    /// strings and `values.len()` parts. Nested [`Sql`] parts splice into the
    /// parent, preserving left-to-right parameter order.
    ///
    /// # Panics
    ///
    /// Panics if `strings.len() != values.len() + 1`. Mismatched construction
    /// is a programmer error.
    pub fn new(strings: Vec<String>, values: Vec<SqlPart>) -> Sql {
        assert_eq!(
            strings.len(),
            values.len() + 1,
            "Sql fragment requires one more string than values",
        );

        let mut strings_iter = strings.into_iter();
        let mut out = Sql::raw(strings_iter.next().unwrap());

        for (part, text) in values.into_iter().zip(strings_iter) {
            match part {
                SqlPart::Value(value) => out.push_param(value),
                SqlPart::Sql(sql) => out.push_sql(sql),
            }
            out.push_text(&text);
        }

        out
    }

    /// Join fragments with a separator, optionally wrapped in a raw prefix
    /// and suffix. Empty input yields `prefix + suffix`.
    pub fn join_with(
        parts: impl IntoIterator<Item = Sql>,
        separator: &str,
        prefix: &str,
        suffix: &str,
    ) -> Sql {
        let mut out = Sql::raw(prefix);
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                out.push_text(separator);
            }
            out.push_sql(part);
        }
        out.push_text(suffix);
        out
    }

    /// [`Sql::join_with`] without wrapping.
    pub fn join(parts: impl IntoIterator<Item = Sql>, separator: &str) -> Sql {
        Sql::join_with(parts, separator, "", "")
    }

    /// Concatenate `other` after `self`.
    pub fn append(mut self, other: Sql) -> Sql {
        self.push_sql(other);
        self.rendered = Default::default();
        self
    }

    /// Concatenate raw text after `self`.
    pub fn append_raw(mut self, text: &str) -> Sql {
        self.push_text(text);
        self.rendered = Default::default();
        self
    }

    /// Concatenate a bound parameter after `self`.
    pub fn append_parameter(mut self, value: Value) -> Sql {
        self.push_param(value);
        self.rendered = Default::default();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.strings.iter().all(|s| s.is_empty())
    }

    pub fn parameters(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parameters(self) -> Vec<Value> {
        self.params
    }

    /// Render the statement with placeholders in the given style. The result
    /// is memoized per style; repeated calls return the same string.
    pub fn to_statement(&self, style: PlaceholderStyle) -> &str {
        self.rendered[style.index()].get_or_init(|| {
            let format = style.format();
            let mut out = String::with_capacity(self.text_len() + self.params.len() * 3);
            let mut counter = 1;

            for (i, text) in self.strings.iter().enumerate() {
                out.push_str(text);
                if i < self.params.len() {
                    format
                        .write(&mut out, &mut counter)
                        .expect("writing into a String cannot fail");
                }
            }

            out
        })
    }

    fn text_len(&self) -> usize {
        self.strings.iter().map(String::len).sum()
    }

    fn push_text(&mut self, text: &str) {
        match self.strings.last_mut() {
            Some(last) => last.push_str(text),
            None => self.strings.push(text.to_owned()),
        }
    }

    fn push_param(&mut self, value: Value) {
        self.params.push(value);
        self.strings.push(String::new());
    }

    fn push_sql(&mut self, other: Sql) {
        let mut strings = other.strings.into_iter();
        if let Some(first) = strings.next() {
            self.push_text(&first);
        }
        for (value, text) in other.params.into_iter().zip(strings) {
            self.push_param(value);
            self.push_text(&text);
        }
    }
}

impl fmt::Debug for Sql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sql")
            .field("strings", &self.strings)
            .field("params", &self.params)
            .finish()
    }
}

impl PartialEq for Sql {
    fn eq(&self, other: &Self) -> bool {
        self.strings == other.strings && self.params == other.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "one more string than values")]
    fn mismatched_construction_panics() {
        Sql::new(vec!["a".into()], vec![SqlPart::Value(Value::Int(1))]);
    }

    #[test]
    fn nested_fragments_keep_parameter_order() {
        let inner = Sql::new(
            vec!["x = ".into(), " AND y = ".into(), "".into()],
            vec![Value::Int(1).into(), Value::Int(2).into()],
        );
        let outer = Sql::new(
            vec!["SELECT * FROM t WHERE ".into(), " OR z = ".into(), "".into()],
            vec![inner.into(), Value::Int(3).into()],
        );

        assert_eq!(
            outer.to_statement(PlaceholderStyle::Dollar),
            "SELECT * FROM t WHERE x = $1 AND y = $2 OR z = $3"
        );
        assert_eq!(
            outer.parameters(),
            &[Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }
}
