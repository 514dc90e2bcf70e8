use std::fmt::{self, Write as _};

/// The three placeholder spellings understood by the supported databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderStyle {
    /// `$1`, `$2`, … (PostgreSQL)
    Dollar,
    /// `:1`, `:2`, …
    Colon,
    /// `?` (MySQL, SQLite)
    Question,
}

impl PlaceholderStyle {
    pub const ALL: [PlaceholderStyle; 3] =
        [PlaceholderStyle::Dollar, PlaceholderStyle::Colon, PlaceholderStyle::Question];

    pub fn format(self) -> PlaceholderFormat {
        match self {
            PlaceholderStyle::Dollar => PlaceholderFormat {
                prefix: "$",
                has_numbering: true,
            },
            PlaceholderStyle::Colon => PlaceholderFormat {
                prefix: ":",
                has_numbering: true,
            },
            PlaceholderStyle::Question => PlaceholderFormat {
                prefix: "?",
                has_numbering: false,
            },
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            PlaceholderStyle::Dollar => 0,
            PlaceholderStyle::Colon => 1,
            PlaceholderStyle::Question => 2,
        }
    }
}

/// How placeholders are spelled when a statement is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderFormat {
    pub prefix: &'static str,
    pub has_numbering: bool,
}

impl PlaceholderFormat {
    /// Write the next placeholder into `sql`, advancing the 1-based counter.
    /// The counter advances even for unnumbered styles so callers can track
    /// how many parameters were emitted.
    pub fn write(&self, sql: &mut String, counter: &mut usize) -> fmt::Result {
        sql.write_str(self.prefix)?;
        if self.has_numbering {
            write!(sql, "{counter}")?;
        }
        *counter += 1;
        Ok(())
    }
}
