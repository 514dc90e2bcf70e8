use crate::error::{Error, Result};
use model_value::Value;
use sql_connection::SqlFamily;
use std::collections::BTreeMap;

/// The scalar type of a column-backed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Int,
    Float,
    Decimal,
    BigInt,
    Boolean,
    DateTime,
    Date,
    Time,
    Json,
    Bytes,
    Enum,
    Vector,
    Point,
}

impl ScalarKind {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ScalarKind::Int | ScalarKind::Float | ScalarKind::Decimal | ScalarKind::BigInt
        )
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, ScalarKind::DateTime | ScalarKind::Date | ScalarKind::Time)
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::Decimal => "decimal",
            ScalarKind::BigInt => "bigint",
            ScalarKind::Boolean => "boolean",
            ScalarKind::DateTime => "datetime",
            ScalarKind::Date => "date",
            ScalarKind::Time => "time",
            ScalarKind::Json => "json",
            ScalarKind::Bytes => "blob",
            ScalarKind::Enum => "enum",
            ScalarKind::Vector => "vector",
            ScalarKind::Point => "point",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldArity {
    Required,
    Nullable,
    List,
}

impl FieldArity {
    pub fn is_list(self) -> bool {
        matches!(self, FieldArity::List)
    }

    pub fn is_nullable(self) -> bool {
        matches!(self, FieldArity::Nullable)
    }
}

/// Client-side value generation attached to a field default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Uuid,
    Ulid,
    Nanoid,
    Cuid,
    Increment,
    Now,
    UpdatedAt,
}

impl GeneratorKind {
    /// Whether the generator produces values in the engine (as opposed to
    /// the database, like `increment`).
    pub fn is_client_side(self) -> bool {
        !matches!(self, GeneratorKind::Increment)
    }

    /// Produce a fresh value. `increment` is database-side and yields none.
    pub fn generate(self) -> Option<Value> {
        match self {
            GeneratorKind::Uuid => Some(Value::String(uuid::Uuid::new_v4().to_string())),
            GeneratorKind::Ulid => Some(Value::String(ulid::Ulid::new().to_string())),
            GeneratorKind::Nanoid => Some(Value::String(nanoid::nanoid!())),
            GeneratorKind::Cuid => Some(Value::String(cuid2::create_id())),
            GeneratorKind::Now | GeneratorKind::UpdatedAt => Some(Value::now()),
            GeneratorKind::Increment => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GeneratorKind::Uuid => "uuid",
            GeneratorKind::Ulid => "ulid",
            GeneratorKind::Nanoid => "nanoid",
            GeneratorKind::Cuid => "cuid",
            GeneratorKind::Increment => "increment",
            GeneratorKind::Now => "now",
            GeneratorKind::UpdatedAt => "updatedAt",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Value(Value),
    Generator(GeneratorKind),
}

/// A scalar field of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: ScalarKind,
    pub arity: FieldArity,
    pub is_id: bool,
    pub is_unique: bool,
    pub default: Option<DefaultValue>,
    mapped_name: Option<String>,
    /// Per-dialect native column type overrides, e.g. `varchar(40)`.
    native_types: BTreeMap<&'static str, String>,
    /// Referenced enum definition name, for `ScalarKind::Enum` fields.
    pub enum_name: Option<String>,
    /// Vector dimension, for `ScalarKind::Vector` fields.
    pub dimension: Option<u32>,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: ScalarKind) -> Field {
        Field {
            name: name.into(),
            kind,
            arity: FieldArity::Required,
            is_id: false,
            is_unique: false,
            default: None,
            mapped_name: None,
            native_types: BTreeMap::new(),
            enum_name: None,
            dimension: None,
        }
    }

    pub fn id(mut self) -> Field {
        self.is_id = true;
        self
    }

    pub fn unique(mut self) -> Field {
        self.is_unique = true;
        self
    }

    pub fn nullable(mut self) -> Field {
        self.arity = FieldArity::Nullable;
        self
    }

    pub fn list(mut self) -> Field {
        self.arity = FieldArity::List;
        self
    }

    pub fn mapped(mut self, column: impl Into<String>) -> Field {
        self.mapped_name = Some(column.into());
        self
    }

    pub fn default_value(mut self, value: Value) -> Field {
        self.default = Some(DefaultValue::Value(value));
        self
    }

    pub fn generated(mut self, generator: GeneratorKind) -> Field {
        self.default = Some(DefaultValue::Generator(generator));
        self
    }

    pub fn enum_of(mut self, enum_name: impl Into<String>) -> Field {
        self.enum_name = Some(enum_name.into());
        self
    }

    pub fn dimensions(mut self, dimension: u32) -> Field {
        self.dimension = Some(dimension);
        self
    }

    pub fn native_type(mut self, family: SqlFamily, tpe: impl Into<String>) -> Field {
        self.native_types.insert(family.as_str(), tpe.into());
        self
    }

    /// The physical column name.
    pub fn db_name(&self) -> &str {
        self.mapped_name.as_deref().unwrap_or(&self.name)
    }

    pub fn native_type_for(&self, family: SqlFamily) -> Option<&str> {
        self.native_types.get(family.as_str()).map(String::as_str)
    }

    pub fn is_list(&self) -> bool {
        self.arity.is_list()
    }

    pub fn is_nullable(&self) -> bool {
        self.arity.is_nullable()
    }

    pub fn is_autoincrement(&self) -> bool {
        matches!(self.default, Some(DefaultValue::Generator(GeneratorKind::Increment)))
    }

    pub fn is_updated_at(&self) -> bool {
        matches!(self.default, Some(DefaultValue::Generator(GeneratorKind::UpdatedAt)))
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub(crate) fn validate(&self, model: &str) -> Result<()> {
        if let Some(DefaultValue::Generator(generator)) = self.default {
            let compatible = match generator {
                GeneratorKind::Increment => {
                    matches!(self.kind, ScalarKind::Int | ScalarKind::BigInt)
                }
                GeneratorKind::Now | GeneratorKind::UpdatedAt => self.kind.is_temporal(),
                GeneratorKind::Uuid
                | GeneratorKind::Ulid
                | GeneratorKind::Nanoid
                | GeneratorKind::Cuid => matches!(self.kind, ScalarKind::String),
            };

            if !compatible {
                return Err(Error::schema(format!(
                    "generator `{}` is not valid for {} field `{}.{}`",
                    generator.name(),
                    self.kind.name(),
                    model,
                    self.name,
                )));
            }
        }

        if self.kind == ScalarKind::Enum && self.enum_name.is_none() {
            return Err(Error::schema(format!(
                "enum field `{model}.{}` does not name an enum definition",
                self.name,
            )));
        }

        Ok(())
    }
}
