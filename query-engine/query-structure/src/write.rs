use crate::arguments::UniqueFilter;
use crate::filter::Filter;
use indexmap::IndexMap;
use model_value::Value;

/// The scalar assignments of a create or update, keyed by field name in
/// payload order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteArgs {
    pub entries: IndexMap<String, WriteOperation>,
}

impl WriteArgs {
    pub fn insert(&mut self, field: impl Into<String>, op: WriteOperation) {
        self.entries.insert(field.into(), op);
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.insert(field, WriteOperation::Set(value));
    }

    pub fn get(&self, field: &str) -> Option<&WriteOperation> {
        self.entries.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A per-field write operation.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOperation {
    Set(Value),
    Increment(Value),
    Decrement(Value),
    Multiply(Value),
    Divide(Value),
    /// Append to a scalar list. The value may be a single element or a list.
    Push(Value),
    /// Prepend to a scalar list.
    Unshift(Value),
}

impl WriteOperation {
    pub fn operator_name(&self) -> &'static str {
        match self {
            WriteOperation::Set(_) => "set",
            WriteOperation::Increment(_) => "increment",
            WriteOperation::Decrement(_) => "decrement",
            WriteOperation::Multiply(_) => "multiply",
            WriteOperation::Divide(_) => "divide",
            WriteOperation::Push(_) => "push",
            WriteOperation::Unshift(_) => "unshift",
        }
    }
}

/// The full data of a create or update: scalar assignments plus nested
/// relation writes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteData {
    pub scalars: WriteArgs,
    pub nested: Vec<NestedWrite>,
}

impl WriteData {
    pub fn has_nested(&self) -> bool {
        !self.nested.is_empty()
    }
}

/// The nested operations of one relation entry inside `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedWrite {
    pub relation: String,
    pub ops: Vec<NestedWriteOp>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NestedWriteOp {
    Create(WriteData),
    Connect(UniqueFilter),
    ConnectOrCreate {
        filter: UniqueFilter,
        create: WriteData,
    },
    /// To-one relations disconnect with `true`; to-many name the record.
    Disconnect(Option<UniqueFilter>),
    Delete(Option<UniqueFilter>),
    Update {
        filter: Option<UniqueFilter>,
        data: Box<WriteData>,
    },
    UpdateMany {
        filter: Option<Filter>,
        data: WriteArgs,
    },
    Upsert {
        filter: UniqueFilter,
        create: WriteData,
        update: WriteData,
    },
    /// Replace the full link set of a to-many relation.
    Set(Vec<UniqueFilter>),
    DeleteMany(Option<Filter>),
}

impl NestedWriteOp {
    pub fn name(&self) -> &'static str {
        match self {
            NestedWriteOp::Create(_) => "create",
            NestedWriteOp::Connect(_) => "connect",
            NestedWriteOp::ConnectOrCreate { .. } => "connectOrCreate",
            NestedWriteOp::Disconnect(_) => "disconnect",
            NestedWriteOp::Delete(_) => "delete",
            NestedWriteOp::Update { .. } => "update",
            NestedWriteOp::UpdateMany { .. } => "updateMany",
            NestedWriteOp::Upsert { .. } => "upsert",
            NestedWriteOp::Set(_) => "set",
            NestedWriteOp::DeleteMany(_) => "deleteMany",
        }
    }
}
