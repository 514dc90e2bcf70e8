/// The root operations of the query surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FindMany,
    FindFirst,
    FindFirstOrThrow,
    FindUnique,
    FindUniqueOrThrow,
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Upsert,
    Delete,
    DeleteMany,
    Count,
    Aggregate,
    GroupBy,
    Exist,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::FindMany => "findMany",
            Operation::FindFirst => "findFirst",
            Operation::FindFirstOrThrow => "findFirstOrThrow",
            Operation::FindUnique => "findUnique",
            Operation::FindUniqueOrThrow => "findUniqueOrThrow",
            Operation::Create => "create",
            Operation::CreateMany => "createMany",
            Operation::Update => "update",
            Operation::UpdateMany => "updateMany",
            Operation::Upsert => "upsert",
            Operation::Delete => "delete",
            Operation::DeleteMany => "deleteMany",
            Operation::Count => "count",
            Operation::Aggregate => "aggregate",
            Operation::GroupBy => "groupBy",
            Operation::Exist => "exist",
        }
    }

    /// Operations whose `where` must resolve to a unique criteria.
    pub fn requires_unique_where(self) -> bool {
        matches!(
            self,
            Operation::FindUnique
                | Operation::FindUniqueOrThrow
                | Operation::Update
                | Operation::Upsert
                | Operation::Delete
        )
    }

    /// Operations that read back a single record and append `LIMIT 1`.
    pub fn is_single_record_read(self) -> bool {
        matches!(
            self,
            Operation::FindFirst
                | Operation::FindFirstOrThrow
                | Operation::FindUnique
                | Operation::FindUniqueOrThrow
        )
    }

    /// The OrThrow variants: the caller maps an empty result to
    /// `RecordNotFound`.
    pub fn throws_on_empty(self) -> bool {
        matches!(self, Operation::FindFirstOrThrow | Operation::FindUniqueOrThrow)
    }

    pub fn is_write(self) -> bool {
        matches!(
            self,
            Operation::Create
                | Operation::CreateMany
                | Operation::Update
                | Operation::UpdateMany
                | Operation::Upsert
                | Operation::Delete
                | Operation::DeleteMany
        )
    }
}
