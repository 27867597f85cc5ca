use crate::storage::row::Row;

/// Statement types the shell understands.
#[derive(Debug)]
pub enum Statement {
    Insert(InsertStatement),
    Select(SelectStatement),
}

/// An `insert <id> <username> <email>` statement with the row already built.
#[derive(Debug)]
pub struct InsertStatement {
    pub row: Row,
}

/// A `select` statement: all rows, or a single row when a key is given.
#[derive(Debug)]
pub struct SelectStatement {
    pub key: Option<u32>,
}
