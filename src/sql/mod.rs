pub mod parser;
pub mod statement;
pub mod tokenizer;

pub use parser::prepare;
pub use statement::{InsertStatement, SelectStatement, Statement};
