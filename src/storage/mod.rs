pub mod btree;
pub mod cursor;
pub mod pager;
pub mod row;
pub mod table;

pub use cursor::Cursor;
pub use pager::Pager;
pub use row::Row;
pub use table::Table;
