//! # Database Cursor
//!
//! A cursor is a position inside the table: a page number, a cell number within
//! that page, and an end-of-table flag. Descent walks internal nodes from the
//! root; sequential traversal hops between sibling leaves.

use super::btree::{NodeType, INVALID_PAGE_NUM};
use super::row::Row;
use super::table::Table;
use crate::errors::Error;

/// Represents a position within the table.
///
/// The cursor borrows the table mutably for its entire lifetime; pages it
/// touches are faulted in through the pager on demand.
pub struct Cursor<'a> {
    pub table: &'a mut Table,
    pub page_num: u32,
    pub cell_num: u32,
    /// Indicates a position one past the last element.
    pub end_of_table: bool,
}

impl<'a> Cursor<'a> {
    /// Positions a cursor at the first row of the table. On an empty table the
    /// cursor is already at the end.
    pub fn start(table: &'a mut Table) -> Result<Self, Error> {
        let mut cursor = Cursor::find(table, 0)?;
        let num_cells = cursor
            .table
            .pager
            .page(cursor.page_num)?
            .leaf_node_num_cells();
        cursor.end_of_table = num_cells == 0;
        Ok(cursor)
    }

    /// Descends from the root to the leaf owning `key` and positions the
    /// cursor at the key's cell, or at the slot where it would be inserted.
    pub fn find(table: &'a mut Table, key: u32) -> Result<Self, Error> {
        let mut page_num = table.root_page_num;

        loop {
            let node = table.pager.page(page_num)?;
            if node.node_type()? == NodeType::Leaf {
                break;
            }
            let child_index = node.internal_node_find_child(key)?;
            let child = node.internal_node_child(child_index)?;
            if child == INVALID_PAGE_NUM {
                return Err(err!(
                    Corrupt,
                    "Internal node {} points to an unset child.",
                    page_num
                ));
            }
            page_num = child;
        }

        Self::leaf_node_find(table, page_num, key)
    }

    fn leaf_node_find(table: &'a mut Table, page_num: u32, key: u32) -> Result<Self, Error> {
        let cell_num = {
            let node = table.pager.page(page_num)?;

            // Binary search
            let mut min_index = 0;
            let mut one_past_max_index = node.leaf_node_num_cells();
            let mut found = None;
            while one_past_max_index != min_index {
                let index = (min_index + one_past_max_index) / 2;
                let key_at_index = node.leaf_node_key(index)?;
                if key == key_at_index {
                    found = Some(index);
                    break;
                }
                if key < key_at_index {
                    one_past_max_index = index;
                } else {
                    min_index = index + 1;
                }
            }
            found.unwrap_or(min_index)
        };

        Ok(Cursor {
            table,
            page_num,
            cell_num,
            end_of_table: false,
        })
    }

    /// Advances to the next cell, following the sibling pointer when the
    /// current leaf is exhausted.
    pub fn advance(&mut self) -> Result<(), Error> {
        self.cell_num += 1;

        let (num_cells, next_leaf) = {
            let node = self.table.pager.page(self.page_num)?;
            (node.leaf_node_num_cells(), node.leaf_node_next_leaf())
        };

        if self.cell_num >= num_cells {
            if next_leaf == 0 {
                // Rightmost leaf
                self.end_of_table = true;
            } else {
                self.page_num = next_leaf;
                self.cell_num = 0;
            }
        }
        Ok(())
    }

    /// Key stored at the cursor position.
    pub fn key(&mut self) -> Result<u32, Error> {
        let node = self.table.pager.page(self.page_num)?;
        node.leaf_node_key(self.cell_num)
    }

    /// Decodes the row stored at the cursor position.
    pub fn row(&mut self) -> Result<Row, Error> {
        let node = self.table.pager.page(self.page_num)?;
        Ok(Row::deserialize(node.leaf_node_value(self.cell_num)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn start_on_empty_table_is_end_of_table() {
        let dir = TempDir::new().unwrap();
        let mut table = Table::open(&dir.path().join("cursor.db")).unwrap();
        let cursor = Cursor::start(&mut table).unwrap();
        assert!(cursor.end_of_table);
        assert_eq!(cursor.page_num, 0);
        assert_eq!(cursor.cell_num, 0);
    }

    #[test]
    fn advance_walks_rows_in_key_order() {
        let dir = TempDir::new().unwrap();
        let mut table = Table::open(&dir.path().join("cursor.db")).unwrap();
        for id in [3u32, 1, 2] {
            table
                .insert(&Row::new(id, "user", "user@test.com"))
                .unwrap();
        }

        let mut cursor = Cursor::start(&mut table).unwrap();
        let mut keys = Vec::new();
        while !cursor.end_of_table {
            keys.push(cursor.key().unwrap());
            cursor.advance().unwrap();
        }
        assert_eq!(keys, vec![1, 2, 3]);
    }

    #[test]
    fn find_lands_on_insertion_slot_for_missing_key() {
        let dir = TempDir::new().unwrap();
        let mut table = Table::open(&dir.path().join("cursor.db")).unwrap();
        for id in [10u32, 20, 30] {
            table
                .insert(&Row::new(id, "user", "user@test.com"))
                .unwrap();
        }

        let mut cursor = Cursor::find(&mut table, 20).unwrap();
        assert_eq!(cursor.cell_num, 1);
        assert_eq!(cursor.key().unwrap(), 20);

        let cursor = Cursor::find(&mut table, 25).unwrap();
        assert_eq!(cursor.cell_num, 2);
    }
}
