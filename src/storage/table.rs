//! Table: the single B-tree backing the database, plus every mutation that
//! keeps it balanced.
//!
//! Searching the tree is logarithmic and a range scan just walks sibling
//! leaves, which is why the rows live in a B-tree rather than a sorted array:
//! an array gives the same lookup cost but linear-time insertion. Internal
//! nodes route by key and store no rows; leaves hold the cells. The root is
//! page 0 for the life of the file, so splitting the root moves its contents
//! to a fresh page and rebuilds page 0 in place above the two halves.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::btree::{
    NodeType, INTERNAL_NODE_MAX_KEYS, INVALID_PAGE_NUM, LEAF_NODE_LEFT_SPLIT_COUNT,
    LEAF_NODE_MAX_CELLS, LEAF_NODE_RIGHT_SPLIT_COUNT,
};
use super::cursor::Cursor;
use super::pager::Pager;
use super::row::{Row, ROW_SIZE};
use crate::errors::Error;

pub struct Table {
    pub root_page_num: u32,
    pub pager: Pager,
    pub path: PathBuf,
}

impl Table {
    /// Opens the database file, creating it if absent. A fresh file gets page 0
    /// initialized as an empty leaf root.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let mut pager = Pager::open(path)?;
        if pager.num_pages() == 0 {
            let root = pager.page(0)?;
            root.initialize_leaf_node();
            root.set_root(true);
        }

        Ok(Table {
            root_page_num: 0,
            pager,
            path: path.to_path_buf(),
        })
    }

    /// Flushes every cached page to disk. A failure here is fatal to the
    /// caller: the file may hold a half-written tree.
    pub fn close(&mut self) -> Result<(), Error> {
        info!(path = %self.path.display(), "Closing table.");
        self.pager.flush_all()
    }

    /// Inserts a row keyed by its id. Rejects duplicates; splits the target
    /// leaf when it is already full.
    pub fn insert(&mut self, row: &Row) -> Result<(), Error> {
        let key = row.id;
        debug!(key, "Inserting a row...");

        let (page_num, cell_num) = {
            let cursor = Cursor::find(self, key)?;
            (cursor.page_num, cursor.cell_num)
        };

        let num_cells = self.pager.page(page_num)?.leaf_node_num_cells();
        if cell_num < num_cells {
            let key_at_index = self.pager.page(page_num)?.leaf_node_key(cell_num)?;
            if key_at_index == key {
                return Err(Error::DuplicateKey(key));
            }
        }

        if num_cells as usize >= LEAF_NODE_MAX_CELLS {
            warn!(page_num, num_cells, "Leaf node full. Splitting...");
            return self.leaf_node_split_and_insert(page_num, cell_num, row);
        }

        let mut value = [0u8; ROW_SIZE];
        row.serialize(&mut value);
        let (is_root, grew_max) = {
            let node = self.pager.page(page_num)?;
            let grew_max = cell_num == node.leaf_node_num_cells();
            node.leaf_node_insert(cell_num, key, &value)?;
            (node.is_root(), grew_max)
        };

        // A new rightmost cell raises this leaf's max key; every ancestor
        // storing that max must follow.
        if grew_max && !is_root {
            self.update_parent_keys(page_num, key)?;
        }
        Ok(())
    }

    /// Single-key lookup.
    pub fn find_row(&mut self, key: u32) -> Result<Row, Error> {
        let (page_num, cell_num) = {
            let cursor = Cursor::find(self, key)?;
            (cursor.page_num, cursor.cell_num)
        };

        let node = self.pager.page(page_num)?;
        if cell_num >= node.leaf_node_num_cells() || node.leaf_node_key(cell_num)? != key {
            return Err(Error::KeyNotFound(key));
        }
        Ok(Row::deserialize(node.leaf_node_value(cell_num)?))
    }

    /// All rows in ascending key order, walking the leaf chain.
    pub fn select_rows(&mut self) -> Result<Vec<Row>, Error> {
        let mut rows = Vec::new();
        let mut cursor = Cursor::start(self)?;
        while !cursor.end_of_table {
            rows.push(cursor.row()?);
            cursor.advance()?;
        }
        Ok(rows)
    }

    /// Total number of rows, summed over the leaf chain. While the root is
    /// still a leaf this is simply its cell count.
    pub fn num_rows(&mut self) -> Result<u32, Error> {
        let mut page_num = {
            let cursor = Cursor::find(self, 0)?;
            cursor.page_num
        };

        let mut total = 0;
        loop {
            let node = self.pager.page(page_num)?;
            total += node.leaf_node_num_cells();
            match node.leaf_node_next_leaf() {
                0 => break,
                next => page_num = next,
            }
        }
        Ok(total)
    }

    /// Greatest key reachable through `page_num`, found by following right
    /// children down to the rightmost leaf. Internal nodes do not store their
    /// own subtree max, so the stored keys are never consulted here.
    fn node_max_key(&mut self, mut page_num: u32) -> Result<u32, Error> {
        loop {
            let node = self.pager.page(page_num)?;
            match node.node_type()? {
                NodeType::Leaf => return node.leaf_node_max_key(),
                NodeType::Internal => {
                    let right_child = node.internal_node_right_child();
                    if right_child == INVALID_PAGE_NUM {
                        return Err(err!(
                            Corrupt,
                            "Internal node {} has an unset right child.",
                            page_num
                        ));
                    }
                    page_num = right_child;
                }
            }
        }
    }

    /// Rewrites the stored max key for `child` in its parent. When the child
    /// is a right child the parent stores nothing, but the parent's own
    /// subtree max grew with it, so the update climbs toward the root.
    fn update_parent_keys(&mut self, mut child: u32, new_max: u32) -> Result<(), Error> {
        loop {
            let (is_root, parent) = {
                let node = self.pager.page(child)?;
                (node.is_root(), node.parent())
            };
            if is_root {
                return Ok(());
            }

            let updated = self
                .pager
                .page(parent)?
                .internal_node_update_child_key(child, new_max)?;
            if updated {
                return Ok(());
            }
            child = parent;
        }
    }

    /// Splits a full leaf and inserts `{row.id, row}` in the process.
    ///
    /// The upper half of the cells moves to a new right sibling; the sibling
    /// chain is spliced; then the parent learns about the new node, or a new
    /// root is created when the split leaf was the root.
    fn leaf_node_split_and_insert(
        &mut self,
        old_page_num: u32,
        cell_num: u32,
        row: &Row,
    ) -> Result<(), Error> {
        let new_page_num = self.pager.get_unused_page_num();

        let old = self.pager.page(old_page_num)?.clone();
        let old_is_root = old.is_root();
        let old_parent = old.parent();

        // All existing cells plus the new one, in key order.
        let mut value = [0u8; ROW_SIZE];
        row.serialize(&mut value);
        let mut cells: Vec<(u32, Vec<u8>)> = Vec::with_capacity(LEAF_NODE_MAX_CELLS + 1);
        for i in 0..old.leaf_node_num_cells() {
            cells.push((old.leaf_node_key(i)?, old.leaf_node_value(i)?.to_vec()));
        }
        cells.insert(cell_num as usize, (row.id, value.to_vec()));

        // New right sibling takes the upper half and slots into the chain.
        {
            let node = self.pager.page(new_page_num)?;
            node.initialize_leaf_node();
            node.set_parent(old_parent);
            node.set_leaf_node_next_leaf(old.leaf_node_next_leaf());
            for (i, (key, value)) in cells[LEAF_NODE_LEFT_SPLIT_COUNT..].iter().enumerate() {
                node.set_leaf_node_key(i as u32, *key)?;
                node.leaf_node_value_mut(i as u32)?.copy_from_slice(value);
            }
            node.set_leaf_node_num_cells(LEAF_NODE_RIGHT_SPLIT_COUNT as u32);
        }

        // Old leaf keeps the lower half.
        {
            let node = self.pager.page(old_page_num)?;
            for (i, (key, value)) in cells[..LEAF_NODE_LEFT_SPLIT_COUNT].iter().enumerate() {
                node.set_leaf_node_key(i as u32, *key)?;
                node.leaf_node_value_mut(i as u32)?.copy_from_slice(value);
            }
            node.set_leaf_node_num_cells(LEAF_NODE_LEFT_SPLIT_COUNT as u32);
            node.set_leaf_node_next_leaf(new_page_num);
        }

        if old_is_root {
            return self.create_new_root(new_page_num);
        }

        let new_left_max = cells[LEAF_NODE_LEFT_SPLIT_COUNT - 1].0;
        self.pager
            .page(old_parent)?
            .internal_node_update_child_key(old_page_num, new_left_max)?;
        self.internal_node_insert(old_parent, new_page_num)
    }

    /// Rebuilds page 0 as an internal root over its former contents and a new
    /// right child.
    ///
    /// The old root is copied wholesale to a fresh page, demoting it to the
    /// left child while the root keeps page number 0. The leaf sibling chain
    /// was already spliced during the split, so the copy carries the correct
    /// `next_leaf`.
    fn create_new_root(&mut self, right_child_page_num: u32) -> Result<(), Error> {
        debug!(right_child_page_num, "Creating a new root.");
        let left_child_page_num = self.pager.get_unused_page_num();

        let root_copy = self.pager.page(self.root_page_num)?.clone();
        {
            let left = self.pager.page(left_child_page_num)?;
            left.data.copy_from_slice(&root_copy.data);
            left.set_root(false);
            left.set_parent(self.root_page_num);
        }

        // A demoted internal root keeps its children; they must learn the new
        // parent page number.
        if root_copy.node_type()? == NodeType::Internal {
            for i in 0..=root_copy.internal_node_num_keys() {
                let child = root_copy.internal_node_child(i)?;
                self.pager.page(child)?.set_parent(left_child_page_num);
            }
        }

        let left_max = self.node_max_key(left_child_page_num)?;
        {
            let root = self.pager.page(self.root_page_num)?;
            root.initialize_internal_node();
            root.set_root(true);
            root.set_internal_node_num_keys(1);
            root.set_internal_node_child(0, left_child_page_num)?;
            root.set_internal_node_key(0, left_max)?;
            root.set_internal_node_right_child(right_child_page_num);
        }
        self.pager
            .page(right_child_page_num)?
            .set_parent(self.root_page_num);
        Ok(())
    }

    /// Adds a child/key pair to `parent_page_num` for a freshly split-off
    /// child. The rightmost child pointer is stored apart from the cell array,
    /// so a child that outranks the current right child swaps places with it.
    fn internal_node_insert(
        &mut self,
        parent_page_num: u32,
        child_page_num: u32,
    ) -> Result<(), Error> {
        debug!(parent_page_num, child_page_num, "Internal node insert.");
        let child_max = self.node_max_key(child_page_num)?;

        let (num_keys, right_child) = {
            let parent = self.pager.page(parent_page_num)?;
            (
                parent.internal_node_num_keys(),
                parent.internal_node_right_child(),
            )
        };

        if num_keys as usize >= INTERNAL_NODE_MAX_KEYS {
            return self.internal_node_split_and_insert(parent_page_num, child_page_num);
        }

        if right_child == INVALID_PAGE_NUM {
            // An internal node with an unset right child is empty.
            self.pager
                .page(parent_page_num)?
                .set_internal_node_right_child(child_page_num);
            self.pager
                .page(child_page_num)?
                .set_parent(parent_page_num);
            return Ok(());
        }

        let right_child_max = self.node_max_key(right_child)?;
        {
            let parent = self.pager.page(parent_page_num)?;
            if child_max > right_child_max {
                // New rightmost child; the old right child moves into the cell
                // array, where its key is now stored.
                parent.set_internal_node_child(num_keys, right_child)?;
                parent.set_internal_node_key(num_keys, right_child_max)?;
                parent.set_internal_node_right_child(child_page_num);
                parent.set_internal_node_num_keys(num_keys + 1);
            } else {
                // Make room for the new cell.
                let index = parent.internal_node_find_child(child_max)?;
                for i in (index + 1..=num_keys).rev() {
                    let prev = parent.internal_node_cell(i - 1)?.to_vec();
                    parent.internal_node_cell_mut(i)?.copy_from_slice(&prev);
                }
                parent.set_internal_node_child(index, child_page_num)?;
                parent.set_internal_node_key(index, child_max)?;
                parent.set_internal_node_num_keys(num_keys + 1);
            }
        }
        self.pager
            .page(child_page_num)?
            .set_parent(parent_page_num);
        Ok(())
    }

    /// Splits a full internal node while inserting `child_page_num`.
    ///
    /// All child entries plus the incoming one are gathered in subtree-max
    /// order and redistributed around the median: the lower half stays in (or
    /// returns to) the old node, the upper half goes to a new sibling, and the
    /// median key is promoted into the parent. Splitting the root rebuilds
    /// page 0 over two fresh halves instead.
    fn internal_node_split_and_insert(
        &mut self,
        old_page_num: u32,
        child_page_num: u32,
    ) -> Result<(), Error> {
        debug!(old_page_num, child_page_num, "Internal node full. Splitting...");

        let old = self.pager.page(old_page_num)?.clone();
        let old_is_root = old.is_root();
        let old_parent = old.parent();
        let num_keys = old.internal_node_num_keys();

        let right_child = old.internal_node_right_child();
        if right_child == INVALID_PAGE_NUM {
            return Err(err!(
                Corrupt,
                "Internal node {} has an unset right child.",
                old_page_num
            ));
        }

        // Every child of the node plus the incoming one, by subtree max.
        let mut entries: Vec<(u32, u32)> = Vec::with_capacity(num_keys as usize + 2);
        for i in 0..num_keys {
            entries.push((old.internal_node_child(i)?, old.internal_node_key(i)?));
        }
        entries.push((right_child, self.node_max_key(right_child)?));

        let child_max = self.node_max_key(child_page_num)?;
        let pos = entries.partition_point(|&(_, max)| max < child_max);
        entries.insert(pos, (child_page_num, child_max));

        let left_entries = entries[..entries.len() / 2].to_vec();
        let right_entries = entries[entries.len() / 2..].to_vec();

        if old_is_root {
            // Both halves move to fresh pages; page 0 is rebuilt above them.
            let left_page_num = self.pager.get_unused_page_num();
            self.write_internal_node(left_page_num, &left_entries, self.root_page_num)?;
            let right_page_num = self.pager.get_unused_page_num();
            self.write_internal_node(right_page_num, &right_entries, self.root_page_num)?;

            let promoted = left_entries[left_entries.len() - 1].1;
            {
                let root = self.pager.page(self.root_page_num)?;
                root.initialize_internal_node();
                root.set_root(true);
                root.set_internal_node_num_keys(1);
                root.set_internal_node_child(0, left_page_num)?;
                root.set_internal_node_key(0, promoted)?;
                root.set_internal_node_right_child(right_page_num);
            }
            self.repoint_children(&left_entries, left_page_num)?;
            self.repoint_children(&right_entries, right_page_num)?;
            return Ok(());
        }

        let new_page_num = self.pager.get_unused_page_num();
        self.write_internal_node(new_page_num, &right_entries, old_parent)?;
        self.write_internal_node(old_page_num, &left_entries, old_parent)?;
        self.repoint_children(&left_entries, old_page_num)?;
        self.repoint_children(&right_entries, new_page_num)?;

        let new_left_max = left_entries[left_entries.len() - 1].1;
        self.pager
            .page(old_parent)?
            .internal_node_update_child_key(old_page_num, new_left_max)?;
        self.internal_node_insert(old_parent, new_page_num)
    }

    /// Lays out `entries` (child page, subtree max) as the full contents of an
    /// internal node: the last entry becomes the right child, the rest become
    /// cells.
    fn write_internal_node(
        &mut self,
        page_num: u32,
        entries: &[(u32, u32)],
        parent: u32,
    ) -> Result<(), Error> {
        let node = self.pager.page(page_num)?;
        node.initialize_internal_node();
        node.set_parent(parent);
        node.set_internal_node_num_keys(entries.len() as u32 - 1);
        for (i, (child, max)) in entries[..entries.len() - 1].iter().enumerate() {
            node.set_internal_node_child(i as u32, *child)?;
            node.set_internal_node_key(i as u32, *max)?;
        }
        node.set_internal_node_right_child(entries[entries.len() - 1].0);
        Ok(())
    }

    fn repoint_children(&mut self, entries: &[(u32, u32)], parent: u32) -> Result<(), Error> {
        for (child, _) in entries {
            self.pager.page(*child)?.set_parent(parent);
        }
        Ok(())
    }

    /// Renders the tree as indented text, one line per node or key.
    pub fn print_tree(&mut self) -> Result<String, Error> {
        let mut out = String::new();
        self.print_node(self.root_page_num, 0, &mut out)?;
        Ok(out)
    }

    fn print_node(
        &mut self,
        page_num: u32,
        indentation_level: usize,
        out: &mut String,
    ) -> Result<(), Error> {
        let node = self.pager.page(page_num)?.clone();
        match node.node_type()? {
            NodeType::Leaf => {
                let num_cells = node.leaf_node_num_cells();
                indent(out, indentation_level);
                out.push_str(&format!("- leaf (size {})\n", num_cells));
                for i in 0..num_cells {
                    indent(out, indentation_level + 1);
                    out.push_str(&format!("- {}\n", node.leaf_node_key(i)?));
                }
            }
            NodeType::Internal => {
                let num_keys = node.internal_node_num_keys();
                indent(out, indentation_level);
                out.push_str(&format!("- internal (size {})\n", num_keys));
                if num_keys > 0 {
                    for i in 0..num_keys {
                        self.print_node(node.internal_node_child(i)?, indentation_level + 1, out)?;
                        indent(out, indentation_level + 1);
                        out.push_str(&format!("- key {}\n", node.internal_node_key(i)?));
                    }
                    self.print_node(
                        node.internal_node_right_child(),
                        indentation_level + 1,
                        out,
                    )?;
                }
            }
        }
        Ok(())
    }
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}
