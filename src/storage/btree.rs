//! B-tree node layout and accessors.
//!
//! Every 4096-byte page is either a leaf node or an internal node. Both share a
//! 6-byte common header; the variant-specific header and the cell array follow
//! at fixed offsets. A [`Node`] owns one page buffer and exposes typed reads and
//! writes computed from those offsets. The disk layout is the source of truth;
//! there is no heap-allocated tree.
//!
//! | Property           | Internal node                 | Leaf node           |
//! |--------------------|-------------------------------|---------------------|
//! | Stores             | keys and pointers to children | keys and values     |
//! | Number of keys     | up to `INTERNAL_NODE_MAX_KEYS`| as many as will fit |
//! | Number of pointers | number of keys + 1            | none                |
//! | Stores values?     | no                            | yes                 |

use super::pager::PAGE_SIZE;
use super::row::ROW_SIZE;
use crate::errors::Error;

/// Sentinel for an uninitialized child slot. No real page ever has this number.
pub const INVALID_PAGE_NUM: u32 = u32::MAX;

// Common Node Header Layout

const NODE_TYPE_SIZE: usize = std::mem::size_of::<u8>();
const NODE_TYPE_OFFSET: usize = 0;
const IS_ROOT_SIZE: usize = std::mem::size_of::<u8>();
const IS_ROOT_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;
const PARENT_POINTER_SIZE: usize = std::mem::size_of::<u32>();
const PARENT_POINTER_OFFSET: usize = IS_ROOT_OFFSET + IS_ROOT_SIZE;

/// Total size of the header shared by both node types.
pub const COMMON_NODE_HEADER_SIZE: usize = NODE_TYPE_SIZE + IS_ROOT_SIZE + PARENT_POINTER_SIZE;

// Leaf Node Header Layout

const LEAF_NODE_NUM_CELLS_SIZE: usize = std::mem::size_of::<u32>();
const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const LEAF_NODE_NEXT_LEAF_SIZE: usize = std::mem::size_of::<u32>();
const LEAF_NODE_NEXT_LEAF_OFFSET: usize = LEAF_NODE_NUM_CELLS_OFFSET + LEAF_NODE_NUM_CELLS_SIZE;

/// Common header plus `num_cells` and `next_leaf`.
pub const LEAF_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + LEAF_NODE_NUM_CELLS_SIZE + LEAF_NODE_NEXT_LEAF_SIZE;

// Leaf Node Body Layout

const LEAF_NODE_KEY_SIZE: usize = std::mem::size_of::<u32>();
const LEAF_NODE_VALUE_SIZE: usize = ROW_SIZE;

/// Size of one leaf cell: a key followed by a serialized row.
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + LEAF_NODE_VALUE_SIZE;
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE;

// Split counts: all existing cells plus the incoming one are divided so the left
// node keeps the larger half.
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) / 2;
pub const LEAF_NODE_LEFT_SPLIT_COUNT: usize =
    (LEAF_NODE_MAX_CELLS + 1) - LEAF_NODE_RIGHT_SPLIT_COUNT;

// Internal Node Header Layout

const INTERNAL_NODE_NUM_KEYS_SIZE: usize = std::mem::size_of::<u32>();
const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const INTERNAL_NODE_RIGHT_CHILD_SIZE: usize = std::mem::size_of::<u32>();
const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize =
    INTERNAL_NODE_NUM_KEYS_OFFSET + INTERNAL_NODE_NUM_KEYS_SIZE;

/// Common header plus `num_keys` and `right_child`.
pub const INTERNAL_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + INTERNAL_NODE_NUM_KEYS_SIZE + INTERNAL_NODE_RIGHT_CHILD_SIZE;

// Internal Node Body Layout

const INTERNAL_NODE_CHILD_SIZE: usize = std::mem::size_of::<u32>();
const INTERNAL_NODE_KEY_SIZE: usize = std::mem::size_of::<u32>();

/// Size of one internal cell: a child page number followed by that subtree's
/// maximum key.
pub const INTERNAL_NODE_CELL_SIZE: usize = INTERNAL_NODE_CHILD_SIZE + INTERNAL_NODE_KEY_SIZE;

/// Keep this small for now. A production fanout would be
/// `(PAGE_SIZE - INTERNAL_NODE_HEADER_SIZE) / INTERNAL_NODE_CELL_SIZE`.
pub const INTERNAL_NODE_MAX_KEYS: usize = 3;

/// Node variant, encoded in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Leaf,
    Internal,
}

/// A single B-tree node, owning its page buffer.
#[derive(Debug, Clone)]
pub struct Node {
    pub data: [u8; PAGE_SIZE],
}

impl Node {
    pub fn new() -> Self {
        Node {
            data: [0u8; PAGE_SIZE],
        }
    }

    fn read_u32(&self, offset: usize) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_le_bytes(bytes)
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn node_type(&self) -> Result<NodeType, Error> {
        match self.data[NODE_TYPE_OFFSET] {
            0 => Ok(NodeType::Leaf),
            1 => Ok(NodeType::Internal),
            invalid => Err(err!(Corrupt, "Invalid node type byte {}.", invalid)),
        }
    }

    pub fn set_node_type(&mut self, node_type: NodeType) {
        self.data[NODE_TYPE_OFFSET] = match node_type {
            NodeType::Leaf => 0,
            NodeType::Internal => 1,
        };
    }

    pub fn is_root(&self) -> bool {
        self.data[IS_ROOT_OFFSET] == 1
    }

    pub fn set_root(&mut self, is_root: bool) {
        self.data[IS_ROOT_OFFSET] = is_root as u8;
    }

    /// Parent page number. Meaningful only for non-root nodes.
    pub fn parent(&self) -> u32 {
        self.read_u32(PARENT_POINTER_OFFSET)
    }

    pub fn set_parent(&mut self, page_num: u32) {
        self.write_u32(PARENT_POINTER_OFFSET, page_num);
    }

    // Leaf accessors

    pub fn initialize_leaf_node(&mut self) {
        self.set_node_type(NodeType::Leaf);
        self.set_root(false);
        self.set_leaf_node_num_cells(0);
        self.set_leaf_node_next_leaf(0); // 0 represents no sibling
    }

    pub fn leaf_node_num_cells(&self) -> u32 {
        self.read_u32(LEAF_NODE_NUM_CELLS_OFFSET)
    }

    pub fn set_leaf_node_num_cells(&mut self, num: u32) {
        self.write_u32(LEAF_NODE_NUM_CELLS_OFFSET, num);
    }

    pub fn leaf_node_next_leaf(&self) -> u32 {
        self.read_u32(LEAF_NODE_NEXT_LEAF_OFFSET)
    }

    pub fn set_leaf_node_next_leaf(&mut self, page_num: u32) {
        self.write_u32(LEAF_NODE_NEXT_LEAF_OFFSET, page_num);
    }

    fn leaf_node_cell_offset(&self, cell_num: u32) -> Result<usize, Error> {
        if cell_num as usize >= LEAF_NODE_MAX_CELLS {
            return Err(err!(
                OutOfRange,
                "Leaf cell {} exceeds capacity {}.",
                cell_num,
                LEAF_NODE_MAX_CELLS
            ));
        }
        Ok(LEAF_NODE_HEADER_SIZE + cell_num as usize * LEAF_NODE_CELL_SIZE)
    }

    pub fn leaf_node_cell(&self, cell_num: u32) -> Result<&[u8], Error> {
        let offset = self.leaf_node_cell_offset(cell_num)?;
        Ok(&self.data[offset..offset + LEAF_NODE_CELL_SIZE])
    }

    pub fn leaf_node_cell_mut(&mut self, cell_num: u32) -> Result<&mut [u8], Error> {
        let offset = self.leaf_node_cell_offset(cell_num)?;
        Ok(&mut self.data[offset..offset + LEAF_NODE_CELL_SIZE])
    }

    pub fn leaf_node_key(&self, cell_num: u32) -> Result<u32, Error> {
        let offset = self.leaf_node_cell_offset(cell_num)?;
        Ok(self.read_u32(offset))
    }

    pub fn set_leaf_node_key(&mut self, cell_num: u32, key: u32) -> Result<(), Error> {
        let offset = self.leaf_node_cell_offset(cell_num)?;
        self.write_u32(offset, key);
        Ok(())
    }

    pub fn leaf_node_value(&self, cell_num: u32) -> Result<&[u8], Error> {
        let offset = self.leaf_node_cell_offset(cell_num)? + LEAF_NODE_KEY_SIZE;
        Ok(&self.data[offset..offset + LEAF_NODE_VALUE_SIZE])
    }

    pub fn leaf_node_value_mut(&mut self, cell_num: u32) -> Result<&mut [u8], Error> {
        let offset = self.leaf_node_cell_offset(cell_num)? + LEAF_NODE_KEY_SIZE;
        Ok(&mut self.data[offset..offset + LEAF_NODE_VALUE_SIZE])
    }

    /// Key of the last cell. The caller must not ask this of an empty leaf.
    pub fn leaf_node_max_key(&self) -> Result<u32, Error> {
        let num_cells = self.leaf_node_num_cells();
        if num_cells == 0 {
            return Err(err!(Storage, "Empty leaf has no max key."));
        }
        self.leaf_node_key(num_cells - 1)
    }

    /// Inserts `{key, value}` at `cell_num`, shifting later cells one slot
    /// right. The node must not be full; a full leaf takes the split path
    /// instead.
    pub fn leaf_node_insert(&mut self, cell_num: u32, key: u32, value: &[u8]) -> Result<(), Error> {
        let num_cells = self.leaf_node_num_cells();
        if num_cells as usize >= LEAF_NODE_MAX_CELLS {
            return Err(err!(
                Storage,
                "Leaf is full ({} cells); split before inserting.",
                num_cells
            ));
        }
        if cell_num > num_cells {
            return Err(err!(
                OutOfRange,
                "Leaf insert position {} past cell count {}.",
                cell_num,
                num_cells
            ));
        }
        if value.len() != LEAF_NODE_VALUE_SIZE {
            return Err(err!(
                Storage,
                "Value size mismatch (expected={}, got={}).",
                LEAF_NODE_VALUE_SIZE,
                value.len()
            ));
        }

        // Make room for the new cell
        for i in (cell_num + 1..=num_cells).rev() {
            let prev = self.leaf_node_cell(i - 1)?.to_vec();
            self.leaf_node_cell_mut(i)?.copy_from_slice(&prev);
        }

        self.set_leaf_node_key(cell_num, key)?;
        self.leaf_node_value_mut(cell_num)?.copy_from_slice(value);
        self.set_leaf_node_num_cells(num_cells + 1);
        Ok(())
    }

    // Internal accessors

    pub fn initialize_internal_node(&mut self) {
        self.set_node_type(NodeType::Internal);
        self.set_root(false);
        self.set_internal_node_num_keys(0);
        // The root lives at page 0, so a zeroed right child would make this node
        // a parent of the root. The sentinel marks the slot as unset.
        self.set_internal_node_right_child(INVALID_PAGE_NUM);
    }

    pub fn internal_node_num_keys(&self) -> u32 {
        self.read_u32(INTERNAL_NODE_NUM_KEYS_OFFSET)
    }

    pub fn set_internal_node_num_keys(&mut self, num_keys: u32) {
        self.write_u32(INTERNAL_NODE_NUM_KEYS_OFFSET, num_keys);
    }

    pub fn internal_node_right_child(&self) -> u32 {
        self.read_u32(INTERNAL_NODE_RIGHT_CHILD_OFFSET)
    }

    pub fn set_internal_node_right_child(&mut self, page_num: u32) {
        self.write_u32(INTERNAL_NODE_RIGHT_CHILD_OFFSET, page_num);
    }

    fn internal_node_cell_offset(&self, cell_num: u32) -> Result<usize, Error> {
        if cell_num as usize >= INTERNAL_NODE_MAX_KEYS {
            return Err(err!(
                OutOfRange,
                "Internal cell {} exceeds capacity {}.",
                cell_num,
                INTERNAL_NODE_MAX_KEYS
            ));
        }
        Ok(INTERNAL_NODE_HEADER_SIZE + cell_num as usize * INTERNAL_NODE_CELL_SIZE)
    }

    pub fn internal_node_cell(&self, cell_num: u32) -> Result<&[u8], Error> {
        let offset = self.internal_node_cell_offset(cell_num)?;
        Ok(&self.data[offset..offset + INTERNAL_NODE_CELL_SIZE])
    }

    pub fn internal_node_cell_mut(&mut self, cell_num: u32) -> Result<&mut [u8], Error> {
        let offset = self.internal_node_cell_offset(cell_num)?;
        Ok(&mut self.data[offset..offset + INTERNAL_NODE_CELL_SIZE])
    }

    /// Child page number at `child_num`. `child_num == num_keys` addresses the
    /// right child.
    pub fn internal_node_child(&self, child_num: u32) -> Result<u32, Error> {
        let num_keys = self.internal_node_num_keys();
        if child_num > num_keys {
            return Err(err!(
                OutOfRange,
                "Child index {} exceeds num_keys {}.",
                child_num,
                num_keys
            ));
        }
        if child_num == num_keys {
            Ok(self.internal_node_right_child())
        } else {
            let offset = self.internal_node_cell_offset(child_num)?;
            Ok(self.read_u32(offset))
        }
    }

    pub fn set_internal_node_child(&mut self, cell_num: u32, page_num: u32) -> Result<(), Error> {
        let offset = self.internal_node_cell_offset(cell_num)?;
        self.write_u32(offset, page_num);
        Ok(())
    }

    pub fn internal_node_key(&self, key_num: u32) -> Result<u32, Error> {
        let num_keys = self.internal_node_num_keys();
        if key_num >= num_keys {
            return Err(err!(
                OutOfRange,
                "Key index {} exceeds num_keys {}.",
                key_num,
                num_keys
            ));
        }
        let offset = self.internal_node_cell_offset(key_num)? + INTERNAL_NODE_CHILD_SIZE;
        Ok(self.read_u32(offset))
    }

    pub fn set_internal_node_key(&mut self, key_num: u32, key: u32) -> Result<(), Error> {
        let offset = self.internal_node_cell_offset(key_num)? + INTERNAL_NODE_CHILD_SIZE;
        self.write_u32(offset, key);
        Ok(())
    }

    /// Index of the child to descend into (or insert before) for `key`: the
    /// smallest slot whose key is `>= key`, or `num_keys` for the right child.
    pub fn internal_node_find_child(&self, key: u32) -> Result<u32, Error> {
        let num_keys = self.internal_node_num_keys();

        let mut min_index = 0;
        let mut one_past_max_index = num_keys;
        while one_past_max_index != min_index {
            let index = (min_index + one_past_max_index) / 2;
            if self.internal_node_key(index)? >= key {
                one_past_max_index = index;
            } else {
                min_index = index + 1;
            }
        }
        Ok(min_index)
    }

    /// Locates the cell slot holding `child_page_num`. `None` means the page is
    /// this node's right child, which has no stored key.
    pub fn internal_node_find_child_slot(
        &self,
        child_page_num: u32,
    ) -> Result<Option<u32>, Error> {
        if self.internal_node_right_child() == child_page_num {
            return Ok(None);
        }
        let num_keys = self.internal_node_num_keys();
        for i in 0..num_keys {
            let offset = self.internal_node_cell_offset(i)?;
            if self.read_u32(offset) == child_page_num {
                return Ok(Some(i));
            }
        }
        Err(err!(
            Corrupt,
            "Page {} is not a child of this node.",
            child_page_num
        ))
    }

    /// Rewrites the stored key for `child_page_num`. Returns `false` when the
    /// page is the right child: its max is not stored here, so the caller must
    /// continue the update at the parent above.
    pub fn internal_node_update_child_key(
        &mut self,
        child_page_num: u32,
        new_max: u32,
    ) -> Result<bool, Error> {
        match self.internal_node_find_child_slot(child_page_num)? {
            Some(i) => {
                self.set_internal_node_key(i, new_max)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
