//! Structural checks over the B-tree: node invariants after every kind of
//! insert workload, the first-split boundary, and sparse-key lookups.

use litedb::storage::btree::{
    NodeType, LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_MAX_CELLS,
};
use litedb::storage::row::Row;
use litedb::storage::table::Table;
use tempfile::TempDir;

fn open_table(dir: &TempDir, name: &str) -> Table {
    Table::open(&dir.path().join(name)).unwrap()
}

fn row(id: u32) -> Row {
    Row::new(id, &format!("user{}", id), &format!("user{}@test.com", id))
}

/// Recursively validates one subtree and returns its max key. Collects the
/// leaves in left-to-right order together with their depth.
fn check_subtree(
    table: &mut Table,
    page_num: u32,
    parent: Option<u32>,
    depth: usize,
    leaves: &mut Vec<(u32, usize)>,
) -> u32 {
    let node = table.pager.page(page_num).unwrap().clone();
    if let Some(parent) = parent {
        assert!(!node.is_root(), "non-root page {} flagged as root", page_num);
        assert_eq!(node.parent(), parent, "bad parent pointer on page {}", page_num);
    }

    match node.node_type().unwrap() {
        NodeType::Leaf => {
            let num_cells = node.leaf_node_num_cells();
            assert!(num_cells > 0, "leaf {} is empty", page_num);
            for i in 1..num_cells {
                assert!(
                    node.leaf_node_key(i - 1).unwrap() < node.leaf_node_key(i).unwrap(),
                    "leaf {} keys not strictly ascending",
                    page_num
                );
            }
            leaves.push((page_num, depth));
            node.leaf_node_max_key().unwrap()
        }
        NodeType::Internal => {
            let num_keys = node.internal_node_num_keys();
            assert!(num_keys > 0, "internal {} has no keys", page_num);

            let mut prev_key: Option<u32> = None;
            for i in 0..num_keys {
                let child = node.internal_node_child(i).unwrap();
                let child_max = check_subtree(table, child, Some(page_num), depth + 1, leaves);
                let stored = node.internal_node_key(i).unwrap();
                assert_eq!(
                    stored, child_max,
                    "internal {} key {} does not match subtree max",
                    page_num, i
                );
                if let Some(prev) = prev_key {
                    assert!(stored > prev, "internal {} keys not ascending", page_num);
                }
                prev_key = Some(stored);
            }

            let right_max = check_subtree(
                table,
                node.internal_node_right_child(),
                Some(page_num),
                depth + 1,
                leaves,
            );
            assert!(
                right_max > prev_key.unwrap(),
                "internal {} right child not greater than stored keys",
                page_num
            );
            right_max
        }
    }
}

/// Full-tree validation: root flag, per-node invariants, uniform leaf depth,
/// and a sibling chain that visits every leaf in order and terminates at 0.
fn check_tree(table: &mut Table) {
    assert!(table.pager.page(0).unwrap().is_root());

    let mut leaves = Vec::new();
    check_subtree(table, 0, None, 0, &mut leaves);

    let depth = leaves[0].1;
    for (page_num, leaf_depth) in &leaves {
        assert_eq!(*leaf_depth, depth, "leaf {} at the wrong depth", page_num);
    }

    for pair in leaves.windows(2) {
        let next = table.pager.page(pair[0].0).unwrap().leaf_node_next_leaf();
        assert_eq!(next, pair[1].0, "sibling chain broken at page {}", pair[0].0);
    }
    let last = leaves[leaves.len() - 1].0;
    assert_eq!(table.pager.page(last).unwrap().leaf_node_next_leaf(), 0);
}

#[test]
fn first_split_shape() {
    let dir = TempDir::new().unwrap();
    let mut table = open_table(&dir, "split.db");

    for id in 0..=LEAF_NODE_MAX_CELLS as u32 {
        table.insert(&row(id)).unwrap();
    }

    assert_eq!(table.pager.num_pages(), 3);
    let root = table.pager.page(0).unwrap().clone();
    assert_eq!(root.node_type().unwrap(), NodeType::Internal);
    assert_eq!(root.internal_node_num_keys(), 1);
    assert_eq!(
        root.internal_node_key(0).unwrap(),
        LEAF_NODE_LEFT_SPLIT_COUNT as u32 - 1
    );

    check_tree(&mut table);

    let ids: Vec<u32> = table.select_rows().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, (0..=LEAF_NODE_MAX_CELLS as u32).collect::<Vec<u32>>());
}

#[test]
fn sparse_keys_scan_and_lookup() {
    let dir = TempDir::new().unwrap();
    let mut table = open_table(&dir, "sparse.db");

    for id in (0..100u32).step_by(10) {
        table.insert(&row(id)).unwrap();
    }

    let ids: Vec<u32> = table.select_rows().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);

    assert_eq!(table.find_row(50).unwrap().id, 50);
    assert_eq!(table.find_row(55).unwrap_err().to_string(), "Key 55 not found.");
}

#[test]
fn invariants_hold_under_ascending_inserts() {
    let dir = TempDir::new().unwrap();
    let mut table = open_table(&dir, "asc.db");
    for id in 0..200u32 {
        table.insert(&row(id)).unwrap();
    }
    check_tree(&mut table);
    assert_eq!(table.num_rows().unwrap(), 200);
}

#[test]
fn invariants_hold_under_descending_inserts() {
    let dir = TempDir::new().unwrap();
    let mut table = open_table(&dir, "desc.db");
    for id in (0..200u32).rev() {
        table.insert(&row(id)).unwrap();
    }
    check_tree(&mut table);

    let ids: Vec<u32> = table.select_rows().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, (0..200).collect::<Vec<u32>>());
}

#[test]
fn invariants_hold_under_shuffled_inserts() {
    let dir = TempDir::new().unwrap();
    let mut table = open_table(&dir, "shuffled.db");

    // 7 is coprime with 200, so this visits every key in 0..200 exactly once.
    for i in 0..200u32 {
        table.insert(&row((i * 7) % 200)).unwrap();
    }
    check_tree(&mut table);

    let ids: Vec<u32> = table.select_rows().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, (0..200).collect::<Vec<u32>>());
    for id in 0..200u32 {
        assert_eq!(table.find_row(id).unwrap().id, id);
    }
}

#[test]
fn invariants_hold_after_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reopen.db");

    {
        let mut table = Table::open(&path).unwrap();
        for i in 0..150u32 {
            table.insert(&row((i * 11) % 150)).unwrap();
        }
        table.close().unwrap();
    }

    let mut table = Table::open(&path).unwrap();
    check_tree(&mut table);
    assert_eq!(table.num_rows().unwrap(), 150);
}
