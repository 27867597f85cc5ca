use litedb::errors::Error;
use litedb::storage::row::Row;
use litedb::storage::table::Table;
use tempfile::TempDir;

fn open_table(dir: &TempDir, name: &str) -> Table {
    Table::open(&dir.path().join(name)).unwrap()
}

#[test]
fn fresh_insert_then_select() {
    let dir = TempDir::new().unwrap();
    let mut table = open_table(&dir, "a.db");

    table
        .insert(&Row::new(1, "alice", "alice@test.com"))
        .unwrap();

    let rows = table.select_rows().unwrap();
    let lines: Vec<String> = rows.iter().map(|r| r.to_string()).collect();
    assert_eq!(lines, vec!["(1, alice@test.com, alice)"]);
}

#[test]
fn duplicate_key_leaves_one_row() {
    let dir = TempDir::new().unwrap();
    let mut table = open_table(&dir, "dup.db");

    table.insert(&Row::new(1, "a", "a@x")).unwrap();
    let err = table.insert(&Row::new(1, "b", "b@x")).unwrap_err();
    assert!(matches!(err, Error::DuplicateKey(1)));

    let rows = table.select_rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, 1);
    assert_eq!(rows[0].username(), "a");
}

#[test]
fn long_username_reads_back_truncated() {
    let dir = TempDir::new().unwrap();
    let mut table = open_table(&dir, "trunc.db");

    let long_name = "x".repeat(50);
    table.insert(&Row::new(7, &long_name, "x@test.com")).unwrap();

    let row = table.find_row(7).unwrap();
    let name = row.username();
    assert_eq!(name.len(), 31);
    assert!(long_name.starts_with(&name));
}

#[test]
fn rows_come_back_in_key_order_regardless_of_insert_order() {
    let dir = TempDir::new().unwrap();
    let mut table = open_table(&dir, "order.db");

    for id in [5u32, 1, 9, 3, 7, 2, 8, 4, 6] {
        table
            .insert(&Row::new(id, &format!("u{}", id), &format!("u{}@x", id)))
            .unwrap();
    }

    let ids: Vec<u32> = table.select_rows().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
}
