//! Meta-commands: the dot-prefixed commands handled outside the SQL parser.
//!
//! Dispatch is a table from command name to handler function, looked up by the
//! exact input line.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::errors::Error;
use crate::storage::btree::{
    COMMON_NODE_HEADER_SIZE, INTERNAL_NODE_CELL_SIZE, INTERNAL_NODE_HEADER_SIZE,
    INTERNAL_NODE_MAX_KEYS, LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE, LEAF_NODE_MAX_CELLS,
    LEAF_NODE_SPACE_FOR_CELLS,
};
use crate::storage::row::ROW_SIZE;
use crate::storage::table::Table;

pub enum MetaCommandResult {
    Success,
    Exit,
}

type MetaHandler = fn(&mut Table) -> Result<MetaCommandResult, Error>;

struct MetaCommand {
    description: &'static str,
    handler: MetaHandler,
}

static META_COMMANDS: Lazy<HashMap<&'static str, MetaCommand>> = Lazy::new(|| {
    let mut commands: HashMap<&'static str, MetaCommand> = HashMap::new();
    commands.insert(
        ".exit",
        MetaCommand {
            description: "Flush all pages and quit.",
            handler: |_table| Ok(MetaCommandResult::Exit),
        },
    );
    commands.insert(
        ".help",
        MetaCommand {
            description: "List meta-commands.",
            handler: print_help,
        },
    );
    commands.insert(
        ".constants",
        MetaCommand {
            description: "Print storage layout constants.",
            handler: print_constants,
        },
    );
    commands.insert(
        ".btree",
        MetaCommand {
            description: "Print the B-tree.",
            handler: print_btree,
        },
    );
    commands
});

/// Runs the meta-command on `line`, printing to stdout. Unrecognized commands
/// are reported but are not errors; the REPL keeps going either way.
pub fn execute(line: &str, table: &mut Table) -> Result<MetaCommandResult, Error> {
    match META_COMMANDS.get(line) {
        Some(command) => (command.handler)(table),
        None => {
            println!("Unrecognized command at start of '{}'.", line);
            Ok(MetaCommandResult::Success)
        }
    }
}

fn print_help(_table: &mut Table) -> Result<MetaCommandResult, Error> {
    println!("Available commands:");
    let mut names: Vec<&&str> = META_COMMANDS.keys().collect();
    names.sort();
    for name in names {
        println!("  {:<11} {}", name, META_COMMANDS[*name].description);
    }
    Ok(MetaCommandResult::Success)
}

fn print_constants(_table: &mut Table) -> Result<MetaCommandResult, Error> {
    println!("Constants:");
    println!("ROW_SIZE: {}", ROW_SIZE);
    println!("COMMON_NODE_HEADER_SIZE: {}", COMMON_NODE_HEADER_SIZE);
    println!("LEAF_NODE_HEADER_SIZE: {}", LEAF_NODE_HEADER_SIZE);
    println!("LEAF_NODE_CELL_SIZE: {}", LEAF_NODE_CELL_SIZE);
    println!("LEAF_NODE_SPACE_FOR_CELLS: {}", LEAF_NODE_SPACE_FOR_CELLS);
    println!("LEAF_NODE_MAX_CELLS: {}", LEAF_NODE_MAX_CELLS);
    println!("INTERNAL_NODE_HEADER_SIZE: {}", INTERNAL_NODE_HEADER_SIZE);
    println!("INTERNAL_NODE_CELL_SIZE: {}", INTERNAL_NODE_CELL_SIZE);
    println!("INTERNAL_NODE_MAX_KEYS: {}", INTERNAL_NODE_MAX_KEYS);
    Ok(MetaCommandResult::Success)
}

fn print_btree(table: &mut Table) -> Result<MetaCommandResult, Error> {
    println!("Tree:");
    print!("{}", table.print_tree()?);
    Ok(MetaCommandResult::Success)
}
