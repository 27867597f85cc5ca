//! Line-oriented REPL: prompt, read, dispatch, repeat.
//!
//! Input comes from stdin a line at a time, so the shell behaves the same
//! whether it is driven interactively or from a pipe. Dot-prefixed lines go to
//! the meta-command table; everything else is parsed as a statement.

use std::io::{self, BufRead, Write};
use std::path::Path;

use crossterm::style::Stylize;
use tracing::{error, info};
use uuid::Uuid;

use super::{history, meta};
use crate::errors::Error;
use crate::sql;
use crate::sql::statement::Statement;
use crate::storage::table::Table;

const PROMPT: &str = "db > ";

/// Starts a REPL session over the database at `path`. Returns when the user
/// exits or stdin closes; the table is flushed on the way out and a flush
/// failure is passed up as fatal.
pub fn start(path: &Path) -> Result<(), Error> {
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, path = %path.display(), "Starting REPL session...");

    let mut table = Table::open(path)?;
    let history_path = history::default_path();

    let stdin = io::stdin();
    let mut input = String::new();
    loop {
        print!("{}", PROMPT);
        io::stdout().flush()?;

        input.clear();
        if stdin.lock().read_line(&mut input)? == 0 {
            // stdin closed; same exit path as .exit
            break;
        }
        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(path) = &history_path {
            if let Err(e) = history::append(line, path) {
                error!("Failed to write history. {}", e);
            }
        }

        if line.starts_with('.') {
            match meta::execute(line, &mut table) {
                Ok(meta::MetaCommandResult::Exit) => break,
                Ok(meta::MetaCommandResult::Success) => {}
                Err(e) => echo_error(&e),
            }
            continue;
        }

        match sql::prepare(line) {
            Ok(statement) => {
                if let Err(e) = execute_statement(statement, &mut table) {
                    echo_error(&e);
                }
            }
            Err(e) => echo_error(&e),
        }
    }

    table.close()?;
    info!(session_id = %session_id, "Closed REPL session.");
    Ok(())
}

fn execute_statement(statement: Statement, table: &mut Table) -> Result<(), Error> {
    match statement {
        Statement::Insert(insert) => {
            table.insert(&insert.row)?;
        }
        Statement::Select(select) => match select.key {
            Some(key) => {
                let row = table.find_row(key)?;
                println!("{}", row);
            }
            None => {
                for row in table.select_rows()? {
                    println!("{}", row);
                }
            }
        },
    }
    println!("Executed.");
    Ok(())
}

fn echo_error(err: &Error) {
    println!("{}", err.to_string().red());
}
