use std::collections::VecDeque;

use super::statement::{InsertStatement, SelectStatement, Statement};
use super::tokenizer::tokenize;
use crate::errors::Error;
use crate::storage::row::Row;

/// Parses one line of input into a [`Statement`].
pub fn prepare(input: &str) -> Result<Statement, Error> {
    let mut tokens = tokenize(input);
    let keyword = tokens
        .pop_front()
        .ok_or_else(|| err!(Syntax, "Expected a statement."))?;

    match keyword.as_str() {
        "insert" => parse_insert(tokens),
        "select" => parse_select(tokens),
        _ => Err(err!(
            Syntax,
            "Unrecognized keyword at start of '{}'.",
            input
        )),
    }
}

fn parse_insert(mut tokens: VecDeque<String>) -> Result<Statement, Error> {
    let (id, username, email) = match (tokens.pop_front(), tokens.pop_front(), tokens.pop_front()) {
        (Some(id), Some(username), Some(email)) => (id, username, email),
        _ => return Err(err!(Syntax, "Could not parse statement.")),
    };
    if !tokens.is_empty() {
        return Err(err!(Syntax, "Could not parse statement."));
    }

    let id = parse_id(&id)?;
    Ok(Statement::Insert(InsertStatement {
        row: Row::new(id, &username, &email),
    }))
}

fn parse_select(mut tokens: VecDeque<String>) -> Result<Statement, Error> {
    let key = match tokens.pop_front() {
        Some(token) => Some(parse_id(&token)?),
        None => None,
    };
    if !tokens.is_empty() {
        return Err(err!(Syntax, "Could not parse statement."));
    }
    Ok(Statement::Select(SelectStatement { key }))
}

fn parse_id(token: &str) -> Result<u32, Error> {
    if token.starts_with('-') {
        return Err(err!(Syntax, "ID must be positive."));
    }
    token
        .parse()
        .map_err(|_| err!(Syntax, "Invalid ID '{}'.", token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_insert() {
        let statement = prepare("insert 1 alice alice@test.com").unwrap();
        match statement {
            Statement::Insert(insert) => {
                assert_eq!(insert.row.id, 1);
                assert_eq!(insert.row.username(), "alice");
                assert_eq!(insert.row.email(), "alice@test.com");
            }
            other => panic!("Expected insert, got {:?}", other),
        }
    }

    #[test]
    fn parses_select_all_and_by_key() {
        assert!(matches!(
            prepare("select").unwrap(),
            Statement::Select(SelectStatement { key: None })
        ));
        assert!(matches!(
            prepare("select 42").unwrap(),
            Statement::Select(SelectStatement { key: Some(42) })
        ));
    }

    #[test]
    fn insert_with_missing_tokens_is_a_syntax_error() {
        assert!(matches!(prepare("insert 1 alice"), Err(Error::Syntax(_))));
    }

    #[test]
    fn negative_id_is_a_syntax_error() {
        let err = prepare("insert -1 alice alice@test.com").unwrap_err();
        assert_eq!(err.to_string(), "Syntax error. ID must be positive.");
    }

    #[test]
    fn non_numeric_id_is_a_syntax_error() {
        assert!(matches!(
            prepare("insert abc alice alice@test.com"),
            Err(Error::Syntax(_))
        ));
    }

    #[test]
    fn unknown_keyword_is_a_syntax_error() {
        let err = prepare("update 1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Syntax error. Unrecognized keyword at start of 'update 1'."
        );
    }
}
