//! SQL text to statement lists.

mod lexer;
mod parser;

use crate::error::CoreResult;
use crate::stmt::List;
use parser::Parser;

/// Compiles `sql` into a statement list.
///
/// Statements are separated by `;`. Empty statements are dropped.
///
/// # Errors
///
/// Returns [`crate::CoreError::Syntax`] with the byte offset of the first
/// offending token.
pub fn compile(sql: &str) -> CoreResult<List> {
    let mut parser = Parser::new(sql)?;
    let mut stmts = Vec::new();
    loop {
        while parser.eat_sym(";") {}
        if parser.at_eof() {
            break;
        }
        stmts.push(parser.statement()?);
        if !parser.at_eof() {
            parser.expect_sym(";")?;
        }
    }
    Ok(List::new(stmts, parser.params))
}
