mod ast;
pub mod fixture;
mod lexer;
mod parser;
pub mod repl;
mod runtime;
mod trace;
pub mod value;

pub use ast::Visibility;
pub use fixture::{Directive, Fixture, FixtureReport, Verdict, check, parse_fixture};
pub use runtime::Interpreter;
pub use value::{RuntimeError, RuntimeErrorCode, Value};

/// Parse a PHP file and pretty-print its syntax tree.
pub fn dump_ast(input: &str) -> Result<String, RuntimeError> {
    let stmts = parser::parse_program(input)?;
    Ok(format!("{:#?}", stmts))
}
