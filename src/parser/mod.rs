mod class;
mod expr;
mod stmt;

use crate::ast::Stmt;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::value::{RuntimeError, RuntimeErrorCode};

/// Parse a full PHP file (inline HTML outside `<?php`).
pub(crate) fn parse_program(source: &str) -> Result<Vec<Stmt>, RuntimeError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens);
    let stmts = parser.parse_program()?;
    crate::trace::trace_log!("parse", "parsed {} top-level statements", stmts.len());
    Ok(stmts)
}

/// Parse code that starts directly in PHP mode (no open tag).
pub(crate) fn parse_code(source: &str) -> Result<Vec<Stmt>, RuntimeError> {
    let tokens = Lexer::new_code(source, 1).tokenize()?;
    Parser::new(tokens).parse_program()
}

fn parse_error_hint(message: &str) -> Option<&'static str> {
    if message.contains("expected ';'") {
        Some("every statement ends with ';' (or a closing '?>').")
    } else if message.contains("member name after '->'") {
        Some("property and method names follow '->' without a '$'.")
    } else if message.contains("after '::'") {
        Some("use 'Class::method()', 'Class::$prop' or 'Class::CONST'.")
    } else {
        None
    }
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub(crate) fn parse_program(&mut self) -> Result<Vec<Stmt>, RuntimeError> {
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn error(&self, code: RuntimeErrorCode, message: impl Into<String>) -> RuntimeError {
        let message = message.into();
        let err = RuntimeError::with_location(message.clone(), code, self.line(), 0);
        match parse_error_hint(&message) {
            Some(hint) => err.with_hint(hint),
            None => err,
        }
    }

    fn unexpected(&self, context: &str) -> RuntimeError {
        let found = match self.peek_kind() {
            TokenKind::Eof => "end of file".to_string(),
            TokenKind::Ident(name) => format!("identifier \"{}\"", name),
            TokenKind::Var(name) => format!("variable \"${}\"", name),
            other => format!("{:?}", other),
        };
        self.error(
            RuntimeErrorCode::ParseUnexpected,
            format!("syntax error, unexpected {} {}", found, context),
        )
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn peek_kind(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_kind_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(&kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn consume_kind(&mut self, kind: TokenKind, what: &str) -> Result<(), RuntimeError> {
        if self.match_kind(kind) {
            Ok(())
        } else {
            Err(self.error(
                RuntimeErrorCode::ParseExpected,
                format!("syntax error, expected {}", what),
            ))
        }
    }

    fn consume_semicolon(&mut self) -> Result<(), RuntimeError> {
        if self.match_kind(TokenKind::Semicolon) || self.check(&TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.error(RuntimeErrorCode::ParseExpected, "syntax error, expected ';'"))
        }
    }

    /// Keywords are case-insensitive.
    fn check_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Ident(name) if name.eq_ignore_ascii_case(keyword))
    }

    fn match_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn consume_ident(&mut self, what: &str) -> Result<String, RuntimeError> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected(&format!("expecting {}", what))),
        }
    }

    fn consume_var(&mut self) -> Result<String, RuntimeError> {
        match self.peek_kind().clone() {
            TokenKind::Var(name) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("expecting variable")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Stmt};

    #[test]
    fn missing_semicolon_reports_line_and_hint() {
        let err = parse_program("<?php\n$x = 1\n$y = 2;").unwrap_err();
        assert_eq!(err.code, Some(RuntimeErrorCode::ParseExpected));
        assert_eq!(err.line, Some(3));
        assert!(err.hint.is_some());
    }

    #[test]
    fn inline_html_becomes_statement() {
        let stmts = parse_program("head\n<?php echo 1;").unwrap();
        assert!(matches!(&stmts[0], Stmt::InlineHtml(text) if text == "head\n"));
        assert!(matches!(&stmts[1], Stmt::Echo { .. }));
    }

    #[test]
    fn code_fragments_need_no_open_tag() {
        let stmts = parse_code("$x = 1;").unwrap();
        assert!(matches!(
            &stmts[0],
            Stmt::Expr {
                expr: Expr::Assign { .. },
                ..
            }
        ));
    }
}
