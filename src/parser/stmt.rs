use super::Parser;
use crate::ast::{Expr, FunctionDef, ParamDef, Stmt};
use crate::lexer::TokenKind;
use crate::value::{RuntimeError, RuntimeErrorCode};

impl Parser {
    pub(super) fn parse_stmt(&mut self) -> Result<Stmt, RuntimeError> {
        let line = self.line();
        if let TokenKind::InlineHtml(text) = self.peek_kind().clone() {
            self.pos += 1;
            return Ok(Stmt::InlineHtml(text));
        }
        if self.match_kind(TokenKind::LBrace) {
            return Ok(Stmt::Block(self.parse_block_body()?));
        }
        if self.match_kind(TokenKind::Semicolon) {
            return Ok(Stmt::Block(Vec::new()));
        }
        if self.check_keyword("echo") {
            self.pos += 1;
            let mut args = vec![self.parse_expr()?];
            while self.match_kind(TokenKind::Comma) {
                args.push(self.parse_expr()?);
            }
            self.consume_semicolon()?;
            return Ok(Stmt::Echo { args, line });
        }
        if self.match_keyword("return") {
            let value = if self.check(&TokenKind::Semicolon) || self.check(&TokenKind::Eof) {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.consume_semicolon()?;
            return Ok(Stmt::Return { value, line });
        }
        if self.match_keyword("if") {
            return self.parse_if(line);
        }
        if self.match_keyword("while") {
            let cond = self.parse_paren_expr()?;
            let body = self.parse_body()?;
            return Ok(Stmt::While { cond, body, line });
        }
        if self.match_keyword("do") {
            let body = self.parse_body()?;
            if !self.match_keyword("while") {
                return Err(self.unexpected("expecting \"while\""));
            }
            let cond = self.parse_paren_expr()?;
            self.consume_semicolon()?;
            return Ok(Stmt::DoWhile { body, cond, line });
        }
        if self.match_keyword("for") {
            return self.parse_for(line);
        }
        if self.match_keyword("foreach") {
            return self.parse_foreach(line);
        }
        if self.check_keyword("break") || self.check_keyword("continue") {
            let is_break = self.check_keyword("break");
            self.pos += 1;
            let levels = match self.peek_kind() {
                TokenKind::Int(n) if *n > 0 => {
                    let n = *n as usize;
                    self.pos += 1;
                    n
                }
                _ => 1,
            };
            self.consume_semicolon()?;
            return Ok(if is_break {
                Stmt::Break(levels)
            } else {
                Stmt::Continue(levels)
            });
        }
        if self.match_keyword("unset") {
            self.consume_kind(TokenKind::LParen, "'(' after unset")?;
            let mut targets = Vec::new();
            if !self.check(&TokenKind::RParen) {
                loop {
                    let target = self.parse_expr()?;
                    if !target.is_assignable() {
                        return Err(self.error(
                            RuntimeErrorCode::ParseGeneric,
                            "Cannot use unset() on the result of an expression",
                        ));
                    }
                    targets.push(target);
                    if !self.match_kind(TokenKind::Comma) || self.check(&TokenKind::RParen) {
                        break;
                    }
                }
            }
            self.consume_kind(TokenKind::RParen, "')'")?;
            self.consume_semicolon()?;
            return Ok(Stmt::Unset { targets, line });
        }
        if self.check_keyword("function")
            && matches!(self.peek_kind_at(1), TokenKind::Ident(_))
        {
            self.pos += 1;
            return Ok(Stmt::FunctionDecl(self.parse_function_rest(line)?));
        }
        if self.check_keyword("class")
            || ((self.check_keyword("abstract") || self.check_keyword("final"))
                && matches!(self.peek_kind_at(1), TokenKind::Ident(k) if k.eq_ignore_ascii_case("class")))
        {
            return Ok(Stmt::ClassDecl(self.parse_class_decl()?));
        }
        let expr = self.parse_expr()?;
        self.consume_semicolon()?;
        Ok(Stmt::Expr { expr, line })
    }

    /// Statements up to the closing `}` (the `{` is already consumed).
    pub(super) fn parse_block_body(&mut self) -> Result<Vec<Stmt>, RuntimeError> {
        let mut stmts = Vec::new();
        while !self.match_kind(TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.unexpected("expecting '}'"));
            }
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    /// A braced block or a single statement.
    fn parse_body(&mut self) -> Result<Vec<Stmt>, RuntimeError> {
        if self.match_kind(TokenKind::LBrace) {
            self.parse_block_body()
        } else {
            Ok(vec![self.parse_stmt()?])
        }
    }

    fn parse_paren_expr(&mut self) -> Result<Expr, RuntimeError> {
        self.consume_kind(TokenKind::LParen, "'('")?;
        let expr = self.parse_expr()?;
        self.consume_kind(TokenKind::RParen, "')'")?;
        Ok(expr)
    }

    fn parse_if(&mut self, line: usize) -> Result<Stmt, RuntimeError> {
        let cond = self.parse_paren_expr()?;
        let then_branch = self.parse_body()?;
        let else_branch = if self.check_keyword("elseif") {
            let line = self.line();
            self.pos += 1;
            vec![self.parse_if(line)?]
        } else if self.match_keyword("else") {
            if self.check_keyword("if") {
                let line = self.line();
                self.pos += 1;
                vec![self.parse_if(line)?]
            } else {
                self.parse_body()?
            }
        } else {
            Vec::new()
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
            line,
        })
    }

    fn parse_for(&mut self, line: usize) -> Result<Stmt, RuntimeError> {
        self.consume_kind(TokenKind::LParen, "'(' after for")?;
        let init = self.parse_expr_list(TokenKind::Semicolon)?;
        self.consume_kind(TokenKind::Semicolon, "';'")?;
        let cond = self.parse_expr_list(TokenKind::Semicolon)?;
        self.consume_kind(TokenKind::Semicolon, "';'")?;
        let step = self.parse_expr_list(TokenKind::RParen)?;
        self.consume_kind(TokenKind::RParen, "')'")?;
        let body = self.parse_body()?;
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
            line,
        })
    }

    fn parse_expr_list(&mut self, end: TokenKind) -> Result<Vec<Expr>, RuntimeError> {
        let mut exprs = Vec::new();
        if self.check(&end) {
            return Ok(exprs);
        }
        loop {
            exprs.push(self.parse_expr()?);
            if !self.match_kind(TokenKind::Comma) {
                return Ok(exprs);
            }
        }
    }

    fn parse_foreach(&mut self, line: usize) -> Result<Stmt, RuntimeError> {
        self.consume_kind(TokenKind::LParen, "'(' after foreach")?;
        let subject = self.parse_expr()?;
        if !self.match_keyword("as") {
            return Err(self.unexpected("expecting \"as\""));
        }
        let first = self.parse_foreach_target()?;
        let (key, value) = if self.match_kind(TokenKind::FatArrow) {
            (Some(first), self.parse_foreach_target()?)
        } else {
            (None, first)
        };
        self.consume_kind(TokenKind::RParen, "')'")?;
        let body = self.parse_body()?;
        Ok(Stmt::Foreach {
            subject,
            key,
            value,
            body,
            line,
        })
    }

    fn parse_foreach_target(&mut self) -> Result<Expr, RuntimeError> {
        if self.check(&TokenKind::Ampersand) {
            return Err(self.error(
                RuntimeErrorCode::ParseGeneric,
                "foreach by reference is not supported",
            ));
        }
        let target = self.parse_postfix()?;
        if !target.is_assignable() {
            return Err(self.error(
                RuntimeErrorCode::ParseGeneric,
                "foreach target must be a variable",
            ));
        }
        Ok(target)
    }

    /// `name(params) { body }` after the `function` keyword.
    pub(super) fn parse_function_rest(&mut self, line: usize) -> Result<FunctionDef, RuntimeError> {
        let name = self.consume_ident("function name")?;
        let params = self.parse_params()?;
        self.skip_return_type()?;
        self.consume_kind(TokenKind::LBrace, "'{'")?;
        let body = self.parse_block_body()?;
        Ok(FunctionDef {
            name,
            params,
            body,
            line,
        })
    }

    pub(super) fn parse_params(&mut self) -> Result<Vec<ParamDef>, RuntimeError> {
        self.consume_kind(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        while !self.match_kind(TokenKind::RParen) {
            self.skip_type_hint();
            if self.check(&TokenKind::Ampersand) {
                return Err(self.error(
                    RuntimeErrorCode::ParseGeneric,
                    "by-reference parameters are not supported",
                ));
            }
            let name = self.consume_var()?;
            let default = if self.match_kind(TokenKind::Eq) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            params.push(ParamDef { name, default });
            if !self.match_kind(TokenKind::Comma) {
                self.consume_kind(TokenKind::RParen, "')'")?;
                break;
            }
        }
        Ok(params)
    }

    /// Type hints are accepted and ignored: `?int`, `array`, `Foo`.
    pub(super) fn skip_type_hint(&mut self) {
        self.match_kind(TokenKind::Question);
        if let TokenKind::Ident(_) = self.peek_kind() {
            self.pos += 1;
        }
    }

    pub(super) fn skip_return_type(&mut self) -> Result<(), RuntimeError> {
        if self.match_kind(TokenKind::Colon) {
            self.match_kind(TokenKind::Question);
            self.consume_ident("return type")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Expr, Stmt};
    use crate::parser::parse_program;

    #[test]
    fn elseif_chains_nest_in_else_branch() {
        let stmts =
            parse_program("<?php if ($a) { echo 1; } elseif ($b) { echo 2; } else { echo 3; }")
                .unwrap();
        let Stmt::If { else_branch, .. } = &stmts[0] else {
            panic!("expected if");
        };
        assert!(matches!(&else_branch[0], Stmt::If { else_branch, .. } if else_branch.len() == 1));
    }

    #[test]
    fn foreach_with_key() {
        let stmts = parse_program("<?php foreach ($arr as $k => $v) echo $k;").unwrap();
        assert!(matches!(
            &stmts[0],
            Stmt::Foreach {
                key: Some(Expr::Var(_)),
                value: Expr::Var(_),
                ..
            }
        ));
    }

    #[test]
    fn typed_params_and_return_types_are_ignored() {
        let stmts =
            parse_program("<?php function f(?int $a, array $b = []): void { return; }").unwrap();
        let Stmt::FunctionDecl(def) = &stmts[0] else {
            panic!("expected function");
        };
        assert_eq!(def.params.len(), 2);
        assert_eq!(def.params[0].name, "a");
        assert!(def.params[1].default.is_some());
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let stmts = parse_program("<?php ECHO 1; If (1) { Echo 2; }").unwrap();
        assert!(matches!(&stmts[0], Stmt::Echo { .. }));
        assert!(matches!(&stmts[1], Stmt::If { .. }));
    }
}
