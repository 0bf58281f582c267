use super::Parser;
use crate::ast::{ArrayItem, BinaryOp, CastKind, ClassRef, Expr, UnaryOp};
use crate::lexer::{IndexKey, Lexer, StrPart, TokenKind};
use crate::value::{RuntimeError, RuntimeErrorCode};

fn assign_op(kind: &TokenKind) -> Option<Option<BinaryOp>> {
    Some(match kind {
        TokenKind::Eq => None,
        TokenKind::PlusEq => Some(BinaryOp::Add),
        TokenKind::MinusEq => Some(BinaryOp::Sub),
        TokenKind::StarEq => Some(BinaryOp::Mul),
        TokenKind::SlashEq => Some(BinaryOp::Div),
        TokenKind::PercentEq => Some(BinaryOp::Mod),
        TokenKind::DotEq => Some(BinaryOp::Concat),
        _ => return None,
    })
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

impl Parser {
    pub(crate) fn parse_expr(&mut self) -> Result<Expr, RuntimeError> {
        self.parse_keyword_or()
    }

    fn parse_keyword_or(&mut self) -> Result<Expr, RuntimeError> {
        let mut left = self.parse_keyword_xor()?;
        while self.match_keyword("or") {
            let right = self.parse_keyword_xor()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_keyword_xor(&mut self) -> Result<Expr, RuntimeError> {
        let mut left = self.parse_keyword_and()?;
        while self.match_keyword("xor") {
            let right = self.parse_keyword_and()?;
            left = binary(BinaryOp::Xor, left, right);
        }
        Ok(left)
    }

    fn parse_keyword_and(&mut self) -> Result<Expr, RuntimeError> {
        let mut left = self.parse_assignment()?;
        while self.match_keyword("and") {
            let right = self.parse_assignment()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_assignment(&mut self) -> Result<Expr, RuntimeError> {
        if self.match_keyword("print") {
            return Ok(Expr::Print(Box::new(self.parse_assignment()?)));
        }
        let left = self.parse_ternary()?;
        let kind = self.peek_kind().clone();
        if kind == TokenKind::QuestionQuestionEq {
            self.pos += 1;
            self.require_assignable(&left)?;
            let value = self.parse_assignment()?;
            return Ok(Expr::CoalesceAssign {
                target: Box::new(left),
                value: Box::new(value),
            });
        }
        let Some(op) = assign_op(&kind) else {
            return Ok(left);
        };
        self.pos += 1;
        self.require_assignable(&left)?;
        if op.is_none() && self.check(&TokenKind::Ampersand) {
            return Err(self.error(
                RuntimeErrorCode::ParseGeneric,
                "assignment by reference is not supported",
            ));
        }
        let value = self.parse_assignment()?;
        Ok(match op {
            None => Expr::Assign {
                target: Box::new(left),
                value: Box::new(value),
            },
            Some(op) => Expr::CompoundAssign {
                op,
                target: Box::new(left),
                value: Box::new(value),
            },
        })
    }

    fn require_assignable(&self, target: &Expr) -> Result<(), RuntimeError> {
        if target.is_assignable() {
            Ok(())
        } else if matches!(target, Expr::This) {
            Err(self.error(RuntimeErrorCode::ParseGeneric, "Cannot re-assign $this"))
        } else {
            Err(self.error(
                RuntimeErrorCode::ParseGeneric,
                "syntax error, cannot assign to this expression",
            ))
        }
    }

    fn parse_ternary(&mut self) -> Result<Expr, RuntimeError> {
        let cond = self.parse_coalesce()?;
        if !self.match_kind(TokenKind::Question) {
            return Ok(cond);
        }
        let then_expr = if self.match_kind(TokenKind::Colon) {
            None
        } else {
            let then_expr = self.parse_assignment()?;
            self.consume_kind(TokenKind::Colon, "':' in ternary")?;
            Some(Box::new(then_expr))
        };
        let else_expr = self.parse_assignment()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then_expr,
            else_expr: Box::new(else_expr),
        })
    }

    fn parse_coalesce(&mut self) -> Result<Expr, RuntimeError> {
        let left = self.parse_or()?;
        if self.match_kind(TokenKind::QuestionQuestion) {
            let right = self.parse_coalesce()?;
            return Ok(Expr::Coalesce {
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, RuntimeError> {
        let mut left = self.parse_and()?;
        while self.match_kind(TokenKind::OrOr) {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, RuntimeError> {
        let mut left = self.parse_equality()?;
        while self.match_kind(TokenKind::AndAnd) {
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, RuntimeError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::BangEq => BinaryOp::NotEq,
                TokenKind::EqEqEq => BinaryOp::Identical,
                TokenKind::BangEqEq => BinaryOp::NotIdentical,
                TokenKind::Spaceship => BinaryOp::Spaceship,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, RuntimeError> {
        let mut left = self.parse_concat()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Lte => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Gte => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_concat()?;
            left = binary(op, left, right);
        }
    }

    /// `.` binds looser than `+` and `-`.
    fn parse_concat(&mut self) -> Result<Expr, RuntimeError> {
        let mut left = self.parse_additive()?;
        while self.match_kind(TokenKind::Dot) {
            let right = self.parse_additive()?;
            left = binary(BinaryOp::Concat, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, RuntimeError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, RuntimeError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, RuntimeError> {
        let op = match self.peek_kind().clone() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Cast(name) => {
                self.pos += 1;
                let kind = match name.as_str() {
                    "int" | "integer" => CastKind::Int,
                    "float" | "double" => CastKind::Float,
                    "string" => CastKind::String,
                    "bool" | "boolean" => CastKind::Bool,
                    _ => CastKind::Array,
                };
                let expr = self.parse_unary()?;
                return Ok(Expr::Cast {
                    kind,
                    expr: Box::new(expr),
                });
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let increment = self.check(&TokenKind::PlusPlus);
                self.pos += 1;
                let target = self.parse_unary()?;
                self.require_assignable(&target)?;
                return Ok(Expr::IncDec {
                    target: Box::new(target),
                    increment,
                    prefix: true,
                });
            }
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
            });
        }
        self.parse_instanceof()
    }

    fn parse_instanceof(&mut self) -> Result<Expr, RuntimeError> {
        let mut expr = self.parse_pow()?;
        while self.match_keyword("instanceof") {
            let class = self.parse_class_ref()?;
            expr = Expr::InstanceOf {
                expr: Box::new(expr),
                class,
            };
        }
        Ok(expr)
    }

    fn parse_pow(&mut self) -> Result<Expr, RuntimeError> {
        let base = self.parse_postfix()?;
        if self.match_kind(TokenKind::StarStar) {
            let exponent = self.parse_unary()?;
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    pub(super) fn parse_postfix(&mut self) -> Result<Expr, RuntimeError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::LBracket => {
                    self.pos += 1;
                    let index = if self.check(&TokenKind::RBracket) {
                        None
                    } else {
                        Some(Box::new(self.parse_expr()?))
                    };
                    self.consume_kind(TokenKind::RBracket, "']'")?;
                    expr = Expr::Index {
                        base: Box::new(expr),
                        index,
                    };
                }
                TokenKind::Arrow => {
                    self.pos += 1;
                    let name = match self.peek_kind().clone() {
                        TokenKind::Ident(name) => {
                            self.pos += 1;
                            name
                        }
                        _ => {
                            return Err(self.error(
                                RuntimeErrorCode::ParseExpected,
                                "syntax error, expected member name after '->'",
                            ));
                        }
                    };
                    if self.check(&TokenKind::LParen) {
                        let args = self.parse_args()?;
                        expr = Expr::MethodCall {
                            object: Box::new(expr),
                            name,
                            args,
                        };
                    } else {
                        expr = Expr::Prop {
                            object: Box::new(expr),
                            name,
                        };
                    }
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let increment = self.check(&TokenKind::PlusPlus);
                    self.pos += 1;
                    self.require_assignable(&expr)?;
                    return Ok(Expr::IncDec {
                        target: Box::new(expr),
                        increment,
                        prefix: false,
                    });
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, RuntimeError> {
        match self.peek_kind().clone() {
            TokenKind::Int(i) => {
                self.pos += 1;
                Ok(Expr::Int(i))
            }
            TokenKind::Float(f) => {
                self.pos += 1;
                Ok(Expr::Float(f))
            }
            TokenKind::Str(s) => {
                self.pos += 1;
                Ok(Expr::Str(s))
            }
            TokenKind::Template(parts) => {
                self.pos += 1;
                self.parse_template(parts)
            }
            TokenKind::Var(name) => {
                self.pos += 1;
                Ok(var_expr(name))
            }
            TokenKind::LBracket => {
                self.pos += 1;
                Ok(Expr::ArrayLiteral(self.parse_array_items(TokenKind::RBracket)?))
            }
            TokenKind::LParen => {
                self.pos += 1;
                let expr = self.parse_expr()?;
                self.consume_kind(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::Ident(name) => {
                self.pos += 1;
                self.parse_name_expr(name)
            }
            _ => Err(self.unexpected("in expression")),
        }
    }

    fn parse_name_expr(&mut self, name: String) -> Result<Expr, RuntimeError> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "true" => return Ok(Expr::Bool(true)),
            "false" => return Ok(Expr::Bool(false)),
            "null" => return Ok(Expr::Null),
            "array" if self.check(&TokenKind::LParen) => {
                self.pos += 1;
                return Ok(Expr::ArrayLiteral(self.parse_array_items(TokenKind::RParen)?));
            }
            "new" => {
                let class = self.parse_class_ref()?;
                let args = if self.check(&TokenKind::LParen) {
                    self.parse_args()?
                } else {
                    Vec::new()
                };
                return Ok(Expr::New { class, args });
            }
            "isset" => {
                let args = self.parse_args()?;
                if args.is_empty() || !args.iter().all(|a| a.is_assignable() || matches!(a, Expr::This)) {
                    return Err(self.error(
                        RuntimeErrorCode::ParseGeneric,
                        "Cannot use isset() on the result of an expression",
                    ));
                }
                return Ok(Expr::Isset(args));
            }
            "empty" => {
                self.consume_kind(TokenKind::LParen, "'(' after empty")?;
                let expr = self.parse_expr()?;
                self.consume_kind(TokenKind::RParen, "')'")?;
                return Ok(Expr::Empty(Box::new(expr)));
            }
            _ => {}
        }
        if self.match_kind(TokenKind::DoubleColon) {
            let class = class_ref_from_name(name);
            return self.parse_static_member(class);
        }
        if self.check(&TokenKind::LParen) {
            let args = self.parse_args()?;
            return Ok(Expr::Call { name, args });
        }
        Ok(Expr::Const(name))
    }

    /// The member after `Class::`.
    fn parse_static_member(&mut self, class: ClassRef) -> Result<Expr, RuntimeError> {
        match self.peek_kind().clone() {
            TokenKind::Var(name) => {
                self.pos += 1;
                Ok(Expr::StaticProp { class, name })
            }
            TokenKind::Ident(name) => {
                self.pos += 1;
                if self.check(&TokenKind::LParen) {
                    let args = self.parse_args()?;
                    Ok(Expr::StaticCall { class, name, args })
                } else {
                    Ok(Expr::ClassConst { class, name })
                }
            }
            _ => Err(self.error(
                RuntimeErrorCode::ParseExpected,
                "syntax error, expected member after '::'",
            )),
        }
    }

    fn parse_class_ref(&mut self) -> Result<ClassRef, RuntimeError> {
        let name = self.consume_ident("class name")?;
        Ok(class_ref_from_name(name))
    }

    pub(super) fn parse_args(&mut self) -> Result<Vec<Expr>, RuntimeError> {
        self.consume_kind(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        while !self.match_kind(TokenKind::RParen) {
            args.push(self.parse_expr()?);
            if !self.match_kind(TokenKind::Comma) {
                self.consume_kind(TokenKind::RParen, "')' after arguments")?;
                break;
            }
        }
        Ok(args)
    }

    fn parse_array_items(&mut self, close: TokenKind) -> Result<Vec<ArrayItem>, RuntimeError> {
        let mut items = Vec::new();
        while !self.match_kind(close.clone()) {
            let first = self.parse_expr()?;
            let item = if self.match_kind(TokenKind::FatArrow) {
                ArrayItem {
                    key: Some(first),
                    value: self.parse_expr()?,
                }
            } else {
                ArrayItem {
                    key: None,
                    value: first,
                }
            };
            items.push(item);
            if !self.match_kind(TokenKind::Comma) {
                self.consume_kind(close, "end of array literal")?;
                break;
            }
        }
        Ok(items)
    }

    fn parse_template(&mut self, parts: Vec<StrPart>) -> Result<Expr, RuntimeError> {
        let mut exprs = Vec::with_capacity(parts.len());
        for part in parts {
            exprs.push(match part {
                StrPart::Lit(s) => Expr::Str(s),
                StrPart::Var(name) => var_expr(name),
                StrPart::Prop(name, prop) => Expr::Prop {
                    object: Box::new(var_expr(name)),
                    name: prop,
                },
                StrPart::Index(name, key) => Expr::Index {
                    base: Box::new(var_expr(name)),
                    index: Some(Box::new(match key {
                        IndexKey::Int(i) => Expr::Int(i),
                        IndexKey::Name(n) => Expr::Str(n.into()),
                        IndexKey::Var(v) => var_expr(v),
                    })),
                },
                StrPart::Expr { source, line } => {
                    let tokens = Lexer::new_code(&source, line).tokenize()?;
                    let mut inner = Parser::new(tokens);
                    let expr = inner.parse_expr()?;
                    if !inner.check(&TokenKind::Eof) {
                        return Err(inner.unexpected("in string interpolation"));
                    }
                    expr
                }
            });
        }
        Ok(Expr::Interpolated(exprs))
    }
}

fn var_expr(name: String) -> Expr {
    if name == "this" {
        Expr::This
    } else {
        Expr::Var(name)
    }
}

fn class_ref_from_name(name: String) -> ClassRef {
    match name.to_ascii_lowercase().as_str() {
        "self" => ClassRef::SelfRef,
        "parent" => ClassRef::Parent,
        "static" => ClassRef::Static,
        _ => ClassRef::Named(name),
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{BinaryOp, ClassRef, Expr, Stmt};
    use crate::parser::parse_program;

    fn expr_of(src: &str) -> Expr {
        let stmts = parse_program(&format!("<?php {};", src)).unwrap();
        match stmts.into_iter().next() {
            Some(Stmt::Expr { expr, .. }) => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn append_to_property_is_an_assignment_target() {
        let expr = expr_of("$this->field[] = 1");
        let Expr::Assign { target, .. } = expr else {
            panic!("expected assignment");
        };
        let Expr::Index { base, index: None } = *target else {
            panic!("expected append");
        };
        assert!(matches!(*base, Expr::Prop { ref name, .. } if name == "field"));
    }

    #[test]
    fn method_call_on_this() {
        let expr = expr_of("$this->fun1()");
        assert!(matches!(expr, Expr::MethodCall { ref name, ref args, .. } if name == "fun1" && args.is_empty()));
    }

    #[test]
    fn concat_binds_looser_than_addition() {
        let expr = expr_of("'a' . 1 + 2");
        assert!(matches!(
            expr,
            Expr::Binary {
                op: BinaryOp::Concat,
                ..
            }
        ));
    }

    #[test]
    fn static_members() {
        assert!(matches!(
            expr_of("self::$count"),
            Expr::StaticProp {
                class: ClassRef::SelfRef,
                ..
            }
        ));
        assert!(matches!(
            expr_of("parent::__construct(1)"),
            Expr::StaticCall {
                class: ClassRef::Parent,
                ..
            }
        ));
        assert!(matches!(
            expr_of("Foo::BAR"),
            Expr::ClassConst {
                class: ClassRef::Named(_),
                ..
            }
        ));
    }

    #[test]
    fn new_without_parens() {
        assert!(matches!(expr_of("new Base"), Expr::New { ref args, .. } if args.is_empty()));
    }

    #[test]
    fn assignment_is_right_associative() {
        let expr = expr_of("$a = $b = 3");
        let Expr::Assign { value, .. } = expr else {
            panic!("expected assignment");
        };
        assert!(matches!(*value, Expr::Assign { .. }));
    }

    #[test]
    fn assigning_to_this_is_rejected() {
        assert!(parse_program("<?php $this = 1;").is_err());
    }

    #[test]
    fn brace_interpolation_parses_inner_expression() {
        let expr = expr_of(r#""v={$o->items[0]}""#);
        let Expr::Interpolated(parts) = expr else {
            panic!("expected interpolation");
        };
        assert!(matches!(parts[1], Expr::Index { .. }));
    }
}
