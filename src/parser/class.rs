use super::Parser;
use crate::ast::{ClassDecl, ConstDecl, MethodDecl, PropertyDecl, Visibility};
use crate::lexer::TokenKind;
use crate::value::{RuntimeError, RuntimeErrorCode};

#[derive(Default)]
struct Modifiers {
    visibility: Option<Visibility>,
    is_static: bool,
    is_abstract: bool,
    saw_var: bool,
}

impl Parser {
    pub(super) fn parse_class_decl(&mut self) -> Result<ClassDecl, RuntimeError> {
        let line = self.line();
        let mut is_abstract = false;
        loop {
            if self.match_keyword("abstract") {
                is_abstract = true;
            } else if !self.match_keyword("final") {
                break;
            }
        }
        if !self.match_keyword("class") {
            return Err(self.unexpected("expecting \"class\""));
        }
        let name = self.consume_ident("class name")?;
        let parent = if self.match_keyword("extends") {
            Some(self.consume_ident("parent class name")?)
        } else {
            None
        };
        if self.match_keyword("implements") {
            // Interfaces carry no behavior in this subset.
            loop {
                self.consume_ident("interface name")?;
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume_kind(TokenKind::LBrace, "'{' to open class body")?;
        let mut decl = ClassDecl {
            name,
            parent,
            is_abstract,
            properties: Vec::new(),
            constants: Vec::new(),
            methods: Vec::new(),
            line,
        };
        while !self.match_kind(TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.unexpected("expecting '}' to close class body"));
            }
            self.parse_member(&mut decl)?;
        }
        crate::trace::trace_log!(
            "parse",
            "class {} ({} props, {} methods, {} consts)",
            decl.name,
            decl.properties.len(),
            decl.methods.len(),
            decl.constants.len()
        );
        Ok(decl)
    }

    fn parse_modifiers(&mut self) -> Result<Modifiers, RuntimeError> {
        let mut mods = Modifiers::default();
        loop {
            let visibility = if self.match_keyword("public") {
                Some(Visibility::Public)
            } else if self.match_keyword("protected") {
                Some(Visibility::Protected)
            } else if self.match_keyword("private") {
                Some(Visibility::Private)
            } else {
                None
            };
            if let Some(vis) = visibility {
                if mods.visibility.is_some() {
                    return Err(self.error(
                        RuntimeErrorCode::ParseGeneric,
                        "Multiple access type modifiers are not allowed",
                    ));
                }
                mods.visibility = Some(vis);
                continue;
            }
            if self.match_keyword("static") {
                mods.is_static = true;
            } else if self.match_keyword("abstract") {
                mods.is_abstract = true;
            } else if self.match_keyword("var") {
                mods.saw_var = true;
            } else if !(self.match_keyword("final") || self.match_keyword("readonly")) {
                return Ok(mods);
            }
        }
    }

    fn parse_member(&mut self, decl: &mut ClassDecl) -> Result<(), RuntimeError> {
        let mods = self.parse_modifiers()?;
        let visibility = mods.visibility.unwrap_or(Visibility::Public);

        if self.match_keyword("const") {
            if mods.is_static || mods.is_abstract {
                return Err(self.error(
                    RuntimeErrorCode::ParseGeneric,
                    "Cannot use 'static' or 'abstract' as constant modifier",
                ));
            }
            loop {
                let name = self.consume_ident("constant name")?;
                self.consume_kind(TokenKind::Eq, "'=' in constant declaration")?;
                let value = self.parse_expr()?;
                decl.constants.push(ConstDecl {
                    name,
                    visibility,
                    value,
                });
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
            return self.consume_semicolon();
        }

        if self.match_keyword("function") {
            let name = self.consume_ident("method name")?;
            let params = self.parse_params()?;
            self.skip_return_type()?;
            let body = if self.match_kind(TokenKind::Semicolon) {
                if !mods.is_abstract {
                    return Err(self.error(
                        RuntimeErrorCode::ParseGeneric,
                        format!(
                            "Non-abstract method {}::{}() must contain body",
                            decl.name, name
                        ),
                    ));
                }
                Vec::new()
            } else {
                if mods.is_abstract {
                    return Err(self.error(
                        RuntimeErrorCode::ParseGeneric,
                        format!("Abstract function {}::{}() cannot contain body", decl.name, name),
                    ));
                }
                self.consume_kind(TokenKind::LBrace, "'{' to open method body")?;
                self.parse_block_body()?
            };
            if mods.is_abstract && visibility == Visibility::Private {
                return Err(self.error(
                    RuntimeErrorCode::ParseGeneric,
                    format!(
                        "Abstract function {}::{}() cannot be declared private",
                        decl.name, name
                    ),
                ));
            }
            if decl
                .methods
                .iter()
                .any(|m| m.name.eq_ignore_ascii_case(&name))
            {
                return Err(self.error(
                    RuntimeErrorCode::ParseGeneric,
                    format!("Cannot redeclare {}::{}()", decl.name, name),
                ));
            }
            decl.methods.push(MethodDecl {
                name,
                visibility,
                is_static: mods.is_static,
                is_abstract: mods.is_abstract,
                params,
                body,
            });
            return Ok(());
        }

        if mods.visibility.is_none() && !mods.saw_var && !mods.is_static {
            return Err(self.unexpected("expecting member declaration"));
        }
        if mods.is_abstract {
            return Err(self.error(
                RuntimeErrorCode::ParseGeneric,
                "Properties cannot be declared abstract",
            ));
        }
        self.skip_type_hint();
        loop {
            let name = self.consume_var()?;
            let default = if self.match_kind(TokenKind::Eq) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            if decl.properties.iter().any(|p| p.name == name) {
                return Err(self.error(
                    RuntimeErrorCode::ParseGeneric,
                    format!("Cannot redeclare {}::${}", decl.name, name),
                ));
            }
            decl.properties.push(PropertyDecl {
                name,
                visibility,
                is_static: mods.is_static,
                default,
            });
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        self.consume_semicolon()
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Stmt, Visibility};
    use crate::parser::parse_program;

    const FIXTURE: &str = r#"<?php

class Base {
  private $field = [];
  private function fun1() { echo "Base::fun1\n";}
  public function test() {
    $this->field[] = 1;
    var_dump($this->field);
    $this->fun1();
  }
}
"#;

    #[test]
    fn private_members_keep_their_visibility() {
        let stmts = parse_program(FIXTURE).unwrap();
        let Stmt::ClassDecl(decl) = &stmts[0] else {
            panic!("expected class");
        };
        assert_eq!(decl.name, "Base");
        assert_eq!(decl.properties[0].name, "field");
        assert_eq!(decl.properties[0].visibility, Visibility::Private);
        assert_eq!(decl.methods[0].name, "fun1");
        assert_eq!(decl.methods[0].visibility, Visibility::Private);
        assert_eq!(decl.methods[1].visibility, Visibility::Public);
        assert_eq!(decl.methods[1].body.len(), 3);
    }

    #[test]
    fn members_without_modifier_default_to_public() {
        let stmts = parse_program("<?php class A { function f() {} var $x; const C = 1; }").unwrap();
        let Stmt::ClassDecl(decl) = &stmts[0] else {
            panic!("expected class");
        };
        assert_eq!(decl.methods[0].visibility, Visibility::Public);
        assert_eq!(decl.properties[0].visibility, Visibility::Public);
        assert_eq!(decl.constants[0].visibility, Visibility::Public);
    }

    #[test]
    fn static_and_typed_properties() {
        let stmts =
            parse_program("<?php class A extends B { private static int $n = 0, $m; }").unwrap();
        let Stmt::ClassDecl(decl) = &stmts[0] else {
            panic!("expected class");
        };
        assert_eq!(decl.parent.as_deref(), Some("B"));
        assert!(decl.properties.iter().all(|p| p.is_static));
        assert_eq!(decl.properties.len(), 2);
    }

    #[test]
    fn duplicate_visibility_is_rejected() {
        let err = parse_program("<?php class A { public private $x; }").unwrap_err();
        assert!(err.message.contains("Multiple access type modifiers"));
    }

    #[test]
    fn abstract_methods_have_no_body() {
        assert!(parse_program("<?php abstract class A { abstract function f(); }").is_ok());
        assert!(parse_program("<?php class A { function f(); }").is_err());
    }
}
