use super::*;
use crate::ast::Expr;

enum LoopStep {
    Next,
    Exit,
    Propagate(Flow),
}

fn loop_step(flow: Flow) -> LoopStep {
    match flow {
        Flow::Normal | Flow::Continue(1) => LoopStep::Next,
        Flow::Break(1) => LoopStep::Exit,
        Flow::Break(n) => LoopStep::Propagate(Flow::Break(n - 1)),
        Flow::Continue(n) => LoopStep::Propagate(Flow::Continue(n - 1)),
        Flow::Return(value) => LoopStep::Propagate(Flow::Return(value)),
    }
}

impl Interpreter {
    pub(super) fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    pub(super) fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        let line = stmt.line();
        if let Some(line) = line {
            self.current_line = line;
        }
        self.exec_stmt_inner(stmt).map_err(|err| match line {
            Some(line) => err.at_line(line),
            None => err,
        })
    }

    fn exec_stmt_inner(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::InlineHtml(text) => {
                self.emit_output(text);
                Ok(Flow::Normal)
            }
            Stmt::Echo { args, .. } => {
                for arg in args {
                    let value = self.eval(arg)?;
                    let text = self.to_php_string(&value)?;
                    self.emit_output(&text);
                }
                Ok(Flow::Normal)
            }
            Stmt::Expr { expr, .. } => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                if self.eval(cond)?.truthy() {
                    self.exec_block(then_branch)
                } else {
                    self.exec_block(else_branch)
                }
            }
            Stmt::While { cond, body, .. } => {
                while self.eval(cond)?.truthy() {
                    match loop_step(self.exec_block(body)?) {
                        LoopStep::Next => {}
                        LoopStep::Exit => break,
                        LoopStep::Propagate(flow) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile { body, cond, .. } => {
                loop {
                    match loop_step(self.exec_block(body)?) {
                        LoopStep::Next => {}
                        LoopStep::Exit => break,
                        LoopStep::Propagate(flow) => return Ok(flow),
                    }
                    if !self.eval(cond)?.truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
                ..
            } => {
                for expr in init {
                    self.eval(expr)?;
                }
                loop {
                    if !self.eval_for_cond(cond)? {
                        break;
                    }
                    match loop_step(self.exec_block(body)?) {
                        LoopStep::Next => {}
                        LoopStep::Exit => break,
                        LoopStep::Propagate(flow) => return Ok(flow),
                    }
                    for expr in step {
                        self.eval(expr)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Foreach {
                subject,
                key,
                value,
                body,
                ..
            } => {
                let subject = self.eval(subject)?;
                let entries = self.foreach_entries(&subject);
                for (k, v) in entries {
                    if let Some(key) = key {
                        self.assign(key, k)?;
                    }
                    self.assign(value, v)?;
                    match loop_step(self.exec_block(body)?) {
                        LoopStep::Next => {}
                        LoopStep::Exit => break,
                        LoopStep::Propagate(flow) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Break(levels) => Ok(Flow::Break(*levels)),
            Stmt::Continue(levels) => Ok(Flow::Continue(*levels)),
            Stmt::Block(stmts) => self.exec_block(stmts),
            Stmt::Unset { targets, .. } => {
                for target in targets {
                    self.unset(target)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::FunctionDecl(def) => {
                self.register_function(def)?;
                Ok(Flow::Normal)
            }
            Stmt::ClassDecl(decl) => {
                self.declare_class(decl)?;
                Ok(Flow::Normal)
            }
        }
    }

    /// Every expression runs; the last one decides. No expressions loops forever.
    fn eval_for_cond(&mut self, cond: &[Expr]) -> Result<bool, RuntimeError> {
        let mut result = true;
        for expr in cond {
            result = self.eval(expr)?.truthy();
        }
        Ok(result)
    }

    /// Snapshot of what `foreach` walks. Objects yield the properties the
    /// current scope can see.
    fn foreach_entries(&mut self, subject: &Value) -> Vec<(Value, Value)> {
        match subject {
            Value::Array(arr) => arr
                .iter()
                .map(|(k, v)| (k.to_value(), v.clone()))
                .collect(),
            Value::Object(obj) => {
                let scope = self.current_scope();
                let obj = obj.borrow();
                obj.props
                    .iter()
                    .filter(|slot| {
                        self.slot_visible(
                            slot.declared_in.as_deref(),
                            &slot.name,
                            slot.visibility,
                            scope.as_deref(),
                        )
                    })
                    .map(|slot| (Value::str(slot.name.clone()), slot.value.clone()))
                    .collect()
            }
            other => {
                self.warn(format!(
                    "foreach() argument must be of type array|object, {} given",
                    other.debug_type()
                ));
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Interpreter;

    fn run(src: &str) -> String {
        Interpreter::new().run(src).unwrap()
    }

    #[test]
    fn loops_with_break_and_continue() {
        let out = run("<?php
for ($i = 0; $i < 10; $i++) {
  if ($i % 2) continue;
  if ($i > 6) break;
  echo $i;
}
$n = 0;
while (true) { if (++$n >= 3) break; }
do { echo $n; } while (false);");
        assert_eq!(out, "02463");
    }

    #[test]
    fn multi_level_break() {
        let out = run("<?php foreach ([1, 2] as $a) { foreach ([1, 2] as $b) { echo $a, $b; break 2; } }");
        assert_eq!(out, "11");
    }

    #[test]
    fn foreach_over_object_respects_visibility() {
        let out = run("<?php
class A {
  public $a = 1; protected $b = 2; private $c = 3;
  function inside() { foreach ($this as $k => $v) echo $k; }
}
$o = new A;
foreach ($o as $k => $v) echo $k;
echo '|';
$o->inside();");
        assert_eq!(out, "a|abc");
    }

    #[test]
    fn foreach_iterates_a_snapshot() {
        assert_eq!(
            run("<?php $a = [1, 2]; foreach ($a as $v) { $a[] = $v; } echo count($a);"),
            "4"
        );
    }

    #[test]
    fn errors_carry_the_statement_line() {
        let err = Interpreter::new().run("<?php\n\necho 1 % 0;").unwrap_err();
        assert_eq!(err.line, Some(3));
    }

    #[test]
    fn inline_html_is_echoed() {
        assert_eq!(run("head\n<?php echo 'x'; ?>\ntail"), "head\nxtail");
    }
}
