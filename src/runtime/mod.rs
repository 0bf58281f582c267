use std::borrow::Cow;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{FunctionDef, Stmt};
use crate::value::{ObjectRef, RuntimeError, Value};

mod access;
mod builtins;
mod calls;
mod class;
pub(crate) mod dump;
mod eval;
mod exec;
mod place;

use self::class::ClassDef;

/// Nested user calls beyond this depth abort the script instead of
/// overflowing the native stack.
const MAX_CALL_DEPTH: usize = 128;

/// How a statement finished. `return`, `break` and `continue` travel
/// outward through this rather than through errors.
#[derive(Debug)]
pub(crate) enum Flow {
    Normal,
    Break(usize),
    Continue(usize),
    Return(Value),
}

/// Variables of one function activation plus the class context it runs in.
#[derive(Default)]
struct Frame {
    vars: HashMap<String, Value>,
    this: Option<ObjectRef>,
    /// Declaring class of the running method; `None` at top level and in
    /// free functions.
    scope: Option<String>,
    /// The class `static::` refers to.
    static_class: Option<String>,
}

pub struct Interpreter {
    output: Vec<u8>,
    warnings: Vec<String>,
    echo_warnings: bool,
    program_path: Option<String>,
    classes: HashMap<String, ClassDef>,
    functions: HashMap<String, Rc<FunctionDef>>,
    globals: Frame,
    frames: Vec<Frame>,
    next_object_id: u64,
    current_line: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            output: Vec::new(),
            warnings: Vec::new(),
            echo_warnings: false,
            program_path: None,
            classes: HashMap::new(),
            functions: HashMap::new(),
            globals: Frame::default(),
            frames: Vec::new(),
            next_object_id: 1,
            current_line: 0,
        }
    }

    /// Run a PHP file. Text before `<?php` is echoed as inline HTML.
    /// Returns the output produced by this run, with invalid UTF-8 replaced;
    /// `output_bytes` keeps the raw bytes.
    pub fn run(&mut self, source: &str) -> Result<String, RuntimeError> {
        let stmts = crate::parser::parse_program(source)?;
        self.run_stmts(&stmts)
    }

    /// Run code that starts directly in PHP mode, as `php -r` does.
    pub fn run_code(&mut self, code: &str) -> Result<String, RuntimeError> {
        let stmts = crate::parser::parse_code(code)?;
        self.run_stmts(&stmts)
    }

    /// Everything written so far, including output of a run that failed.
    pub fn output(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }

    pub fn output_bytes(&self) -> &[u8] {
        &self.output
    }

    /// Warnings raised so far, each prefixed with `Warning: `.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn set_program_path(&mut self, path: &str) {
        self.program_path = Some(path.to_string());
    }

    pub fn program_path(&self) -> Option<&str> {
        self.program_path.as_deref()
    }

    /// Mirror warnings to stderr as they are raised.
    pub fn set_echo_warnings(&mut self, echo: bool) {
        self.echo_warnings = echo;
    }

    /// Line of the statement that ran last.
    pub fn current_line(&self) -> usize {
        self.current_line
    }

    fn run_stmts(&mut self, stmts: &[Stmt]) -> Result<String, RuntimeError> {
        let start = self.output.len();
        self.frames.clear();
        let hoisted = self.hoist_declarations(stmts)?;
        for (stmt, done) in stmts.iter().zip(hoisted) {
            if done {
                continue;
            }
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                Flow::Return(_) => break,
                Flow::Break(_) | Flow::Continue(_) => {
                    return Err(RuntimeError::new(
                        "'break' not in the 'loop' or 'switch' context",
                    ));
                }
            }
        }
        Ok(String::from_utf8_lossy(&self.output[start..]).into_owned())
    }

    /// Register top-level functions and classes before anything runs.
    /// Classes whose parent cannot be resolved yet are left for the
    /// statement itself to declare. Returns which statements were consumed.
    fn hoist_declarations(&mut self, stmts: &[Stmt]) -> Result<Vec<bool>, RuntimeError> {
        let mut done = vec![false; stmts.len()];
        for (i, stmt) in stmts.iter().enumerate() {
            if let Stmt::FunctionDecl(def) = stmt {
                self.register_function(def)
                    .map_err(|e| e.at_line(def.line))?;
                done[i] = true;
            }
        }
        loop {
            let mut progress = false;
            for (i, stmt) in stmts.iter().enumerate() {
                if done[i] {
                    continue;
                }
                if let Stmt::ClassDecl(decl) = stmt {
                    let ready = match &decl.parent {
                        Some(parent) => self.find_class(parent).is_some(),
                        None => true,
                    };
                    if ready {
                        self.declare_class(decl).map_err(|e| e.at_line(decl.line))?;
                        done[i] = true;
                        progress = true;
                    }
                }
            }
            if !progress {
                return Ok(done);
            }
        }
    }

    fn register_function(&mut self, def: &FunctionDef) -> Result<(), RuntimeError> {
        let key = def.name.to_ascii_lowercase();
        if self.functions.contains_key(&key) || builtins::is_builtin(&key) {
            return Err(RuntimeError::new(format!(
                "Cannot redeclare {}()",
                def.name
            )));
        }
        crate::trace::trace_log!("call", "declare function {}()", def.name);
        self.functions.insert(key, Rc::new(def.clone()));
        Ok(())
    }

    fn frame(&self) -> &Frame {
        match self.frames.last() {
            Some(frame) => frame,
            None => &self.globals,
        }
    }

    fn frame_mut(&mut self) -> &mut Frame {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => &mut self.globals,
        }
    }

    fn push_frame(&mut self, frame: Frame) -> Result<(), RuntimeError> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(RuntimeError::new(format!(
                "Maximum function nesting level of '{}' reached, aborting!",
                MAX_CALL_DEPTH
            )));
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Run `f` as if inside a method of `class` with no `$this`. Used for
    /// property defaults and constant expressions.
    fn in_class_scope<T>(
        &mut self,
        class: &str,
        f: impl FnOnce(&mut Self) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        self.push_frame(Frame {
            scope: Some(class.to_string()),
            static_class: Some(class.to_string()),
            ..Frame::default()
        })?;
        let result = f(self);
        self.frames.pop();
        result
    }

    fn current_scope(&self) -> Option<String> {
        self.frame().scope.clone()
    }

    fn emit_output(&mut self, text: impl AsRef<[u8]>) {
        self.output.extend_from_slice(text.as_ref());
    }

    fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.echo_warnings {
            eprintln!(
                "PHP Warning:  {} in {} on line {}",
                message,
                self.program_path.as_deref().unwrap_or("Standard input code"),
                self.current_line
            );
        }
        self.warnings.push(format!("Warning: {}", message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_returns_only_this_runs_output() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.run("<?php echo 'a';").unwrap(), "a");
        assert_eq!(interp.run("<?php echo 'b';").unwrap(), "b");
        assert_eq!(interp.output(), "ab");
    }

    #[test]
    fn output_survives_a_failed_run() {
        let mut interp = Interpreter::new();
        let err = interp.run("<?php echo 'before'; echo 1 % 0;").unwrap_err();
        assert_eq!(err.message, "Modulo by zero");
        assert_eq!(interp.output(), "before");
    }

    #[test]
    fn functions_are_hoisted() {
        let mut interp = Interpreter::new();
        let out = interp.run("<?php echo f(); function f() { return 'hoisted'; }").unwrap();
        assert_eq!(out, "hoisted");
    }

    #[test]
    fn classes_are_hoisted_in_parent_order() {
        let mut interp = Interpreter::new();
        let out = interp
            .run("<?php echo (new B)->f(); class B extends A {} class A { function f() { return 'A'; } }")
            .unwrap();
        assert_eq!(out, "A");
    }

    #[test]
    fn top_level_return_stops_the_script() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.run("<?php echo 1; return; echo 2;").unwrap(), "1");
    }

    #[test]
    fn redeclaring_a_builtin_fails() {
        let mut interp = Interpreter::new();
        let err = interp.run("<?php function strlen($s) {}").unwrap_err();
        assert_eq!(err.message, "Cannot redeclare strlen()");
    }

    #[test]
    fn runaway_recursion_is_an_error() {
        let handle = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(|| {
                let mut interp = Interpreter::new();
                interp
                    .run("<?php function f() { return f(); } f();")
                    .unwrap_err()
                    .message
            })
            .unwrap();
        let message = handle.join().unwrap();
        assert!(message.starts_with("Maximum function nesting level"));
    }
}
