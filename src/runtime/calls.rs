use super::class::MethodDef;
use super::*;
use crate::ast::{ClassRef, Expr, ParamDef};

impl Interpreter {
    pub(super) fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, RuntimeError> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    pub(super) fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let key = name.to_ascii_lowercase();
        if let Some(def) = self.functions.get(&key).cloned() {
            crate::trace::trace_log!("call", "{}() with {} args", def.name, args.len());
            self.push_frame(Frame::default())?;
            let result = self.bind_and_run(&def.params, &def.body, args, &def.name);
            self.frames.pop();
            return result;
        }
        if builtins::is_builtin(&key) {
            return self.call_builtin(&key, args);
        }
        Err(RuntimeError::undefined_symbol(format!(
            "Call to undefined function {}()",
            name
        )))
    }

    /// Bind arguments to parameters in the current (fresh) frame and run
    /// the body. Missing trailing arguments take their defaults.
    fn bind_and_run(
        &mut self,
        params: &[ParamDef],
        body: &[Stmt],
        args: Vec<Value>,
        display_name: &str,
    ) -> Result<Value, RuntimeError> {
        let required = params
            .iter()
            .rposition(|p| p.default.is_none())
            .map_or(0, |i| i + 1);
        if args.len() < required {
            return Err(RuntimeError::type_error(format!(
                "Too few arguments to function {}(), {} passed and {} {} expected",
                display_name,
                args.len(),
                if required == params.len() { "exactly" } else { "at least" },
                required
            )));
        }
        let mut args = args.into_iter();
        for param in params {
            let value = match args.next() {
                Some(value) => value,
                None => match &param.default {
                    Some(default) => self.eval(default)?,
                    None => Value::Null,
                },
            };
            self.frame_mut().vars.insert(param.name.clone(), value);
        }
        match self.exec_block(body)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Null),
            Flow::Break(_) | Flow::Continue(_) => Err(RuntimeError::new(
                "'break' not in the 'loop' or 'switch' context",
            )),
        }
    }

    /// Run a resolved method. Visibility has already been checked.
    pub(super) fn invoke_method(
        &mut self,
        method: &Rc<MethodDef>,
        this: Option<ObjectRef>,
        static_class: String,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if method.is_abstract {
            return Err(RuntimeError::new(format!(
                "Cannot call abstract method {}::{}()",
                method.class, method.name
            )));
        }
        crate::trace::trace_log!(
            "call",
            "{}::{}() on {} with {} args",
            method.class,
            method.name,
            static_class,
            args.len()
        );
        self.push_frame(Frame {
            vars: HashMap::new(),
            this,
            scope: Some(method.class.clone()),
            static_class: Some(static_class),
        })?;
        let display_name = format!("{}::{}", method.class, method.name);
        let result = self.bind_and_run(&method.params, &method.body, args, &display_name);
        self.frames.pop();
        result
    }

    pub(super) fn call_method_on(
        &mut self,
        target: &Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let Value::Object(obj) = target else {
            return Err(RuntimeError::new(format!(
                "Call to a member function {}() on {}",
                name,
                target.debug_type()
            )));
        };
        let class = obj.borrow().class_name.clone();
        let scope = self.current_scope();
        let method = self.resolve_method(&class, name, scope.as_deref())?;
        let this = (!method.is_static).then(|| obj.clone());
        self.invoke_method(&method, this, class, args)
    }

    /// `Name::m()`, `self::m()`, `parent::m()`, `static::m()`.
    pub(super) fn call_static(
        &mut self,
        class: &ClassRef,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let target = self.resolve_class_ref(class)?;
        let scope = self.current_scope();
        let method = self.resolve_method(&target, name, scope.as_deref())?;
        // self:: and parent:: forward the late static binding class.
        let static_class = match class {
            ClassRef::Named(_) => target.clone(),
            _ => self.frame().static_class.clone().unwrap_or(target.clone()),
        };
        if method.is_static {
            return self.invoke_method(&method, None, static_class, args);
        }
        let this = self.frame().this.clone().filter(|this| {
            let class = this.borrow().class_name.clone();
            self.is_subclass_of(&class, &method.class)
        });
        match this {
            Some(this) => {
                let class = this.borrow().class_name.clone();
                self.invoke_method(&method, Some(this), class, args)
            }
            None => Err(RuntimeError::new(format!(
                "Non-static method {}::{}() cannot be called statically",
                method.class, method.name
            ))),
        }
    }

    pub(super) fn new_object(&mut self, class: &ClassRef, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let class = self.resolve_class_ref(class)?;
        if self.find_class(&class).is_some_and(|def| def.is_abstract) {
            return Err(RuntimeError::new(format!(
                "Cannot instantiate abstract class {}",
                class
            )));
        }
        let obj = self.instantiate(&class)?;
        let scope = self.current_scope();
        if let Some(ctor) = self.resolve_constructor(&class, scope.as_deref())? {
            self.invoke_method(&ctor, Some(obj.clone()), class, args)?;
        }
        Ok(Value::Object(obj))
    }
}

#[cfg(test)]
mod tests {
    use crate::Interpreter;

    fn run(src: &str) -> String {
        Interpreter::new().run(src).unwrap()
    }

    #[test]
    fn defaults_fill_missing_arguments() {
        assert_eq!(run("<?php function f($a, $b = 2) { return $a + $b; } echo f(1), f(1, 5);"), "36");
    }

    #[test]
    fn too_few_arguments() {
        let err = Interpreter::new()
            .run("<?php function f($a, $b) {} f(1);")
            .unwrap_err();
        assert_eq!(
            err.message,
            "Too few arguments to function f(), 1 passed and exactly 2 expected"
        );
    }

    #[test]
    fn parent_constructor_keeps_this() {
        let out = run("<?php
class A { protected $v; function __construct($v) { $this->v = $v; } }
class B extends A { function __construct() { parent::__construct('from B'); } function v() { return $this->v; } }
echo (new B)->v();");
        assert_eq!(out, "from B");
    }

    #[test]
    fn late_static_binding_follows_the_called_class() {
        let out = run("<?php
class A { static function create() { return new static; } static function name() { return static::class; } }
class B extends A {}
echo get_class(B::create()), ' ', B::name(), ' ', A::name();");
        assert_eq!(out, "B B A");
    }

    #[test]
    fn non_static_method_called_statically_from_outside() {
        let err = Interpreter::new()
            .run("<?php class A { function f() {} } A::f();")
            .unwrap_err();
        assert_eq!(err.message, "Non-static method A::f() cannot be called statically");
    }

    #[test]
    fn abstract_class_cannot_be_instantiated() {
        let err = Interpreter::new()
            .run("<?php abstract class A {} new A;")
            .unwrap_err();
        assert_eq!(err.message, "Cannot instantiate abstract class A");
    }

    #[test]
    fn member_call_on_null() {
        let err = Interpreter::new().run("<?php $x = null; $x->f();").unwrap_err();
        assert_eq!(err.message, "Call to a member function f() on null");
    }
}
