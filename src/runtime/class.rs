use std::cell::RefCell;

use super::*;
use crate::ast::{ClassDecl, Expr, ParamDef, Visibility};
use crate::value::{Object, PropSlot};

#[derive(Debug)]
pub(crate) struct MethodDef {
    pub(crate) name: String,
    /// Declaring class; this is the scope the body runs in.
    pub(crate) class: String,
    pub(crate) visibility: Visibility,
    pub(crate) is_static: bool,
    pub(crate) is_abstract: bool,
    pub(crate) params: Vec<ParamDef>,
    pub(crate) body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub(crate) struct PropDef {
    pub(crate) name: String,
    pub(crate) visibility: Visibility,
    pub(crate) default: Option<Expr>,
}

#[derive(Debug)]
pub(crate) struct StaticSlot {
    pub(crate) visibility: Visibility,
    pub(crate) value: Value,
}

#[derive(Debug)]
pub(crate) enum ConstState {
    Pending(Expr),
    Evaluating,
    Ready(Value),
}

#[derive(Debug)]
pub(crate) struct ConstSlot {
    pub(crate) visibility: Visibility,
    pub(crate) state: ConstState,
}

#[derive(Debug)]
pub(crate) struct ClassDef {
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    pub(crate) is_abstract: bool,
    /// Instance properties declared by this class only, in source order.
    pub(crate) props: Vec<PropDef>,
    pub(crate) static_props: HashMap<String, StaticSlot>,
    pub(crate) consts: HashMap<String, ConstSlot>,
    /// Keyed by lowercased name.
    pub(crate) methods: HashMap<String, Rc<MethodDef>>,
}

pub(super) fn class_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl Interpreter {
    pub(super) fn find_class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(&class_key(name))
    }

    /// Canonical (declared) spelling of a class name.
    pub(super) fn lookup_class(&self, name: &str) -> Result<String, RuntimeError> {
        self.find_class(name)
            .map(|class| class.name.clone())
            .ok_or_else(|| RuntimeError::undefined_symbol(format!("Class \"{}\" not found", name)))
    }

    /// `class` followed by its ancestors, most-derived first.
    pub(super) fn class_chain(&self, class: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut next = Some(class.to_string());
        while let Some(name) = next {
            let Some(def) = self.find_class(&name) else {
                break;
            };
            next = def.parent.clone();
            chain.push(def.name.clone());
        }
        chain
    }

    /// True when `class` is `ancestor` or inherits from it.
    pub(super) fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        self.class_chain(class)
            .iter()
            .any(|name| name.eq_ignore_ascii_case(ancestor))
    }

    pub(super) fn parent_of(&self, class: &str) -> Option<String> {
        self.find_class(class).and_then(|def| def.parent.clone())
    }

    pub(super) fn own_method(&self, class: &str, name: &str) -> Option<Rc<MethodDef>> {
        self.find_class(class)?
            .methods
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    /// Most-derived declaration of a method along the chain of `class`.
    pub(super) fn find_method(&self, class: &str, name: &str) -> Option<Rc<MethodDef>> {
        self.class_chain(class)
            .iter()
            .find_map(|cn| self.own_method(cn, name))
    }

    pub(super) fn own_property(&self, class: &str, name: &str) -> Option<&PropDef> {
        self.find_class(class)?.props.iter().find(|p| p.name == name)
    }

    pub(super) fn declare_class(&mut self, decl: &ClassDecl) -> Result<(), RuntimeError> {
        let key = class_key(&decl.name);
        if self.classes.contains_key(&key) {
            return Err(RuntimeError::new(format!(
                "Cannot declare class {}, because the name is already in use",
                decl.name
            )));
        }
        let parent = match &decl.parent {
            Some(parent) => Some(self.lookup_class(parent)?),
            None => None,
        };

        let mut def = ClassDef {
            name: decl.name.clone(),
            parent,
            is_abstract: decl.is_abstract,
            props: Vec::new(),
            static_props: HashMap::new(),
            consts: HashMap::new(),
            methods: HashMap::new(),
        };
        let mut static_defaults = Vec::new();
        for prop in &decl.properties {
            if prop.is_static {
                def.static_props.insert(
                    prop.name.clone(),
                    StaticSlot {
                        visibility: prop.visibility,
                        value: Value::Null,
                    },
                );
                if let Some(default) = &prop.default {
                    static_defaults.push((prop.name.clone(), default.clone()));
                }
            } else {
                def.props.push(PropDef {
                    name: prop.name.clone(),
                    visibility: prop.visibility,
                    default: prop.default.clone(),
                });
            }
        }
        for constant in &decl.constants {
            if def.consts.contains_key(&constant.name) {
                return Err(RuntimeError::new(format!(
                    "Cannot redefine class constant {}::{}",
                    decl.name, constant.name
                )));
            }
            def.consts.insert(
                constant.name.clone(),
                ConstSlot {
                    visibility: constant.visibility,
                    state: ConstState::Pending(constant.value.clone()),
                },
            );
        }
        for method in &decl.methods {
            def.methods.insert(
                method.name.to_ascii_lowercase(),
                Rc::new(MethodDef {
                    name: method.name.clone(),
                    class: decl.name.clone(),
                    visibility: method.visibility,
                    is_static: method.is_static,
                    is_abstract: method.is_abstract,
                    params: method.params.clone(),
                    body: method.body.clone(),
                }),
            );
        }

        self.check_inherited_visibility(&def)?;
        if !def.is_abstract {
            self.check_abstract_methods(&def)?;
        }

        crate::trace::trace_log!(
            "class",
            "declare {}{} ({} props, {} static, {} methods)",
            def.name,
            def.parent
                .as_ref()
                .map(|p| format!(" extends {}", p))
                .unwrap_or_default(),
            def.props.len(),
            def.static_props.len(),
            def.methods.len()
        );
        let name = def.name.clone();
        self.classes.insert(key.clone(), def);

        for (prop, expr) in static_defaults {
            let value = match self.in_class_scope(&name, |interp| interp.eval(&expr)) {
                Ok(value) => value,
                Err(err) => {
                    self.classes.remove(&key);
                    return Err(err);
                }
            };
            if let Some(slot) = self
                .classes
                .get_mut(&key)
                .and_then(|def| def.static_props.get_mut(&prop))
            {
                slot.value = value;
            }
        }
        Ok(())
    }

    /// A redeclared member may keep or widen the visibility it inherits,
    /// never narrow it. Private parent members impose nothing, and neither
    /// does a concrete parent constructor.
    fn check_inherited_visibility(&self, def: &ClassDef) -> Result<(), RuntimeError> {
        let Some(parent) = &def.parent else {
            return Ok(());
        };
        for method in def.methods.values() {
            if let Some(inherited) = self.find_method(parent, &method.name)
                && inherited.visibility != Visibility::Private
                && !(method.name.eq_ignore_ascii_case("__construct") && !inherited.is_abstract)
                && rank(method.visibility) > rank(inherited.visibility)
            {
                return Err(RuntimeError::access(format!(
                    "Access level to {}::{}() must be {} (as in class {}){}",
                    def.name,
                    method.name,
                    inherited.visibility,
                    inherited.class,
                    weaker_suffix(inherited.visibility)
                )));
            }
        }
        for prop in &def.props {
            for ancestor in self.class_chain(parent) {
                let Some(inherited) = self.own_property(&ancestor, &prop.name) else {
                    continue;
                };
                if inherited.visibility != Visibility::Private
                    && rank(prop.visibility) > rank(inherited.visibility)
                {
                    return Err(RuntimeError::access(format!(
                        "Access level to {}::${} must be {} (as in class {}){}",
                        def.name,
                        prop.name,
                        inherited.visibility,
                        ancestor,
                        weaker_suffix(inherited.visibility)
                    )));
                }
                break;
            }
        }
        Ok(())
    }

    fn check_abstract_methods(&self, def: &ClassDef) -> Result<(), RuntimeError> {
        let mut seen: Vec<String> = Vec::new();
        let mut missing: Vec<String> = Vec::new();
        let mut visit = |method: &MethodDef| {
            let key = method.name.to_ascii_lowercase();
            if seen.contains(&key) {
                return;
            }
            seen.push(key);
            if method.is_abstract {
                missing.push(format!("{}::{}", method.class, method.name));
            }
        };
        let mut own: Vec<&Rc<MethodDef>> = def.methods.values().collect();
        own.sort_by(|a, b| a.name.cmp(&b.name));
        for method in own {
            visit(method);
        }
        if let Some(parent) = &def.parent {
            for ancestor in self.class_chain(parent) {
                if let Some(class) = self.find_class(&ancestor) {
                    let mut inherited: Vec<&Rc<MethodDef>> = class.methods.values().collect();
                    inherited.sort_by(|a, b| a.name.cmp(&b.name));
                    for method in inherited {
                        visit(method);
                    }
                }
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        Err(RuntimeError::new(format!(
            "Class {} contains {} abstract method{} and must therefore be declared abstract or implement the remaining methods ({})",
            def.name,
            missing.len(),
            if missing.len() == 1 { "" } else { "s" },
            missing.join(", ")
        )))
    }

    /// Allocate an object of `class` with every declared property
    /// initialized. Parent properties come first; private properties get a
    /// slot per declaring class.
    pub(super) fn instantiate(&mut self, class: &str) -> Result<ObjectRef, RuntimeError> {
        let mut chain = self.class_chain(class);
        chain.reverse();
        let mut object = Object::new(self.next_object_id, class);
        self.next_object_id += 1;
        for cn in chain {
            let props = match self.find_class(&cn) {
                Some(def) => def.props.clone(),
                None => continue,
            };
            for prop in props {
                let value = match &prop.default {
                    Some(expr) => self.in_class_scope(&cn, |interp| interp.eval(expr))?,
                    None => Value::Null,
                };
                let owner = (prop.visibility == Visibility::Private).then(|| cn.clone());
                let slot = PropSlot {
                    name: prop.name.clone(),
                    owner: owner.clone(),
                    declared_in: Some(cn.clone()),
                    visibility: prop.visibility,
                    value,
                };
                match object.slot_index(&prop.name, owner.as_deref()) {
                    Some(idx) => object.props[idx] = slot,
                    None => object.props.push(slot),
                }
            }
        }
        crate::trace::trace_log!(
            "class",
            "new {}#{} ({} slots)",
            object.class_name,
            object.id,
            object.props.len()
        );
        Ok(Rc::new(RefCell::new(object)))
    }
}

fn rank(visibility: Visibility) -> u8 {
    match visibility {
        Visibility::Public => 0,
        Visibility::Protected => 1,
        Visibility::Private => 2,
    }
}

fn weaker_suffix(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Protected => " or weaker",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use crate::Interpreter;

    #[test]
    fn unknown_parent_is_reported() {
        let mut interp = Interpreter::new();
        let err = interp.run("<?php class B extends Missing {}").unwrap_err();
        assert_eq!(err.message, "Class \"Missing\" not found");
    }

    #[test]
    fn duplicate_class_is_rejected() {
        let mut interp = Interpreter::new();
        let err = interp.run("<?php class A {} class a {}").unwrap_err();
        assert!(err.message.starts_with("Cannot declare class a"));
    }

    #[test]
    fn narrowing_inherited_visibility_is_rejected() {
        let mut interp = Interpreter::new();
        let err = interp
            .run("<?php class A { public function f() {} } class B extends A { private function f() {} }")
            .unwrap_err();
        assert_eq!(err.message, "Access level to B::f() must be public (as in class A)");
        assert!(err.is_access_violation());
    }

    #[test]
    fn redeclaring_a_private_parent_method_is_allowed() {
        let mut interp = Interpreter::new();
        let out = interp
            .run("<?php class A { private function f() {} } class B extends A { private function f() { return 1; } } echo 'ok';")
            .unwrap();
        assert_eq!(out, "ok");
    }

    #[test]
    fn concrete_class_must_implement_abstract_methods() {
        let mut interp = Interpreter::new();
        let err = interp
            .run("<?php abstract class A { abstract function f(); } class B extends A {}")
            .unwrap_err();
        assert!(err.message.contains("1 abstract method"));
        assert!(err.message.contains("A::f"));
    }

    #[test]
    fn constructor_may_narrow_a_concrete_parent_constructor() {
        let mut interp = Interpreter::new();
        let out = interp
            .run("<?php
class A { public function __construct() {} }
class B extends A {
    private function __construct() { parent::__construct(); }
    static function make() { return new B; }
}
B::make();
echo 'made';")
            .unwrap();
        assert_eq!(out, "made");
    }

    #[test]
    fn abstract_constructor_keeps_its_visibility() {
        let mut interp = Interpreter::new();
        let err = interp
            .run("<?php abstract class A { abstract public function __construct(); } class B extends A { private function __construct() {} }")
            .unwrap_err();
        assert_eq!(
            err.message,
            "Access level to B::__construct() must be public (as in class A)"
        );
    }

    #[test]
    fn parent_properties_come_first() {
        let mut interp = Interpreter::new();
        let out = interp
            .run("<?php class A { public $a = 1; } class B extends A { public $b = 2; } print_r(new B);")
            .unwrap();
        assert_eq!(out, "B Object\n(\n    [a] => 1\n    [b] => 2\n)\n");
    }

    #[test]
    fn static_defaults_see_class_constants() {
        let mut interp = Interpreter::new();
        let out = interp
            .run("<?php class A { const N = 3; public static $n = self::N * 2; } echo A::$n;")
            .unwrap();
        assert_eq!(out, "6");
    }
}
