//! Member visibility checks.
//!
//! Every access site (`$o->p`, `$o->m()`, `C::m()`, `C::$p`, `C::K`,
//! `new C`) resolves the member it names and then asks whether the
//! executing scope may see it. A private member is visible only from its
//! declaring class; a protected member from any class on the same
//! inheritance line as the class that first declared it.

use super::class::MethodDef;
use super::*;
use crate::ast::Visibility;
use crate::trace::trace_log;

/// Where a property read or write lands.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PropertyRef {
    /// `Some(class)` for a private slot.
    pub(crate) owner: Option<String>,
    /// Declaring class; `None` for dynamic properties.
    pub(crate) declared_in: Option<String>,
    pub(crate) visibility: Visibility,
}

fn scope_label(scope: Option<&str>) -> String {
    match scope {
        Some(scope) => format!("scope {}", scope),
        None => "global scope".to_string(),
    }
}

impl Interpreter {
    /// Is a member declared with `visibility` in `declaring` reachable from
    /// `scope`? `root` is the class that first declared a protected member.
    pub(super) fn visibility_allows(
        &self,
        declaring: &str,
        root: &str,
        visibility: Visibility,
        scope: Option<&str>,
    ) -> bool {
        match visibility {
            Visibility::Public => true,
            Visibility::Private => scope == Some(declaring),
            Visibility::Protected => scope.is_some_and(|scope| {
                self.is_subclass_of(scope, root) || self.is_subclass_of(root, scope)
            }),
        }
    }

    /// Topmost ancestor of `class` that declares `member` non-privately.
    fn protected_root(&self, class: &str, declares: impl Fn(&str) -> bool) -> String {
        self.class_chain(class)
            .into_iter()
            .filter(|cn| declares(cn))
            .last()
            .unwrap_or_else(|| class.to_string())
    }

    pub(super) fn resolve_property(
        &self,
        class: &str,
        name: &str,
        scope: Option<&str>,
    ) -> Result<PropertyRef, RuntimeError> {
        // The scope's own private property wins when the object is an
        // instance of the scope class.
        if let Some(scope) = scope
            && self.is_subclass_of(class, scope)
            && let Some(prop) = self.own_property(scope, name)
            && prop.visibility == Visibility::Private
        {
            trace_log!("access", "{}::${} private slot of {}", class, name, scope);
            return Ok(PropertyRef {
                owner: Some(scope.to_string()),
                declared_in: Some(scope.to_string()),
                visibility: Visibility::Private,
            });
        }

        for cn in self.class_chain(class) {
            let Some(prop) = self.own_property(&cn, name) else {
                continue;
            };
            // Private properties of ancestors are invisible from here.
            if prop.visibility == Visibility::Private && !cn.eq_ignore_ascii_case(class) {
                continue;
            }
            let root = self.protected_root(&cn, |c| {
                self.own_property(c, name)
                    .is_some_and(|p| p.visibility != Visibility::Private)
            });
            let allowed = self.visibility_allows(&cn, &root, prop.visibility, scope);
            trace_log!(
                "access",
                "{}::${} ({}) from {}: {}",
                cn,
                name,
                prop.visibility,
                scope_label(scope),
                if allowed { "ok" } else { "denied" }
            );
            if !allowed {
                return Err(RuntimeError::access(format!(
                    "Cannot access {} property {}::${}",
                    prop.visibility, class, name
                )));
            }
            return Ok(PropertyRef {
                owner: (prop.visibility == Visibility::Private).then(|| cn.clone()),
                declared_in: Some(cn),
                visibility: prop.visibility,
            });
        }

        Ok(PropertyRef {
            owner: None,
            declared_in: None,
            visibility: Visibility::Public,
        })
    }

    /// Method called through an instance of `class` (or statically on it).
    pub(super) fn resolve_method(
        &self,
        class: &str,
        name: &str,
        scope: Option<&str>,
    ) -> Result<Rc<MethodDef>, RuntimeError> {
        if let Some(scope) = scope
            && self.is_subclass_of(class, scope)
            && let Some(method) = self.own_method(scope, name)
            && method.visibility == Visibility::Private
        {
            trace_log!("access", "{}::{}() private to {}", class, name, scope);
            return Ok(method);
        }

        let Some(method) = self.find_method(class, name) else {
            return Err(RuntimeError::undefined_member(format!(
                "Call to undefined method {}::{}()",
                class, name
            )));
        };
        self.check_method_access(&method, name, scope)?;
        Ok(method)
    }

    fn check_method_access(
        &self,
        method: &MethodDef,
        called_as: &str,
        scope: Option<&str>,
    ) -> Result<(), RuntimeError> {
        let root = self.protected_root(&method.class, |c| {
            self.own_method(c, called_as)
                .is_some_and(|m| m.visibility != Visibility::Private)
        });
        let allowed = self.visibility_allows(&method.class, &root, method.visibility, scope);
        trace_log!(
            "access",
            "{}::{}() ({}) from {}: {}",
            method.class,
            method.name,
            method.visibility,
            scope_label(scope),
            if allowed { "ok" } else { "denied" }
        );
        if allowed {
            return Ok(());
        }
        Err(RuntimeError::access(format!(
            "Call to {} method {}::{}() from {}",
            method.visibility,
            method.class,
            called_as,
            scope_label(scope)
        )))
    }

    /// The constructor `new class(...)` would run, after checking that the
    /// caller may invoke it.
    pub(super) fn resolve_constructor(
        &self,
        class: &str,
        scope: Option<&str>,
    ) -> Result<Option<Rc<MethodDef>>, RuntimeError> {
        let Some(ctor) = self.find_method(class, "__construct") else {
            return Ok(None);
        };
        let root = self.protected_root(&ctor.class, |c| {
            self.own_method(c, "__construct")
                .is_some_and(|m| m.visibility != Visibility::Private)
        });
        if self.visibility_allows(&ctor.class, &root, ctor.visibility, scope) {
            return Ok(Some(ctor));
        }
        trace_log!("access", "{}::__construct() denied from {}", class, scope_label(scope));
        Err(RuntimeError::access(format!(
            "Call to {} {}::__construct() from {}",
            ctor.visibility,
            class,
            scope_label(scope)
        )))
    }

    /// Declaring class of static property `name` as seen from `class`.
    pub(super) fn resolve_static_prop(
        &self,
        class: &str,
        name: &str,
        scope: Option<&str>,
    ) -> Result<String, RuntimeError> {
        for cn in self.class_chain(class) {
            let Some(slot) = self
                .find_class(&cn)
                .and_then(|def| def.static_props.get(name))
            else {
                continue;
            };
            let root = self.protected_root(&cn, |c| {
                self.find_class(c)
                    .and_then(|def| def.static_props.get(name))
                    .is_some_and(|s| s.visibility != Visibility::Private)
            });
            if !self.visibility_allows(&cn, &root, slot.visibility, scope) {
                trace_log!("access", "{}::${} (static) denied from {}", cn, name, scope_label(scope));
                return Err(RuntimeError::access(format!(
                    "Cannot access {} property {}::${}",
                    slot.visibility, class, name
                )));
            }
            return Ok(cn);
        }
        Err(RuntimeError::undefined_member(format!(
            "Access to undeclared static property {}::${}",
            class, name
        )))
    }

    /// Declaring class of constant `name` as seen from `class`.
    pub(super) fn resolve_class_const(
        &self,
        class: &str,
        name: &str,
        scope: Option<&str>,
    ) -> Result<String, RuntimeError> {
        for cn in self.class_chain(class) {
            let Some(slot) = self.find_class(&cn).and_then(|def| def.consts.get(name)) else {
                continue;
            };
            let root = self.protected_root(&cn, |c| {
                self.find_class(c)
                    .and_then(|def| def.consts.get(name))
                    .is_some_and(|s| s.visibility != Visibility::Private)
            });
            if !self.visibility_allows(&cn, &root, slot.visibility, scope) {
                trace_log!("access", "{}::{} (const) denied from {}", cn, name, scope_label(scope));
                return Err(RuntimeError::access(format!(
                    "Cannot access {} constant {}::{}",
                    slot.visibility, class, name
                )));
            }
            return Ok(cn);
        }
        Err(RuntimeError::undefined_member(format!(
            "Undefined constant {}::{}",
            class, name
        )))
    }

    /// Whether a property slot may be listed from `scope` (foreach over an
    /// object, `get_object_vars`-style views).
    pub(super) fn slot_visible(
        &self,
        declared_in: Option<&str>,
        name: &str,
        visibility: Visibility,
        scope: Option<&str>,
    ) -> bool {
        let Some(declaring) = declared_in else {
            return true;
        };
        let root = self.protected_root(declaring, |c| {
            self.own_property(c, name)
                .is_some_and(|p| p.visibility != Visibility::Private)
        });
        self.visibility_allows(declaring, &root, visibility, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interp_with(src: &str) -> Interpreter {
        let mut interp = Interpreter::new();
        interp.run(src).unwrap();
        interp
    }

    const HIERARCHY: &str = "<?php
class Base {
  private $secret = 1;
  protected $shared = 2;
  public $open = 3;
  private function hidden() {}
  protected function guarded() {}
}
class Derived extends Base {
  private $secret = 10;
}
class Other {}
";

    #[test]
    fn private_is_visible_only_from_the_declaring_class() {
        let interp = interp_with(HIERARCHY);
        assert!(interp.visibility_allows("Base", "Base", Visibility::Private, Some("Base")));
        assert!(!interp.visibility_allows("Base", "Base", Visibility::Private, Some("Derived")));
        assert!(!interp.visibility_allows("Base", "Base", Visibility::Private, None));
    }

    #[test]
    fn protected_follows_the_inheritance_line() {
        let interp = interp_with(HIERARCHY);
        assert!(interp.visibility_allows("Base", "Base", Visibility::Protected, Some("Derived")));
        assert!(interp.visibility_allows("Derived", "Base", Visibility::Protected, Some("Base")));
        assert!(!interp.visibility_allows("Base", "Base", Visibility::Protected, Some("Other")));
        assert!(!interp.visibility_allows("Base", "Base", Visibility::Protected, None));
    }

    #[test]
    fn scope_private_slot_wins_over_subclass_slot() {
        let interp = interp_with(HIERARCHY);
        let from_base = interp.resolve_property("Derived", "secret", Some("Base")).unwrap();
        assert_eq!(from_base.owner.as_deref(), Some("Base"));
        let from_derived = interp.resolve_property("Derived", "secret", Some("Derived")).unwrap();
        assert_eq!(from_derived.owner.as_deref(), Some("Derived"));
    }

    #[test]
    fn private_property_from_global_scope_is_denied() {
        let interp = interp_with(HIERARCHY);
        let err = interp.resolve_property("Base", "secret", None).unwrap_err();
        assert_eq!(err.message, "Cannot access private property Base::$secret");
        assert!(err.is_access_violation());
        let err = interp.resolve_property("Base", "shared", None).unwrap_err();
        assert_eq!(err.message, "Cannot access protected property Base::$shared");
    }

    #[test]
    fn inherited_private_property_looks_dynamic() {
        let interp = interp_with("<?php class A { private $x; } class B extends A {}");
        let prop = interp.resolve_property("B", "x", Some("B")).unwrap();
        assert_eq!(prop.declared_in, None);
        assert_eq!(prop.owner, None);
    }

    #[test]
    fn method_errors_name_the_calling_scope() {
        let interp = interp_with(HIERARCHY);
        let err = interp.resolve_method("Base", "hidden", None).unwrap_err();
        assert_eq!(
            err.message,
            "Call to private method Base::hidden() from global scope"
        );
        let err = interp
            .resolve_method("Derived", "hidden", Some("Derived"))
            .unwrap_err();
        assert_eq!(
            err.message,
            "Call to private method Base::hidden() from scope Derived"
        );
        assert!(interp.resolve_method("Derived", "guarded", Some("Derived")).is_ok());
        let err = interp.resolve_method("Base", "nothing", None).unwrap_err();
        assert_eq!(err.message, "Call to undefined method Base::nothing()");
    }

    #[test]
    fn siblings_share_a_protected_root() {
        let interp = interp_with(
            "<?php class A { protected function f() {} }
             class B extends A { protected function f() {} }
             class C extends A {}",
        );
        assert!(interp.resolve_method("B", "f", Some("C")).is_ok());
    }
}
