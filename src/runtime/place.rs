//! Assignment targets.
//!
//! An lvalue such as `$this->items['k'][]` is resolved once into a root
//! storage location plus a path of array keys. Keys are evaluated up front,
//! so reading and then writing the same place never re-runs side effects.

use super::class::class_key;
use super::*;
use crate::ast::Expr;
use crate::value::{ArrayKey, PhpArray, PropSlot};

pub(super) enum PlaceRoot {
    Var(String),
    Prop {
        object: ObjectRef,
        name: String,
        prop: access::PropertyRef,
    },
    Static {
        class: String,
        name: String,
    },
}

pub(super) struct Place {
    root: PlaceRoot,
    /// `None` is an append (`[]`).
    path: Vec<Option<ArrayKey>>,
}

fn vivify_array(slot: &mut Value) -> Result<&mut PhpArray, RuntimeError> {
    if matches!(slot, Value::Null | Value::Bool(false)) {
        *slot = Value::empty_array();
    }
    match slot {
        Value::Array(arr) => Ok(arr),
        Value::Str(_) => Err(RuntimeError::new("Cannot use string offset as an array")),
        Value::Object(obj) => Err(RuntimeError::type_error(format!(
            "Cannot use object of type {} as array",
            obj.borrow().class_name
        ))),
        _ => Err(RuntimeError::type_error("Cannot use a scalar value as an array")),
    }
}

/// Walk `path` from `slot`. With `create`, missing levels spring into
/// existence; without it a missing level yields `None`.
fn descend<'a>(
    mut slot: &'a mut Value,
    path: &[Option<ArrayKey>],
    create: bool,
) -> Result<Option<&'a mut Value>, RuntimeError> {
    for step in path {
        if !create && !matches!(slot, Value::Array(_)) {
            return Ok(None);
        }
        let arr = vivify_array(slot)?;
        slot = match step {
            Some(key) if create => arr.entry(key.clone()),
            Some(key) => match arr.get_mut(key) {
                Some(next) => next,
                None => return Ok(None),
            },
            None if create => arr.push_slot(),
            None => return Ok(None),
        };
    }
    Ok(Some(slot))
}

fn read_path(mut value: &Value, path: &[Option<ArrayKey>]) -> Value {
    for step in path {
        let next = match (value, step) {
            (Value::Array(arr), Some(key)) => arr.get(key),
            _ => None,
        };
        match next {
            Some(next) => value = next,
            None => return Value::Null,
        }
    }
    value.clone()
}

impl Interpreter {
    pub(super) fn resolve_place(&mut self, expr: &Expr) -> Result<Place, RuntimeError> {
        match expr {
            Expr::Var(name) => Ok(Place {
                root: PlaceRoot::Var(name.clone()),
                path: Vec::new(),
            }),
            Expr::This => Err(RuntimeError::new("Cannot re-assign $this")),
            Expr::Index { base, index } => {
                let mut place = self.resolve_place(base)?;
                let key = match index {
                    Some(index) => {
                        let key = self.eval(index)?;
                        Some(self.array_key(&key)?)
                    }
                    None => None,
                };
                place.path.push(key);
                Ok(place)
            }
            Expr::Prop { object, name } => {
                let target = self.eval(object)?;
                let Value::Object(object) = target else {
                    return Err(RuntimeError::new(format!(
                        "Attempt to assign property \"{}\" on {}",
                        name,
                        target.debug_type()
                    )));
                };
                let class = object.borrow().class_name.clone();
                let scope = self.current_scope();
                let prop = self.resolve_property(&class, name, scope.as_deref())?;
                Ok(Place {
                    root: PlaceRoot::Prop {
                        object,
                        name: name.clone(),
                        prop,
                    },
                    path: Vec::new(),
                })
            }
            Expr::StaticProp { class, name } => {
                let target = self.resolve_class_ref(class)?;
                let scope = self.current_scope();
                let declaring = self.resolve_static_prop(&target, name, scope.as_deref())?;
                Ok(Place {
                    root: PlaceRoot::Static {
                        class: declaring,
                        name: name.clone(),
                    },
                    path: Vec::new(),
                })
            }
            _ => Err(RuntimeError::new("Cannot assign to this expression")),
        }
    }

    pub(super) fn array_key(&self, value: &Value) -> Result<ArrayKey, RuntimeError> {
        ArrayKey::from_value(value).ok_or_else(|| {
            RuntimeError::type_error(format!("Illegal offset type: {}", value.debug_type()))
        })
    }

    /// Apply `f` to the storage behind `place`. Returns `None` when the
    /// place does not exist and `create` is false.
    pub(super) fn with_place_mut<R>(
        &mut self,
        place: &Place,
        create: bool,
        f: impl FnOnce(&mut Value) -> R,
    ) -> Result<Option<R>, RuntimeError> {
        match &place.root {
            PlaceRoot::Var(name) => {
                let frame = self.frame_mut();
                let root = if create {
                    frame.vars.entry(name.clone()).or_default()
                } else {
                    match frame.vars.get_mut(name) {
                        Some(root) => root,
                        None => return Ok(None),
                    }
                };
                Ok(descend(root, &place.path, create)?.map(f))
            }
            PlaceRoot::Prop { object, name, prop } => {
                let mut object = object.borrow_mut();
                let idx = match object.slot_index(name, prop.owner.as_deref()) {
                    Some(idx) => idx,
                    None if create => {
                        object.props.push(PropSlot {
                            name: name.clone(),
                            owner: prop.owner.clone(),
                            declared_in: prop.declared_in.clone(),
                            visibility: prop.visibility,
                            value: Value::Null,
                        });
                        object.props.len() - 1
                    }
                    None => return Ok(None),
                };
                Ok(descend(&mut object.props[idx].value, &place.path, create)?.map(f))
            }
            PlaceRoot::Static { class, name } => {
                let slot = self
                    .classes
                    .get_mut(&class_key(class))
                    .and_then(|def| def.static_props.get_mut(name))
                    .ok_or_else(|| {
                        RuntimeError::undefined_member(format!(
                            "Access to undeclared static property {}::${}",
                            class, name
                        ))
                    })?;
                Ok(descend(&mut slot.value, &place.path, create)?.map(f))
            }
        }
    }

    pub(super) fn write_place(&mut self, place: &Place, value: Value) -> Result<(), RuntimeError> {
        self.with_place_mut(place, true, |slot| *slot = value)?;
        Ok(())
    }

    /// Current value at `place`, `NULL` when absent. Reading an undefined
    /// variable warns; missing keys and properties are silent because the
    /// caller is about to write them.
    pub(super) fn read_place(&mut self, place: &Place) -> Value {
        match &place.root {
            PlaceRoot::Var(name) => match self.frame().vars.get(name) {
                Some(root) => read_path(root, &place.path),
                None => {
                    self.warn(format!("Undefined variable ${}", name));
                    Value::Null
                }
            },
            PlaceRoot::Prop { object, name, prop } => {
                let object = object.borrow();
                match object.slot_index(name, prop.owner.as_deref()) {
                    Some(idx) => read_path(&object.props[idx].value, &place.path),
                    None => Value::Null,
                }
            }
            PlaceRoot::Static { class, name } => self
                .find_class(class)
                .and_then(|def| def.static_props.get(name))
                .map(|slot| read_path(&slot.value, &place.path))
                .unwrap_or_default(),
        }
    }

    pub(super) fn assign(&mut self, target: &Expr, value: Value) -> Result<(), RuntimeError> {
        let place = self.resolve_place(target)?;
        self.write_place(&place, value)
    }

    pub(super) fn unset(&mut self, target: &Expr) -> Result<(), RuntimeError> {
        match target {
            Expr::Var(name) => {
                self.frame_mut().vars.remove(name);
                Ok(())
            }
            Expr::Index {
                base,
                index: Some(index),
            } => {
                let place = self.resolve_place(base)?;
                let key = self.eval(index)?;
                let key = self.array_key(&key)?;
                self.with_place_mut(&place, false, |slot| {
                    if let Value::Array(arr) = slot {
                        arr.remove(&key);
                    }
                })?;
                Ok(())
            }
            Expr::Prop { .. } => {
                let place = self.resolve_place(target)?;
                if let PlaceRoot::Prop { object, name, prop } = &place.root {
                    let mut object = object.borrow_mut();
                    if let Some(idx) = object.slot_index(name, prop.owner.as_deref()) {
                        object.props.remove(idx);
                    }
                }
                Ok(())
            }
            Expr::StaticProp { .. } => Err(RuntimeError::new("Attempt to unset static property")),
            _ => Err(RuntimeError::new(
                "Cannot use unset() on the result of an expression",
            )),
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
    fn nested_append_creates_intermediate_arrays() {
        assert_eq!(
            run("<?php $a['x'][] = 1; $a['x'][] = 2; echo count($a['x']);"),
            "2"
        );
    }

    #[test]
    fn arrays_copy_on_assignment() {
        assert_eq!(run("<?php $a = [1]; $b = $a; $b[] = 2; echo count($a), count($b);"), "12");
    }

    #[test]
    fn objects_share_on_assignment() {
        assert_eq!(
            run("<?php class P { public $v = 1; } $a = new P; $b = $a; $b->v = 5; echo $a->v;"),
            "5"
        );
    }

    #[test]
    fn compound_append_appends_once() {
        assert_eq!(run("<?php $a = []; $a[] .= 'x'; echo count($a), $a[0];"), "1x");
    }

    #[test]
    fn unset_removes_keys_and_properties() {
        let out = run("<?php $a = [1, 2, 3]; unset($a[1]); echo implode(',', $a);
            class P { public $v = 1; } $p = new P; unset($p->v); echo isset($p->v) ? 'y' : 'n';");
        assert_eq!(out, "1,3n");
    }

    #[test]
    fn scalar_cannot_become_an_array() {
        let err = Interpreter::new().run("<?php $x = 5; $x[] = 1;").unwrap_err();
        assert_eq!(err.message, "Cannot use a scalar value as an array");
    }
}
