use super::class::ConstState;
use super::*;
use crate::ast::{ArrayItem, BinaryOp, CastKind, ClassRef, Expr, UnaryOp, Visibility};
use crate::value::{ArrayKey, Numeric, PhpArray, PhpString, numeric_string, parse_numeric_prefix};

fn op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Pow => "**",
        BinaryOp::Concat => ".",
        BinaryOp::Eq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::Identical => "===",
        BinaryOp::NotIdentical => "!==",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::Spaceship => "<=>",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
        BinaryOp::Xor => "xor",
    }
}

/// `$s++` on a non-numeric string: alphanumeric carry, `"Az"` becomes `"Ba"`
/// and `"zz"` becomes `"aaa"`.
fn str_increment(s: &PhpString) -> PhpString {
    if s.is_empty() {
        return "1".into();
    }
    let mut bytes = s.as_bytes().to_vec();
    let mut i = bytes.len();
    loop {
        if i == 0 {
            let carry = match bytes[0] {
                b'0'..=b'9' => b'1',
                b'a'..=b'z' => b'a',
                _ => b'A',
            };
            bytes.insert(0, carry);
            break;
        }
        i -= 1;
        match bytes[i] {
            b'z' => bytes[i] = b'a',
            b'Z' => bytes[i] = b'A',
            b'9' => bytes[i] = b'0',
            c if c.is_ascii_alphanumeric() => {
                bytes[i] = c + 1;
                break;
            }
            _ => break,
        }
    }
    bytes.into()
}

fn int_or_float(checked: Option<i64>, fallback: f64) -> Value {
    match checked {
        Some(i) => Value::Int(i),
        None => Value::Float(fallback),
    }
}

impl Interpreter {
    pub(super) fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Interpolated(parts) => {
                let mut out = PhpString::new();
                for part in parts {
                    let value = self.eval(part)?;
                    out.push_bytes(self.to_php_string(&value)?.as_bytes());
                }
                Ok(Value::Str(out))
            }
            Expr::Var(name) => Ok(self.read_var(name)),
            Expr::This => match &self.frame().this {
                Some(this) => Ok(Value::Object(this.clone())),
                None => Err(RuntimeError::new(
                    "Using $this when not in object context",
                )),
            },
            Expr::Const(name) => self.constant(name),
            Expr::ArrayLiteral(items) => self.eval_array_literal(items),
            Expr::Index { base, index } => {
                let Some(index) = index else {
                    return Err(RuntimeError::new("Cannot use [] for reading"));
                };
                let container = self.eval(base)?;
                let key = self.eval(index)?;
                self.read_index(&container, &key)
            }
            Expr::Prop { object, name } => {
                let target = self.eval(object)?;
                self.read_property(&target, name)
            }
            Expr::StaticProp { class, name } => {
                let target = self.resolve_class_ref(class)?;
                let scope = self.current_scope();
                let declaring = self.resolve_static_prop(&target, name, scope.as_deref())?;
                Ok(self
                    .find_class(&declaring)
                    .and_then(|def| def.static_props.get(name))
                    .map(|slot| slot.value.clone())
                    .unwrap_or_default())
            }
            Expr::ClassConst { class, name } => self.class_constant(class, name),
            Expr::Call { name, args } => {
                let args = self.eval_args(args)?;
                self.call_function(name, args)
            }
            Expr::MethodCall { object, name, args } => {
                let target = self.eval(object)?;
                let args = self.eval_args(args)?;
                self.call_method_on(&target, name, args)
            }
            Expr::StaticCall { class, name, args } => {
                let args = self.eval_args(args)?;
                self.call_static(class, name, args)
            }
            Expr::New { class, args } => {
                let args = self.eval_args(args)?;
                self.new_object(class, args)
            }
            Expr::Assign { target, value } => {
                let value = self.eval(value)?;
                self.assign(target, value.clone())?;
                Ok(value)
            }
            Expr::CompoundAssign { op, target, value } => {
                let place = self.resolve_place(target)?;
                let rhs = self.eval(value)?;
                let current = self.read_place(&place);
                let result = self.binary(*op, &current, &rhs)?;
                self.write_place(&place, result.clone())?;
                Ok(result)
            }
            Expr::CoalesceAssign { target, value } => {
                if let Some(current) = self.eval_quiet(target)?
                    && !current.is_null()
                {
                    return Ok(current);
                }
                let value = self.eval(value)?;
                self.assign(target, value.clone())?;
                Ok(value)
            }
            Expr::IncDec {
                target,
                increment,
                prefix,
            } => {
                let place = self.resolve_place(target)?;
                let old = self.read_place(&place);
                let new = self.inc_dec(&old, *increment)?;
                self.write_place(&place, new.clone())?;
                Ok(if *prefix { new } else { old })
            }
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right),
            Expr::Unary { op, expr } => {
                let value = self.eval(expr)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                    UnaryOp::Neg => match value {
                        Value::Int(i) => Ok(int_or_float(i.checked_neg(), -(i as f64))),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        other => self.arithmetic(BinaryOp::Mul, &other, &Value::Int(-1)),
                    },
                    UnaryOp::Plus => self.arithmetic(BinaryOp::Mul, &value, &Value::Int(1)),
                }
            }
            Expr::Coalesce { left, right } => match self.eval_quiet(left)? {
                Some(value) if !value.is_null() => Ok(value),
                _ => self.eval(right),
            },
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                let cond = self.eval(cond)?;
                if cond.truthy() {
                    match then_expr {
                        Some(then_expr) => self.eval(then_expr),
                        None => Ok(cond),
                    }
                } else {
                    self.eval(else_expr)
                }
            }
            Expr::InstanceOf { expr, class } => {
                let value = self.eval(expr)?;
                let Value::Object(obj) = value else {
                    return Ok(Value::Bool(false));
                };
                let target = match class {
                    ClassRef::Named(name) => match self.find_class(name) {
                        Some(def) => def.name.clone(),
                        None => return Ok(Value::Bool(false)),
                    },
                    other => self.resolve_class_ref(other)?,
                };
                let class_name = obj.borrow().class_name.clone();
                Ok(Value::Bool(self.is_subclass_of(&class_name, &target)))
            }
            Expr::Cast { kind, expr } => {
                let value = self.eval(expr)?;
                self.cast(*kind, value)
            }
            Expr::Isset(targets) => {
                for target in targets {
                    match self.eval_quiet(target)? {
                        Some(value) if !value.is_null() => {}
                        _ => return Ok(Value::Bool(false)),
                    }
                }
                Ok(Value::Bool(true))
            }
            Expr::Empty(target) => Ok(Value::Bool(
                !self.eval_quiet(target)?.is_some_and(|v| v.truthy()),
            )),
            Expr::Print(expr) => {
                let value = self.eval(expr)?;
                let text = self.to_php_string(&value)?;
                self.emit_output(&text);
                Ok(Value::Int(1))
            }
        }
    }

    fn read_var(&mut self, name: &str) -> Value {
        match self.frame().vars.get(name) {
            Some(value) => value.clone(),
            None => {
                self.warn(format!("Undefined variable ${}", name));
                Value::Null
            }
        }
    }

    /// Evaluation for `isset`, `empty` and `??`: missing variables, keys and
    /// properties, and members the scope may not see, yield `None` instead
    /// of warnings or errors.
    pub(super) fn eval_quiet(&mut self, expr: &Expr) -> Result<Option<Value>, RuntimeError> {
        match expr {
            Expr::Var(name) => Ok(self.frame().vars.get(name).cloned()),
            Expr::This => Ok(self.frame().this.clone().map(Value::Object)),
            Expr::Index {
                base,
                index: Some(index),
            } => {
                let Some(container) = self.eval_quiet(base)? else {
                    return Ok(None);
                };
                let key = self.eval(index)?;
                Ok(match &container {
                    Value::Array(arr) => {
                        ArrayKey::from_value(&key).and_then(|key| arr.get(&key).cloned())
                    }
                    Value::Str(s) => string_offset(s, key.to_int()).map(Value::Str),
                    _ => None,
                })
            }
            Expr::Prop { object, name } => {
                let Some(Value::Object(obj)) = self.eval_quiet(object)? else {
                    return Ok(None);
                };
                let class = obj.borrow().class_name.clone();
                let scope = self.current_scope();
                match self.resolve_property(&class, name, scope.as_deref()) {
                    Ok(prop) => {
                        let obj = obj.borrow();
                        Ok(obj
                            .slot_index(name, prop.owner.as_deref())
                            .map(|idx| obj.props[idx].value.clone()))
                    }
                    Err(err) if err.is_access_violation() => Ok(None),
                    Err(err) => Err(err),
                }
            }
            Expr::StaticProp { class, name } => {
                let target = self.resolve_class_ref(class)?;
                let scope = self.current_scope();
                match self.resolve_static_prop(&target, name, scope.as_deref()) {
                    Ok(declaring) => Ok(self
                        .find_class(&declaring)
                        .and_then(|def| def.static_props.get(name))
                        .map(|slot| slot.value.clone())),
                    Err(_) => Ok(None),
                }
            }
            _ => Ok(Some(self.eval(expr)?)),
        }
    }

    fn eval_array_literal(&mut self, items: &[ArrayItem]) -> Result<Value, RuntimeError> {
        let mut arr = PhpArray::new();
        for item in items {
            let value = self.eval(&item.value)?;
            match &item.key {
                Some(key) => {
                    let key = self.eval(key)?;
                    let key = self.array_key(&key)?;
                    arr.insert(key, value);
                }
                None => arr.push(value),
            }
        }
        Ok(Value::Array(arr))
    }

    pub(super) fn read_index(&mut self, container: &Value, key: &Value) -> Result<Value, RuntimeError> {
        match container {
            Value::Array(arr) => {
                let key = self.array_key(key)?;
                match arr.get(&key) {
                    Some(value) => Ok(value.clone()),
                    None => {
                        match &key {
                            ArrayKey::Int(i) => self.warn(format!("Undefined array key {}", i)),
                            ArrayKey::Str(s) => self.warn(format!("Undefined array key \"{}\"", s)),
                        }
                        Ok(Value::Null)
                    }
                }
            }
            Value::Str(s) => {
                let offset = key.to_int();
                match string_offset(s, offset) {
                    Some(ch) => Ok(Value::Str(ch)),
                    None => {
                        self.warn(format!("Uninitialized string offset {}", offset));
                        Ok(Value::str(""))
                    }
                }
            }
            Value::Object(obj) => Err(RuntimeError::type_error(format!(
                "Cannot use object of type {} as array",
                obj.borrow().class_name
            ))),
            other => {
                self.warn(format!(
                    "Trying to access array offset on value of type {}",
                    other.debug_type()
                ));
                Ok(Value::Null)
            }
        }
    }

    pub(super) fn read_property(&mut self, target: &Value, name: &str) -> Result<Value, RuntimeError> {
        let Value::Object(obj) = target else {
            self.warn(format!(
                "Attempt to read property \"{}\" on {}",
                name,
                target.debug_type()
            ));
            return Ok(Value::Null);
        };
        let class = obj.borrow().class_name.clone();
        let scope = self.current_scope();
        let prop = self.resolve_property(&class, name, scope.as_deref())?;
        let found = {
            let obj = obj.borrow();
            obj.slot_index(name, prop.owner.as_deref())
                .map(|idx| obj.props[idx].value.clone())
        };
        match found {
            Some(value) => Ok(value),
            None => {
                self.warn(format!("Undefined property: {}::${}", class, name));
                Ok(Value::Null)
            }
        }
    }

    /// Resolve `self`, `parent`, `static` or a class name to a declared class.
    pub(super) fn resolve_class_ref(&self, class: &ClassRef) -> Result<String, RuntimeError> {
        match class {
            ClassRef::Named(name) => self.lookup_class(name),
            ClassRef::SelfRef => self.current_scope().ok_or_else(|| {
                RuntimeError::new("Cannot use \"self\" when no class scope is active")
            }),
            ClassRef::Parent => {
                let scope = self.current_scope().ok_or_else(|| {
                    RuntimeError::new("Cannot use \"parent\" when no class scope is active")
                })?;
                self.parent_of(&scope).ok_or_else(|| {
                    RuntimeError::new("Cannot use \"parent\" when current class scope has no parent")
                })
            }
            ClassRef::Static => self.frame().static_class.clone().ok_or_else(|| {
                RuntimeError::new("Cannot use \"static\" when no class scope is active")
            }),
        }
    }

    fn class_constant(&mut self, class: &ClassRef, name: &str) -> Result<Value, RuntimeError> {
        if name.eq_ignore_ascii_case("class") {
            return match class {
                ClassRef::Named(name) => Ok(Value::str(name.clone())),
                other => Ok(Value::str(self.resolve_class_ref(other)?)),
            };
        }
        let target = self.resolve_class_ref(class)?;
        let scope = self.current_scope();
        let declaring = self.resolve_class_const(&target, name, scope.as_deref())?;
        let key = class::class_key(&declaring);
        let pending = {
            let Some(slot) = self
                .classes
                .get_mut(&key)
                .and_then(|def| def.consts.get_mut(name))
            else {
                return Ok(Value::Null);
            };
            match std::mem::replace(&mut slot.state, ConstState::Evaluating) {
                ConstState::Ready(value) => {
                    slot.state = ConstState::Ready(value.clone());
                    return Ok(value);
                }
                ConstState::Evaluating => {
                    return Err(RuntimeError::new(format!(
                        "Cannot declare self-referencing constant {}::{}",
                        declaring, name
                    )));
                }
                ConstState::Pending(expr) => expr,
            }
        };
        let result = self.in_class_scope(&declaring, |interp| interp.eval(&pending));
        if let Some(slot) = self
            .classes
            .get_mut(&key)
            .and_then(|def| def.consts.get_mut(name))
        {
            slot.state = match &result {
                Ok(value) => ConstState::Ready(value.clone()),
                Err(_) => ConstState::Pending(pending),
            };
        }
        result
    }

    fn constant(&self, name: &str) -> Result<Value, RuntimeError> {
        Ok(match name {
            "PHP_EOL" => Value::str("\n"),
            "PHP_INT_MAX" => Value::Int(i64::MAX),
            "PHP_INT_MIN" => Value::Int(i64::MIN),
            "PHP_INT_SIZE" => Value::Int(8),
            "PHP_FLOAT_EPSILON" => Value::Float(f64::EPSILON),
            "PHP_FLOAT_MAX" => Value::Float(f64::MAX),
            "NAN" => Value::Float(f64::NAN),
            "INF" => Value::Float(f64::INFINITY),
            "M_PI" => Value::Float(std::f64::consts::PI),
            "COUNT_RECURSIVE" => Value::Int(1),
            "COUNT_NORMAL" => Value::Int(0),
            _ => {
                return Err(RuntimeError::undefined_symbol(format!(
                    "Undefined constant \"{}\"",
                    name
                )));
            }
        })
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value, RuntimeError> {
        match op {
            BinaryOp::And => {
                let result = self.eval(left)?.truthy() && self.eval(right)?.truthy();
                Ok(Value::Bool(result))
            }
            BinaryOp::Or => {
                let result = self.eval(left)?.truthy() || self.eval(right)?.truthy();
                Ok(Value::Bool(result))
            }
            _ => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary(op, &left, &right)
            }
        }
    }

    pub(super) fn binary(&mut self, op: BinaryOp, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
        Ok(match op {
            BinaryOp::Concat => {
                let mut text = self.to_php_string(a)?;
                text.push_bytes(self.to_php_string(b)?.as_bytes());
                Value::Str(text)
            }
            BinaryOp::Eq => Value::Bool(a.loose_equals(b)),
            BinaryOp::NotEq => Value::Bool(!a.loose_equals(b)),
            BinaryOp::Identical => Value::Bool(a.strict_equals(b)),
            BinaryOp::NotIdentical => Value::Bool(!a.strict_equals(b)),
            BinaryOp::Lt => Value::Bool(a.compare(b) < 0),
            BinaryOp::Le => Value::Bool(a.compare(b) <= 0),
            BinaryOp::Gt => Value::Bool(a.compare(b) > 0),
            BinaryOp::Ge => Value::Bool(a.compare(b) >= 0),
            BinaryOp::Spaceship => Value::Int(a.compare(b)),
            BinaryOp::And => Value::Bool(a.truthy() && b.truthy()),
            BinaryOp::Or => Value::Bool(a.truthy() || b.truthy()),
            BinaryOp::Xor => Value::Bool(a.truthy() != b.truthy()),
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::Pow => return self.arithmetic(op, a, b),
        })
    }

    fn operand(&mut self, op: BinaryOp, value: &Value, a: &Value, b: &Value) -> Result<Numeric, RuntimeError> {
        let unsupported = || {
            RuntimeError::type_error(format!(
                "Unsupported operand types: {} {} {}",
                a.debug_type(),
                op_symbol(op),
                b.debug_type()
            ))
        };
        match value {
            Value::Str(s) => {
                if let Some(num) = numeric_string(s) {
                    return Ok(num);
                }
                match parse_numeric_prefix(s) {
                    Some(num) => {
                        self.warn("A non-numeric value encountered");
                        Ok(num)
                    }
                    None => Err(unsupported()),
                }
            }
            other => other.to_number().ok_or_else(unsupported),
        }
    }

    pub(super) fn arithmetic(&mut self, op: BinaryOp, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
        if op == BinaryOp::Add
            && let (Value::Array(left), Value::Array(right)) = (a, b)
        {
            let mut union = left.clone();
            for (key, value) in right.iter() {
                if !union.contains_key(key) {
                    union.insert(key.clone(), value.clone());
                }
            }
            return Ok(Value::Array(union));
        }
        if op == BinaryOp::Mod {
            if a.to_number().is_none() || b.to_number().is_none() {
                return Err(RuntimeError::type_error(format!(
                    "Unsupported operand types: {} % {}",
                    a.debug_type(),
                    b.debug_type()
                )));
            }
            let divisor = b.to_int();
            if divisor == 0 {
                return Err(RuntimeError::arithmetic("Modulo by zero"));
            }
            return Ok(Value::Int(a.to_int().wrapping_rem(divisor)));
        }
        let x = self.operand(op, a, a, b)?;
        let y = self.operand(op, b, a, b)?;
        let (fx, fy) = (x.as_f64(), y.as_f64());
        Ok(match (op, x, y) {
            (BinaryOp::Add, Numeric::Int(i), Numeric::Int(j)) => int_or_float(i.checked_add(j), fx + fy),
            (BinaryOp::Sub, Numeric::Int(i), Numeric::Int(j)) => int_or_float(i.checked_sub(j), fx - fy),
            (BinaryOp::Mul, Numeric::Int(i), Numeric::Int(j)) => int_or_float(i.checked_mul(j), fx * fy),
            (BinaryOp::Add, ..) => Value::Float(fx + fy),
            (BinaryOp::Sub, ..) => Value::Float(fx - fy),
            (BinaryOp::Mul, ..) => Value::Float(fx * fy),
            (BinaryOp::Div, _, _) if fy == 0.0 => {
                return Err(RuntimeError::arithmetic("Division by zero"));
            }
            (BinaryOp::Div, Numeric::Int(i), Numeric::Int(j)) => {
                match i.checked_rem(j) {
                    Some(0) => int_or_float(i.checked_div(j), fx / fy),
                    _ => Value::Float(fx / fy),
                }
            }
            (BinaryOp::Div, ..) => Value::Float(fx / fy),
            (BinaryOp::Pow, Numeric::Int(i), Numeric::Int(j)) if j >= 0 => {
                let checked = u32::try_from(j).ok().and_then(|e| i.checked_pow(e));
                int_or_float(checked, fx.powf(fy))
            }
            (BinaryOp::Pow, ..) => Value::Float(fx.powf(fy)),
            _ => return self.binary(op, a, b),
        })
    }

    fn inc_dec(&mut self, value: &Value, increment: bool) -> Result<Value, RuntimeError> {
        let step = if increment { 1 } else { -1 };
        Ok(match value {
            Value::Null if increment => Value::Int(1),
            Value::Null => Value::Null,
            Value::Int(i) => int_or_float(i.checked_add(step), *i as f64 + step as f64),
            Value::Float(f) => Value::Float(f + step as f64),
            Value::Bool(_) => value.clone(),
            Value::Str(s) => match numeric_string(s) {
                Some(Numeric::Int(i)) => int_or_float(i.checked_add(step), i as f64 + step as f64),
                Some(Numeric::Float(f)) => Value::Float(f + step as f64),
                None if s.is_empty() && !increment => Value::Int(-1),
                None if increment => Value::Str(str_increment(s)),
                None => value.clone(),
            },
            Value::Array(_) | Value::Object(_) => {
                return Err(RuntimeError::type_error(format!(
                    "Cannot {} {}",
                    if increment { "increment" } else { "decrement" },
                    value.debug_type()
                )));
            }
        })
    }

    fn cast(&mut self, kind: CastKind, value: Value) -> Result<Value, RuntimeError> {
        Ok(match kind {
            CastKind::Int => Value::Int(value.to_int()),
            CastKind::Float => Value::Float(value.to_float()),
            CastKind::String => Value::Str(self.to_php_string(&value)?),
            CastKind::Bool => Value::Bool(value.truthy()),
            CastKind::Array => match value {
                Value::Array(_) => value,
                Value::Null => Value::empty_array(),
                Value::Object(obj) => {
                    let mut arr = PhpArray::new();
                    for slot in &obj.borrow().props {
                        let key = match (slot.visibility, &slot.owner) {
                            (Visibility::Private, Some(owner)) => {
                                format!("\0{}\0{}", owner, slot.name)
                            }
                            (Visibility::Protected, _) => format!("\0*\0{}", slot.name),
                            _ => slot.name.clone(),
                        };
                        arr.insert(ArrayKey::from_str_key(&key), slot.value.clone());
                    }
                    Value::Array(arr)
                }
                scalar => Value::Array(PhpArray::from_values([scalar])),
            },
        })
    }

    /// PHP string conversion. Objects convert through `__toString()`.
    pub(super) fn to_php_string(&mut self, value: &Value) -> Result<PhpString, RuntimeError> {
        match value {
            Value::Array(_) => {
                self.warn("Array to string conversion");
                Ok("Array".into())
            }
            Value::Object(obj) => {
                let class = obj.borrow().class_name.clone();
                let Some(method) = self.find_method(&class, "__toString") else {
                    return Err(RuntimeError::type_error(format!(
                        "Object of class {} could not be converted to string",
                        class
                    )));
                };
                match self.invoke_method(&method, Some(obj.clone()), class, Vec::new())? {
                    Value::Str(s) => Ok(s),
                    other => Err(RuntimeError::type_error(format!(
                        "{}::__toString(): Return value must be of type string, {} returned",
                        method.class,
                        other.debug_type()
                    ))),
                }
            }
            scalar => Ok(scalar.scalar_to_string().unwrap_or_default()),
        }
    }
}

/// One-byte string at `offset`; negative offsets count from the end.
fn string_offset(s: &PhpString, offset: i64) -> Option<PhpString> {
    let len = s.len() as i64;
    let idx = if offset < 0 { len + offset } else { offset };
    if idx < 0 || idx >= len {
        return None;
    }
    Some(PhpString::from(vec![s.as_bytes()[idx as usize]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RuntimeErrorCode;

    fn run(src: &str) -> String {
        Interpreter::new().run(src).unwrap()
    }

    fn run_err(src: &str) -> RuntimeError {
        Interpreter::new().run(src).unwrap_err()
    }

    #[test]
    fn integer_overflow_promotes_to_float() {
        assert_eq!(run("<?php echo gettype(PHP_INT_MAX + 1), gettype(PHP_INT_MAX - 1);"), "doubleinteger");
        assert_eq!(run("<?php echo 7 / 2, ' ', 6 / 3;"), "3.5 2");
    }

    #[test]
    fn division_and_modulo_by_zero() {
        assert_eq!(run_err("<?php echo 1 / 0;").message, "Division by zero");
        let err = run_err("<?php echo 1 % 0;");
        assert_eq!(err.message, "Modulo by zero");
        assert_eq!(err.code, Some(RuntimeErrorCode::ArithmeticError));
    }

    #[test]
    fn non_numeric_strings_reject_arithmetic() {
        let err = run_err("<?php echo 'abc' + 1;");
        assert_eq!(err.message, "Unsupported operand types: string + int");
    }

    #[test]
    fn leading_numeric_strings_warn() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.run("<?php echo '5 apples' + 1;").unwrap(), "6");
        assert_eq!(interp.warnings(), ["Warning: A non-numeric value encountered"]);
    }

    #[test]
    fn string_increment_carries() {
        let inc = |s: &str| str_increment(&s.into());
        assert_eq!(inc("a"), "b");
        assert_eq!(inc("Az"), "Ba");
        assert_eq!(inc("zz"), "aaa");
        assert_eq!(inc("a9"), "b0");
    }

    #[test]
    fn string_offsets_address_bytes() {
        let mut interp = Interpreter::new();
        interp.run("<?php var_dump('é'[0]); echo strlen('é'), '|', 'abc'[-1];").unwrap();
        assert_eq!(interp.output_bytes(), b"string(1) \"\xc3\"\n2|c");
    }

    #[test]
    fn coalesce_and_isset_are_quiet() {
        let mut interp = Interpreter::new();
        let out = interp
            .run("<?php $a = []; echo $a['x'] ?? 'd', isset($u) ? 1 : 0, empty($a['y']) ? 'e' : '';")
            .unwrap();
        assert_eq!(out, "d0e");
        assert!(interp.warnings().is_empty());
    }

    #[test]
    fn isset_on_hidden_property_is_false() {
        let out = run("<?php class A { private $p = 1; } echo isset((new A)->p) ? 'y' : 'n';");
        assert_eq!(out, "n");
    }

    #[test]
    fn interpolation_reads_properties_and_keys() {
        let out = run(
            "<?php class P { public $n = 'x'; } $p = new P; $a = ['k' => 2, 3];
             echo \"$p->n {$p->n} $a[k] $a[0] {$a['k']}\";",
        );
        assert_eq!(out, "x x 2 3 2");
    }

    #[test]
    fn to_string_magic_is_used() {
        let out = run("<?php class T { function __toString() { return 'T!'; } } echo new T, '.' . new T;");
        assert_eq!(out, "T!.T!");
        let err = run_err("<?php class U {} echo new U;");
        assert_eq!(err.message, "Object of class U could not be converted to string");
    }

    #[test]
    fn class_constants_resolve_lazily() {
        let out = run("<?php class A { const X = self::Y . '!'; const Y = 'y'; } echo A::X, A::class;");
        assert_eq!(out, "y!A");
        let err = run_err("<?php class B { const X = self::X; } echo B::X;");
        assert_eq!(err.message, "Cannot declare self-referencing constant B::X");
    }

    #[test]
    fn undefined_variable_warns() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.run("<?php echo $nope;").unwrap(), "");
        assert_eq!(interp.warnings(), ["Warning: Undefined variable $nope"]);
    }

    #[test]
    fn object_array_cast_mangles_hidden_names() {
        let out = run(
            "<?php class A { private $a = 1; protected $b = 2; public $c = 3; }
             echo implode(',', key_lengths((array) new A));
             function key_lengths($arr) { $out = []; foreach ($arr as $k => $v) { $out[] = strlen($k); } return $out; }",
        );
        assert_eq!(out, "4,4,1");
    }
}
