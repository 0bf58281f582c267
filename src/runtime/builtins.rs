use super::*;
use crate::value::{ArrayKey, PhpArray, PhpString};

const BUILTINS: &[&str] = &[
    "var_dump",
    "print_r",
    "count",
    "strlen",
    "implode",
    "in_array",
    "array_keys",
    "array_values",
    "array_merge",
    "is_array",
    "is_int",
    "is_string",
    "is_bool",
    "is_null",
    "is_object",
    "is_float",
    "gettype",
    "get_class",
    "intval",
    "strval",
    "str_repeat",
    "method_exists",
    "property_exists",
];

pub(super) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), RuntimeError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let (qualifier, expected) = if min == max {
        ("exactly", min)
    } else if args.len() < min {
        ("at least", min)
    } else {
        ("at most", max)
    };
    Err(RuntimeError::type_error(format!(
        "{}() expects {} {} argument{}, {} given",
        name,
        qualifier,
        expected,
        if expected == 1 { "" } else { "s" },
        args.len()
    )))
}

fn array_arg<'a>(
    func: &str,
    position: usize,
    param: &str,
    value: &'a Value,
) -> Result<&'a PhpArray, RuntimeError> {
    match value {
        Value::Array(arr) => Ok(arr),
        other => Err(RuntimeError::type_error(format!(
            "{}(): Argument #{} (${}) must be of type array, {} given",
            func,
            position,
            param,
            other.debug_type()
        ))),
    }
}

fn count_recursive(arr: &PhpArray) -> i64 {
    arr.values()
        .map(|v| match v {
            Value::Array(inner) => 1 + count_recursive(inner),
            _ => 1,
        })
        .sum()
}

impl Interpreter {
    fn string_arg(
        &mut self,
        func: &str,
        position: usize,
        param: &str,
        value: &Value,
    ) -> Result<PhpString, RuntimeError> {
        match value {
            Value::Array(_) => Err(RuntimeError::type_error(format!(
                "{}(): Argument #{} (${}) must be of type string, array given",
                func, position, param
            ))),
            other => self.to_php_string(other),
        }
    }

    /// Class named by an object or a class-name string.
    fn class_of(&self, value: &Value) -> Option<String> {
        match value {
            Value::Object(obj) => Some(obj.borrow().class_name.clone()),
            Value::Str(name) => self.find_class(&name.to_str_lossy()).map(|def| def.name.clone()),
            _ => None,
        }
    }

    pub(super) fn call_builtin(&mut self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        crate::trace::trace_log!("call", "builtin {}() with {} args", name, args.len());
        match name {
            "var_dump" => {
                arity(name, &args, 1, usize::MAX)?;
                for value in &args {
                    let text = dump::var_dump(value);
                    self.emit_output(&text);
                }
                Ok(Value::Null)
            }
            "print_r" => {
                arity(name, &args, 1, 2)?;
                let text = dump::print_r(&args[0]);
                if args.get(1).is_some_and(|r| r.truthy()) {
                    return Ok(Value::Str(text));
                }
                self.emit_output(&text);
                Ok(Value::Bool(true))
            }
            "count" => {
                arity(name, &args, 1, 2)?;
                let Value::Array(arr) = &args[0] else {
                    return Err(RuntimeError::type_error(format!(
                        "count(): Argument #1 ($value) must be of type Countable|array, {} given",
                        args[0].debug_type()
                    )));
                };
                if args.get(1).is_some_and(|mode| mode.to_int() == 1) {
                    return Ok(Value::Int(count_recursive(arr)));
                }
                Ok(Value::Int(arr.len() as i64))
            }
            "strlen" => {
                arity(name, &args, 1, 1)?;
                let s = self.string_arg(name, 1, "string", &args[0])?;
                Ok(Value::Int(s.len() as i64))
            }
            "implode" => {
                arity(name, &args, 1, 2)?;
                let (separator, pieces) = match (&args[0], args.get(1)) {
                    (Value::Array(arr), None) => (PhpString::new(), arr),
                    (sep, Some(Value::Array(arr))) => (self.string_arg(name, 1, "separator", sep)?, arr),
                    (Value::Array(arr), Some(sep)) => (self.string_arg(name, 2, "array", sep)?, arr),
                    (other, _) => {
                        return Err(RuntimeError::type_error(format!(
                            "implode(): Argument #2 ($array) must be of type ?array, {} given",
                            other.debug_type()
                        )));
                    }
                };
                let mut parts = Vec::with_capacity(pieces.len());
                for piece in pieces.values() {
                    parts.push(self.to_php_string(piece)?);
                }
                Ok(Value::Str(PhpString::join(&parts, &separator)))
            }
            "in_array" => {
                arity(name, &args, 2, 3)?;
                let haystack = array_arg(name, 2, "haystack", &args[1])?;
                let strict = args.get(2).is_some_and(|s| s.truthy());
                let needle = &args[0];
                Ok(Value::Bool(haystack.values().any(|v| {
                    if strict {
                        v.strict_equals(needle)
                    } else {
                        v.loose_equals(needle)
                    }
                })))
            }
            "array_keys" => {
                arity(name, &args, 1, 1)?;
                let arr = array_arg(name, 1, "array", &args[0])?;
                Ok(Value::Array(PhpArray::from_values(
                    arr.keys().map(ArrayKey::to_value),
                )))
            }
            "array_values" => {
                arity(name, &args, 1, 1)?;
                let arr = array_arg(name, 1, "array", &args[0])?;
                Ok(Value::Array(PhpArray::from_values(arr.values().cloned())))
            }
            "array_merge" => {
                let mut merged = PhpArray::new();
                for (i, arg) in args.iter().enumerate() {
                    let arr = array_arg(name, i + 1, "arrays", arg)?;
                    for (key, value) in arr.iter() {
                        match key {
                            ArrayKey::Int(_) => merged.push(value.clone()),
                            ArrayKey::Str(_) => merged.insert(key.clone(), value.clone()),
                        }
                    }
                }
                Ok(Value::Array(merged))
            }
            "is_array" | "is_int" | "is_string" | "is_bool" | "is_null" | "is_object"
            | "is_float" => {
                arity(name, &args, 1, 1)?;
                let v = &args[0];
                Ok(Value::Bool(match name {
                    "is_array" => matches!(v, Value::Array(_)),
                    "is_int" => matches!(v, Value::Int(_)),
                    "is_string" => matches!(v, Value::Str(_)),
                    "is_bool" => matches!(v, Value::Bool(_)),
                    "is_null" => v.is_null(),
                    "is_float" => matches!(v, Value::Float(_)),
                    _ => matches!(v, Value::Object(_)),
                }))
            }
            "gettype" => {
                arity(name, &args, 1, 1)?;
                Ok(Value::str(args[0].type_name()))
            }
            "get_class" => {
                arity(name, &args, 0, 1)?;
                match args.first() {
                    Some(Value::Object(obj)) => Ok(Value::str(obj.borrow().class_name.clone())),
                    Some(other) => Err(RuntimeError::type_error(format!(
                        "get_class(): Argument #1 ($object) must be of type object, {} given",
                        other.debug_type()
                    ))),
                    None => self.current_scope().map(Value::str).ok_or_else(|| {
                        RuntimeError::new("get_class() without arguments must be called from within a class")
                    }),
                }
            }
            "intval" => {
                arity(name, &args, 1, 2)?;
                let base = args.get(1).map_or(10, Value::to_int);
                match &args[0] {
                    Value::Str(s) if base != 10 => Ok(Value::Int(parse_radix(&s.to_str_lossy(), base))),
                    other => Ok(Value::Int(other.to_int())),
                }
            }
            "strval" => {
                arity(name, &args, 1, 1)?;
                Ok(Value::Str(self.to_php_string(&args[0])?))
            }
            "str_repeat" => {
                arity(name, &args, 2, 2)?;
                let s = self.string_arg(name, 1, "string", &args[0])?;
                let times = args[1].to_int();
                let times = usize::try_from(times).map_err(|_| {
                    RuntimeError::type_error(
                        "str_repeat(): Argument #2 ($times) must be greater than or equal to 0",
                    )
                })?;
                Ok(Value::Str(s.repeat(times)))
            }
            "method_exists" => {
                arity(name, &args, 2, 2)?;
                let method = self.string_arg(name, 2, "method", &args[1])?.to_str_lossy().into_owned();
                let found = self
                    .class_of(&args[0])
                    .is_some_and(|class| self.find_method(&class, &method).is_some());
                Ok(Value::Bool(found))
            }
            "property_exists" => {
                arity(name, &args, 2, 2)?;
                let prop = self.string_arg(name, 2, "property", &args[1])?.to_str_lossy().into_owned();
                if let Value::Object(obj) = &args[0]
                    && obj.borrow().has_any_slot(&prop)
                {
                    return Ok(Value::Bool(true));
                }
                let found = self.class_of(&args[0]).is_some_and(|class| {
                    self.class_chain(&class).iter().any(|cn| {
                        self.own_property(cn, &prop).is_some()
                            || self
                                .find_class(cn)
                                .is_some_and(|def| def.static_props.contains_key(&prop))
                    })
                });
                Ok(Value::Bool(found))
            }
            _ => Err(RuntimeError::undefined_symbol(format!(
                "Call to undefined function {}()",
                name
            ))),
        }
    }
}

/// `intval("ff", 16)`: leading digits valid in `base`, optional sign.
fn parse_radix(s: &str, base: i64) -> i64 {
    let Ok(radix) = u32::try_from(base) else {
        return 0;
    };
    if !(2..=36).contains(&radix) {
        return 0;
    }
    let trimmed = s.trim_start();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits = match radix {
        16 => digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits),
        8 => digits
            .strip_prefix("0o")
            .or_else(|| digits.strip_prefix("0O"))
            .unwrap_or(digits),
        2 => digits
            .strip_prefix("0b")
            .or_else(|| digits.strip_prefix("0B"))
            .unwrap_or(digits),
        _ => digits,
    };
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    let value = i64::from_str_radix(&digits[..end], radix).unwrap_or(0);
    if negative { -value } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> String {
        Interpreter::new().run(src).unwrap()
    }

    #[test]
    fn print_r_can_return_its_text() {
        assert_eq!(
            run("<?php $s = print_r([1], true); echo strlen($s);"),
            "23"
        );
    }

    #[test]
    fn array_helpers() {
        let out = run("<?php
$a = ['x' => 1, 5 => 2];
echo implode(',', array_keys($a)), '|', implode(',', array_values($a)), '|';
echo implode(',', array_merge([1, 2], ['k' => 3], [4])), '|';
echo in_array('1', $a) ? 'y' : 'n', in_array('1', $a, true) ? 'y' : 'n';");
        assert_eq!(out, "x,5|1,2|1,2,3,4|yn");
    }

    #[test]
    fn count_modes() {
        assert_eq!(run("<?php echo count([1, [2, 3]]), count([1, [2, 3]], COUNT_RECURSIVE);"), "24");
        let err = Interpreter::new().run("<?php count(5);").unwrap_err();
        assert_eq!(
            err.message,
            "count(): Argument #1 ($value) must be of type Countable|array, int given"
        );
    }

    #[test]
    fn type_predicates_and_conversions() {
        let out = run("<?php
echo gettype(1.5), ' ', gettype(null), ' ', intval('12abc'), ' ', intval('ff', 16), ' ';
echo strval(2.50), ' ', str_repeat('ab', 3), ' ', is_int(1) ? 'i' : '-', is_string(1) ? 's' : '-';");
        assert_eq!(out, "double NULL 12 255 2.5 ababab i-");
    }

    #[test]
    fn member_lookups_ignore_visibility() {
        let out = run("<?php
class A { private $p; private function m() {} }
echo method_exists('A', 'm') ? 1 : 0, method_exists(new A, 'M') ? 1 : 0, property_exists('A', 'p') ? 1 : 0, property_exists('A', 'q') ? 1 : 0;");
        assert_eq!(out, "1110");
    }

    #[test]
    fn escaped_bytes_count_once() {
        assert_eq!(run(r#"<?php echo strlen("\xff"), strlen("\377"), strlen("é");"#), "112");
        let mut interp = Interpreter::new();
        interp.run(r#"<?php var_dump("\x80");"#).unwrap();
        assert_eq!(interp.output_bytes(), b"string(1) \"\x80\"\n");
    }

    #[test]
    fn wrong_argument_count() {
        let err = Interpreter::new().run("<?php strlen();").unwrap_err();
        assert_eq!(err.message, "strlen() expects exactly 1 argument, 0 given");
    }

    #[test]
    fn get_class_without_arguments_uses_the_scope() {
        assert_eq!(
            run("<?php class A { function f() { return get_class(); } } class B extends A {} echo (new B)->f();"),
            "A"
        );
    }

    #[test]
    fn radix_parsing() {
        assert_eq!(parse_radix("0x1A", 16), 26);
        assert_eq!(parse_radix("-101", 2), -5);
        assert_eq!(parse_radix("zz", 10), 0);
    }
}
