//! `var_dump` and `print_r` renderers. Both build byte strings so string
//! values come out with their raw bytes and byte lengths.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::Visibility;
use crate::value::{ArrayKey, Object, PhpString, PropSlot, Value, format_float, format_float_repr};

fn pad(out: &mut PhpString, indent: usize) {
    for _ in 0..indent {
        out.push(b' ');
    }
}

/// Objects currently being rendered, to cut reference cycles.
type Seen = Vec<*const RefCell<Object>>;

pub(crate) fn var_dump(value: &Value) -> PhpString {
    let mut out = PhpString::new();
    var_dump_into(&mut out, value, 0, &mut Vec::new());
    out
}

fn var_dump_key(out: &mut PhpString, key: &ArrayKey) {
    match key {
        ArrayKey::Int(i) => out.push_str(&format!("[{}]", i)),
        ArrayKey::Str(s) => {
            out.push_str("[\"");
            out.push_bytes(s.as_bytes());
            out.push_str("\"]");
        }
    }
}

fn var_dump_prop_key(slot: &PropSlot) -> String {
    match (slot.visibility, &slot.owner) {
        (Visibility::Private, Some(owner)) => format!("[\"{}\":\"{}\":private]", slot.name, owner),
        (Visibility::Protected, _) => format!("[\"{}\":protected]", slot.name),
        _ => format!("[\"{}\"]", slot.name),
    }
}

fn var_dump_into(out: &mut PhpString, value: &Value, indent: usize, seen: &mut Seen) {
    pad(out, indent);
    match value {
        Value::Null => out.push_str("NULL\n"),
        Value::Bool(b) => out.push_str(&format!("bool({})\n", b)),
        Value::Int(i) => out.push_str(&format!("int({})\n", i)),
        Value::Float(f) => out.push_str(&format!("float({})\n", format_float_repr(*f))),
        Value::Str(s) => {
            out.push_str(&format!("string({}) \"", s.len()));
            out.push_bytes(s.as_bytes());
            out.push_str("\"\n");
        }
        Value::Array(arr) => {
            out.push_str(&format!("array({}) {{\n", arr.len()));
            for (key, item) in arr.iter() {
                pad(out, indent + 2);
                var_dump_key(out, key);
                out.push_str("=>\n");
                var_dump_into(out, item, indent + 2, seen);
            }
            pad(out, indent);
            out.push_str("}\n");
        }
        Value::Object(obj) => {
            let ptr = Rc::as_ptr(obj);
            if seen.contains(&ptr) {
                out.push_str("*RECURSION*\n");
                return;
            }
            seen.push(ptr);
            let obj = obj.borrow();
            out.push_str(&format!(
                "object({})#{} ({}) {{\n",
                obj.class_name,
                obj.id,
                obj.props.len()
            ));
            for slot in &obj.props {
                pad(out, indent + 2);
                out.push_str(&var_dump_prop_key(slot));
                out.push_str("=>\n");
                var_dump_into(out, &slot.value, indent + 2, seen);
            }
            pad(out, indent);
            out.push_str("}\n");
            seen.pop();
        }
    }
}

pub(crate) fn print_r(value: &Value) -> PhpString {
    let mut out = PhpString::new();
    print_r_into(&mut out, value, 0, &mut Vec::new());
    out
}

fn print_r_array_key(key: &ArrayKey) -> PhpString {
    match key {
        ArrayKey::Int(i) => i.to_string().into(),
        ArrayKey::Str(s) => s.clone(),
    }
}

fn print_r_prop_key(slot: &PropSlot) -> PhpString {
    match (slot.visibility, &slot.owner) {
        (Visibility::Private, Some(owner)) => format!("{}:{}:private", slot.name, owner).into(),
        (Visibility::Protected, _) => format!("{}:protected", slot.name).into(),
        _ => slot.name.as_str().into(),
    }
}

fn print_r_entries<'a>(
    out: &mut PhpString,
    entries: impl Iterator<Item = (PhpString, &'a Value)>,
    indent: usize,
    seen: &mut Seen,
) {
    pad(out, indent);
    out.push_str("(\n");
    for (key, item) in entries {
        pad(out, indent + 4);
        out.push(b'[');
        out.push_bytes(key.as_bytes());
        out.push_str("] => ");
        print_r_into(out, item, indent + 8, seen);
        out.push(b'\n');
    }
    pad(out, indent);
    out.push_str(")\n");
}

fn print_r_into(out: &mut PhpString, value: &Value, indent: usize, seen: &mut Seen) {
    match value {
        Value::Array(arr) => {
            out.push_str("Array\n");
            print_r_entries(out, arr.iter().map(|(k, v)| (print_r_array_key(k), v)), indent, seen);
        }
        Value::Object(obj) => {
            let ptr = Rc::as_ptr(obj);
            let obj = obj.borrow();
            out.push_str(&format!("{} Object\n", obj.class_name));
            if seen.contains(&ptr) {
                out.push_str(" *RECURSION*");
                return;
            }
            seen.push(ptr);
            print_r_entries(
                out,
                obj.props.iter().map(|slot| (print_r_prop_key(slot), &slot.value)),
                indent,
                seen,
            );
            seen.pop();
        }
        Value::Float(f) => out.push_str(&format_float(*f)),
        scalar => out.push_bytes(scalar.scalar_to_string().unwrap_or_default().as_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::PhpArray;

    #[test]
    fn var_dump_of_appended_array() {
        let arr = PhpArray::from_values([Value::Int(1)]);
        assert_eq!(
            var_dump(&Value::Array(arr)),
            "array(1) {\n  [0]=>\n  int(1)\n}\n"
        );
    }

    #[test]
    fn var_dump_scalars() {
        assert_eq!(var_dump(&Value::Null), "NULL\n");
        assert_eq!(var_dump(&Value::Bool(false)), "bool(false)\n");
        assert_eq!(var_dump(&Value::Float(0.1)), "float(0.1)\n");
        assert_eq!(var_dump(&Value::Float(2.0)), "float(2)\n");
        assert_eq!(var_dump(&Value::str("héllo")), "string(6) \"héllo\"\n");
    }

    #[test]
    fn var_dump_nests_with_two_spaces() {
        let inner = PhpArray::from_values([Value::str("x")]);
        let mut outer = PhpArray::new();
        outer.insert(ArrayKey::Str("k".into()), Value::Array(inner));
        assert_eq!(
            var_dump(&Value::Array(outer)),
            "array(1) {\n  [\"k\"]=>\n  array(1) {\n    [0]=>\n    string(1) \"x\"\n  }\n}\n"
        );
    }

    #[test]
    fn var_dump_keeps_raw_bytes() {
        let value = Value::Str(PhpString::from(vec![0xe9]));
        assert_eq!(var_dump(&value).as_bytes(), b"string(1) \"\xe9\"\n");
    }

    #[test]
    fn var_dump_empty_array() {
        assert_eq!(var_dump(&Value::empty_array()), "array(0) {\n}\n");
    }

    #[test]
    fn print_r_nested_array() {
        let inner = PhpArray::from_values([Value::Int(2)]);
        let outer = PhpArray::from_values([Value::Int(1), Value::Array(inner)]);
        assert_eq!(
            print_r(&Value::Array(outer)),
            "Array\n(\n    [0] => 1\n    [1] => Array\n        (\n            [0] => 2\n        )\n\n)\n"
        );
    }

    #[test]
    fn print_r_scalars_have_no_newline() {
        assert_eq!(print_r(&Value::Bool(true)), "1");
        assert_eq!(print_r(&Value::Float(0.1 + 0.2)), "0.3");
    }
}
