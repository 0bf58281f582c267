use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::Visibility;

mod array;
mod display;
mod error;
mod string;

pub use array::{ArrayKey, PhpArray};
pub use display::{format_float, format_float_repr};
pub use error::{RuntimeError, RuntimeErrorCode};
pub use string::PhpString;

/// Objects are shared handles; assigning one copies the handle, never the object.
pub type ObjectRef = Rc<RefCell<Object>>;

/// A property storage slot. Private slots remember their declaring class so a
/// parent and a child can each own a private property of the same name.
#[derive(Debug, Clone)]
pub struct PropSlot {
    pub name: String,
    pub owner: Option<String>,
    pub declared_in: Option<String>,
    pub visibility: Visibility,
    pub value: Value,
}

#[derive(Debug)]
pub struct Object {
    pub id: u64,
    pub class_name: String,
    pub props: Vec<PropSlot>,
}

impl Object {
    pub fn new(id: u64, class_name: impl Into<String>) -> Self {
        Self {
            id,
            class_name: class_name.into(),
            props: Vec::new(),
        }
    }

    /// Find a slot by name; `owner` is `Some(class)` only for private slots.
    pub fn slot_index(&self, name: &str, owner: Option<&str>) -> Option<usize> {
        self.props
            .iter()
            .position(|slot| slot.name == name && slot.owner.as_deref() == owner)
    }

    /// Any slot with this name, ignoring ownership. Used by `property_exists`.
    pub fn has_any_slot(&self, name: &str) -> bool {
        self.props.iter().any(|slot| slot.name == name)
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(PhpString),
    Array(PhpArray),
    Object(ObjectRef),
}

impl Value {
    pub fn str(s: impl Into<PhpString>) -> Self {
        Value::Str(s.into())
    }

    pub fn empty_array() -> Self {
        Value::Array(PhpArray::new())
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !(s.is_empty() || s == "0"),
            Value::Array(arr) => !arr.is_empty(),
            Value::Object(_) => true,
        }
    }

    /// The name `gettype()` reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "double",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// The name used in type errors (`int`, `string`, class name, ...).
    pub fn debug_type(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::Array(_) => "array".to_string(),
            Value::Object(obj) => obj.borrow().class_name.clone(),
        }
    }

    pub fn to_int(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Bool(b) => *b as i64,
            Value::Int(i) => *i,
            Value::Float(f) => float_to_int(*f),
            Value::Str(s) => match parse_numeric_prefix(s) {
                Some(Numeric::Int(i)) => i,
                Some(Numeric::Float(f)) => float_to_int(f),
                None => 0,
            },
            Value::Array(arr) => !arr.is_empty() as i64,
            Value::Object(_) => 1,
        }
    }

    pub fn to_float(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => *b as i64 as f64,
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Str(s) => match parse_numeric_prefix(s) {
                Some(Numeric::Int(i)) => i as f64,
                Some(Numeric::Float(f)) => f,
                None => 0.0,
            },
            Value::Array(arr) => !arr.is_empty() as i64 as f64,
            Value::Object(_) => 1.0,
        }
    }

    /// Numeric view used by arithmetic. Strings that are not numeric at all
    /// are rejected so the caller can raise the PHP 8 `TypeError`.
    pub fn to_number(&self) -> Option<Numeric> {
        match self {
            Value::Null => Some(Numeric::Int(0)),
            Value::Bool(b) => Some(Numeric::Int(*b as i64)),
            Value::Int(i) => Some(Numeric::Int(*i)),
            Value::Float(f) => Some(Numeric::Float(*f)),
            Value::Str(s) => parse_numeric_prefix(s),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.strict_equals(vb))
            }
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==` with PHP 8 comparison rules.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), b) | (b, Value::Bool(a)) => *a == b.truthy(),
            (Value::Null, Value::Str(s)) | (Value::Str(s), Value::Null) => s.is_empty(),
            (Value::Null, b) | (b, Value::Null) => !b.truthy(),
            (Value::Str(a), Value::Str(b)) => {
                match (numeric_string(a), numeric_string(b)) {
                    (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
                    _ => a == b,
                }
            }
            (Value::Int(_) | Value::Float(_), Value::Str(s))
            | (Value::Str(s), Value::Int(_) | Value::Float(_)) => {
                let num = if let Value::Str(_) = self { other } else { self };
                match numeric_string(s) {
                    Some(n) => n.as_f64() == num.to_float(),
                    None => match num {
                        Value::Int(i) => *s == *i.to_string(),
                        Value::Float(f) => *s == *format_float(*f),
                        _ => false,
                    },
                }
            }
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.to_float() == other.to_float()
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.loose_equals(w)))
            }
            (Value::Object(a), Value::Object(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.class_name == b.class_name
                    && a.props.len() == b.props.len()
                    && a.props.iter().zip(b.props.iter()).all(|(x, y)| {
                        x.name == y.name && x.owner == y.owner && x.value.loose_equals(&y.value)
                    })
            }
            _ => false,
        }
    }

    /// `<=>` ordering. Returns -1, 0 or 1.
    pub fn compare(&self, other: &Value) -> i64 {
        fn sign(o: Option<std::cmp::Ordering>) -> i64 {
            match o {
                Some(std::cmp::Ordering::Less) => -1,
                Some(std::cmp::Ordering::Greater) => 1,
                _ => 0,
            }
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => match (numeric_string(a), numeric_string(b)) {
                (Some(x), Some(y)) => sign(x.as_f64().partial_cmp(&y.as_f64())),
                _ => sign(Some(a.cmp(b))),
            },
            (Value::Bool(_), _) | (_, Value::Bool(_)) | (Value::Null, _) | (_, Value::Null) => {
                sign(Some(self.truthy().cmp(&other.truthy())))
            }
            (Value::Int(a), Value::Int(b)) => sign(Some(a.cmp(b))),
            (Value::Array(a), Value::Array(b)) => {
                if a.len() != b.len() {
                    return sign(Some(a.len().cmp(&b.len())));
                }
                for (k, v) in a.iter() {
                    match b.get(k) {
                        Some(w) => {
                            let c = v.compare(w);
                            if c != 0 {
                                return c;
                            }
                        }
                        None => return 1,
                    }
                }
                0
            }
            (Value::Str(s), n @ (Value::Int(_) | Value::Float(_)))
                if numeric_string(s).is_none() =>
            {
                let rendered = match n {
                    Value::Int(i) => i.to_string(),
                    _ => format_float(n.to_float()),
                };
                sign(Some(s.as_bytes().cmp(rendered.as_bytes())))
            }
            (n @ (Value::Int(_) | Value::Float(_)), Value::Str(s))
                if numeric_string(s).is_none() =>
            {
                -Value::Str(s.clone()).compare(n)
            }
            _ => sign(self.to_float().partial_cmp(&other.to_float())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Int(i) => i as f64,
            Numeric::Float(f) => f,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Numeric::Int(i) => Value::Int(i),
            Numeric::Float(f) => Value::Float(f),
        }
    }
}

fn float_to_int(f: f64) -> i64 {
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        f as i64
    } else {
        0
    }
}

/// Leading-numeric parse (`"12abc"` is 12, `" 3.5"` is 3.5). Returns `None`
/// when no digits lead the string.
pub(crate) fn parse_numeric_prefix(s: impl AsRef<[u8]>) -> Option<Numeric> {
    scan_numeric(s.as_ref()).map(|(num, _)| num)
}

/// A fully numeric string (surrounding whitespace allowed).
pub(crate) fn numeric_string(s: impl AsRef<[u8]>) -> Option<Numeric> {
    let bytes = s.as_ref();
    let end = bytes
        .iter()
        .rposition(|b| !is_php_whitespace(*b))
        .map_or(0, |i| i + 1);
    let trimmed = &bytes[..end];
    let (num, consumed) = scan_numeric(trimmed)?;
    (consumed == trimmed.len()).then_some(num)
}

fn is_php_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Returns the parsed number and how many bytes of `s` it covered,
/// leading whitespace included.
fn scan_numeric(s: &[u8]) -> Option<(Numeric, usize)> {
    let skipped = s.iter().take_while(|b| is_php_whitespace(**b)).count();
    let bytes = &s[skipped..];
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let int_digits = end - digits_start;
    let mut is_float = false;
    if end < bytes.len() && bytes[end] == b'.' {
        let mut frac_end = end + 1;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if int_digits > 0 || frac_end > end + 1 {
            is_float = true;
            end = frac_end;
        }
    }
    if int_digits == 0 && !is_float {
        return None;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            is_float = true;
            end = exp_end;
        }
    }
    // Only ASCII digits, signs, '.' and 'e' were consumed.
    let text = std::str::from_utf8(&bytes[..end]).ok()?;
    let num = if !is_float && let Ok(i) = text.parse::<i64>() {
        Numeric::Int(i)
    } else {
        Numeric::Float(text.parse::<f64>().ok()?)
    };
    Some((num, skipped + end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_prefix_parsing() {
        assert_eq!(parse_numeric_prefix("12abc"), Some(Numeric::Int(12)));
        assert_eq!(parse_numeric_prefix(" 3.5"), Some(Numeric::Float(3.5)));
        assert_eq!(parse_numeric_prefix("1e3"), Some(Numeric::Float(1000.0)));
        assert_eq!(parse_numeric_prefix("abc"), None);
        assert_eq!(parse_numeric_prefix("."), None);
    }

    #[test]
    fn numeric_strings_must_be_complete() {
        assert!(numeric_string("42").is_some());
        assert!(numeric_string(" 42 ").is_some());
        assert!(numeric_string("4.2e1").is_some());
        assert!(numeric_string("42abc").is_none());
        assert!(numeric_string("").is_none());
    }

    #[test]
    fn loose_equality_follows_php8() {
        assert!(Value::Int(0).loose_equals(&Value::str("0")));
        assert!(!Value::Int(0).loose_equals(&Value::str("a")));
        assert!(Value::str("1e1").loose_equals(&Value::str("10")));
        assert!(Value::Null.loose_equals(&Value::Bool(false)));
        assert!(Value::Null.loose_equals(&Value::empty_array()));
    }

    #[test]
    fn strict_equality_checks_types() {
        assert!(!Value::Int(1).strict_equals(&Value::Float(1.0)));
        assert!(Value::str("a").strict_equals(&Value::str("a")));
    }

    #[test]
    fn private_slots_are_keyed_by_owner() {
        let mut obj = Object::new(1, "Child");
        obj.props.push(PropSlot {
            name: "x".to_string(),
            owner: Some("Base".to_string()),
            declared_in: Some("Base".to_string()),
            visibility: Visibility::Private,
            value: Value::Int(1),
        });
        obj.props.push(PropSlot {
            name: "x".to_string(),
            owner: Some("Child".to_string()),
            declared_in: Some("Child".to_string()),
            visibility: Visibility::Private,
            value: Value::Int(2),
        });
        assert_eq!(obj.slot_index("x", Some("Base")), Some(0));
        assert_eq!(obj.slot_index("x", Some("Child")), Some(1));
        assert_eq!(obj.slot_index("x", None), None);
    }
}
