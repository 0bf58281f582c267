use super::{PhpString, Value};

/// Decimal digits and decimal-point position of a finite, non-zero float.
/// `precision` of `None` asks for the shortest round-trip digits.
fn decimal_digits(f: f64, precision: Option<usize>) -> (String, i32) {
    let sci = match precision {
        Some(p) => format!("{:.*e}", p.saturating_sub(1), f.abs()),
        None => format!("{:e}", f.abs()),
    };
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let mut digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    while digits.len() > 1 && digits.ends_with('0') {
        digits.pop();
    }
    (digits, exp + 1)
}

fn render_float(f: f64, precision: Option<usize>, max_fixed_exp: i32) -> String {
    if f.is_nan() {
        return "NAN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let (digits, decpt) = decimal_digits(f, precision);
    let mut out = String::new();
    if f < 0.0 {
        out.push('-');
    }
    if decpt > max_fixed_exp || decpt < -3 {
        out.push_str(&digits[..1]);
        out.push('.');
        if digits.len() > 1 {
            out.push_str(&digits[1..]);
        } else {
            out.push('0');
        }
        let exp = decpt - 1;
        out.push_str(&format!("E{}{}", if exp < 0 { '-' } else { '+' }, exp.abs()));
    } else if decpt <= 0 {
        out.push_str("0.");
        out.push_str(&"0".repeat((-decpt) as usize));
        out.push_str(&digits);
    } else {
        let point = decpt as usize;
        if digits.len() <= point {
            out.push_str(&digits);
            out.push_str(&"0".repeat(point - digits.len()));
        } else {
            out.push_str(&digits[..point]);
            out.push('.');
            out.push_str(&digits[point..]);
        }
    }
    out
}

/// Float to string the way `echo` does it (`precision=14`).
pub fn format_float(f: f64) -> String {
    render_float(f, Some(14), 14)
}

/// Float to string the way `var_dump` does it (`serialize_precision=-1`).
pub fn format_float_repr(f: f64) -> String {
    render_float(f, None, 15)
}

impl Value {
    /// String conversion for everything except objects, which need the
    /// interpreter to look up `__toString`.
    pub fn scalar_to_string(&self) -> Option<PhpString> {
        match self {
            Value::Null | Value::Bool(false) => Some(PhpString::new()),
            Value::Bool(true) => Some("1".into()),
            Value::Int(i) => Some(i.to_string().into()),
            Value::Float(f) => Some(format_float(*f).into()),
            Value::Str(s) => Some(s.clone()),
            Value::Array(_) => Some("Array".into()),
            Value::Object(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_precision_rounds_to_fourteen_digits() {
        assert_eq!(format_float(0.1 + 0.2), "0.3");
        assert_eq!(format_float(1.0), "1");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(1e15), "1.0E+15");
        assert_eq!(format_float(0.00001), "1.0E-5");
    }

    #[test]
    fn repr_uses_shortest_round_trip() {
        assert_eq!(format_float_repr(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_float_repr(1.5), "1.5");
        assert_eq!(format_float_repr(100.0), "100");
        assert_eq!(format_float_repr(0.0001), "0.0001");
    }

    #[test]
    fn special_floats() {
        assert_eq!(format_float(f64::NAN), "NAN");
        assert_eq!(format_float(f64::NEG_INFINITY), "-INF");
        assert_eq!(format_float_repr(-0.0), "-0");
    }
}
