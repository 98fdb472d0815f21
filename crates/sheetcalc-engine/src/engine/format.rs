use super::ValueEval;

/// Format a scalar value the way text coercion renders it.
pub fn format_value(value: &ValueEval) -> String {
    match value {
        ValueEval::Number(n) => format_number(*n),
        ValueEval::Text(s) => s.clone(),
        ValueEval::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        ValueEval::Error(code) => code.text().to_string(),
        ValueEval::Blank => String::new(),
        ValueEval::Ref(r) => r.to_string(),
        ValueEval::Area(a) => a.to_string(),
    }
}

/// Format a number in general style: integers without a fraction, other
/// values rounded to 15 significant digits.
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        "#NUM!".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        let rounded = format!("{:.14e}", n).parse::<f64>().unwrap_or(n);
        rounded.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ErrorCode;

    #[test]
    fn test_format_number_integers() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-12.0), "-12");
        assert_eq!(format_number(0.0), "0");
    }

    #[test]
    fn test_format_number_fractions() {
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
    }

    #[test]
    fn test_format_value_scalars() {
        assert_eq!(format_value(&ValueEval::Boolean(true)), "TRUE");
        assert_eq!(format_value(&ValueEval::Blank), "");
        assert_eq!(
            format_value(&ValueEval::Error(ErrorCode::Na)),
            "#N/A"
        );
    }
}
