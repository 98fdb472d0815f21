//! Built-in spreadsheet functions and their metadata.
//!
//! Conventions:
//! - Function names are ALL CAPS; lookups ignore case.
//! - Every implementation takes the unevaluated argument values, so
//!   references arrive lazy and each function decides how to read them.
//! - If you add a built-in, add a row to `BUILTINS`.

use std::cmp::Ordering;

use chrono::{Local, NaiveDate, NaiveDateTime};
use rand::Rng;

use crate::engine::{
    AreaEval, EvalError, ErrorCode, OperationEvaluationContext, Result, ValueEval, power,
    try_value,
};

type BuiltinFn = fn(&OperationEvaluationContext<'_, '_>, &[ValueEval]) -> Result<ValueEval>;
type Coerced<T> = std::result::Result<T, ErrorCode>;

pub struct Builtin {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub description: &'static str,
    eval: BuiltinFn,
}

macro_rules! builtin {
    ($name:literal, $min:expr, $max:expr, $eval:expr, $description:literal) => {
        Builtin {
            name: $name,
            min_args: $min,
            max_args: $max,
            description: $description,
            eval: $eval,
        }
    };
}

pub const BUILTINS: &[Builtin] = &[
    builtin!("SUM", 1, None, sum, "Sum of numeric values"),
    builtin!("AVERAGE", 1, None, average, "Arithmetic mean of numeric values"),
    builtin!("COUNT", 0, None, count, "Count of numeric values"),
    builtin!("COUNTA", 1, None, counta, "Count of non-empty values"),
    builtin!("MIN", 1, None, min, "Smallest numeric value"),
    builtin!("MAX", 1, None, max, "Largest numeric value"),
    builtin!("PRODUCT", 1, None, product, "Product of numeric values"),
    builtin!("STDEV", 1, None, stdev, "Sample standard deviation"),
    builtin!("VAR", 1, None, var, "Sample variance"),
    builtin!("SUBTOTAL", 2, None, subtotal, "Aggregate that skips other subtotals"),
    builtin!("IF", 2, Some(3), if_fn, "Choose a value by condition"),
    builtin!("AND", 1, None, and, "True if every argument is true"),
    builtin!("OR", 1, None, or, "True if any argument is true"),
    builtin!("NOT", 1, Some(1), not, "Logical negation"),
    builtin!("IFERROR", 2, Some(2), iferror, "Replace an error value"),
    builtin!("ISERROR", 1, Some(1), iserror, "True for any error value"),
    builtin!("ISERR", 1, Some(1), iserr, "True for errors other than #N/A"),
    builtin!("ISNA", 1, Some(1), isna, "True for #N/A"),
    builtin!("ISBLANK", 1, Some(1), isblank, "True for an empty cell"),
    builtin!("ISNUMBER", 1, Some(1), isnumber, "True for numbers"),
    builtin!("ISTEXT", 1, Some(1), istext, "True for text"),
    builtin!("ISLOGICAL", 1, Some(1), islogical, "True for booleans"),
    builtin!("NA", 0, Some(0), na, "The #N/A error"),
    builtin!("TRUE", 0, Some(0), true_fn, "Boolean TRUE"),
    builtin!("FALSE", 0, Some(0), false_fn, "Boolean FALSE"),
    builtin!("ABS", 1, Some(1), abs, "Absolute value"),
    builtin!("INT", 1, Some(1), int, "Round down to an integer"),
    builtin!("MOD", 2, Some(2), modulo, "Remainder with the sign of the divisor"),
    builtin!("ROUND", 2, Some(2), round, "Round to a number of digits"),
    builtin!("SQRT", 1, Some(1), sqrt, "Square root"),
    builtin!("POWER", 2, Some(2), power_fn, "Raise to a power"),
    builtin!("LEN", 1, Some(1), len, "Number of characters"),
    builtin!("UPPER", 1, Some(1), upper, "Convert text to upper case"),
    builtin!("LOWER", 1, Some(1), lower, "Convert text to lower case"),
    builtin!("TRIM", 1, Some(1), trim, "Remove extra spaces"),
    builtin!("CONCATENATE", 1, None, concatenate, "Join text values"),
    builtin!("ROW", 0, Some(1), row, "Row number of a reference"),
    builtin!("COLUMN", 0, Some(1), column, "Column number of a reference"),
    builtin!("ROWS", 1, Some(1), rows, "Number of rows in a reference"),
    builtin!("COLUMNS", 1, Some(1), columns, "Number of columns in a reference"),
    builtin!("OFFSET", 3, Some(5), offset, "Reference shifted from a base reference"),
    builtin!("INDEX", 2, Some(3), index, "Value or sub-area at a position"),
    builtin!("TODAY", 0, Some(0), today, "Current date as a serial number"),
    builtin!("NOW", 0, Some(0), now, "Current date and time as a serial number"),
    builtin!("RAND", 0, Some(0), rand_fn, "Random number in [0, 1)"),
    builtin!("RANDBETWEEN", 2, Some(2), randbetween, "Random integer in a closed range"),
];

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name.eq_ignore_ascii_case(name))
}

/// Call a built-in. Unknown names are `#NAME?` and argument counts outside
/// the function's range are `#VALUE!`.
pub(crate) fn invoke(
    ctx: &OperationEvaluationContext<'_, '_>,
    name: &str,
    args: &[ValueEval],
) -> Result<ValueEval> {
    let Some(builtin) = lookup(name) else {
        return Ok(ValueEval::Error(ErrorCode::NameInvalid));
    };
    if args.len() < builtin.min_args || builtin.max_args.is_some_and(|max| args.len() > max) {
        return Ok(ValueEval::Error(ErrorCode::ValueInvalid));
    }
    (builtin.eval)(ctx, args)
}

fn scalar(ctx: &OperationEvaluationContext<'_, '_>, arg: &ValueEval) -> Result<ValueEval> {
    ctx.single_value(arg.clone())
}

fn number(ctx: &OperationEvaluationContext<'_, '_>, arg: &ValueEval) -> Result<Coerced<f64>> {
    Ok(scalar(ctx, arg)?.to_number())
}

fn text(ctx: &OperationEvaluationContext<'_, '_>, arg: &ValueEval) -> Result<Coerced<String>> {
    Ok(scalar(ctx, arg)?.to_text())
}

fn boolean(ctx: &OperationEvaluationContext<'_, '_>, arg: &ValueEval) -> Result<Coerced<bool>> {
    Ok(scalar(ctx, arg)?.to_boolean())
}

/// Optional argument; omitted and missing arguments are None.
fn optional(args: &[ValueEval], index: usize) -> Option<&ValueEval> {
    args.get(index).filter(|arg| !arg.is_blank())
}

// Aggregation

#[derive(Clone, Copy, Debug, Default)]
struct CellFilter {
    skip_subtotals: bool,
    skip_hidden_rows: bool,
}

enum Operand {
    /// Passed directly as an argument.
    Direct(ValueEval),
    /// Read through a reference.
    Referenced(ValueEval),
}

fn operands(
    ctx: &OperationEvaluationContext<'_, '_>,
    args: &[ValueEval],
    filter: CellFilter,
) -> Result<Vec<Operand>> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            ValueEval::Ref(reference) => push_area(ctx, &reference.as_area(), filter, &mut out)?,
            ValueEval::Area(area) => push_area(ctx, area, filter, &mut out)?,
            other => out.push(Operand::Direct(other.clone())),
        }
    }
    Ok(out)
}

fn push_area(
    ctx: &OperationEvaluationContext<'_, '_>,
    area: &AreaEval,
    filter: CellFilter,
    out: &mut Vec<Operand>,
) -> Result<()> {
    match area {
        AreaEval::Materialized { values, .. } => {
            out.extend(values.iter().cloned().map(Operand::Referenced));
        }
        AreaEval::SheetBacked { sheets, bounds } => {
            let range = ctx.range_evaluator(*sheets)?;
            for sheet_index in sheets.iter() {
                let sheet = range.sheet_evaluator(sheet_index)?;
                // Nothing below the last populated row.
                let Some(last_row) = sheet.last_row_num() else {
                    continue;
                };
                for row in bounds.first_row..=last_row.min(bounds.last_row) {
                    if filter.skip_hidden_rows && sheet.is_row_hidden(row) {
                        continue;
                    }
                    for col in bounds.first_col..=bounds.last_col {
                        if filter.skip_subtotals && sheet.is_subtotal(row, col) {
                            continue;
                        }
                        out.push(Operand::Referenced(sheet.eval_cell(row, col)?));
                    }
                }
            }
        }
    }
    Ok(())
}

fn numbers(operands: &[Operand]) -> Coerced<Vec<f64>> {
    let mut out = Vec::new();
    for operand in operands {
        match operand {
            Operand::Direct(value) => out.push(value.to_number()?),
            Operand::Referenced(ValueEval::Number(n)) => out.push(*n),
            Operand::Referenced(ValueEval::Error(code)) => return Err(*code),
            Operand::Referenced(_) => {}
        }
    }
    Ok(out)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Aggregate {
    Average,
    Count,
    CountA,
    Max,
    Min,
    Product,
    StDev,
    StDevP,
    Sum,
    Var,
    VarP,
}

impl Aggregate {
    /// SUBTOTAL function codes; 101..=111 are the same list ignoring hidden rows.
    fn from_subtotal_code(code: i64) -> Option<Aggregate> {
        let aggregate = match code % 100 {
            1 => Aggregate::Average,
            2 => Aggregate::Count,
            3 => Aggregate::CountA,
            4 => Aggregate::Max,
            5 => Aggregate::Min,
            6 => Aggregate::Product,
            7 => Aggregate::StDev,
            8 => Aggregate::StDevP,
            9 => Aggregate::Sum,
            10 => Aggregate::Var,
            11 => Aggregate::VarP,
            _ => return None,
        };
        matches!(code, 1..=11 | 101..=111).then_some(aggregate)
    }

    fn apply(self, operands: &[Operand]) -> ValueEval {
        match self {
            Aggregate::Count => ValueEval::Number(count_numbers(operands) as f64),
            Aggregate::CountA => ValueEval::Number(count_non_empty(operands) as f64),
            _ => match numbers(operands) {
                Ok(values) => self.reduce(&values),
                Err(code) => ValueEval::Error(code),
            },
        }
    }

    fn reduce(self, values: &[f64]) -> ValueEval {
        let count = values.len() as f64;
        let sum: f64 = values.iter().sum();
        match self {
            Aggregate::Sum => ValueEval::checked_number(sum),
            Aggregate::Product if values.is_empty() => ValueEval::Number(0.0),
            Aggregate::Product => ValueEval::checked_number(values.iter().product()),
            Aggregate::Average if values.is_empty() => ValueEval::Error(ErrorCode::DivZero),
            Aggregate::Average => ValueEval::checked_number(sum / count),
            Aggregate::Max => ValueEval::Number(
                values
                    .iter()
                    .copied()
                    .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
                    .unwrap_or(0.0),
            ),
            Aggregate::Min => ValueEval::Number(
                values
                    .iter()
                    .copied()
                    .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
                    .unwrap_or(0.0),
            ),
            Aggregate::Var | Aggregate::StDev if values.len() < 2 => {
                ValueEval::Error(ErrorCode::DivZero)
            }
            Aggregate::VarP | Aggregate::StDevP if values.is_empty() => {
                ValueEval::Error(ErrorCode::DivZero)
            }
            Aggregate::Var | Aggregate::StDev | Aggregate::VarP | Aggregate::StDevP => {
                let mean = sum / count;
                let squares: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
                let divisor = if matches!(self, Aggregate::Var | Aggregate::StDev) {
                    count - 1.0
                } else {
                    count
                };
                let variance = squares / divisor;
                if matches!(self, Aggregate::StDev | Aggregate::StDevP) {
                    ValueEval::checked_number(variance.sqrt())
                } else {
                    ValueEval::checked_number(variance)
                }
            }
            Aggregate::Count | Aggregate::CountA => ValueEval::Error(ErrorCode::ValueInvalid),
        }
    }
}

fn count_numbers(operands: &[Operand]) -> usize {
    operands
        .iter()
        .filter(|operand| match operand {
            Operand::Direct(ValueEval::Blank | ValueEval::Error(_)) => false,
            Operand::Direct(value) => value.to_number().is_ok(),
            Operand::Referenced(value) => matches!(value, ValueEval::Number(_)),
        })
        .count()
}

fn count_non_empty(operands: &[Operand]) -> usize {
    operands
        .iter()
        .filter(|operand| match operand {
            Operand::Direct(value) | Operand::Referenced(value) => !value.is_blank(),
        })
        .count()
}

fn aggregate(
    ctx: &OperationEvaluationContext<'_, '_>,
    args: &[ValueEval],
    kind: Aggregate,
) -> Result<ValueEval> {
    let operands = operands(ctx, args, CellFilter::default())?;
    Ok(kind.apply(&operands))
}

fn sum(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    aggregate(ctx, args, Aggregate::Sum)
}

fn average(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    aggregate(ctx, args, Aggregate::Average)
}

fn count(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    aggregate(ctx, args, Aggregate::Count)
}

fn counta(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    aggregate(ctx, args, Aggregate::CountA)
}

fn min(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    aggregate(ctx, args, Aggregate::Min)
}

fn max(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    aggregate(ctx, args, Aggregate::Max)
}

fn product(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    aggregate(ctx, args, Aggregate::Product)
}

fn stdev(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    aggregate(ctx, args, Aggregate::StDev)
}

fn var(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    aggregate(ctx, args, Aggregate::Var)
}

fn subtotal(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let code = try_value!(number(ctx, &args[0])?).trunc() as i64;
    let Some(kind) = Aggregate::from_subtotal_code(code) else {
        return Ok(ValueEval::Error(ErrorCode::ValueInvalid));
    };
    let filter = CellFilter {
        skip_subtotals: true,
        skip_hidden_rows: code > 100,
    };
    let operands = operands(ctx, &args[1..], filter)?;
    Ok(kind.apply(&operands))
}

// Logical

fn if_fn(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let condition = try_value!(boolean(ctx, &args[0])?);
    let branch = if condition {
        args[1].clone()
    } else {
        args.get(2).cloned().unwrap_or(ValueEval::Boolean(false))
    };
    Ok(branch)
}

fn logical_values(operands: &[Operand]) -> Coerced<Vec<bool>> {
    let mut out = Vec::new();
    for operand in operands {
        match operand {
            Operand::Direct(ValueEval::Blank) => {}
            Operand::Direct(value) => out.push(value.to_boolean()?),
            Operand::Referenced(ValueEval::Boolean(b)) => out.push(*b),
            Operand::Referenced(ValueEval::Number(n)) => out.push(*n != 0.0),
            Operand::Referenced(ValueEval::Error(code)) => return Err(*code),
            Operand::Referenced(_) => {}
        }
    }
    if out.is_empty() {
        return Err(ErrorCode::ValueInvalid);
    }
    Ok(out)
}

fn and(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let operands = operands(ctx, args, CellFilter::default())?;
    let values = try_value!(logical_values(&operands));
    Ok(ValueEval::Boolean(values.iter().all(|b| *b)))
}

fn or(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let operands = operands(ctx, args, CellFilter::default())?;
    let values = try_value!(logical_values(&operands));
    Ok(ValueEval::Boolean(values.iter().any(|b| *b)))
}

fn not(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    Ok(ValueEval::Boolean(!try_value!(boolean(ctx, &args[0])?)))
}

fn true_fn(_ctx: &OperationEvaluationContext<'_, '_>, _args: &[ValueEval]) -> Result<ValueEval> {
    Ok(ValueEval::Boolean(true))
}

fn false_fn(_ctx: &OperationEvaluationContext<'_, '_>, _args: &[ValueEval]) -> Result<ValueEval> {
    Ok(ValueEval::Boolean(false))
}

// Information

fn iferror(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let value = scalar(ctx, &args[0])?;
    if value.is_error() {
        scalar(ctx, &args[1])
    } else {
        Ok(value)
    }
}

fn inspect(
    ctx: &OperationEvaluationContext<'_, '_>,
    args: &[ValueEval],
    test: fn(&ValueEval) -> bool,
) -> Result<ValueEval> {
    let value = scalar(ctx, &args[0])?;
    Ok(ValueEval::Boolean(test(&value)))
}

fn iserror(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    inspect(ctx, args, ValueEval::is_error)
}

fn iserr(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    inspect(ctx, args, |v| v.is_error() && v.error_code() != Some(ErrorCode::Na))
}

fn isna(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    inspect(ctx, args, |v| v.error_code() == Some(ErrorCode::Na))
}

fn isblank(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    inspect(ctx, args, ValueEval::is_blank)
}

fn isnumber(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    inspect(ctx, args, |v| matches!(v, ValueEval::Number(_)))
}

fn istext(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    inspect(ctx, args, |v| matches!(v, ValueEval::Text(_)))
}

fn islogical(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    inspect(ctx, args, |v| matches!(v, ValueEval::Boolean(_)))
}

fn na(_ctx: &OperationEvaluationContext<'_, '_>, _args: &[ValueEval]) -> Result<ValueEval> {
    Ok(ValueEval::Error(ErrorCode::Na))
}

// Math

fn abs(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    Ok(ValueEval::Number(try_value!(number(ctx, &args[0])?).abs()))
}

fn int(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    Ok(ValueEval::Number(try_value!(number(ctx, &args[0])?).floor()))
}

fn modulo(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let n = try_value!(number(ctx, &args[0])?);
    let d = try_value!(number(ctx, &args[1])?);
    if d == 0.0 {
        return Ok(ValueEval::Error(ErrorCode::DivZero));
    }
    Ok(ValueEval::checked_number(n - d * (n / d).floor()))
}

fn round(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let n = try_value!(number(ctx, &args[0])?);
    // Past 308 digits the factor is no longer a finite f64.
    let digits = try_value!(number(ctx, &args[1])?).trunc().clamp(-308.0, 308.0) as i32;
    let rounded = if digits >= 0 {
        let factor = 10f64.powi(digits);
        let scaled = n * factor;
        if !scaled.is_finite() {
            return Ok(ValueEval::checked_number(n));
        }
        scaled.round() / factor
    } else {
        let factor = 10f64.powi(-digits);
        (n / factor).round() * factor
    };
    Ok(ValueEval::checked_number(rounded))
}

fn sqrt(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let n = try_value!(number(ctx, &args[0])?);
    if n < 0.0 {
        return Ok(ValueEval::Error(ErrorCode::NumError));
    }
    Ok(ValueEval::Number(n.sqrt()))
}

fn power_fn(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let base = try_value!(number(ctx, &args[0])?);
    let exponent = try_value!(number(ctx, &args[1])?);
    Ok(power(base, exponent))
}

// Text

fn len(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let s = try_value!(text(ctx, &args[0])?);
    Ok(ValueEval::Number(s.chars().count() as f64))
}

fn upper(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    Ok(ValueEval::Text(try_value!(text(ctx, &args[0])?).to_uppercase()))
}

fn lower(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    Ok(ValueEval::Text(try_value!(text(ctx, &args[0])?).to_lowercase()))
}

fn trim(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let s = try_value!(text(ctx, &args[0])?);
    let words: Vec<&str> = s.split(' ').filter(|word| !word.is_empty()).collect();
    Ok(ValueEval::Text(words.join(" ")))
}

fn concatenate(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&try_value!(text(ctx, arg)?));
    }
    Ok(ValueEval::Text(out))
}

// Lookup and reference

fn row(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let row = match args.first() {
        None => ctx.row(),
        Some(ValueEval::Ref(reference)) => reference.row,
        Some(ValueEval::Area(area)) if area.sheets().is_some() => area.first_row(),
        Some(ValueEval::Error(code)) => return Ok(ValueEval::Error(*code)),
        Some(_) => return Ok(ValueEval::Error(ErrorCode::ValueInvalid)),
    };
    Ok(ValueEval::Number((row + 1) as f64))
}

fn column(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let col = match args.first() {
        None => ctx.column(),
        Some(ValueEval::Ref(reference)) => reference.col,
        Some(ValueEval::Area(area)) if area.sheets().is_some() => area.first_column(),
        Some(ValueEval::Error(code)) => return Ok(ValueEval::Error(*code)),
        Some(_) => return Ok(ValueEval::Error(ErrorCode::ValueInvalid)),
    };
    Ok(ValueEval::Number((col + 1) as f64))
}

fn rows(_ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let height = match &args[0] {
        ValueEval::Area(area) => area.height(),
        ValueEval::Error(code) => return Ok(ValueEval::Error(*code)),
        _ => 1,
    };
    Ok(ValueEval::Number(height as f64))
}

fn columns(_ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let width = match &args[0] {
        ValueEval::Area(area) => area.width(),
        ValueEval::Error(code) => return Ok(ValueEval::Error(*code)),
        _ => 1,
    };
    Ok(ValueEval::Number(width as f64))
}

/// Reference arguments as areas; scalars are rejected with the returned error.
fn area_arg(arg: &ValueEval) -> Coerced<AreaEval> {
    match arg {
        ValueEval::Ref(reference) => Ok(reference.as_area()),
        ValueEval::Area(area) => Ok(area.clone()),
        ValueEval::Error(code) => Err(*code),
        _ => Err(ErrorCode::ValueInvalid),
    }
}

/// Bad positions become `#REF!`; other engine errors propagate.
fn reference_result(result: Result<AreaEval>) -> Result<ValueEval> {
    match result {
        Ok(area) => Ok(ValueEval::Area(area)),
        Err(EvalError::InvalidArgument(_) | EvalError::IndexOutOfRange { .. }) => {
            Ok(ValueEval::Error(ErrorCode::RefInvalid))
        }
        Err(e) => Err(e),
    }
}

/// First and last relative index covered by `extent` cells starting at `start`.
/// Negative extents grow towards the origin. `None` when the span overflows.
fn span(start: isize, extent: isize) -> Option<(isize, isize)> {
    if extent > 0 {
        Some((start, start.checked_add(extent - 1)?))
    } else {
        Some((start.checked_add(extent + 1)?, start))
    }
}

fn offset(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let base = try_value!(area_arg(&args[0]));
    if base.sheets().is_none() {
        return Ok(ValueEval::Error(ErrorCode::ValueInvalid));
    }
    let rows = try_value!(number(ctx, &args[1])?).trunc() as isize;
    let cols = try_value!(number(ctx, &args[2])?).trunc() as isize;
    let height = match optional(args, 3) {
        Some(arg) => try_value!(number(ctx, arg)?).trunc() as isize,
        None => base.height() as isize,
    };
    let width = match optional(args, 4) {
        Some(arg) => try_value!(number(ctx, arg)?).trunc() as isize,
        None => base.width() as isize,
    };
    if height == 0 || width == 0 {
        return Ok(ValueEval::Error(ErrorCode::RefInvalid));
    }
    let (Some((first_row, last_row)), Some((first_col, last_col))) =
        (span(rows, height), span(cols, width))
    else {
        return Ok(ValueEval::Error(ErrorCode::RefInvalid));
    };
    reference_result(base.offset(first_row, last_row, first_col, last_col))
}

fn index(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let area = try_value!(area_arg(&args[0]));
    let row = try_value!(number(ctx, &args[1])?).trunc();
    let col = match optional(args, 2) {
        Some(arg) => Some(try_value!(number(ctx, arg)?).trunc()),
        None => None,
    };
    if row < 0.0 || col.is_some_and(|c| c < 0.0) {
        return Ok(ValueEval::Error(ErrorCode::ValueInvalid));
    }
    let row = row as usize;
    // A lone index into a single row selects a column.
    let (row, col) = match col {
        Some(col) => (row, col as usize),
        None if area.height() == 1 => (1, row),
        None if area.width() == 1 => (row, 1),
        None => (row, 0),
    };
    let result = match (row, col) {
        (0, 0) => Ok(area),
        (0, col) => area.get_column(col - 1),
        (row, 0) => area.get_row(row - 1),
        (row, col) if row > area.height() || col > area.width() => Err(EvalError::IndexOutOfRange {
            index: row.max(col),
            len: area.height().max(area.width()),
        }),
        (row, col) => {
            let (r, c) = ((row - 1) as isize, (col - 1) as isize);
            area.offset(r, r, c, c)
        }
    };
    reference_result(result)
}

// Date and time

fn excel_serial(at: NaiveDateTime) -> Option<f64> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    Some((at - epoch).num_milliseconds() as f64 / 86_400_000.0)
}

fn now(_ctx: &OperationEvaluationContext<'_, '_>, _args: &[ValueEval]) -> Result<ValueEval> {
    Ok(excel_serial(Local::now().naive_local())
        .map(ValueEval::Number)
        .unwrap_or(ValueEval::Error(ErrorCode::NumError)))
}

fn today(_ctx: &OperationEvaluationContext<'_, '_>, _args: &[ValueEval]) -> Result<ValueEval> {
    Ok(excel_serial(Local::now().naive_local())
        .map(|serial| ValueEval::Number(serial.floor()))
        .unwrap_or(ValueEval::Error(ErrorCode::NumError)))
}

// Random

fn rand_fn(_ctx: &OperationEvaluationContext<'_, '_>, _args: &[ValueEval]) -> Result<ValueEval> {
    Ok(ValueEval::Number(rand::thread_rng().r#gen::<f64>()))
}

fn randbetween(ctx: &OperationEvaluationContext<'_, '_>, args: &[ValueEval]) -> Result<ValueEval> {
    let low = try_value!(number(ctx, &args[0])?).ceil();
    let high = try_value!(number(ctx, &args[1])?).floor();
    if low > high || low < i64::MIN as f64 || high > i64::MAX as f64 {
        return Ok(ValueEval::Error(ErrorCode::NumError));
    }
    let k = rand::thread_rng().gen_range(low as i64..=high as i64);
    Ok(ValueEval::Number(k as f64))
}
