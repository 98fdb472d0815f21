//! Evaluation properties over the in-memory workbook.

use sheetcalc::sheetcalc_engine::engine::{AreaEval, BinaryOp, CellRangeAddress, EvaluatorConfig};
use sheetcalc::{
    CellCoordinate, CellRef, ErrorCode, EvalError, Token, ValueEval, Workbook, WorkbookEvaluator,
    parse_config,
};

fn cell(a1: &str) -> CellRef {
    CellRef::from_str(a1).unwrap()
}

fn r(text: &str) -> Token {
    Token::reference(text).unwrap()
}

fn binary(lhs: Token, rhs: Token, op: BinaryOp) -> Vec<Token> {
    vec![lhs, rhs, Token::Binary(op)]
}

fn at(a1: &str) -> CellCoordinate {
    let cell = cell(a1);
    CellCoordinate::new(0, cell.row, cell.col)
}

#[test]
fn test_repeat_evaluation_is_served_from_cache() {
    let workbook = Workbook::with_sheets(&["Sheet1"]);
    let sheet = workbook.sheet_by_name("Sheet1").unwrap();
    sheet.set_number(cell("A1"), 10.0);
    sheet.set_number(cell("B1"), 0.0);
    sheet.set_formula(cell("C1"), binary(r("A1"), r("B1"), BinaryOp::Divide));

    let evaluator = WorkbookEvaluator::new(&workbook);
    let first = evaluator.evaluate(at("C1")).unwrap();
    let after_first = evaluator.stats();
    let second = evaluator.evaluate(at("C1")).unwrap();
    let after_second = evaluator.stats();

    assert_eq!(first, ValueEval::Error(ErrorCode::DivZero));
    assert_eq!(first, second);
    assert_eq!(after_first.formula_evaluations, 1);
    assert_eq!(after_first.plain_reads, 2);
    assert_eq!(after_second.formula_evaluations, 1);
    assert_eq!(after_second.plain_reads, 2);
    assert_eq!(after_second.cache_hits, after_first.cache_hits + 1);

    evaluator.invalidate_values();
    assert_eq!(evaluator.cached_value_count(), 0);
    evaluator.evaluate(at("C1")).unwrap();
    assert_eq!(evaluator.stats().formula_evaluations, 2);
}

#[test]
fn test_offset_of_materialized_area_pads_with_blanks() {
    let workbook = Workbook::with_sheets(&["Sheet1"]);
    let evaluator = WorkbookEvaluator::new(&workbook);
    let area = AreaEval::materialized(CellRangeAddress::new(0, 0, 2, 2), vec![ValueEval::Number(1.0); 9]).unwrap();

    let moved = area.offset(1, 3, 1, 3).unwrap();
    assert_eq!(moved.bounds(), CellRangeAddress::new(1, 1, 3, 3));
    for row in 0..3 {
        for col in 0..3 {
            let expected = if row < 2 && col < 2 {
                ValueEval::Number(1.0)
            } else {
                ValueEval::Blank
            };
            assert_eq!(moved.relative_value(&evaluator, row, col).unwrap(), expected);
        }
    }
}

#[test]
fn test_errors_propagate_through_operators() {
    let workbook = Workbook::with_sheets(&["Sheet1"]);
    let sheet = workbook.sheet_by_name("Sheet1").unwrap();
    sheet.set_formula(
        cell("A1"),
        binary(Token::Number(10.0), Token::Number(0.0), BinaryOp::Divide),
    );
    sheet.set_formula(cell("A2"), binary(r("A1"), Token::Number(5.0), BinaryOp::Add));
    sheet.set_formula(cell("A3"), binary(r("Missing!B2"), Token::Number(1.0), BinaryOp::Add));

    let evaluator = WorkbookEvaluator::new(&workbook);
    assert_eq!(evaluator.evaluate(at("A1")).unwrap(), ValueEval::Error(ErrorCode::DivZero));
    assert_eq!(evaluator.evaluate(at("A2")).unwrap(), ValueEval::Error(ErrorCode::DivZero));
    assert_eq!(evaluator.evaluate(at("A3")).unwrap(), ValueEval::Error(ErrorCode::RefInvalid));
}

#[test]
fn test_circular_reference_is_an_error_value() {
    let workbook = Workbook::with_sheets(&["Sheet1"]);
    let sheet = workbook.sheet_by_name("Sheet1").unwrap();
    sheet.set_formula(cell("A1"), vec![r("B1")]);
    sheet.set_formula(cell("B1"), vec![r("A1")]);
    sheet.set_formula(cell("C1"), binary(r("A1"), Token::Number(1.0), BinaryOp::Add));

    let evaluator = WorkbookEvaluator::new(&workbook);
    assert_eq!(evaluator.evaluate(at("A1")).unwrap(), ValueEval::Error(ErrorCode::CircularRef));
    assert_eq!(evaluator.evaluate(at("C1")).unwrap(), ValueEval::Error(ErrorCode::CircularRef));
}

#[test]
fn test_subtotal_sees_hidden_rows() {
    let workbook = Workbook::with_sheets(&["Sheet1"]);
    let sheet = workbook.sheet_by_name("Sheet1").unwrap();
    sheet.set_number(cell("A1"), 1.0);
    sheet.set_number(cell("A2"), 2.0);
    sheet.set_number(cell("A3"), 4.0);
    sheet.set_row_hidden(1, true);
    sheet.set_formula(
        cell("B1"),
        vec![Token::Number(109.0), r("A1:A3"), Token::func("SUBTOTAL", 2)],
    );
    sheet.set_formula(
        cell("B2"),
        vec![Token::Number(9.0), r("A1:A3"), Token::func("SUBTOTAL", 2)],
    );
    sheet.set_formula(cell("B3"), vec![r("B1:B2"), Token::func("SUM", 1)]);

    let evaluator = WorkbookEvaluator::new(&workbook);
    assert_eq!(evaluator.evaluate(at("B1")).unwrap(), ValueEval::Number(5.0));
    assert_eq!(evaluator.evaluate(at("B2")).unwrap(), ValueEval::Number(7.0));
    assert_eq!(evaluator.evaluate(at("B3")).unwrap(), ValueEval::Number(12.0));
}

fn chain(length: usize) -> Workbook {
    let workbook = Workbook::with_sheets(&["Sheet1"]);
    let sheet = workbook.sheet_by_name("Sheet1").unwrap();
    sheet.set_number(CellRef::new(0, 0), 1.0);
    for row in 1..length {
        let previous = CellRef::new(0, row - 1).to_string();
        sheet.set_formula(
            CellRef::new(0, row),
            binary(r(&previous), Token::Number(1.0), BinaryOp::Add),
        );
    }
    workbook
}

#[test]
fn test_deep_chain_hits_recursion_limit() {
    let workbook = chain(200);
    let evaluator = WorkbookEvaluator::new(&workbook);
    let err = evaluator.evaluate(CellCoordinate::new(0, 199, 0)).unwrap_err();
    assert_eq!(err, EvalError::RecursionLimit { limit: 128 });

    // Nothing is left marked in progress.
    assert_eq!(
        evaluator.evaluate(CellCoordinate::new(0, 50, 0)).unwrap(),
        ValueEval::Number(51.0)
    );
}

#[test]
fn test_configured_depth_limit() {
    let config = parse_config("[evaluator]\nmax_depth = 16\n").unwrap();
    let workbook = chain(30);
    let evaluator = WorkbookEvaluator::with_config(&workbook, config.evaluator);
    assert_eq!(
        evaluator.evaluate(CellCoordinate::new(0, 29, 0)).unwrap_err(),
        EvalError::RecursionLimit { limit: 16 }
    );
    assert_eq!(
        evaluator.evaluate(CellCoordinate::new(0, 9, 0)).unwrap(),
        ValueEval::Number(10.0)
    );

    let uncached = EvaluatorConfig {
        cache_formula_results: false,
        ..EvaluatorConfig::default()
    };
    let evaluator = WorkbookEvaluator::with_config(&workbook, uncached);
    assert_eq!(
        evaluator.evaluate(CellCoordinate::new(0, 20, 0)).unwrap(),
        ValueEval::Number(21.0)
    );
    assert_eq!(evaluator.cached_value_count(), 0);
}
