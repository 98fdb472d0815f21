//! Rule matching over the in-memory workbook.

use std::rc::Rc;

use pretty_assertions::assert_eq;

use sheetcalc_core::conditional_formatting::{
    AverageFilter, Condition, ConditionalFormatting, ConditionalFormattingEvaluator,
    ConditionalFormattingRule, ComparisonOperator, FilterCondition,
};
use sheetcalc_core::{CellRef, CellReference, CoreError, Workbook};
use sheetcalc_engine::engine::{BinaryOp, CellRangeAddress, Formula, Token};

fn cell(a1: &str) -> CellRef {
    CellRef::from_str(a1).unwrap()
}

fn range(text: &str) -> CellRangeAddress {
    CellRangeAddress::parse(text).unwrap()
}

fn at(text: &str) -> CellReference {
    CellReference::parse(text).unwrap()
}

fn refs(cells: &[&str]) -> Vec<CellReference> {
    cells.iter().map(|text| at(text)).collect()
}

fn formula(tokens: Vec<Token>) -> Formula {
    Formula::new(tokens)
}

/// `ref > n`
fn greater_than(reference: &str, n: f64) -> Formula {
    formula(vec![
        Token::reference(reference).unwrap(),
        Token::Number(n),
        Token::Binary(BinaryOp::Greater),
    ])
}

fn column_of_numbers(values: &[f64]) -> Workbook {
    let workbook = Workbook::with_sheets(&["Sheet1", "Empty"]);
    let sheet = workbook.sheet_by_name("Sheet1").unwrap();
    for (row, value) in values.iter().enumerate() {
        sheet.set_number(CellRef::new(0, row), *value);
    }
    workbook
}

fn add_rule(workbook: &Workbook, regions: &str, rule: ConditionalFormattingRule) {
    let regions = regions.split(',').map(range).collect();
    workbook
        .sheet_by_name("Sheet1")
        .unwrap()
        .add_conditional_formatting(ConditionalFormatting::new(regions, vec![rule]));
}

#[test]
fn test_cell_value_between() {
    let workbook = column_of_numbers(&[1.0, 2.0, 3.0, 4.0, 5.0]);
    add_rule(
        &workbook,
        "A1:A6",
        ConditionalFormattingRule::new(Condition::cell_value(
            ComparisonOperator::Between,
            formula(vec![Token::Number(2.0)]),
            Some(formula(vec![Token::Number(4.0)])),
        )),
    );
    let evaluator = ConditionalFormattingEvaluator::new(&workbook);
    let cells = evaluator.matching_cells_for("Sheet1", 0, 0).unwrap();
    assert_eq!(cells, refs(&["Sheet1!A2", "Sheet1!A3", "Sheet1!A4"]));
}

#[test]
fn test_cell_value_skips_undefined_and_empty_cells() {
    let workbook = column_of_numbers(&[0.0]);
    let sheet = workbook.sheet_by_name("Sheet1").unwrap();
    sheet.set_text(cell("A2"), "");
    add_rule(
        &workbook,
        "A1:A3",
        ConditionalFormattingRule::new(Condition::cell_value(
            ComparisonOperator::LessOrEqual,
            formula(vec![Token::Number(0.0)]),
            None,
        )),
    );
    let evaluator = ConditionalFormattingEvaluator::new(&workbook);
    assert_eq!(evaluator.matching_cells_for("Sheet1", 0, 0).unwrap(), refs(&["Sheet1!A1"]));
}

#[test]
fn test_cell_value_text_and_incompatible_operands() {
    let workbook = Workbook::with_sheets(&["Sheet1"]);
    let sheet = workbook.sheet_by_name("Sheet1").unwrap();
    sheet.set_text(cell("A1"), "apple");
    sheet.set_text(cell("A2"), "pear");
    add_rule(
        &workbook,
        "A1:A2",
        ConditionalFormattingRule::new(Condition::cell_value(
            ComparisonOperator::Equal,
            formula(vec![Token::text("APPLE")]),
            None,
        )),
    );
    add_rule(
        &workbook,
        "A1:A2",
        ConditionalFormattingRule::new(Condition::cell_value(
            ComparisonOperator::NotEqual,
            formula(vec![Token::Number(1.0)]),
            None,
        )),
    );
    let evaluator = ConditionalFormattingEvaluator::new(&workbook);
    assert_eq!(evaluator.matching_cells_for("Sheet1", 0, 0).unwrap(), refs(&["Sheet1!A1"]));
    assert_eq!(
        evaluator.matching_cells_for("Sheet1", 1, 0).unwrap(),
        refs(&["Sheet1!A1", "Sheet1!A2"])
    );
}

#[test]
fn test_formula_rule_is_relative_to_anchor() {
    let workbook = Workbook::with_sheets(&["Sheet1"]);
    let sheet = workbook.sheet_by_name("Sheet1").unwrap();
    sheet.set_number(cell("B2"), 5.0);
    sheet.set_number(cell("B3"), 20.0);
    sheet.set_number(cell("B4"), 11.0);
    let condition = greater_than("B2", 10.0);
    add_rule(
        &workbook,
        "B2:B4",
        ConditionalFormattingRule::new(Condition::Formula(condition.clone())),
    );

    let evaluator = ConditionalFormattingEvaluator::new(&workbook);
    assert_eq!(
        evaluator.matching_cells_for("Sheet1", 0, 0).unwrap(),
        refs(&["Sheet1!B3", "Sheet1!B4"])
    );
    let rule = evaluator.rule("Sheet1", 0, 0).unwrap();
    assert_eq!(rule.condition(), &Condition::Formula(condition));
}

#[test]
fn test_formula_rule_truthiness() {
    let workbook = Workbook::with_sheets(&["Sheet1"]);
    let sheet = workbook.sheet_by_name("Sheet1").unwrap();
    sheet.set_number(cell("A1"), 0.0);
    sheet.set_number(cell("A2"), 2.0);
    sheet.set_text(cell("A4"), "yes");
    sheet.set_formula(
        cell("A5"),
        vec![Token::Number(1.0), Token::Number(0.0), Token::Binary(BinaryOp::Divide)],
    );
    // Rule formula is just the cell itself.
    add_rule(
        &workbook,
        "A1:A5",
        ConditionalFormattingRule::new(Condition::Formula(formula(vec![
            Token::reference("A1").unwrap(),
        ]))),
    );
    let evaluator = ConditionalFormattingEvaluator::new(&workbook);
    // A3 is blank and matches; text and errors do not.
    assert_eq!(
        evaluator.matching_cells_for("Sheet1", 0, 0).unwrap(),
        refs(&["Sheet1!A2", "Sheet1!A3"])
    );
}

#[test]
fn test_anchor_shift_off_the_grid_never_matches() {
    let workbook = Workbook::with_sheets(&["Sheet1"]);
    let sheet = workbook.sheet_by_name("Sheet1").unwrap();
    sheet.set_number(cell("A1"), 5.0);
    sheet.set_number(cell("B1"), 5.0);
    // Anchor is A3, so B1 shifts A1 two rows above the grid.
    add_rule(
        &workbook,
        "B1:B2,A3",
        ConditionalFormattingRule::new(Condition::Formula(greater_than("A1", 0.0))),
    );
    let evaluator = ConditionalFormattingEvaluator::new(&workbook);
    let rule = evaluator.rule("Sheet1", 0, 0).unwrap();
    assert_eq!(rule.anchor(), cell("A3"));
    assert_eq!(evaluator.matching_cells(&rule).unwrap(), refs(&["Sheet1!A3"]));
}

#[test]
fn test_priority_order_and_stop_if_true() {
    let workbook = column_of_numbers(&[1.0, 2.0]);
    let sheet = workbook.sheet_by_name("Sheet1").unwrap();
    sheet.add_conditional_formatting(ConditionalFormatting::new(
        vec![range("A1:A2")],
        vec![
            ConditionalFormattingRule::new(Condition::DataBar).with_priority(3),
            ConditionalFormattingRule::new(Condition::Formula(greater_than("A1", 1.0)))
                .with_priority(2)
                .with_stop_if_true(true),
        ],
    ));
    sheet.add_conditional_formatting(ConditionalFormatting::new(
        vec![range("A1:A2")],
        vec![ConditionalFormattingRule::new(Condition::IconSet).with_priority(1)],
    ));

    let evaluator = ConditionalFormattingEvaluator::new(&workbook);
    let order: Vec<(usize, usize)> = evaluator
        .rules_for_sheet("sheet1")
        .unwrap()
        .iter()
        .map(|rule| (rule.formatting_index(), rule.rule_index()))
        .collect();
    assert_eq!(order, vec![(1, 0), (0, 1), (0, 0)]);

    let ids = |cell: &str| -> Vec<(usize, usize)> {
        evaluator
            .rules_matching_cell(&at(cell))
            .unwrap()
            .iter()
            .map(|rule| (rule.formatting_index(), rule.rule_index()))
            .collect()
    };
    assert_eq!(ids("Sheet1!A1"), vec![(1, 0), (0, 0)]);
    assert_eq!(ids("Sheet1!A2"), vec![(1, 0), (0, 1)]);
    assert!(evaluator.rules_matching_cell(&at("Sheet1!C1")).unwrap().is_empty());
}

#[test]
fn test_invalidation_scopes() {
    let workbook = column_of_numbers(&[1.0]);
    add_rule(
        &workbook,
        "A1",
        ConditionalFormattingRule::new(Condition::Formula(greater_than("A1", 2.0))),
    );
    let evaluator = ConditionalFormattingEvaluator::new(&workbook);
    let target = at("Sheet1!A1");

    let rules = evaluator.rules_for_sheet("Sheet1").unwrap();
    let matches = evaluator.rules_matching_cell(&target).unwrap();
    assert!(matches.is_empty());
    assert!(Rc::ptr_eq(&rules, &evaluator.rules_for_sheet("Sheet1").unwrap()));
    assert!(Rc::ptr_eq(&matches, &evaluator.rules_matching_cell(&target).unwrap()));

    workbook
        .sheet_by_name("Sheet1")
        .unwrap()
        .set_number(cell("A1"), 3.0);
    // Stale until values are invalidated.
    assert!(evaluator.rules_matching_cell(&target).unwrap().is_empty());

    evaluator.invalidate_values();
    assert!(Rc::ptr_eq(&rules, &evaluator.rules_for_sheet("Sheet1").unwrap()));
    let matches = evaluator.rules_matching_cell(&target).unwrap();
    assert_eq!(matches.len(), 1);

    evaluator.invalidate_formats();
    assert!(!Rc::ptr_eq(&rules, &evaluator.rules_for_sheet("Sheet1").unwrap()));
    assert!(Rc::ptr_eq(&matches, &evaluator.rules_matching_cell(&target).unwrap()));
}

#[test]
fn test_sheet_without_rules_is_cached_empty() {
    let workbook = column_of_numbers(&[1.0]);
    let evaluator = ConditionalFormattingEvaluator::new(&workbook);
    let rules = evaluator.rules_for_sheet("Empty").unwrap();
    assert!(rules.is_empty());
    assert!(Rc::ptr_eq(&rules, &evaluator.rules_for_sheet("EMPTY").unwrap()));
}

#[test]
fn test_unknown_sheet_and_rule() {
    let workbook = column_of_numbers(&[1.0]);
    let evaluator = ConditionalFormattingEvaluator::new(&workbook);
    assert!(matches!(
        evaluator.rules_for_sheet("Nope"),
        Err(CoreError::UnknownSheet(name)) if name == "Nope"
    ));
    assert!(matches!(
        evaluator.rules_matching_cell(&at("Nope!A1")),
        Err(CoreError::UnknownSheet(_))
    ));
    assert!(matches!(
        evaluator.rule("Sheet1", 0, 0),
        Err(CoreError::UnknownRule { formatting_index: 0, rule_index: 0, .. })
    ));
}

#[test]
fn test_top_ten_and_above_average_filters() {
    let workbook = column_of_numbers(&[10.0, 50.0, 30.0, 20.0, 40.0]);
    add_rule(
        &workbook,
        "A1:A5",
        ConditionalFormattingRule::new(Condition::Filter(FilterCondition::TopTen {
            rank: 2,
            percent: false,
            bottom: false,
        })),
    );
    add_rule(
        &workbook,
        "A1:A5",
        ConditionalFormattingRule::new(Condition::Filter(FilterCondition::AboveAverage(
            AverageFilter {
                above: false,
                equal: true,
                std_dev: 0,
            },
        ))),
    );
    let evaluator = ConditionalFormattingEvaluator::new(&workbook);
    assert_eq!(
        evaluator.matching_cells_for("Sheet1", 0, 0).unwrap(),
        refs(&["Sheet1!A2", "Sheet1!A5"])
    );
    assert_eq!(
        evaluator.matching_cells_for("Sheet1", 1, 0).unwrap(),
        refs(&["Sheet1!A1", "Sheet1!A3", "Sheet1!A4"])
    );
}

#[test]
fn test_duplicate_and_text_filters() {
    let workbook = Workbook::with_sheets(&["Sheet1"]);
    let sheet = workbook.sheet_by_name("Sheet1").unwrap();
    sheet.set_text(cell("A1"), "North");
    sheet.set_text(cell("A2"), "South");
    sheet.set_text(cell("A3"), "North");
    sheet.set_number(cell("A4"), 7.0);
    add_rule(
        &workbook,
        "A1:A4",
        ConditionalFormattingRule::new(Condition::Filter(FilterCondition::DuplicateValues)),
    );
    add_rule(
        &workbook,
        "A1:A4",
        ConditionalFormattingRule::new(Condition::Filter(FilterCondition::BeginsWith(
            "so".to_string(),
        ))),
    );
    let evaluator = ConditionalFormattingEvaluator::new(&workbook);
    assert_eq!(
        evaluator.matching_cells_for("Sheet1", 0, 0).unwrap(),
        refs(&["Sheet1!A1", "Sheet1!A3"])
    );
    assert_eq!(evaluator.matching_cells_for("Sheet1", 1, 0).unwrap(), refs(&["Sheet1!A2"]));
}

#[test]
fn test_error_filter_sees_formula_results() {
    let workbook = Workbook::with_sheets(&["Sheet1"]);
    let sheet = workbook.sheet_by_name("Sheet1").unwrap();
    sheet.set_number(cell("A1"), 1.0);
    sheet.set_formula(
        cell("A2"),
        vec![Token::Number(1.0), Token::Number(0.0), Token::Binary(BinaryOp::Divide)],
    );
    add_rule(
        &workbook,
        "A1:A2",
        ConditionalFormattingRule::new(Condition::Filter(FilterCondition::ContainsErrors)),
    );
    let evaluator = ConditionalFormattingEvaluator::new(&workbook);
    assert_eq!(evaluator.matching_cells_for("Sheet1", 0, 0).unwrap(), refs(&["Sheet1!A2"]));
}
