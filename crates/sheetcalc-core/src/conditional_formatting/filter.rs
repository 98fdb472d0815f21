//! Filter conditions and the per-region statistics some of them need.

use serde::{Deserialize, Serialize};

use sheetcalc_engine::engine::{Formula, ValueEval, format_number};

use super::operator::{Comparable, ComparisonOperator};

#[derive(Clone, Debug, PartialEq)]
pub enum FilterCondition {
    /// The `rank` highest (or lowest) numbers, or that percentage of them.
    TopTen { rank: u32, percent: bool, bottom: bool },
    UniqueValues,
    DuplicateValues,
    /// Numbers above or below the region mean, optionally offset by a number
    /// of standard deviations.
    AboveAverage(AverageFilter),
    ContainsText(String),
    NotContainsText(String),
    BeginsWith(String),
    EndsWith(String),
    ContainsBlanks,
    NotContainsBlanks,
    ContainsErrors,
    NotContainsErrors,
    TimePeriod(Formula),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AverageFilter {
    pub above: bool,
    pub equal: bool,
    pub std_dev: u32,
}

impl FilterCondition {
    /// True if matching needs statistics over the whole region.
    pub(crate) fn uses_region_stats(&self) -> bool {
        matches!(
            self,
            FilterCondition::TopTen { .. }
                | FilterCondition::UniqueValues
                | FilterCondition::DuplicateValues
                | FilterCondition::AboveAverage(_)
        )
    }

    /// Only numeric cells take part in top-N and average statistics.
    pub(crate) fn numbers_only(&self) -> bool {
        matches!(self, FilterCondition::TopTen { .. } | FilterCondition::AboveAverage(_))
    }

    pub(crate) fn region_stats(&self, mut samples: Vec<CellSample>) -> RegionStats {
        if self.numbers_only() {
            samples.retain(|sample| sample.number.is_some());
        }
        match self {
            FilterCondition::TopTen {
                rank,
                percent,
                bottom,
            } => {
                let mut numbers: Vec<f64> = samples.iter().filter_map(|s| s.number).collect();
                if *bottom {
                    numbers.sort_by(|a, b| a.total_cmp(b));
                } else {
                    numbers.sort_by(|a, b| b.total_cmp(a));
                }
                let mut limit = *rank as usize;
                if *percent {
                    limit = numbers.len() * limit / 100;
                }
                numbers.truncate(limit);
                RegionStats::Members(numbers.into_iter().map(CellSample::number).collect())
            }
            FilterCondition::UniqueValues => RegionStats::Members(by_occurrence(&samples, |n| n == 1)),
            FilterCondition::DuplicateValues => RegionStats::Members(by_occurrence(&samples, |n| n > 1)),
            FilterCondition::AboveAverage(_) => {
                let numbers: Vec<f64> = samples.iter().filter_map(|s| s.number).collect();
                let mean = if numbers.is_empty() {
                    0.0
                } else {
                    numbers.iter().sum::<f64>() / numbers.len() as f64
                };
                let std_dev = if numbers.len() <= 1 {
                    0.0
                } else {
                    let squares: f64 = numbers.iter().map(|n| (n - mean).powi(2)).sum();
                    (squares / (numbers.len() - 1) as f64).sqrt()
                };
                RegionStats::Average { mean, std_dev }
            }
            _ => RegionStats::Members(Vec::new()),
        }
    }

    /// Match one cell. `TimePeriod` is formula driven and never matches here.
    pub(crate) fn matches(&self, sample: &CellSample, is_error: bool, stats: Option<&RegionStats>) -> bool {
        match self {
            FilterCondition::TopTen { .. } if sample.number.is_none() => false,
            FilterCondition::TopTen { .. }
            | FilterCondition::UniqueValues
            | FilterCondition::DuplicateValues => match stats {
                Some(RegionStats::Members(members)) => members.contains(sample),
                _ => false,
            },
            FilterCondition::AboveAverage(config) => {
                let (Some(value), Some(RegionStats::Average { mean, std_dev })) = (sample.number, stats) else {
                    return false;
                };
                let direction = if config.above { 1.0 } else { -1.0 };
                let threshold = if config.std_dev > 0 {
                    mean + direction * std_dev * config.std_dev as f64
                } else {
                    *mean
                };
                let operator = match (config.above, config.equal) {
                    (true, true) => ComparisonOperator::GreaterOrEqual,
                    (true, false) => ComparisonOperator::GreaterThan,
                    (false, true) => ComparisonOperator::LessOrEqual,
                    (false, false) => ComparisonOperator::LessThan,
                };
                operator.is_valid(
                    &Comparable::Number(value),
                    Some(&Comparable::Number(threshold)),
                    None,
                )
            }
            FilterCondition::ContainsText(text) => sample.display_lower().contains(&text.to_lowercase()),
            FilterCondition::NotContainsText(text) => !sample.display_lower().contains(&text.to_lowercase()),
            FilterCondition::BeginsWith(text) => sample.display_lower().starts_with(&text.to_lowercase()),
            FilterCondition::EndsWith(text) => sample.display_lower().ends_with(&text.to_lowercase()),
            FilterCondition::ContainsBlanks => !is_error && sample.is_blank(),
            FilterCondition::NotContainsBlanks => is_error || !sample.is_blank(),
            FilterCondition::ContainsErrors => is_error,
            FilterCondition::NotContainsErrors => !is_error,
            FilterCondition::TimePeriod(_) => false,
        }
    }
}

/// Values of the samples whose occurrence count satisfies `keep`.
fn by_occurrence(samples: &[CellSample], keep: impl Fn(usize) -> bool) -> Vec<CellSample> {
    let mut counted: Vec<(&CellSample, usize)> = Vec::new();
    for sample in samples {
        match counted.iter_mut().find(|(seen, _)| *seen == sample) {
            Some((_, count)) => *count += 1,
            None => counted.push((sample, 1)),
        }
    }
    counted
        .into_iter()
        .filter(|(_, count)| keep(*count))
        .map(|(sample, _)| sample.clone())
        .collect()
}

/// Cached result of a region scan.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum RegionStats {
    Members(Vec<CellSample>),
    Average { mean: f64, std_dev: f64 },
}

/// A cell's value as filters see it: a number, or text. Booleans read as
/// their text, blanks and errors as empty text.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CellSample {
    pub number: Option<f64>,
    pub text: String,
}

impl CellSample {
    pub fn number(n: f64) -> Self {
        CellSample {
            number: Some(n),
            text: String::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        CellSample {
            number: None,
            text: text.into(),
        }
    }

    pub fn from_value(value: &ValueEval) -> Self {
        match value {
            ValueEval::Number(n) => CellSample::number(*n),
            ValueEval::Text(s) => CellSample::text(s.as_str()),
            ValueEval::Boolean(b) => CellSample::text(if *b { "TRUE" } else { "FALSE" }),
            _ => CellSample::text(""),
        }
    }

    fn is_blank(&self) -> bool {
        self.number.is_none() && self.text.trim().is_empty()
    }

    fn display_lower(&self) -> String {
        match self.number {
            Some(n) => format_number(n),
            None => self.text.to_lowercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(values: &[f64]) -> Vec<CellSample> {
        values.iter().copied().map(CellSample::number).collect()
    }

    #[test]
    fn test_top_ten_rank_and_percent() {
        let samples = numbers(&[1.0, 9.0, 4.0, 7.0, 3.0]);
        let top = FilterCondition::TopTen {
            rank: 2,
            percent: false,
            bottom: false,
        };
        let stats = top.region_stats(samples.clone());
        assert!(top.matches(&CellSample::number(9.0), false, Some(&stats)));
        assert!(top.matches(&CellSample::number(7.0), false, Some(&stats)));
        assert!(!top.matches(&CellSample::number(4.0), false, Some(&stats)));

        let bottom = FilterCondition::TopTen {
            rank: 40,
            percent: true,
            bottom: true,
        };
        let stats = bottom.region_stats(samples);
        assert_eq!(
            stats,
            RegionStats::Members(vec![CellSample::number(1.0), CellSample::number(3.0)])
        );
    }

    #[test]
    fn test_unique_and_duplicate_values() {
        let mut samples = numbers(&[1.0, 2.0, 2.0, 2.0]);
        samples.push(CellSample::text("x"));
        let unique = FilterCondition::UniqueValues.region_stats(samples.clone());
        assert_eq!(
            unique,
            RegionStats::Members(vec![CellSample::number(1.0), CellSample::text("x")])
        );
        let duplicates = FilterCondition::DuplicateValues.region_stats(samples);
        assert_eq!(duplicates, RegionStats::Members(vec![CellSample::number(2.0)]));
    }

    #[test]
    fn test_above_average_with_std_dev() {
        let samples = numbers(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let plain = FilterCondition::AboveAverage(AverageFilter {
            above: true,
            equal: false,
            std_dev: 0,
        });
        let stats = plain.region_stats(samples.clone());
        assert!(plain.matches(&CellSample::number(7.0), false, Some(&stats)));
        assert!(!plain.matches(&CellSample::number(5.0), false, Some(&stats)));

        let one_sigma = FilterCondition::AboveAverage(AverageFilter {
            above: true,
            equal: false,
            std_dev: 1,
        });
        let stats = one_sigma.region_stats(samples);
        assert!(one_sigma.matches(&CellSample::number(9.0), false, Some(&stats)));
        assert!(!one_sigma.matches(&CellSample::number(7.0), false, Some(&stats)));
    }

    #[test]
    fn test_text_filters_ignore_case() {
        let sample = CellSample::text("Quarterly Report");
        assert!(FilterCondition::ContainsText("REPORT".into()).matches(&sample, false, None));
        assert!(FilterCondition::BeginsWith("quarter".into()).matches(&sample, false, None));
        assert!(FilterCondition::EndsWith("PORT".into()).matches(&sample, false, None));
        assert!(!FilterCondition::NotContainsText("report".into()).matches(&sample, false, None));
        assert!(FilterCondition::ContainsText("2.5".into()).matches(&CellSample::number(12.5), false, None));
    }

    #[test]
    fn test_blank_and_error_filters() {
        let blank = CellSample::text("  ");
        assert!(FilterCondition::ContainsBlanks.matches(&blank, false, None));
        assert!(!FilterCondition::ContainsBlanks.matches(&CellSample::number(0.0), false, None));
        assert!(!FilterCondition::ContainsBlanks.matches(&CellSample::text(""), true, None));
        assert!(FilterCondition::ContainsErrors.matches(&CellSample::text(""), true, None));
        assert!(FilterCondition::NotContainsErrors.matches(&blank, false, None));
    }
}
