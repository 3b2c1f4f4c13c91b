//! Cross-domain correlation of pattern tables.
//!
//! Each domain contributes one row per pattern and three numeric columns
//! (`strength`, `confidence`, `support`). Columns are aligned by row index and
//! correlated pairwise over the rows both columns have.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::stats::{column_strength, pearson};
use crate::config::AnalysisConfig;
use crate::domain::pattern::{
    CombinedPattern, CorrelatedPattern, CorrelationInfo, DomainPair, Pattern, PatternDomain,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Metric {
    Strength,
    Confidence,
    Support,
}

impl Metric {
    const ALL: [Metric; 3] = [Metric::Strength, Metric::Confidence, Metric::Support];

    fn as_str(self) -> &'static str {
        match self {
            Self::Strength => "strength",
            Self::Confidence => "confidence",
            Self::Support => "support",
        }
    }

    fn read(self, pattern: &Pattern) -> f64 {
        match self {
            Self::Strength => pattern.strength,
            Self::Confidence => pattern.confidence,
            Self::Support => pattern.support,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Column {
    domain: PatternDomain,
    label: String,
    values: Vec<f64>,
}

/// Full pairwise Pearson matrix over the concatenated domain columns.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationMatrix {
    columns: Vec<Column>,
    coefficients: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn build(tables: &BTreeMap<PatternDomain, &[Pattern]>) -> Self {
        let mut columns = Vec::new();
        for (domain, patterns) in tables {
            if patterns.is_empty() {
                continue;
            }
            for metric in Metric::ALL {
                columns.push(Column {
                    domain: *domain,
                    label: format!("{}.{}", domain.as_str(), metric.as_str()),
                    values: patterns.iter().map(|pattern| metric.read(pattern)).collect(),
                });
            }
        }

        let coefficients = columns
            .iter()
            .map(|a| {
                columns
                    .iter()
                    .map(|b| {
                        let rows = a.values.len().min(b.values.len());
                        pearson(&a.values[..rows], &b.values[..rows])
                    })
                    .collect()
            })
            .collect();

        Self { columns, coefficients }
    }

    pub fn labels(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.label.as_str()).collect()
    }

    pub fn coefficient(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|column| column.label == a)?;
        let j = self.columns.iter().position(|column| column.label == b)?;
        self.coefficients[i][j]
    }

    fn paired_rows(&self, i: usize, j: usize) -> usize {
        self.columns[i].values.len().min(self.columns[j].values.len())
    }
}

/// `|r| >= threshold`; the threshold itself counts as significant.
pub fn is_significant(coefficient: f64, threshold: f64) -> bool {
    coefficient.is_finite() && coefficient.abs() >= threshold
}

#[derive(Clone, Debug)]
pub struct PatternCorrelator {
    config: AnalysisConfig,
}

impl PatternCorrelator {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// A pattern survives on its own when its observation column is long enough
    /// and its column strength reaches the significance threshold.
    pub fn is_strong(&self, pattern: &Pattern) -> bool {
        pattern.meets_sample_gate(self.config.min_data_points)
            && column_strength(&pattern.observations) >= self.config.pattern_significance_threshold
    }

    pub fn combine(
        &self,
        behavior: &[Pattern],
        financial: &[Pattern],
        temporal: &[Pattern],
    ) -> Vec<CombinedPattern> {
        let tables: BTreeMap<PatternDomain, &[Pattern]> = BTreeMap::from([
            (PatternDomain::Behavior, behavior),
            (PatternDomain::Financial, financial),
            (PatternDomain::Temporal, temporal),
        ]);
        let matrix = CorrelationMatrix::build(&tables);
        let mut combined = self.correlated(&matrix, &tables);

        for patterns in tables.values() {
            combined.extend(
                patterns
                    .iter()
                    .filter(|pattern| self.is_strong(pattern))
                    .cloned()
                    .map(CombinedPattern::SingleDomain),
            );
        }

        combined
    }

    fn correlated(
        &self,
        matrix: &CorrelationMatrix,
        tables: &BTreeMap<PatternDomain, &[Pattern]>,
    ) -> Vec<CombinedPattern> {
        let mut combined = Vec::new();
        let columns = &matrix.columns;

        for i in 0..columns.len() {
            for j in (i + 1)..columns.len() {
                let Some(pair) = DomainPair::from_domains(columns[i].domain, columns[j].domain)
                else {
                    continue;
                };
                let Some(coefficient) = matrix.coefficients[i][j] else {
                    continue;
                };
                let sample_size = matrix.paired_rows(i, j);
                if sample_size < self.config.min_correlation_samples
                    || !is_significant(coefficient, self.config.correlation_threshold)
                {
                    continue;
                }

                let (first, second) = pair.domains();
                let patterns: BTreeMap<PatternDomain, Vec<Pattern>> = [first, second]
                    .into_iter()
                    .map(|domain| (domain, tables.get(&domain).map(|t| t.to_vec()).unwrap_or_default()))
                    .collect();
                let detected_at = latest_detection(patterns.values().flatten());

                combined.push(CombinedPattern::CrossDomain(CorrelatedPattern {
                    pair,
                    strength: coefficient.abs(),
                    patterns,
                    correlation: CorrelationInfo {
                        coefficient,
                        columns: (columns[i].label.clone(), columns[j].label.clone()),
                        sample_size,
                        detected_at,
                    },
                }));
            }
        }

        combined
    }
}

fn latest_detection<'a>(patterns: impl Iterator<Item = &'a Pattern>) -> DateTime<Utc> {
    patterns.map(|pattern| pattern.detected_at).max().unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{is_significant, CorrelationMatrix, PatternCorrelator};
    use crate::config::AnalysisConfig;
    use crate::domain::pattern::{
        BehaviorSignal, CombinedPattern, CombinedPatternKind, FinancialSignal, Pattern,
        PatternDomain, PatternPayload, TemporalSignal,
    };
    use crate::domain::record::SpendingCategory;

    fn behavior(strength: f64, observations: Vec<f64>) -> Pattern {
        Pattern::new(
            "focus_duration",
            "",
            PatternPayload::Behavior(BehaviorSignal::FocusDuration {
                average_minutes: 50.0,
                total_minutes: 500.0,
                session_count: 10,
            }),
            observations,
            Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).single().expect("timestamp"),
        )
        .with_scores(strength, strength / 2.0, 0.1)
    }

    fn financial(strength: f64) -> Pattern {
        Pattern::new(
            "spending_volatility",
            "",
            PatternPayload::Financial(FinancialSignal::SpendingVolatility {
                mean_daily: 10.0,
                std_dev: 5.0,
                max_daily: 20.0,
                min_daily: 1.0,
            }),
            vec![1.0; 10],
            Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).single().expect("timestamp"),
        )
        .with_scores(strength, 0.5, strength)
    }

    fn temporal(strength: f64) -> Pattern {
        Pattern::new(
            "peak_hours",
            "",
            PatternPayload::Temporal(TemporalSignal::CommonStartTimes { hours: vec![9] }),
            vec![9.0; 10],
            Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).single().expect("timestamp"),
        )
        .with_scores(strength, 0.3, 0.2)
    }

    #[test]
    fn threshold_is_inclusive() {
        assert!(is_significant(0.7, 0.7));
        assert!(is_significant(-0.7, 0.7));
        assert!(!is_significant(0.699, 0.7));
        assert!(!is_significant(f64::NAN, 0.7));
    }

    #[test]
    fn matrix_is_symmetric_and_aligned_by_row() {
        let behavior_table = vec![behavior(0.2, vec![]), behavior(0.4, vec![]), behavior(0.6, vec![])];
        let financial_table = vec![financial(0.1), financial(0.2), financial(0.3), financial(0.9)];
        let tables = BTreeMap::from([
            (PatternDomain::Behavior, behavior_table.as_slice()),
            (PatternDomain::Financial, financial_table.as_slice()),
        ]);

        let matrix = CorrelationMatrix::build(&tables);
        let forward = matrix.coefficient("behavior.strength", "financial.strength").expect("r");
        let backward = matrix.coefficient("financial.strength", "behavior.strength").expect("r");

        assert!((forward - 1.0).abs() < 1e-9);
        assert_eq!(forward, backward);
        assert_eq!(matrix.coefficient("behavior.support", "financial.strength"), None);
        assert_eq!(matrix.labels().len(), 6);
    }

    #[test]
    fn each_unordered_pair_is_emitted_once() {
        let behavior_table = vec![behavior(0.2, vec![]), behavior(0.4, vec![]), behavior(0.9, vec![])];
        let financial_table = vec![financial(0.1), financial(0.3), financial(0.8)];
        let temporal_table = vec![temporal(0.3), temporal(0.5), temporal(0.95)];

        let combined = PatternCorrelator::new(AnalysisConfig::default()).combine(
            &behavior_table,
            &financial_table,
            &temporal_table,
        );

        let mut seen = BTreeSet::new();
        for pattern in &combined {
            if let CombinedPattern::CrossDomain(correlated) = pattern {
                let (a, b) = correlated.correlation.columns.clone();
                assert!(!seen.contains(&(b.clone(), a.clone())), "{a} and {b} emitted twice");
                assert!(seen.insert((a, b)));
                assert!(correlated.strength >= 0.7);
                assert!(correlated.correlation.sample_size >= 3);
            }
        }
        let kinds: BTreeSet<String> =
            combined.iter().map(|pattern| pattern.type_name().to_string()).collect();
        assert!(kinds.contains("behavior_financial"));
        assert!(kinds.contains("temporal_financial"));
        assert!(kinds.contains("behavior_temporal"));
    }

    fn sixteenths(values: [u32; 4]) -> Vec<f64> {
        values.iter().map(|value| f64::from(*value) / 16.0).collect()
    }

    fn strength_pair(combined: &[CombinedPattern]) -> Option<f64> {
        combined.iter().find_map(|pattern| match pattern {
            CombinedPattern::CrossDomain(correlated)
                if correlated.correlation.columns
                    == ("behavior.strength".to_string(), "financial.strength".to_string()) =>
            {
                Some(correlated.correlation.coefficient)
            }
            _ => None,
        })
    }

    #[test]
    fn combine_keeps_a_pair_exactly_at_the_threshold() {
        let behavior_table: Vec<Pattern> =
            sixteenths([1, 1, 4, 6]).into_iter().map(|s| behavior(s, vec![])).collect();
        let at_threshold: Vec<Pattern> =
            sixteenths([1, 8, 9, 10]).into_iter().map(financial).collect();
        let just_below: Vec<Pattern> =
            sixteenths([1, 9, 6, 14]).into_iter().map(financial).collect();
        let correlator = PatternCorrelator::new(AnalysisConfig::default());

        let kept = correlator.combine(&behavior_table, &at_threshold, &[]);
        assert_eq!(strength_pair(&kept), Some(0.7));

        let dropped = correlator.combine(&behavior_table, &just_below, &[]);
        assert_eq!(strength_pair(&dropped), None);
    }

    #[test]
    fn too_few_rows_are_not_correlated() {
        let behavior_table = vec![behavior(0.2, vec![]), behavior(0.4, vec![])];
        let financial_table = vec![financial(0.1), financial(0.3)];

        let combined = PatternCorrelator::new(AnalysisConfig::default()).combine(
            &behavior_table,
            &financial_table,
            &[],
        );

        assert!(combined.iter().all(|pattern| !matches!(pattern, CombinedPattern::CrossDomain(_))));
    }

    #[test]
    fn strong_single_patterns_pass_through_untouched() {
        let strong = behavior(0.9, vec![80.0; 12]);
        let short = behavior(0.9, vec![80.0; 4]);
        let weak = behavior(0.9, vec![0.1; 12]);

        let combined = PatternCorrelator::new(AnalysisConfig::default()).combine(
            &[strong.clone(), short, weak],
            &[],
            &[],
        );

        assert_eq!(combined, vec![CombinedPattern::SingleDomain(strong)]);
        assert_eq!(combined[0].kind(), CombinedPatternKind::SingleDomain(PatternDomain::Behavior));
    }

    #[test]
    fn budget_overrun_passes_through_with_few_purchases() {
        let overrun = Pattern::new(
            "discretionary_budget",
            "",
            PatternPayload::Financial(FinancialSignal::BudgetVariance {
                category: SpendingCategory::Discretionary,
                variance: 0.3,
                limit: Decimal::new(500, 0),
                actual: Decimal::new(650, 0),
            }),
            vec![300.0, 350.0],
            Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).single().expect("timestamp"),
        )
        .with_scores(0.3, 0.6, 1.0);

        let combined =
            PatternCorrelator::new(AnalysisConfig::default()).combine(&[], &[overrun.clone()], &[]);

        assert_eq!(combined, vec![CombinedPattern::SingleDomain(overrun)]);
    }
}
