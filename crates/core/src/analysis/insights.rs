//! Turns combined patterns into ranked, deduplicated insights.

use std::collections::BTreeSet;

use serde_json::json;

use crate::config::AnalysisConfig;
use crate::domain::insight::{Insight, InsightCategory, InsightId, InsightType, Severity};
use crate::domain::pattern::{
    BehaviorSignal, CombinedPattern, CorrelatedPattern, DaySegment, DomainPair, FinancialSignal,
    Pattern, PatternPayload, TemporalSignal,
};
use crate::domain::record::SpendingCategory;
use crate::errors::InsightError;

// ============================================================================
// Severity thresholds
// ============================================================================

const HEAVY_DISTRACTION_PER_DAY: f64 = 10.0;
const HIGH_CORRELATION: f64 = 0.9;
const MEDIUM_CORRELATION: f64 = 0.8;

#[derive(Clone, Debug)]
pub struct InsightGenerator {
    config: AnalysisConfig,
}

impl InsightGenerator {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn generate_insights(&self, patterns: &[CombinedPattern]) -> Vec<Insight> {
        let mut insights = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            match self.build(pattern) {
                Ok(insight) => insights.push(insight),
                Err(error) => tracing::warn!(
                    event_name = "analysis.insight.builder_failed",
                    pattern_type = pattern.type_name(),
                    error = %error,
                    "skipping pattern that could not be turned into an insight"
                ),
            }
        }
        rank(dedup(insights))
    }

    fn build(&self, pattern: &CombinedPattern) -> Result<Insight, InsightError> {
        match pattern {
            CombinedPattern::CrossDomain(correlated) => self.cross_domain(correlated),
            CombinedPattern::SingleDomain(pattern) => {
                ensure_finite(pattern.pattern_type(), "strength", pattern.strength)?;
                ensure_finite(pattern.pattern_type(), "confidence", pattern.confidence)?;
                let insight = match &pattern.payload {
                    PatternPayload::Behavior(signal) => self.behavior(pattern, signal),
                    PatternPayload::Financial(signal) => self.financial(pattern, signal),
                    PatternPayload::Temporal(signal) => self.temporal(pattern, signal),
                };
                Ok(insight.with_metadata("pattern_type", json!(pattern.pattern_type())))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Behavior
    // ------------------------------------------------------------------------

    fn behavior(&self, pattern: &Pattern, signal: &BehaviorSignal) -> Insight {
        let thresholds = &self.config.behavior;
        let single = |category, title: String, description: String, severity| {
            single_domain(pattern, InsightType::Behavior, category, title, description, severity)
        };

        match signal {
            BehaviorSignal::PeakFocusHours { peak_hour, peak_duration_minutes, session_count } => {
                single(
                    InsightCategory::PeakFocusHours,
                    format!("Peak focus at {peak_hour:02}:00"),
                    format!(
                        "{session_count} focus sessions; the {peak_hour:02}:00 hour holds \
                         {peak_duration_minutes:.0} minutes of deep work."
                    ),
                    Severity::Low,
                )
                .with_metadata("peak_hour", json!(peak_hour))
            }
            BehaviorSignal::FocusDuration { average_minutes, session_count, .. } => {
                let (title, severity) = if *average_minutes < thresholds.critical_focus_minutes {
                    ("Low focus time", Severity::High)
                } else if *average_minutes < thresholds.low_focus_minutes {
                    ("Low focus time", Severity::Medium)
                } else {
                    ("Sustained focus sessions", Severity::Low)
                };
                single(
                    InsightCategory::Focus,
                    title.to_string(),
                    format!(
                        "Focus sessions average {average_minutes:.0} minutes across \
                         {session_count} sessions (target {:.0}).",
                        thresholds.optimal_focus_minutes
                    ),
                    severity,
                )
                .with_metadata("average_minutes", json!(average_minutes))
            }
            BehaviorSignal::ProductivityScore { score, focus_time_share, .. } => {
                let (title, severity) = if *score < thresholds.critical_productivity_score {
                    ("Low productivity", Severity::High)
                } else if *score < thresholds.low_productivity_score {
                    ("Low productivity", Severity::Medium)
                } else {
                    ("Productive application mix", Severity::Low)
                };
                single(
                    InsightCategory::Productivity,
                    title.to_string(),
                    format!(
                        "Weighted productivity score is {score:.2}; {:.0}% of tracked time \
                         is spent in focused work.",
                        focus_time_share * 100.0
                    ),
                    severity,
                )
                .with_metadata("score", json!(score))
            }
            BehaviorSignal::ApplicationUsage { category, frequency_per_day, average_minutes } => {
                let severity = if !category.is_distraction() {
                    Severity::Low
                } else if *frequency_per_day > HEAVY_DISTRACTION_PER_DAY {
                    Severity::High
                } else {
                    Severity::Medium
                };
                single(
                    InsightCategory::AppUsage,
                    format!("Frequent {} app use", category.as_str().replace('_', " ")),
                    format!(
                        "{frequency_per_day:.1} sessions per day averaging \
                         {average_minutes:.0} minutes."
                    ),
                    severity,
                )
                .with_metadata("category", json!(category.as_str()))
            }
            BehaviorSignal::ActiveHours { hours, peak_hour } => single(
                InsightCategory::WorkRoutine,
                "Consistent working hours".to_string(),
                format!(
                    "Activity concentrates in {} hours of the day, peaking at {peak_hour:02}:00.",
                    hours.len()
                ),
                Severity::Low,
            )
            .with_metadata("hours", json!(hours)),
            BehaviorSignal::BreakRhythm { average_minutes, break_count, consistency } => single(
                InsightCategory::Breaks,
                "Regular break rhythm".to_string(),
                format!(
                    "{break_count} breaks averaging {average_minutes:.0} minutes \
                     (consistency {consistency:.2})."
                ),
                Severity::Low,
            ),
            BehaviorSignal::PeakDistractionHours { hours, distraction_count, total_minutes } => {
                single(
                    InsightCategory::Distraction,
                    "Distraction-prone hours".to_string(),
                    format!(
                        "{distraction_count} distraction sessions ({total_minutes:.0} minutes) \
                         cluster in hours {}.",
                        format_hours(hours)
                    ),
                    Severity::Medium,
                )
                .with_metadata("hours", json!(hours))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Financial
    // ------------------------------------------------------------------------

    fn financial(&self, pattern: &Pattern, signal: &FinancialSignal) -> Insight {
        let thresholds = &self.config.financial;
        let single = |category, title: String, description: String, severity| {
            single_domain(pattern, InsightType::Financial, category, title, description, severity)
        };

        match signal {
            FinancialSignal::SpendingVolatility { mean_daily, std_dev, .. } => {
                let volatility = if *mean_daily > 0.0 { std_dev / mean_daily } else { 0.0 };
                let severity = if volatility > thresholds.high_volatility_threshold {
                    Severity::High
                } else if volatility > thresholds.spending_variance_threshold {
                    Severity::Medium
                } else {
                    Severity::Low
                };
                single(
                    InsightCategory::Spending,
                    "Inconsistent daily spending".to_string(),
                    format!(
                        "Daily spending averages {mean_daily:.2} with a standard deviation \
                         of {std_dev:.2}."
                    ),
                    severity,
                )
                .with_metadata("volatility", json!(volatility))
            }
            FinancialSignal::CategoryConcentration { category, share, amount } => {
                let severity = match category {
                    SpendingCategory::Debt => Severity::High,
                    SpendingCategory::Discretionary => Severity::Medium,
                    _ => Severity::Low,
                };
                single(
                    InsightCategory::Spending,
                    format!("Spending concentrated in {}", category.as_str()),
                    format!(
                        "{:.0}% of expenses ({amount}) go to {} purchases.",
                        share * 100.0,
                        category.as_str()
                    ),
                    severity,
                )
                .with_metadata("category", json!(category.as_str()))
            }
            FinancialSignal::BudgetVariance { category, variance, limit, actual } => {
                let (title, severity) = if *variance > thresholds.high_overrun_threshold {
                    (format!("Over budget on {}", category.as_str()), Severity::High)
                } else if *variance > 0.0 {
                    (format!("Over budget on {}", category.as_str()), Severity::Medium)
                } else {
                    (format!("Under budget on {}", category.as_str()), Severity::Low)
                };
                single(
                    InsightCategory::Budget,
                    title,
                    format!(
                        "Spent {actual} against a limit of {limit} ({:+.0}%).",
                        variance * 100.0
                    ),
                    severity,
                )
                .with_metadata("category", json!(category.as_str()))
                .with_metadata("variance", json!(variance))
            }
            FinancialSignal::RecurringTransaction {
                merchant,
                average_interval_days,
                average_amount,
                transaction_count,
            } => single(
                InsightCategory::RecurringPayments,
                format!("Recurring payment to {merchant}"),
                format!(
                    "{transaction_count} payments of about {average_amount} every \
                     {average_interval_days:.0} days."
                ),
                Severity::Low,
            )
            .with_metadata("merchant", json!(merchant)),
        }
    }

    // ------------------------------------------------------------------------
    // Temporal
    // ------------------------------------------------------------------------

    fn temporal(&self, pattern: &Pattern, signal: &TemporalSignal) -> Insight {
        let single = |category, title: String, description: String, severity| {
            single_domain(pattern, InsightType::Temporal, category, title, description, severity)
        };

        match signal {
            TemporalSignal::DaySegmentConcentration { segment, share, duration_minutes } => {
                let severity =
                    if *segment == DaySegment::Night { Severity::Medium } else { Severity::Low };
                single(
                    InsightCategory::DailyRhythm,
                    format!("Most active in the {}", segment.label()),
                    format!(
                        "{:.0}% of tracked time ({duration_minutes:.0} minutes) falls in the {}.",
                        share * 100.0,
                        segment.label()
                    ),
                    severity,
                )
                .with_metadata("segment", json!(segment))
            }
            TemporalSignal::PeakHours { hours, average_minutes, peak_minutes } => single(
                InsightCategory::PeakHours,
                "Distinct peak activity hours".to_string(),
                format!(
                    "Hours {} reach up to {peak_minutes:.0} minutes against an hourly average \
                     of {average_minutes:.0}.",
                    format_hours(hours)
                ),
                Severity::Low,
            )
            .with_metadata("hours", json!(hours)),
            TemporalSignal::HighActivityDays { weekdays, average_minutes } => single(
                InsightCategory::WeeklyRhythm,
                "Busiest days of the week".to_string(),
                format!(
                    "{} weekdays run above the daily average of {average_minutes:.0} minutes.",
                    weekdays.len()
                ),
                Severity::Low,
            )
            .with_metadata("weekdays", json!(weekdays)),
            TemporalSignal::WeekendVariation {
                weekday_average,
                weekend_average,
                relative_difference,
            } => {
                let (title, severity) = if *relative_difference > 0.0 {
                    ("Heavy weekend activity", Severity::Medium)
                } else {
                    ("Lighter weekends", Severity::Low)
                };
                single(
                    InsightCategory::WorkLifeBalance,
                    title.to_string(),
                    format!(
                        "Weekend days average {weekend_average:.0} minutes against \
                         {weekday_average:.0} on weekdays."
                    ),
                    severity,
                )
                .with_metadata("relative_difference", json!(relative_difference))
            }
            TemporalSignal::ConsistentBlocks { average_minutes, consistency, block_count } => {
                single(
                    InsightCategory::TimeBlocks,
                    "Consistent time blocks".to_string(),
                    format!(
                        "{block_count} blocks averaging {average_minutes:.0} minutes \
                         (consistency {consistency:.2})."
                    ),
                    Severity::Low,
                )
            }
            TemporalSignal::CommonStartTimes { hours } => single(
                InsightCategory::TimeBlocks,
                "Habitual start times".to_string(),
                format!("Work blocks usually begin at {}.", format_hours(hours)),
                Severity::Low,
            )
            .with_metadata("hours", json!(hours)),
        }
    }

    // ------------------------------------------------------------------------
    // Cross-domain
    // ------------------------------------------------------------------------

    fn cross_domain(&self, correlated: &CorrelatedPattern) -> Result<Insight, InsightError> {
        let info = &correlated.correlation;
        ensure_finite(correlated.pair.as_str(), "coefficient", info.coefficient)?;
        let (first, second) = correlated.pair.domains();
        for domain in [first, second] {
            if correlated.patterns.get(&domain).map_or(true, Vec::is_empty) {
                return Err(InsightError::MissingTable(domain));
            }
        }

        let r = info.coefficient.abs();
        let severity = if r >= HIGH_CORRELATION {
            Severity::High
        } else if r >= MEDIUM_CORRELATION {
            Severity::Medium
        } else {
            Severity::Low
        };
        let coverage =
            (info.sample_size as f64 / self.config.min_data_points.max(1) as f64).min(1.0);
        let direction = if info.coefficient >= 0.0 {
            "rise together"
        } else {
            "move in opposite directions"
        };

        let (insight_type, category, subject) = match correlated.pair {
            DomainPair::BehaviorFinancial => (
                InsightType::BehaviorFinancial,
                InsightCategory::ProductivitySpending,
                "Productivity and spending",
            ),
            DomainPair::TemporalFinancial => (
                InsightType::TemporalFinancial,
                InsightCategory::ScheduleSpending,
                "Schedule and spending",
            ),
            DomainPair::BehaviorTemporal => (
                InsightType::BehaviorTemporal,
                InsightCategory::FocusTiming,
                "Focus and daily timing",
            ),
        };

        Ok(Insight::new(
            insight_type,
            category,
            format!("{subject} {direction}"),
            format!(
                "{} and {} correlate with r = {:.2} over {} patterns.",
                info.columns.0, info.columns.1, info.coefficient, info.sample_size
            ),
            severity,
            r * coverage,
            info.detected_at,
        )
        .with_metadata("coefficient", json!(info.coefficient))
        .with_metadata("columns", json!([info.columns.0, info.columns.1]))
        .with_metadata("sample_size", json!(info.sample_size))
        .with_metadata("pattern_type", json!(correlated.pair.as_str())))
    }
}

fn single_domain(
    pattern: &Pattern,
    insight_type: InsightType,
    category: InsightCategory,
    title: String,
    description: String,
    severity: Severity,
) -> Insight {
    Insight::new(
        insight_type,
        category,
        title,
        description,
        severity,
        pattern.confidence,
        pattern.detected_at,
    )
}

fn ensure_finite(pattern_type: &str, field: &'static str, value: f64) -> Result<(), InsightError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(InsightError::NonFinite { pattern_type: pattern_type.to_string(), field })
    }
}

fn format_hours(hours: &[u32]) -> String {
    hours.iter().map(|hour| format!("{hour:02}:00")).collect::<Vec<_>>().join(", ")
}

/// Keeps the first insight for each (type, category, title) fingerprint.
fn dedup(insights: Vec<Insight>) -> Vec<Insight> {
    let mut seen: BTreeSet<InsightId> = BTreeSet::new();
    insights.into_iter().filter(|insight| seen.insert(insight.id.clone())).collect()
}

fn rank(mut insights: Vec<Insight>) -> Vec<Insight> {
    insights.sort_by(|a, b| {
        b.severity
            .score()
            .cmp(&a.severity.score())
            .then_with(|| b.confidence.total_cmp(&a.confidence))
    });
    insights
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::InsightGenerator;
    use crate::config::AnalysisConfig;
    use crate::domain::insight::{InsightCategory, InsightType, Severity};
    use crate::domain::pattern::{
        BehaviorSignal, CombinedPattern, CorrelatedPattern, CorrelationInfo, DomainPair,
        FinancialSignal, Pattern, PatternDomain, PatternPayload, TemporalSignal,
    };
    use crate::domain::record::SpendingCategory;
    use crate::errors::InsightError;

    fn detected() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).single().expect("timestamp")
    }

    fn pattern(payload: PatternPayload, confidence: f64) -> CombinedPattern {
        CombinedPattern::SingleDomain(
            Pattern::new("p", "", payload, vec![1.0; 10], detected())
                .with_scores(0.8, confidence, 0.5),
        )
    }

    fn focus(average_minutes: f64) -> CombinedPattern {
        pattern(
            PatternPayload::Behavior(BehaviorSignal::FocusDuration {
                average_minutes,
                total_minutes: average_minutes * 10.0,
                session_count: 10,
            }),
            0.5,
        )
    }

    fn budget(variance: f64) -> CombinedPattern {
        pattern(
            PatternPayload::Financial(FinancialSignal::BudgetVariance {
                category: SpendingCategory::Discretionary,
                variance,
                limit: Decimal::new(500, 0),
                actual: Decimal::new(650, 0),
            }),
            0.6,
        )
    }

    fn correlated(pair: DomainPair, coefficient: f64, sample_size: usize) -> CombinedPattern {
        let (first, second) = pair.domains();
        let table = |domain: PatternDomain| {
            let payload = match domain {
                PatternDomain::Behavior => PatternPayload::Behavior(BehaviorSignal::ActiveHours {
                    hours: vec![9],
                    peak_hour: 9,
                }),
                PatternDomain::Financial => {
                    PatternPayload::Financial(FinancialSignal::SpendingVolatility {
                        mean_daily: 1.0,
                        std_dev: 1.0,
                        max_daily: 2.0,
                        min_daily: 0.0,
                    })
                }
                PatternDomain::Temporal => {
                    PatternPayload::Temporal(TemporalSignal::CommonStartTimes { hours: vec![9] })
                }
            };
            vec![Pattern::new("p", "", payload, vec![], detected())]
        };
        CombinedPattern::CrossDomain(CorrelatedPattern {
            pair,
            strength: coefficient.abs(),
            patterns: BTreeMap::from([(first, table(first)), (second, table(second))]),
            correlation: CorrelationInfo {
                coefficient,
                columns: (
                    format!("{}.strength", first.as_str()),
                    format!("{}.support", second.as_str()),
                ),
                sample_size,
                detected_at: detected(),
            },
        })
    }

    #[test]
    fn focus_duration_severity_follows_thresholds() {
        let generator = InsightGenerator::new(AnalysisConfig::default());

        let critical = generator.generate_insights(&[focus(20.0)]);
        let low = generator.generate_insights(&[focus(40.0)]);
        let healthy = generator.generate_insights(&[focus(55.0)]);

        assert_eq!(critical[0].severity, Severity::High);
        assert_eq!(critical[0].title, "Low focus time");
        assert_eq!(low[0].severity, Severity::Medium);
        assert_eq!(healthy[0].severity, Severity::Low);
        assert_eq!(healthy[0].category, InsightCategory::Focus);
    }

    #[test]
    fn budget_overrun_severity_depends_on_size() {
        let generator = InsightGenerator::new(AnalysisConfig::default());

        let insights = generator.generate_insights(&[budget(0.2), budget(0.35)]);

        // Same title, so the first occurrence wins.
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].severity, Severity::Medium);
        assert_eq!(insights[0].title, "Over budget on discretionary");

        let high = generator.generate_insights(&[budget(0.35)]);
        assert_eq!(high[0].severity, Severity::High);
    }

    fn volatility(mean_daily: f64, std_dev: f64) -> CombinedPattern {
        pattern(
            PatternPayload::Financial(FinancialSignal::SpendingVolatility {
                mean_daily,
                std_dev,
                max_daily: mean_daily + std_dev,
                min_daily: 0.0,
            }),
            0.6,
        )
    }

    #[test]
    fn severity_cutoffs_come_from_configuration() {
        let default_generator = InsightGenerator::new(AnalysisConfig::default());
        let mut config = AnalysisConfig::default();
        config.financial.high_volatility_threshold = 0.7;
        config.financial.high_overrun_threshold = 0.5;
        let relaxed = InsightGenerator::new(config);

        let swing = volatility(100.0, 60.0);
        assert_eq!(default_generator.generate_insights(&[swing.clone()])[0].severity, Severity::High);
        assert_eq!(relaxed.generate_insights(&[swing])[0].severity, Severity::Medium);

        assert_eq!(default_generator.generate_insights(&[budget(0.4)])[0].severity, Severity::High);
        assert_eq!(relaxed.generate_insights(&[budget(0.4)])[0].severity, Severity::Medium);
    }

    #[test]
    fn cross_domain_confidence_scales_with_sample_coverage() {
        let generator = InsightGenerator::new(AnalysisConfig::default());

        let insights = generator.generate_insights(&[
            correlated(DomainPair::BehaviorFinancial, 0.95, 5),
            correlated(DomainPair::TemporalFinancial, -0.85, 12),
            correlated(DomainPair::BehaviorTemporal, 0.72, 10),
        ]);

        assert_eq!(insights.len(), 3);
        assert_eq!(insights[0].insight_type, InsightType::BehaviorFinancial);
        assert_eq!(insights[0].severity, Severity::High);
        assert!((insights[0].confidence - 0.475).abs() < 1e-9);
        assert_eq!(insights[1].category, InsightCategory::ScheduleSpending);
        assert_eq!(insights[1].severity, Severity::Medium);
        assert!((insights[1].confidence - 0.85).abs() < 1e-9);
        assert_eq!(insights[2].severity, Severity::Low);
    }

    #[test]
    fn broken_patterns_are_skipped_without_failing_the_batch() {
        let generator = InsightGenerator::new(AnalysisConfig::default());
        let broken = match focus(20.0) {
            CombinedPattern::SingleDomain(pattern) => {
                CombinedPattern::SingleDomain(pattern.with_scores(f64::NAN, 0.5, 0.5))
            }
            other => other,
        };
        let mut missing = correlated(DomainPair::BehaviorFinancial, 0.9, 10);
        if let CombinedPattern::CrossDomain(inner) = &mut missing {
            inner.patterns.remove(&PatternDomain::Financial);
            assert_eq!(
                generator.cross_domain(inner).expect_err("missing table"),
                InsightError::MissingTable(PatternDomain::Financial)
            );
        }

        let insights = generator.generate_insights(&[broken, missing, budget(0.35)]);

        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].category, InsightCategory::Budget);
    }

    #[test]
    fn generation_is_deterministic_and_ranked() {
        let generator = InsightGenerator::new(AnalysisConfig::default());
        let patterns = vec![focus(55.0), budget(0.35), focus(40.0), budget(-0.4), focus(55.0)];

        let first = generator.generate_insights(&patterns);
        let second = generator.generate_insights(&patterns);

        assert_eq!(first, second);
        let ids: BTreeSet<_> = first.iter().map(|insight| insight.id.clone()).collect();
        assert_eq!(ids.len(), first.len());
        for pair in first.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.severity.score() > b.severity.score()
                    || (a.severity == b.severity && a.confidence >= b.confidence)
            );
        }
        assert_eq!(first[0].severity, Severity::High);
    }
}
