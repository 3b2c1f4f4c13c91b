//! Groups insights into actionable recommendations.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::insight::{Insight, InsightCategory};
use crate::domain::recommendation::{Difficulty, Recommendation, RecommendationType};
use crate::domain::record::SpendingCategory;
use crate::errors::RecommendationError;

struct Template {
    title: String,
    description: &'static str,
    difficulty: Difficulty,
}

impl Template {
    fn new(title: impl Into<String>, description: &'static str, difficulty: Difficulty) -> Self {
        Self { title: title.into(), description, difficulty }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RecommendationGenerator;

impl RecommendationGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_recommendations(&self, insights: &[Insight]) -> Vec<Recommendation> {
        let mut groups: BTreeMap<RecommendationType, Vec<&Insight>> = BTreeMap::new();
        for insight in insights {
            groups.entry(insight.category.group()).or_default().push(insight);
        }

        let mut recommendations = Vec::new();
        for (group, members) in groups {
            match build_group(group, &members) {
                Ok(built) => recommendations.extend(built),
                Err(error) => tracing::warn!(
                    event_name = "analysis.recommendation.builder_failed",
                    group = group.as_str(),
                    error = %error,
                    "skipping recommendation group"
                ),
            }
        }

        recommendations.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));
        let mut titles = BTreeSet::new();
        recommendations.retain(|recommendation| titles.insert(recommendation.title.clone()));
        recommendations
    }
}

fn build_group(
    group: RecommendationType,
    insights: &[&Insight],
) -> Result<Vec<Recommendation>, RecommendationError> {
    if let Some(bad) = insights.iter().find(|insight| !insight.confidence.is_finite()) {
        return Err(RecommendationError::NonFiniteConfidence { title: bad.title.clone() });
    }

    // Insights sharing a template feed one recommendation.
    let mut by_title: BTreeMap<String, (Template, Vec<&Insight>)> = BTreeMap::new();
    for insight in insights {
        let Some(template) = template_for(insight) else {
            continue;
        };
        by_title
            .entry(template.title.clone())
            .or_insert_with(|| (template, Vec::new()))
            .1
            .push(insight);
    }

    Ok(by_title
        .into_values()
        .map(|(template, sources)| {
            let confidence =
                sources.iter().map(|insight| insight.confidence).sum::<f64>() / sources.len() as f64;
            let timestamp = sources
                .iter()
                .map(|insight| insight.timestamp)
                .max()
                .unwrap_or_else(chrono::Utc::now);
            Recommendation::new(
                template.title,
                template.description,
                group,
                template.difficulty,
                sources.iter().map(|insight| insight.id.clone()).collect(),
                confidence,
                timestamp,
            )
        })
        .collect())
}

/// Informational (low severity) insights only produce a recommendation when the
/// category has something worth acting on regardless of severity.
fn template_for(insight: &Insight) -> Option<Template> {
    use crate::domain::insight::Severity::Low;

    let template = match insight.category {
        InsightCategory::PeakFocusHours => Template::new(
            "Reserve your peak hours for deep work",
            "Block your most focused hour for demanding tasks and move meetings elsewhere.",
            Difficulty::Easy,
        ),
        InsightCategory::Focus if insight.severity != Low => Template::new(
            "Schedule protected focus blocks",
            "Plan uninterrupted blocks of at least fifty minutes and silence notifications.",
            Difficulty::Medium,
        ),
        InsightCategory::Productivity if insight.severity != Low => Template::new(
            "Shift time toward productive tools",
            "Review where tracked time goes and trade low-value app time for focused work.",
            Difficulty::Medium,
        ),
        InsightCategory::AppUsage | InsightCategory::Distraction if insight.severity != Low => {
            Template::new(
                "Limit distracting apps",
                "Set daily limits or blockers for the apps and hours where distractions cluster.",
                Difficulty::Medium,
            )
        }
        InsightCategory::Breaks => Template::new(
            "Keep a steady break rhythm",
            "Short, regular breaks between focus sessions sustain concentration.",
            Difficulty::Easy,
        ),
        InsightCategory::Spending if insight.severity != Low => {
            let title = match spending_category(insight) {
                Some(category) => format!("Cut back on {} spending", category.as_str()),
                None => "Smooth out daily spending".to_string(),
            };
            Template::new(
                title,
                "Set a weekly spending plan and review large purchases before committing.",
                Difficulty::Medium,
            )
        }
        InsightCategory::Budget if insight.severity != Low => Template::new(
            "Rebalance over-budget categories",
            "Adjust limits or spending in categories that run over their budget.",
            Difficulty::Medium,
        ),
        InsightCategory::RecurringPayments => Template::new(
            "Review recurring subscriptions",
            "Check recurring payments and cancel the ones you no longer use.",
            Difficulty::Easy,
        ),
        InsightCategory::ProductivitySpending => Template::new(
            "Watch spending on low-focus days",
            "Spending and productivity move together; plan purchases on clear-headed days.",
            Difficulty::Medium,
        ),
        InsightCategory::ScheduleSpending => Template::new(
            "Align purchases with your schedule",
            "Spending follows your daily rhythm; decide on purchases during planned time.",
            Difficulty::Medium,
        ),
        InsightCategory::DailyRhythm | InsightCategory::PeakHours => Template::new(
            "Plan important work around your daily rhythm",
            "Schedule demanding tasks in your most active hours and light work elsewhere.",
            Difficulty::Easy,
        ),
        InsightCategory::WorkLifeBalance if insight.severity != Low => Template::new(
            "Protect your weekends",
            "Move recurring weekend work into the week and keep weekends for recovery.",
            Difficulty::Hard,
        ),
        InsightCategory::TimeBlocks | InsightCategory::WorkRoutine => Template::new(
            "Build on consistent time blocks",
            "Turn your habitual start times and block lengths into a fixed routine.",
            Difficulty::Easy,
        ),
        InsightCategory::FocusTiming => Template::new(
            "Time focus work to your active hours",
            "Focus quality follows time of day; align deep work with those hours.",
            Difficulty::Medium,
        ),
        InsightCategory::WeeklyRhythm => Template::new(
            "Front-load your busiest days",
            "Put high-energy tasks on the weekdays where you are most active.",
            Difficulty::Easy,
        ),
        _ => return None,
    };
    Some(template)
}

fn spending_category(insight: &Insight) -> Option<SpendingCategory> {
    insight.metadata.get("category").and_then(|value| value.as_str()).and_then(SpendingCategory::parse)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    use super::RecommendationGenerator;
    use crate::domain::insight::{Insight, InsightCategory, InsightType, Severity};
    use crate::domain::recommendation::{Difficulty, RecommendationType};

    fn insight(
        category: InsightCategory,
        title: &str,
        severity: Severity,
        confidence: f64,
    ) -> Insight {
        Insight::new(
            InsightType::Behavior,
            category,
            title,
            "",
            severity,
            confidence,
            Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).single().expect("timestamp"),
        )
    }

    #[test]
    fn sources_sharing_a_template_are_merged() {
        let later = insight(InsightCategory::Focus, "Low focus time", Severity::High, 0.4);
        let earlier = Insight {
            timestamp: later.timestamp - Duration::days(1),
            ..insight(InsightCategory::Productivity, "Low productivity", Severity::Medium, 0.8)
        };
        let distraction =
            insight(InsightCategory::Distraction, "Distraction-prone hours", Severity::Medium, 0.6);

        let recommendations = RecommendationGenerator::new().generate_recommendations(&[
            later.clone(),
            earlier,
            distraction,
        ]);

        let focus = recommendations
            .iter()
            .find(|r| r.title == "Schedule protected focus blocks")
            .expect("focus recommendation");
        assert_eq!(focus.recommendation_type, RecommendationType::Productivity);
        assert_eq!(focus.difficulty, Difficulty::Medium);
        assert_eq!(focus.source_insights, vec![later.id.clone()]);
        assert_eq!(focus.timestamp, later.timestamp);
        assert!((focus.confidence_score - 0.4).abs() < 1e-9);
        assert!((focus.priority_score - 0.64 * 0.4).abs() < 1e-9);
    }

    #[test]
    fn recommendations_are_sorted_by_priority_with_unique_titles() {
        let insights = vec![
            insight(InsightCategory::RecurringPayments, "Recurring payment to Acme", Severity::Low, 0.9),
            insight(InsightCategory::RecurringPayments, "Recurring payment to Gym", Severity::Low, 0.5),
            insight(InsightCategory::WorkLifeBalance, "Heavy weekend activity", Severity::Medium, 0.9),
            insight(InsightCategory::Budget, "Over budget on debt", Severity::High, 0.7),
            insight(InsightCategory::Spending, "Spending concentrated in discretionary", Severity::Medium, 0.5)
                .with_metadata("category", json!("discretionary")),
        ];

        let recommendations = RecommendationGenerator::new().generate_recommendations(&insights);

        let titles: Vec<_> = recommendations.iter().map(|r| r.title.as_str()).collect();
        let unique: BTreeSet<_> = titles.iter().collect();
        assert_eq!(unique.len(), titles.len());
        assert_eq!(titles[0], "Review recurring subscriptions");
        assert!(titles.contains(&"Cut back on discretionary spending"));
        assert!(titles.contains(&"Protect your weekends"));
        for pair in recommendations.windows(2) {
            assert!(pair[0].priority_score >= pair[1].priority_score);
        }
        let subscriptions = &recommendations[0];
        assert_eq!(subscriptions.source_insights.len(), 2);
        assert!((subscriptions.confidence_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn a_broken_group_does_not_block_the_others() {
        let recommendations = RecommendationGenerator::new().generate_recommendations(&[
            insight(InsightCategory::Budget, "Over budget on debt", Severity::High, f64::NAN),
            insight(InsightCategory::PeakFocusHours, "Peak focus at 09:00", Severity::Low, 0.8),
        ]);

        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].recommendation_type, RecommendationType::Productivity);
    }

    #[test]
    fn informational_only_insights_may_yield_nothing() {
        let recommendations = RecommendationGenerator::new().generate_recommendations(&[insight(
            InsightCategory::Focus,
            "Sustained focus sessions",
            Severity::Low,
            0.9,
        )]);

        assert!(recommendations.is_empty());
    }
}
