//! Behavior domain: focus sessions, application mix and work routine.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::stats::{clamp_unit, coefficient_of_variation, mean, sample_std_dev};
use super::{ensure_valid_minutes, retain_supported, DomainAnalyzer};
use crate::config::{AnalysisConfig, BehaviorThresholds};
use crate::domain::analysis::AnalysisWindow;
use crate::domain::pattern::{BehaviorSignal, Pattern, PatternDomain, PatternPayload};
use crate::domain::record::{ActivityRecord, AppCategory, ApplicationUsageRecord};
use crate::errors::AnalysisError;

const MINUTES_PER_DAY: f64 = 1440.0;
const FULL_CONFIDENCE_SESSIONS: f64 = 20.0;
const ROUTINE_CONFIDENCE_FACTOR: f64 = 0.7;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FocusSession {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: f64,
    pub activity_count: usize,
}

impl FocusSession {
    pub fn start_hour(&self) -> u32 {
        self.start.hour()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductivityMetrics {
    pub productivity_score: f64,
    pub focus_time_share: f64,
    pub average_focus_minutes: f64,
    pub context_switches_per_hour: f64,
    pub category_minutes: BTreeMap<AppCategory, f64>,
}

/// Behavior table for one analysis window.
#[derive(Clone, Debug, PartialEq)]
pub struct BehaviorData {
    pub window: AnalysisWindow,
    pub activities: Vec<ActivityRecord>,
    pub usage: Vec<ApplicationUsageRecord>,
    pub focus_sessions: Vec<FocusSession>,
    pub metrics: ProductivityMetrics,
}

impl BehaviorData {
    pub fn from_records(
        window: AnalysisWindow,
        mut activities: Vec<ActivityRecord>,
        mut usage: Vec<ApplicationUsageRecord>,
        thresholds: &BehaviorThresholds,
    ) -> Self {
        activities.sort_by_key(|record| record.timestamp);
        usage.sort_by_key(|record| record.timestamp);

        let focus_sessions = identify_focus_sessions(
            &activities,
            thresholds.focus_gap_tolerance_minutes,
            thresholds.focus_session_threshold_minutes,
        );
        let metrics = productivity_metrics(&activities, &usage, &focus_sessions);

        Self { window, activities, usage, focus_sessions, metrics }
    }

    pub fn active_days(&self) -> usize {
        self.activities.iter().map(|record| record.timestamp.date_naive()).collect::<BTreeSet<_>>().len()
    }
}

/// Groups activities into focus sessions.
///
/// An activity joins the open session when it starts no more than
/// `gap_tolerance_minutes` after the latest end seen in that session. Sessions
/// shorter than `min_duration_minutes` are discarded. The result does not depend
/// on the input order.
pub fn identify_focus_sessions(
    activities: &[ActivityRecord],
    gap_tolerance_minutes: f64,
    min_duration_minutes: f64,
) -> Vec<FocusSession> {
    let mut ordered: Vec<&ActivityRecord> = activities.iter().collect();
    ordered.sort_by_key(|record| record.timestamp);

    let mut sessions = Vec::new();
    let mut current: Option<FocusSession> = None;

    for activity in ordered {
        let end = activity.ends_at();
        let joins = current.as_ref().is_some_and(|session| {
            minutes_between(session.end, activity.timestamp) <= gap_tolerance_minutes
        });

        if joins {
            if let Some(session) = current.as_mut() {
                session.end = session.end.max(end);
                session.duration_minutes += activity.duration_minutes;
                session.activity_count += 1;
            }
            continue;
        }

        if let Some(done) = current.take() {
            if done.duration_minutes >= min_duration_minutes {
                sessions.push(done);
            }
        }
        current = Some(FocusSession {
            start: activity.timestamp,
            end,
            duration_minutes: activity.duration_minutes,
            activity_count: 1,
        });
    }

    if let Some(done) = current {
        if done.duration_minutes >= min_duration_minutes {
            sessions.push(done);
        }
    }

    sessions
}

pub fn productivity_metrics(
    activities: &[ActivityRecord],
    usage: &[ApplicationUsageRecord],
    focus_sessions: &[FocusSession],
) -> ProductivityMetrics {
    let mut category_minutes: BTreeMap<AppCategory, f64> = BTreeMap::new();
    for record in usage {
        *category_minutes.entry(record.category).or_default() += record.duration_minutes;
    }

    let usage_total: f64 = category_minutes.values().sum();
    let productivity_score = if usage_total > 0.0 {
        category_minutes
            .iter()
            .map(|(category, minutes)| minutes * category.productivity_weight())
            .sum::<f64>()
            / usage_total
    } else {
        0.0
    };

    let activity_total: f64 = activities.iter().map(|record| record.duration_minutes).sum();
    let focus_total: f64 = focus_sessions.iter().map(|session| session.duration_minutes).sum();
    let focus_time_share = if activity_total > 0.0 { focus_total / activity_total } else { 0.0 };

    let focus_durations: Vec<f64> =
        focus_sessions.iter().map(|session| session.duration_minutes).collect();

    let mut types_by_hour: BTreeMap<u32, BTreeSet<&str>> = BTreeMap::new();
    for record in activities {
        types_by_hour
            .entry(record.timestamp.hour())
            .or_default()
            .insert(record.activity_type.as_str());
    }
    let distinct_per_hour: Vec<f64> =
        types_by_hour.values().map(|types| types.len() as f64).collect();

    ProductivityMetrics {
        productivity_score: clamp_unit(productivity_score),
        focus_time_share: clamp_unit(focus_time_share),
        average_focus_minutes: mean(&focus_durations).unwrap_or(0.0),
        context_switches_per_hour: mean(&distinct_per_hour).unwrap_or(0.0),
        category_minutes,
    }
}

#[derive(Clone, Debug)]
pub struct BehaviorAnalyzer {
    config: AnalysisConfig,
}

impl BehaviorAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    fn thresholds(&self) -> &BehaviorThresholds {
        &self.config.behavior
    }

    fn peak_focus_hours(&self, data: &BehaviorData) -> Option<Pattern> {
        let sessions = &data.focus_sessions;
        if sessions.is_empty() {
            return None;
        }

        let mut hourly: BTreeMap<u32, f64> = BTreeMap::new();
        for session in sessions {
            *hourly.entry(session.start_hour()).or_default() += session.duration_minutes;
        }
        let (peak_hour, peak_duration) = max_entry(&hourly)?;
        let hourly_values: Vec<f64> = hourly.values().copied().collect();
        let average = mean(&hourly_values)?;

        let strength = clamp_unit(peak_duration / average);
        let confidence =
            clamp_unit((sessions.len() as f64 / FULL_CONFIDENCE_SESSIONS).min(1.0) * strength);
        let focus_total: f64 = sessions.iter().map(|session| session.duration_minutes).sum();
        let support = daily_support(focus_total, data.active_days());

        let pattern = Pattern::new(
            "peak_focus_hours",
            format!("Most focused work starts around {peak_hour:02}:00"),
            PatternPayload::Behavior(BehaviorSignal::PeakFocusHours {
                peak_hour,
                peak_duration_minutes: peak_duration,
                session_count: sessions.len(),
            }),
            sessions.iter().map(|session| session.duration_minutes).collect(),
            data.window.end,
        );
        Some(pattern.with_scores(strength, confidence, support))
    }

    fn focus_duration(&self, data: &BehaviorData) -> Option<Pattern> {
        let sessions = &data.focus_sessions;
        if sessions.is_empty() {
            return None;
        }

        let average = data.metrics.average_focus_minutes;
        let total: f64 = sessions.iter().map(|session| session.duration_minutes).sum();
        let strength = clamp_unit(average / self.thresholds().optimal_focus_minutes);
        let confidence = clamp_unit(sessions.len() as f64 / FULL_CONFIDENCE_SESSIONS);
        let support = clamp_unit(average / MINUTES_PER_DAY);

        let pattern = Pattern::new(
            "focus_duration",
            format!("Focus sessions last {average:.0} minutes on average"),
            PatternPayload::Behavior(BehaviorSignal::FocusDuration {
                average_minutes: average,
                total_minutes: total,
                session_count: sessions.len(),
            }),
            sessions.iter().map(|session| session.duration_minutes).collect(),
            data.window.end,
        );
        Some(pattern.with_scores(strength, confidence, support))
    }

    fn productivity_score(&self, data: &BehaviorData) -> Option<Pattern> {
        let usage_total: f64 = data.metrics.category_minutes.values().sum();
        if usage_total <= 0.0 {
            return None;
        }

        let metrics = &data.metrics;
        let strength = metrics.productivity_score;
        let confidence = clamp_unit(data.usage.len() as f64 / FULL_CONFIDENCE_SESSIONS);
        let support = daily_support(usage_total, data.active_days());

        let pattern = Pattern::new(
            "productivity_score",
            format!("Weighted productivity of application time is {:.2}", strength),
            PatternPayload::Behavior(BehaviorSignal::ProductivityScore {
                score: metrics.productivity_score,
                focus_time_share: metrics.focus_time_share,
                context_switches_per_hour: metrics.context_switches_per_hour,
            }),
            data.usage.iter().map(|record| record.duration_minutes).collect(),
            data.window.end,
        );
        Some(pattern.with_scores(strength, confidence, support))
    }

    fn application_usage(&self, data: &BehaviorData) -> Vec<Pattern> {
        let mut by_category: BTreeMap<AppCategory, Vec<&ApplicationUsageRecord>> = BTreeMap::new();
        for record in &data.usage {
            by_category.entry(record.category).or_default().push(record);
        }

        let mut patterns = Vec::new();
        for (category, records) in by_category {
            let days: BTreeSet<NaiveDate> =
                records.iter().map(|record| record.timestamp.date_naive()).collect();
            if days.is_empty() {
                continue;
            }
            let frequency = records.len() as f64 / days.len() as f64;
            if frequency <= self.thresholds().app_usage_frequency_threshold {
                continue;
            }

            let durations: Vec<f64> = records.iter().map(|record| record.duration_minutes).collect();
            let average = mean(&durations).unwrap_or(0.0);
            let strength = clamp_unit(frequency / 10.0);
            let confidence = clamp_unit((frequency / 10.0).min(1.0) * strength);
            let support = clamp_unit(frequency / 24.0);

            let pattern = Pattern::new(
                format!("{}_usage", category.as_str()),
                format!(
                    "{} applications are opened {frequency:.1} times per active day",
                    category.as_str()
                ),
                PatternPayload::Behavior(BehaviorSignal::ApplicationUsage {
                    category,
                    frequency_per_day: frequency,
                    average_minutes: average,
                }),
                durations,
                data.window.end,
            );
            patterns.push(pattern.with_scores(strength, confidence, support));
        }
        patterns
    }

    fn active_hours(&self, data: &BehaviorData) -> Option<Pattern> {
        let mut hourly: BTreeMap<u32, f64> = BTreeMap::new();
        for record in &data.activities {
            *hourly.entry(record.timestamp.hour()).or_default() += record.duration_minutes;
        }
        let values: Vec<f64> = hourly.values().copied().collect();
        let average = mean(&values)?;
        let hours: Vec<u32> =
            hourly.iter().filter(|(_, minutes)| **minutes > average).map(|(hour, _)| *hour).collect();
        if hours.is_empty() {
            return None;
        }
        let (peak_hour, _) = max_entry(&hourly)?;

        let strength = clamp_unit(hours.len() as f64 / 24.0);
        let confidence = clamp_unit(ROUTINE_CONFIDENCE_FACTOR * strength);

        let pattern = Pattern::new(
            "active_hours",
            format!("Activity concentrates in {} hours of the day", hours.len()),
            PatternPayload::Behavior(BehaviorSignal::ActiveHours { hours, peak_hour }),
            data.activities.iter().map(|record| record.duration_minutes).collect(),
            data.window.end,
        );
        Some(pattern.with_scores(strength, confidence, strength))
    }

    fn break_rhythm(&self, data: &BehaviorData) -> Option<Pattern> {
        let breaks: Vec<f64> = data
            .focus_sessions
            .windows(2)
            .filter(|pair| pair[0].end.date_naive() == pair[1].start.date_naive())
            .map(|pair| minutes_between(pair[0].end, pair[1].start))
            .filter(|gap| *gap > 0.0)
            .collect();
        if breaks.len() < 2 {
            return None;
        }

        let average = mean(&breaks)?;
        let consistency = clamp_unit(1.0 - coefficient_of_variation(&breaks)?);
        let confidence = clamp_unit(ROUTINE_CONFIDENCE_FACTOR * consistency);
        let support = daily_support(breaks.iter().sum(), data.active_days());

        let pattern = Pattern::new(
            "break_rhythm",
            format!("Breaks between focus sessions average {average:.0} minutes"),
            PatternPayload::Behavior(BehaviorSignal::BreakRhythm {
                average_minutes: average,
                break_count: breaks.len(),
                consistency,
            }),
            breaks,
            data.window.end,
        );
        Some(pattern.with_scores(consistency, confidence, support))
    }

    fn peak_distraction_hours(&self, data: &BehaviorData) -> Option<Pattern> {
        let distractions: Vec<&ApplicationUsageRecord> =
            data.usage.iter().filter(|record| record.category.is_distraction()).collect();
        if distractions.is_empty() {
            return None;
        }

        let mut hourly: BTreeMap<u32, f64> = BTreeMap::new();
        for record in &distractions {
            *hourly.entry(record.timestamp.hour()).or_default() += 1.0;
        }
        let counts: Vec<f64> = hourly.values().copied().collect();
        let cutoff = mean(&counts)? + sample_std_dev(&counts)?;
        let hours: Vec<u32> =
            hourly.iter().filter(|(_, count)| **count > cutoff).map(|(hour, _)| *hour).collect();
        if hours.is_empty() {
            return None;
        }

        let durations: Vec<f64> = distractions.iter().map(|record| record.duration_minutes).collect();
        let total: f64 = durations.iter().sum();
        let strength = clamp_unit(hours.len() as f64 / 24.0);
        let confidence = clamp_unit(ROUTINE_CONFIDENCE_FACTOR * strength);
        let support = daily_support(total, data.active_days());

        let pattern = Pattern::new(
            "peak_distraction_hours",
            format!("Distracting applications peak in {} hours of the day", hours.len()),
            PatternPayload::Behavior(BehaviorSignal::PeakDistractionHours {
                hours,
                distraction_count: distractions.len(),
                total_minutes: total,
            }),
            durations,
            data.window.end,
        );
        Some(pattern.with_scores(strength, confidence, support))
    }
}

impl DomainAnalyzer for BehaviorAnalyzer {
    type Data = BehaviorData;

    fn domain(&self) -> PatternDomain {
        PatternDomain::Behavior
    }

    fn analyze(&self, data: &BehaviorData) -> Result<Vec<Pattern>, AnalysisError> {
        ensure_valid_minutes(
            PatternDomain::Behavior,
            "activity record",
            data.activities.iter().map(|record| record.duration_minutes),
        )?;
        ensure_valid_minutes(
            PatternDomain::Behavior,
            "application usage record",
            data.usage.iter().map(|record| record.duration_minutes),
        )?;

        let mut patterns = Vec::new();
        patterns.extend(self.peak_focus_hours(data));
        patterns.extend(self.focus_duration(data));
        patterns.extend(self.productivity_score(data));
        patterns.extend(self.application_usage(data));
        patterns.extend(self.active_hours(data));
        patterns.extend(self.break_rhythm(data));
        patterns.extend(self.peak_distraction_hours(data));

        Ok(retain_supported(patterns, self.config.min_data_points))
    }
}

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

fn daily_support(total_minutes: f64, active_days: usize) -> f64 {
    if active_days == 0 {
        return 0.0;
    }
    clamp_unit(total_minutes / (active_days as f64 * MINUTES_PER_DAY))
}

/// Largest value in the map; ties resolve to the smallest key.
fn max_entry(values: &BTreeMap<u32, f64>) -> Option<(u32, f64)> {
    values.iter().fold(None, |best, (key, value)| match best {
        Some((_, best_value)) if best_value >= *value => best,
        _ => Some((*key, *value)),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{identify_focus_sessions, BehaviorAnalyzer, BehaviorData};
    use crate::analysis::DomainAnalyzer;
    use crate::config::AnalysisConfig;
    use crate::domain::analysis::AnalysisWindow;
    use crate::domain::pattern::{BehaviorSignal, PatternPayload};
    use crate::domain::record::{ActivityRecord, AppCategory, ApplicationUsageRecord};
    use crate::errors::AnalysisError;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).single().expect("timestamp")
    }

    fn window() -> AnalysisWindow {
        AnalysisWindow { start: at(1, 0, 0), end: at(1, 0, 0) + Duration::days(20) }
    }

    fn usage(timestamp: DateTime<Utc>, category: AppCategory, minutes: f64) -> ApplicationUsageRecord {
        ApplicationUsageRecord {
            timestamp,
            application_name: format!("{}-app", category.as_str()),
            duration_minutes: minutes,
            category,
            is_active: true,
        }
    }

    #[test]
    fn adjacent_activities_merge_within_gap_tolerance() {
        let activities = vec![
            ActivityRecord::new(at(2, 9, 0), 20.0, "coding"),
            ActivityRecord::new(at(2, 9, 24), 20.0, "coding"),
            ActivityRecord::new(at(2, 11, 0), 10.0, "email"),
        ];

        let sessions = identify_focus_sessions(&activities, 5.0, 25.0);

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].start, at(2, 9, 0));
        assert_eq!(sessions[0].end, at(2, 9, 44));
        assert_eq!(sessions[0].activity_count, 2);
        assert_eq!(sessions[0].duration_minutes, 40.0);
    }

    #[test]
    fn gap_beyond_tolerance_splits_sessions_and_short_ones_are_dropped() {
        let activities = vec![
            ActivityRecord::new(at(2, 9, 0), 30.0, "coding"),
            ActivityRecord::new(at(2, 9, 36), 30.0, "coding"),
            ActivityRecord::new(at(2, 14, 0), 10.0, "coding"),
        ];

        let sessions = identify_focus_sessions(&activities, 5.0, 25.0);

        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|session| session.duration_minutes >= 25.0));
    }

    #[test]
    fn focus_sessions_do_not_depend_on_input_order() {
        let mut activities = Vec::new();
        for day in 2..6 {
            activities.push(ActivityRecord::new(at(day, 9, 0), 40.0, "coding"));
            activities.push(ActivityRecord::new(at(day, 9, 43), 40.0, "coding"));
            activities.push(ActivityRecord::new(at(day, 13, 0), 15.0, "review"));
            activities.push(ActivityRecord::new(at(day, 13, 10), 30.0, "review"));
        }
        let baseline = identify_focus_sessions(&activities, 5.0, 25.0);

        let mut reversed = activities.clone();
        reversed.reverse();
        let mut rotated = activities.clone();
        rotated.rotate_left(5);

        assert_eq!(identify_focus_sessions(&reversed, 5.0, 25.0), baseline);
        assert_eq!(identify_focus_sessions(&rotated, 5.0, 25.0), baseline);
        assert_eq!(baseline.len(), 8);
    }

    #[test]
    fn peak_focus_hour_is_detected_for_morning_cluster() {
        let mut activities = Vec::new();
        for day in 2..16 {
            activities.push(ActivityRecord::new(at(day, 9, 0), 40.0, "coding"));
            activities.push(ActivityRecord::new(at(day, 9, 43), 40.0, "coding"));
        }
        let config = AnalysisConfig::default();
        let data = BehaviorData::from_records(window(), activities, Vec::new(), &config.behavior);

        let patterns = BehaviorAnalyzer::new(config).analyze(&data).expect("analyze");
        let peak = patterns
            .iter()
            .find_map(|pattern| match &pattern.payload {
                PatternPayload::Behavior(BehaviorSignal::PeakFocusHours { peak_hour, .. }) => {
                    Some((*peak_hour, pattern.strength, pattern.confidence))
                }
                _ => None,
            })
            .expect("peak focus pattern");

        assert_eq!(peak.0, 9);
        assert_eq!(peak.1, 1.0);
        assert!(peak.2 > 0.0);
    }

    #[test]
    fn sparse_columns_never_produce_patterns() {
        let activities: Vec<ActivityRecord> = (2..7)
            .map(|day| ActivityRecord::new(at(day, 9, 0), 60.0, "coding"))
            .collect();
        let usage_records: Vec<ApplicationUsageRecord> = (0..6)
            .map(|minute| usage(at(2, 10, minute), AppCategory::SocialMedia, 2.0))
            .collect();
        let config = AnalysisConfig::default();
        let data =
            BehaviorData::from_records(window(), activities, usage_records, &config.behavior);

        let patterns = BehaviorAnalyzer::new(config.clone()).analyze(&data).expect("analyze");

        assert!(patterns.iter().all(|pattern| pattern.sample_size() >= config.min_data_points));
        assert!(patterns.is_empty());
    }

    #[test]
    fn frequent_social_media_usage_is_reported() {
        let mut usage_records = Vec::new();
        for day in 2..4 {
            for slot in 0..7 {
                usage_records.push(usage(at(day, 20, slot * 5), AppCategory::SocialMedia, 4.0));
            }
        }
        let config = AnalysisConfig::default();
        let data =
            BehaviorData::from_records(window(), Vec::new(), usage_records, &config.behavior);

        let patterns = BehaviorAnalyzer::new(config).analyze(&data).expect("analyze");

        let frequency = patterns.iter().find_map(|pattern| match &pattern.payload {
            PatternPayload::Behavior(BehaviorSignal::ApplicationUsage {
                category: AppCategory::SocialMedia,
                frequency_per_day,
                ..
            }) => Some(*frequency_per_day),
            _ => None,
        });
        assert_eq!(frequency, Some(7.0));
    }

    #[test]
    fn productivity_score_weights_category_time() {
        let usage_records = vec![
            usage(at(2, 9, 0), AppCategory::Development, 60.0),
            usage(at(2, 10, 0), AppCategory::Entertainment, 60.0),
        ];
        let config = AnalysisConfig::default();
        let data =
            BehaviorData::from_records(window(), Vec::new(), usage_records, &config.behavior);

        assert!((data.metrics.productivity_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn invalid_durations_fail_the_analyzer() {
        let activities = vec![ActivityRecord::new(at(2, 9, 0), f64::NAN, "coding")];
        let config = AnalysisConfig::default();
        let data = BehaviorData::from_records(window(), activities, Vec::new(), &config.behavior);

        let error = BehaviorAnalyzer::new(config).analyze(&data).expect_err("nan duration");
        assert!(matches!(error, AnalysisError::Analyzer { .. }));
    }
}
