//! Temporal domain: time-of-day segments, weekly rhythm and work blocks.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::stats::{clamp_unit, coefficient_of_variation, mean, sample_std_dev};
use super::{ensure_valid_minutes, retain_supported, DomainAnalyzer};
use crate::config::{AnalysisConfig, TemporalThresholds};
use crate::domain::analysis::AnalysisWindow;
use crate::domain::pattern::{DaySegment, Pattern, PatternDomain, PatternPayload, TemporalSignal};
use crate::domain::record::ActivityRecord;
use crate::errors::AnalysisError;

const CONFIDENCE_SCALE: f64 = 1.2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub activity_count: usize,
}

impl TimeBlock {
    pub fn duration_minutes(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 60_000.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TemporalData {
    pub window: AnalysisWindow,
    pub activities: Vec<ActivityRecord>,
    pub time_blocks: Vec<TimeBlock>,
    pub active_days: usize,
}

impl TemporalData {
    pub fn from_records(
        window: AnalysisWindow,
        mut activities: Vec<ActivityRecord>,
        thresholds: &TemporalThresholds,
    ) -> Self {
        activities.sort_by_key(|record| record.timestamp);
        let time_blocks = identify_time_blocks(&activities, thresholds.time_block_gap_minutes);
        let active_days = activities
            .iter()
            .map(|record| record.timestamp.date_naive())
            .collect::<BTreeSet<_>>()
            .len();

        Self { window, activities, time_blocks, active_days }
    }

    fn durations(&self) -> Vec<f64> {
        self.activities.iter().map(|record| record.duration_minutes).collect()
    }
}

/// Merges activities into blocks when each starts within `gap_minutes` of the block end.
pub fn identify_time_blocks(activities: &[ActivityRecord], gap_minutes: f64) -> Vec<TimeBlock> {
    let mut ordered: Vec<&ActivityRecord> = activities.iter().collect();
    ordered.sort_by_key(|record| record.timestamp);

    let mut blocks: Vec<TimeBlock> = Vec::new();
    for activity in ordered {
        let end = activity.ends_at();
        if let Some(block) = blocks.last_mut() {
            let gap = (activity.timestamp - block.end).num_milliseconds() as f64 / 60_000.0;
            if gap <= gap_minutes {
                block.end = block.end.max(end);
                block.activity_count += 1;
                continue;
            }
        }
        blocks.push(TimeBlock { start: activity.timestamp, end, activity_count: 1 });
    }
    blocks
}

#[derive(Clone, Debug)]
pub struct TemporalAnalyzer {
    config: AnalysisConfig,
}

impl TemporalAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    fn thresholds(&self) -> &TemporalThresholds {
        &self.config.temporal
    }

    fn day_segments(&self, data: &TemporalData) -> Vec<Pattern> {
        let mut by_segment: BTreeMap<DaySegment, Vec<f64>> = BTreeMap::new();
        for record in &data.activities {
            by_segment
                .entry(DaySegment::from_hour(record.timestamp.hour()))
                .or_default()
                .push(record.duration_minutes);
        }
        let total: f64 = by_segment.values().flatten().sum();
        if total <= 0.0 {
            return Vec::new();
        }

        let shares: BTreeMap<&str, f64> = DaySegment::ALL
            .iter()
            .map(|segment| {
                let minutes: f64 = by_segment.get(segment).into_iter().flatten().sum();
                (segment.label(), minutes / total)
            })
            .collect();

        let mut patterns = Vec::new();
        for (segment, durations) in by_segment {
            let duration: f64 = durations.iter().sum();
            let share = duration / total;
            if share <= self.thresholds().segment_share_threshold {
                continue;
            }

            let strength = clamp_unit(share);
            let pattern = Pattern::new(
                format!("{}_activity", segment.label().replace(' ', "_")),
                format!("{:.0}% of tracked time falls in the {}", share * 100.0, segment.label()),
                PatternPayload::Temporal(TemporalSignal::DaySegmentConcentration {
                    segment,
                    share,
                    duration_minutes: duration,
                }),
                durations,
                data.window.end,
            );
            let (first_hour, last_hour) = segment.hour_range();
            patterns.push(
                pattern
                    .with_scores(strength, scaled_confidence(strength), strength)
                    .with_attribute("hour_range", json!([first_hour, last_hour]))
                    .with_attribute("segment_shares", json!(shares)),
            );
        }
        patterns
    }

    fn peak_hours(&self, data: &TemporalData) -> Option<Pattern> {
        let mut hourly: BTreeMap<u32, f64> = BTreeMap::new();
        for record in &data.activities {
            *hourly.entry(record.timestamp.hour()).or_default() += record.duration_minutes;
        }
        let totals: Vec<f64> = hourly.values().copied().collect();
        let average = mean(&totals)?;
        let cutoff = average + sample_std_dev(&totals)?;
        let hours: Vec<u32> =
            hourly.iter().filter(|(_, minutes)| **minutes > cutoff).map(|(hour, _)| *hour).collect();
        if hours.is_empty() {
            return None;
        }

        let peak_minutes = totals.iter().copied().fold(0.0, f64::max);
        let strength = clamp_unit(hours.len() as f64 / 24.0);
        let pattern = Pattern::new(
            "peak_hours",
            format!("Activity peaks in {} hours of the day", hours.len()),
            PatternPayload::Temporal(TemporalSignal::PeakHours {
                hours,
                average_minutes: average,
                peak_minutes,
            }),
            data.durations(),
            data.window.end,
        );
        Some(pattern.with_scores(strength, scaled_confidence(strength), strength))
    }

    fn high_activity_days(&self, data: &TemporalData) -> Option<Pattern> {
        let mut by_weekday: BTreeMap<u32, f64> = BTreeMap::new();
        for record in &data.activities {
            *by_weekday.entry(record.timestamp.weekday().num_days_from_monday()).or_default() +=
                record.duration_minutes;
        }
        let totals: Vec<f64> = by_weekday.values().copied().collect();
        let average = mean(&totals)?;
        let weekdays: Vec<u32> =
            by_weekday.iter().filter(|(_, minutes)| **minutes > average).map(|(day, _)| *day).collect();
        if weekdays.is_empty() {
            return None;
        }

        let strength = clamp_unit(weekdays.len() as f64 / 7.0);
        let pattern = Pattern::new(
            "high_activity_days",
            format!("{} days of the week carry above-average activity", weekdays.len()),
            PatternPayload::Temporal(TemporalSignal::HighActivityDays {
                weekdays,
                average_minutes: average,
            }),
            data.durations(),
            data.window.end,
        );
        Some(pattern.with_scores(strength, scaled_confidence(strength), strength))
    }

    fn weekend_variation(&self, data: &TemporalData) -> Option<Pattern> {
        let mut weekday_total = 0.0;
        let mut weekend_total = 0.0;
        for record in &data.activities {
            if record.timestamp.weekday().num_days_from_monday() >= 5 {
                weekend_total += record.duration_minutes;
            } else {
                weekday_total += record.duration_minutes;
            }
        }
        let weekday_average = weekday_total / 5.0;
        let weekend_average = weekend_total / 2.0;

        let relative_difference = if weekday_average > 0.0 {
            (weekend_average - weekday_average) / weekday_average
        } else if weekend_average > 0.0 {
            1.0
        } else {
            return None;
        };
        if relative_difference.abs() <= self.thresholds().weekend_variation_threshold {
            return None;
        }

        let strength = clamp_unit(relative_difference.abs());
        let support = clamp_unit(weekend_total / (weekday_total + weekend_total));
        let pattern = Pattern::new(
            "weekend_variation",
            format!(
                "Weekend days carry {:.0}% {} activity than weekdays",
                relative_difference.abs() * 100.0,
                if relative_difference > 0.0 { "more" } else { "less" }
            ),
            PatternPayload::Temporal(TemporalSignal::WeekendVariation {
                weekday_average,
                weekend_average,
                relative_difference,
            }),
            data.durations(),
            data.window.end,
        );
        Some(pattern.with_scores(strength, scaled_confidence(strength), support))
    }

    fn consistent_blocks(&self, data: &TemporalData) -> Option<Pattern> {
        let durations: Vec<f64> = data.time_blocks.iter().map(TimeBlock::duration_minutes).collect();
        let variation = coefficient_of_variation(&durations)?;
        if variation >= self.thresholds().routine_consistency_threshold {
            return None;
        }

        let average = mean(&durations)?;
        let consistency = clamp_unit(1.0 - variation);
        let support = if data.active_days > 0 {
            clamp_unit(durations.iter().sum::<f64>() / (data.active_days as f64 * 1440.0))
        } else {
            0.0
        };
        let pattern = Pattern::new(
            "consistent_blocks",
            format!("Work blocks consistently last about {average:.0} minutes"),
            PatternPayload::Temporal(TemporalSignal::ConsistentBlocks {
                average_minutes: average,
                consistency,
                block_count: durations.len(),
            }),
            durations,
            data.window.end,
        );
        Some(pattern.with_scores(consistency, scaled_confidence(consistency), support))
    }

    fn common_start_times(&self, data: &TemporalData) -> Option<Pattern> {
        let mut starts: BTreeMap<u32, usize> = BTreeMap::new();
        for block in &data.time_blocks {
            *starts.entry(block.start.hour()).or_default() += 1;
        }
        let hours: Vec<u32> = starts
            .iter()
            .filter(|(_, count)| **count >= self.thresholds().min_pattern_occurrences)
            .map(|(hour, _)| *hour)
            .collect();
        if hours.is_empty() {
            return None;
        }

        let strength = clamp_unit(hours.len() as f64 / 24.0);
        let pattern = Pattern::new(
            "common_start_times",
            format!("Work blocks regularly start at {} distinct hours", hours.len()),
            PatternPayload::Temporal(TemporalSignal::CommonStartTimes { hours }),
            data.time_blocks.iter().map(|block| f64::from(block.start.hour())).collect(),
            data.window.end,
        );
        Some(pattern.with_scores(strength, scaled_confidence(strength), strength))
    }
}

impl DomainAnalyzer for TemporalAnalyzer {
    type Data = TemporalData;

    fn domain(&self) -> PatternDomain {
        PatternDomain::Temporal
    }

    fn analyze(&self, data: &TemporalData) -> Result<Vec<Pattern>, AnalysisError> {
        ensure_valid_minutes(PatternDomain::Temporal, "activity record", data.durations())?;

        let mut patterns = self.day_segments(data);
        patterns.extend(self.peak_hours(data));
        patterns.extend(self.high_activity_days(data));
        patterns.extend(self.weekend_variation(data));
        patterns.extend(self.consistent_blocks(data));
        patterns.extend(self.common_start_times(data));

        Ok(retain_supported(patterns, self.config.min_data_points))
    }
}

fn scaled_confidence(strength: f64) -> f64 {
    clamp_unit(CONFIDENCE_SCALE * strength)
}
