use super::stats::clamp_unit;
use crate::config::PatternWeights;
use crate::domain::analysis::PatternScores;
use crate::domain::pattern::{CombinedPattern, PatternDomain};

/// Weighted strength per domain, normalized by the largest domain total.
///
/// Cross-domain patterns count toward the first domain of their pair. When no
/// domain accumulates any weight every score is zero.
pub fn pattern_scores(patterns: &[CombinedPattern], weights: &PatternWeights) -> PatternScores {
    let mut totals = PatternScores::default();
    for pattern in patterns {
        let strength = pattern.strength();
        if !strength.is_finite() {
            continue;
        }
        match pattern.primary_domain() {
            PatternDomain::Behavior => totals.productivity += strength * weights.productivity,
            PatternDomain::Financial => totals.financial += strength * weights.financial,
            PatternDomain::Temporal => totals.temporal += strength * weights.temporal,
        }
    }

    let max = totals.values().into_iter().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return PatternScores::default();
    }

    PatternScores {
        productivity: clamp_unit(totals.productivity / max),
        financial: clamp_unit(totals.financial / max),
        temporal: clamp_unit(totals.temporal / max),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::pattern_scores;
    use crate::config::PatternWeights;
    use crate::domain::analysis::PatternScores;
    use crate::domain::pattern::{
        CombinedPattern, CorrelatedPattern, CorrelationInfo, DomainPair, Pattern, PatternPayload,
        TemporalSignal,
    };

    fn temporal(strength: f64) -> CombinedPattern {
        CombinedPattern::SingleDomain(
            Pattern::new(
                "common_start_times",
                "",
                PatternPayload::Temporal(TemporalSignal::CommonStartTimes { hours: vec![9] }),
                vec![],
                Utc::now(),
            )
            .with_scores(strength, 0.5, 0.5),
        )
    }

    fn behavior_financial(strength: f64) -> CombinedPattern {
        CombinedPattern::CrossDomain(CorrelatedPattern {
            pair: DomainPair::BehaviorFinancial,
            strength,
            patterns: BTreeMap::new(),
            correlation: CorrelationInfo {
                coefficient: strength,
                columns: ("behavior.strength".to_string(), "financial.strength".to_string()),
                sample_size: 3,
                detected_at: Utc::now(),
            },
        })
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(pattern_scores(&[], &PatternWeights::default()), PatternScores::default());
        assert_eq!(
            pattern_scores(&[temporal(0.0)], &PatternWeights::default()),
            PatternScores::default()
        );
    }

    #[test]
    fn cross_domain_counts_toward_first_domain_and_max_is_one() {
        let scores = pattern_scores(
            &[behavior_financial(0.9), temporal(0.6), temporal(0.3)],
            &PatternWeights::default(),
        );

        // behavior 0.9 * 0.35 = 0.315, temporal 0.9 * 0.30 = 0.27
        assert!((scores.productivity - 1.0).abs() < 1e-9);
        assert!((scores.temporal - 0.27 / 0.315).abs() < 1e-9);
        assert_eq!(scores.financial, 0.0);
        assert!(scores.values().iter().all(|value| (0.0..=1.0).contains(value)));
    }
}
