//! Financial domain: spending volatility, category mix, budgets and recurring charges.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::stats::{clamp_unit, coefficient_of_variation, decimal_to_f64, mean, population_std_dev};
use super::{retain_supported, DomainAnalyzer};
use crate::config::{AnalysisConfig, FinancialThresholds};
use crate::domain::analysis::AnalysisWindow;
use crate::domain::pattern::{FinancialSignal, Pattern, PatternDomain, PatternPayload};
use crate::domain::record::{BudgetLimits, SpendingCategory, TransactionRecord};
use crate::errors::AnalysisError;

const CONFIDENCE_SCALE: f64 = 1.2;
const FULL_CONFIDENCE_TRANSACTIONS: f64 = 10.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub category: SpendingCategory,
    pub limit: Decimal,
    /// Sum of expense magnitudes booked to the category inside the window.
    pub actual: Decimal,
    pub transaction_count: usize,
}

impl BudgetStatus {
    /// `(actual - limit) / limit`, or zero for a non-positive limit.
    pub fn variance(&self) -> f64 {
        if self.limit <= Decimal::ZERO {
            return 0.0;
        }
        decimal_to_f64((self.actual - self.limit) / self.limit)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FinancialData {
    pub window: AnalysisWindow,
    pub transactions: Vec<TransactionRecord>,
    pub budgets: Vec<BudgetStatus>,
}

impl FinancialData {
    pub fn from_records(
        window: AnalysisWindow,
        mut transactions: Vec<TransactionRecord>,
        limits: BudgetLimits,
    ) -> Self {
        transactions.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.merchant.cmp(&b.merchant)));

        let budgets = limits
            .into_iter()
            .map(|(category, limit)| {
                let spent: Vec<&TransactionRecord> = transactions
                    .iter()
                    .filter(|record| record.is_expense() && record.category == category)
                    .collect();
                BudgetStatus {
                    category,
                    limit,
                    actual: spent.iter().map(|record| record.spend()).sum(),
                    transaction_count: spent.len(),
                }
            })
            .collect();

        Self { window, transactions, budgets }
    }

    fn expenses(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.transactions.iter().filter(|record| record.is_expense())
    }
}

#[derive(Clone, Debug)]
pub struct FinancialAnalyzer {
    config: AnalysisConfig,
}

impl FinancialAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    fn thresholds(&self) -> &FinancialThresholds {
        &self.config.financial
    }

    fn spending_volatility(&self, data: &FinancialData) -> Option<Pattern> {
        let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for record in data.expenses() {
            *daily.entry(record.date).or_default() += decimal_to_f64(record.spend());
        }
        let totals: Vec<f64> = daily.values().copied().collect();
        let volatility = coefficient_of_variation(&totals)?;
        if volatility <= self.thresholds().spending_variance_threshold {
            return None;
        }

        let std_dev = volatility * mean(&totals)?;
        let max_daily = totals.iter().copied().fold(f64::MIN, f64::max);
        let min_daily = totals.iter().copied().fold(f64::MAX, f64::min);
        let strength = clamp_unit(volatility);
        let support = window_share(totals.len() as f64, data.window);

        let pattern = Pattern::new(
            "spending_volatility",
            format!("Daily spending varies by {:.0}% around its average", volatility * 100.0),
            PatternPayload::Financial(FinancialSignal::SpendingVolatility {
                mean_daily: mean(&totals)?,
                std_dev,
                max_daily,
                min_daily,
            }),
            totals,
            data.window.end,
        );
        Some(pattern.with_scores(strength, clamp_unit(CONFIDENCE_SCALE * strength), support))
    }

    fn category_concentration(&self, data: &FinancialData) -> Vec<Pattern> {
        let mut by_category: BTreeMap<SpendingCategory, Vec<Decimal>> = BTreeMap::new();
        for record in data.expenses() {
            by_category.entry(record.category).or_default().push(record.spend());
        }
        let total: Decimal = by_category.values().flatten().copied().sum();
        if total <= Decimal::ZERO {
            return Vec::new();
        }

        let mut patterns = Vec::new();
        for (category, amounts) in by_category {
            let amount: Decimal = amounts.iter().copied().sum();
            let share = decimal_to_f64(amount / total);
            if share <= self.thresholds().category_concentration_threshold {
                continue;
            }

            let strength = clamp_unit(share);
            let pattern = Pattern::new(
                format!("{}_concentration", category.as_str()),
                format!("{:.0}% of spending goes to {}", share * 100.0, category.as_str()),
                PatternPayload::Financial(FinancialSignal::CategoryConcentration {
                    category,
                    share,
                    amount,
                }),
                amounts.into_iter().map(decimal_to_f64).collect(),
                data.window.end,
            );
            patterns.push(pattern.with_scores(
                strength,
                clamp_unit(CONFIDENCE_SCALE * strength),
                strength,
            ));
        }
        patterns
    }

    fn budget_variances(&self, data: &FinancialData) -> Vec<Pattern> {
        let mut patterns = Vec::new();
        for status in &data.budgets {
            let variance = status.variance();
            if variance.abs() <= self.thresholds().budget_variance_threshold {
                continue;
            }

            let observations: Vec<f64> = data
                .expenses()
                .filter(|record| record.category == status.category)
                .map(|record| decimal_to_f64(record.spend()))
                .collect();
            let direction = if variance > 0.0 { "over" } else { "under" };
            let strength = clamp_unit(variance.abs());

            let pattern = Pattern::new(
                format!("{}_budget", status.category.as_str()),
                format!(
                    "{} spending is {:.0}% {direction} budget",
                    status.category.as_str(),
                    variance.abs() * 100.0
                ),
                PatternPayload::Financial(FinancialSignal::BudgetVariance {
                    category: status.category,
                    variance,
                    limit: status.limit,
                    actual: status.actual,
                }),
                observations,
                data.window.end,
            );
            patterns.push(pattern.with_scores(strength, clamp_unit(2.0 * variance.abs()), 1.0));
        }
        patterns
    }

    fn recurring_transactions(&self, data: &FinancialData) -> Vec<Pattern> {
        let mut by_merchant: BTreeMap<&str, Vec<&TransactionRecord>> = BTreeMap::new();
        for record in &data.transactions {
            by_merchant.entry(record.merchant.as_str()).or_default().push(record);
        }

        let mut patterns = Vec::new();
        for (merchant, records) in by_merchant {
            if records.len() < self.thresholds().recurring_min_transactions {
                continue;
            }

            let intervals: Vec<f64> =
                records.windows(2).map(|pair| (pair[1].date - pair[0].date).num_days() as f64).collect();
            let Some(average_interval) = mean(&intervals) else {
                continue;
            };
            if average_interval <= 0.0 {
                continue;
            }
            let Some(deviation) = population_std_dev(&intervals) else {
                continue;
            };
            let irregularity = deviation / average_interval;
            if irregularity >= self.thresholds().recurring_regularity_threshold {
                continue;
            }

            let count = records.len();
            let total: Decimal = records.iter().map(|record| record.spend()).sum();
            let average_amount = total / Decimal::from(count as u64);
            let span_days = match (records.first(), records.last()) {
                (Some(first), Some(last)) => (last.date - first.date).num_days() as f64,
                _ => 0.0,
            };

            let pattern = Pattern::new(
                format!("recurring_{merchant}"),
                format!("{merchant} charges roughly every {average_interval:.0} days"),
                PatternPayload::Financial(FinancialSignal::RecurringTransaction {
                    merchant: merchant.to_string(),
                    average_interval_days: average_interval,
                    average_amount,
                    transaction_count: count,
                }),
                records.iter().map(|record| decimal_to_f64(record.spend())).collect(),
                data.window.end,
            );
            patterns.push(pattern.with_scores(
                clamp_unit(1.0 - irregularity),
                clamp_unit(count as f64 / FULL_CONFIDENCE_TRANSACTIONS),
                window_share(span_days, data.window),
            ));
        }
        patterns
    }
}

impl DomainAnalyzer for FinancialAnalyzer {
    type Data = FinancialData;

    fn domain(&self) -> PatternDomain {
        PatternDomain::Financial
    }

    fn analyze(&self, data: &FinancialData) -> Result<Vec<Pattern>, AnalysisError> {
        if let Some(record) = data.transactions.iter().find(|record| record.merchant.trim().is_empty())
        {
            return Err(AnalysisError::analyzer(
                PatternDomain::Financial,
                format!("transaction on {} has no merchant", record.date),
            ));
        }

        let mut patterns = Vec::new();
        patterns.extend(self.spending_volatility(data));
        patterns.extend(self.category_concentration(data));
        patterns.extend(self.budget_variances(data));
        patterns.extend(self.recurring_transactions(data));

        Ok(retain_supported(patterns, self.config.min_data_points))
    }
}

fn window_share(days: f64, window: AnalysisWindow) -> f64 {
    let window_days = window.days();
    if window_days <= 0.0 {
        return 0.0;
    }
    clamp_unit(days / window_days)
}
