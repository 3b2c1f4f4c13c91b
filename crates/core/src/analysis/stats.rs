//! Small numeric helpers shared by the domain analyzers and the correlator.

use rust_decimal::Decimal;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with an `n - 1` denominator.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let variance =
        values.iter().map(|value| (value - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Standard deviation with an `n` denominator.
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let variance =
        values.iter().map(|value| (value - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Sample standard deviation over mean. `None` when the mean is zero or undefined.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    if avg == 0.0 {
        return None;
    }
    Some(sample_std_dev(values)? / avg)
}

/// Pearson correlation of two equally long series.
///
/// Returns `None` for fewer than two points or when either series is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mean_x = mean(xs)?;
    let mean_y = mean(ys)?;

    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    let mut variance_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        variance_x += dx * dx;
        variance_y += dy * dy;
    }

    if variance_x == 0.0 || variance_y == 0.0 {
        return None;
    }
    let r = covariance / (variance_x.sqrt() * variance_y.sqrt());
    r.is_finite().then_some(r.clamp(-1.0, 1.0))
}

/// Strength of a numeric column: `|mean| / max(std, 1)`.
///
/// An undefined deviation (single value) counts as 1.
pub fn column_strength(values: &[f64]) -> f64 {
    let Some(avg) = mean(values) else {
        return 0.0;
    };
    let deviation = match sample_std_dev(values) {
        Some(std) if std > 1.0 => std,
        _ => 1.0,
    };
    avg.abs() / deviation
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn decimal_to_f64(d: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    d.to_f64().unwrap_or(0.0)
}
