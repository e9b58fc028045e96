//! Window statistics shared by the pattern analyzers
//!
//! Pure functions over sample slices. No allocation beyond what the
//! regression needs, no I/O.

/// Ordinary least-squares fit of value against window index
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl Regression {
    /// "No trend": flat line through the mean
    fn flat(mean: f64) -> Self {
        Self {
            slope: 0.0,
            intercept: mean,
            r_squared: 0.0,
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator)
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// std_dev / |mean|, 0 when the mean is 0
pub fn relative_std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    if m == 0.0 {
        return 0.0;
    }
    std_dev(values) / m.abs()
}

/// Linear regression over (index, value).
///
/// Needs at least 3 points; fewer points or a singular fit degrade to a
/// flat "no trend" line. R² is 0 when the values are constant.
pub fn linear_regression(values: &[f64]) -> Regression {
    let m = mean(values);
    if values.len() < 3 {
        return Regression::flat(m);
    }

    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - m);
        sxx += dx * dx;
    }

    if sxx == 0.0 || !sxy.is_finite() {
        return Regression::flat(m);
    }

    let slope = sxy / sxx;
    let intercept = m - slope * x_mean;

    let ss_tot: f64 = values.iter().map(|y| (y - m).powi(2)).sum();
    let ss_res: f64 = values
        .iter()
        .enumerate()
        .map(|(i, y)| (y - (slope * i as f64 + intercept)).powi(2))
        .sum();

    let r_squared = if ss_tot == 0.0 {
        0.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    Regression {
        slope,
        intercept,
        r_squared,
    }
}

/// Number of sign flips between consecutive first differences.
///
/// Zero differences carry no direction and are skipped.
pub fn direction_changes(values: &[f64]) -> usize {
    let mut changes = 0;
    let mut last_sign = 0i8;
    for pair in values.windows(2) {
        let diff = pair[1] - pair[0];
        let sign = if diff > 0.0 {
            1
        } else if diff < 0.0 {
            -1
        } else {
            continue;
        };
        if last_sign != 0 && sign != last_sign {
            changes += 1;
        }
        last_sign = sign;
    }
    changes
}

/// direction_changes normalized by the number of interior points
pub fn direction_change_ratio(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    direction_changes(values) as f64 / (values.len() - 2) as f64
}

pub fn min_max(values: &[f64]) -> (f64, f64) {
    values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&values), 5.0);
        assert_relative_eq!(std_dev(&values), 2.138089935, epsilon = 1e-6);
        assert_eq!(std_dev(&[3.0]), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_regression_perfect_line() {
        let values: Vec<f64> = (0..10).map(|i| 3.0 + 2.0 * i as f64).collect();
        let fit = linear_regression(&values);
        assert_relative_eq!(fit.slope, 2.0, epsilon = 1e-9);
        assert_relative_eq!(fit.intercept, 3.0, epsilon = 1e-9);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_regression_degenerate_inputs() {
        let fit = linear_regression(&[1.0, 2.0]);
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.r_squared, 0.0);

        let fit = linear_regression(&[5.0, 5.0, 5.0, 5.0]);
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.r_squared, 0.0);
        assert_relative_eq!(fit.intercept, 5.0);
    }

    #[test]
    fn test_direction_changes() {
        assert_eq!(direction_changes(&[1.0, 2.0, 3.0, 4.0]), 0);
        assert_eq!(direction_changes(&[1.0, 3.0, 1.0, 3.0, 1.0]), 3);
        // Plateaus do not count as a change
        assert_eq!(direction_changes(&[1.0, 2.0, 2.0, 3.0]), 0);
        assert_relative_eq!(direction_change_ratio(&[1.0, 3.0, 1.0, 3.0, 1.0]), 1.0);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(min_max(&[3.0, -1.0, 8.0]), (-1.0, 8.0));
    }
}
