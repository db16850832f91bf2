//! Distribution quantiles, summary statistics and test decisions.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

/// Alternative hypothesis used when deciding whether a replicate rejects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alternative {
    /// `H1: theta != null`
    #[default]
    #[serde(rename = "two-sided", alias = "two_sided", alias = "!=")]
    TwoSided,
    /// `H1: theta > null`
    #[serde(rename = "greater", alias = ">")]
    Greater,
    /// `H1: theta < null`
    #[serde(rename = "less", alias = "<")]
    Less,
}

impl Alternative {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TwoSided => "two-sided",
            Self::Greater => "greater",
            Self::Less => "less",
        }
    }
}

impl std::str::FromStr for Alternative {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "two-sided" | "two_sided" | "!=" => Ok(Self::TwoSided),
            "greater" | ">" => Ok(Self::Greater),
            "less" | "<" => Ok(Self::Less),
            _ => Err(format!(
                "Unsupported alternative '{raw}' (expected two-sided, greater, or less)"
            )),
        }
    }
}

/// Quantile of the standard normal distribution.
///
/// Returns NaN for `p` outside `(0, 1)`.
pub fn normal_quantile(p: f64) -> f64 {
    if !(p > 0.0 && p < 1.0) {
        return f64::NAN;
    }
    Normal::new(0.0, 1.0)
        .map(|normal| normal.inverse_cdf(p))
        .unwrap_or(f64::NAN)
}

/// Quantile of Student's t distribution with `degrees_of_freedom`.
pub fn t_quantile(p: f64, degrees_of_freedom: f64) -> Option<f64> {
    if !(p > 0.0 && p < 1.0) || !(degrees_of_freedom > 0.0) {
        return None;
    }
    StudentsT::new(0.0, 1.0, degrees_of_freedom)
        .ok()
        .map(|t| t.inverse_cdf(p))
}

/// Two-sided normal critical value for a confidence level, e.g. 1.96 for 0.95.
pub fn z_critical(confidence_level: f64) -> f64 {
    normal_quantile(1.0 - (1.0 - confidence_level) / 2.0)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (`ddof = 1`).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - avg) * (v - avg)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// Wald test decision for `(estimate - null) / standard_error`.
///
/// Returns `None` when the standard error is not strictly positive and finite.
pub fn wald_rejects(
    estimate: f64,
    standard_error: f64,
    null_value: f64,
    significance_level: f64,
    alternative: Alternative,
) -> Option<bool> {
    if !(standard_error > 0.0) || !standard_error.is_finite() {
        return None;
    }
    let statistic = (estimate - null_value) / standard_error;
    let decision = match alternative {
        Alternative::TwoSided => statistic.abs() > normal_quantile(1.0 - significance_level / 2.0),
        Alternative::Greater => statistic > normal_quantile(1.0 - significance_level),
        Alternative::Less => statistic < -normal_quantile(1.0 - significance_level),
    };
    Some(decision)
}

/// Interval inversion: reject when the null value lies outside the interval.
pub fn interval_rejects(lower: f64, upper: f64, null_value: f64, alternative: Alternative) -> bool {
    match alternative {
        Alternative::TwoSided => null_value < lower || null_value > upper,
        Alternative::Greater => lower > null_value,
        Alternative::Less => upper < null_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_quantile_reference_values() {
        assert!((z_critical(0.95) - 1.959_963_984_540_054).abs() < 1e-6);
        assert!((normal_quantile(0.5)).abs() < 1e-9);
        assert!(normal_quantile(1.0).is_nan());
    }

    #[test]
    fn test_t_quantile_approaches_normal() {
        let t = t_quantile(0.975, 10.0).unwrap();
        assert!((t - 2.228_138_851_986_274).abs() < 1e-4);
        let t_large = t_quantile(0.975, 1e6).unwrap();
        assert!((t_large - 1.96).abs() < 1e-2);
        assert!(t_quantile(0.975, 0.0).is_none());
    }

    #[test]
    fn test_mean_and_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), Some(5.0));
        let sd = sample_std(&values).unwrap();
        assert!((sd - 2.138_089_935_299_395).abs() < 1e-12);
        assert_eq!(sample_std(&[1.0]), None);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_wald_alternatives() {
        assert_eq!(wald_rejects(2.5, 1.0, 0.0, 0.05, Alternative::TwoSided), Some(true));
        assert_eq!(wald_rejects(1.8, 1.0, 0.0, 0.05, Alternative::TwoSided), Some(false));
        assert_eq!(wald_rejects(1.8, 1.0, 0.0, 0.05, Alternative::Greater), Some(true));
        assert_eq!(wald_rejects(1.8, 1.0, 0.0, 0.05, Alternative::Less), Some(false));
        assert_eq!(wald_rejects(-1.8, 1.0, 0.0, 0.05, Alternative::Less), Some(true));
        assert_eq!(wald_rejects(1.0, 0.0, 0.0, 0.05, Alternative::TwoSided), None);
    }

    #[test]
    fn test_interval_rejects() {
        assert!(interval_rejects(0.1, 0.9, 0.0, Alternative::TwoSided));
        assert!(!interval_rejects(-0.1, 0.9, 0.0, Alternative::TwoSided));
        assert!(interval_rejects(0.1, 0.9, 0.0, Alternative::Greater));
        assert!(!interval_rejects(0.1, 0.9, 0.0, Alternative::Less));
    }

    #[test]
    fn test_alternative_parsing() {
        assert_eq!("!=".parse::<Alternative>().unwrap(), Alternative::TwoSided);
        assert_eq!("Greater".parse::<Alternative>().unwrap(), Alternative::Greater);
        assert!("sideways".parse::<Alternative>().is_err());
        let parsed: Alternative = serde_json::from_str("\"<\"").unwrap();
        assert_eq!(parsed, Alternative::Less);
    }
}
