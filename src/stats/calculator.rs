//! Statistics Calculator Module
//! Descriptive statistics: grouped counts, box statistics and Pearson correlation.

use crate::data::NumericMatrix;
use nalgebra::DMatrix;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Row counts per (target level, category).
#[derive(Debug, Clone, PartialEq)]
pub struct QualityCounts {
    pub total: usize,
    pub levels: Vec<i64>,
    pub categories: Vec<String>,
    pub by_level: BTreeMap<(i64, String), usize>,
}

impl QualityCounts {
    pub fn count(&self, level: i64, category: &str) -> usize {
        self.by_level
            .get(&(level, category.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Totals per category, largest first, ties broken by name.
    pub fn category_totals(&self) -> Vec<(String, usize)> {
        let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
        for ((_, category), n) in &self.by_level {
            *totals.entry(category.as_str()).or_default() += n;
        }
        let mut totals: Vec<(String, usize)> = totals
            .into_iter()
            .map(|(c, n)| (c.to_string(), n))
            .collect();
        totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        totals
    }

    pub fn max_count(&self) -> usize {
        self.by_level.values().copied().max().unwrap_or(0)
    }
}

/// Five-number summary with 1.5 x IQR whiskers.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub count: usize,
    pub mean: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_low: f64,
    pub whisker_high: f64,
    pub outliers: Vec<f64>,
}

impl Default for BoxStats {
    fn default() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            q1: f64::NAN,
            median: f64::NAN,
            q3: f64::NAN,
            whisker_low: f64::NAN,
            whisker_high: f64::NAN,
            outliers: Vec::new(),
        }
    }
}

impl BoxStats {
    /// Smallest and largest value drawn, outliers included.
    pub fn extent(&self) -> (f64, f64) {
        self.outliers
            .iter()
            .fold((self.whisker_low, self.whisker_high), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }
}

/// Pairwise Pearson correlation over named columns.
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: DMatrix<f64>,
}

impl CorrelationMatrix {
    pub fn size(&self) -> usize {
        self.columns.len()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[(i, j)]
    }
}

/// Handles descriptive statistical calculations.
pub struct StatsCalculator;

impl StatsCalculator {
    fn sorted(values: &[f64]) -> Vec<f64> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        sorted
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    pub fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            return f64::NAN;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

    /// Box statistics for one group. NaN values are ignored.
    pub fn box_stats(values: &[f64]) -> BoxStats {
        let sorted = Self::sorted(values);
        let n = sorted.len();
        if n == 0 {
            return BoxStats::default();
        }

        let q1 = Self::percentile(&sorted, 25.0);
        let median = Self::percentile(&sorted, 50.0);
        let q3 = Self::percentile(&sorted, 75.0);
        let iqr = q3 - q1;
        let low_fence = q1 - 1.5 * iqr;
        let high_fence = q3 + 1.5 * iqr;

        let whisker_low = sorted
            .iter()
            .copied()
            .find(|&v| v >= low_fence)
            .unwrap_or(q1);
        let whisker_high = sorted
            .iter()
            .rev()
            .copied()
            .find(|&v| v <= high_fence)
            .unwrap_or(q3);
        let outliers = sorted
            .iter()
            .copied()
            .filter(|&v| v < whisker_low || v > whisker_high)
            .collect();

        BoxStats {
            count: n,
            mean: Self::mean(&sorted),
            q1,
            median,
            q3,
            whisker_low,
            whisker_high,
            outliers,
        }
    }

    /// Count rows per (level, category). Both slices run parallel to the rows.
    pub fn group_counts(levels: &[i64], categories: &[String]) -> QualityCounts {
        let mut by_level: BTreeMap<(i64, String), usize> = BTreeMap::new();
        for (&level, category) in levels.iter().zip(categories) {
            *by_level.entry((level, category.clone())).or_default() += 1;
        }

        let mut distinct_levels: Vec<i64> = by_level.keys().map(|(l, _)| *l).collect();
        distinct_levels.dedup();
        let mut distinct_categories: Vec<String> =
            by_level.keys().map(|(_, c)| c.clone()).collect();
        distinct_categories.sort();
        distinct_categories.dedup();

        QualityCounts {
            total: levels.len().min(categories.len()),
            levels: distinct_levels,
            categories: distinct_categories,
            by_level,
        }
    }

    /// Pearson correlation of two equally long slices. NaN when either side is constant.
    pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
        let n = x.len().min(y.len());
        if n < 2 {
            return f64::NAN;
        }
        let mx = Self::mean(&x[..n]);
        let my = Self::mean(&y[..n]);

        let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
        for (a, b) in x.iter().zip(y) {
            let dx = a - mx;
            let dy = b - my;
            sxy += dx * dy;
            sxx += dx * dx;
            syy += dy * dy;
        }
        if sxx == 0.0 || syy == 0.0 {
            return f64::NAN;
        }
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    }

    /// Symmetric correlation matrix with a unit diagonal.
    pub fn correlation_matrix(matrix: &NumericMatrix) -> CorrelationMatrix {
        let k = matrix.ncols();
        let columns: Vec<Vec<f64>> = (0..k)
            .map(|j| matrix.values.column(j).iter().copied().collect())
            .collect();

        let mut values = DMatrix::from_element(k, k, 1.0);
        for i in 0..k {
            for j in (i + 1)..k {
                let r = Self::pearson(&columns[i], &columns[j]);
                values[(i, j)] = r;
                values[(j, i)] = r;
            }
        }

        CorrelationMatrix {
            columns: matrix.columns.clone(),
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_matches_numpy_linear() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(StatsCalculator::percentile(&sorted, 25.0), 1.75);
        assert_eq!(StatsCalculator::percentile(&sorted, 50.0), 2.5);
        assert_eq!(StatsCalculator::percentile(&sorted, 75.0), 3.25);
        assert!(StatsCalculator::percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn test_box_stats_whiskers_and_outliers() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 50.0];
        let stats = StatsCalculator::box_stats(&values);

        assert_eq!(stats.count, 10);
        assert_eq!(stats.q1, 3.25);
        assert_eq!(stats.median, 5.5);
        assert_eq!(stats.q3, 7.75);
        assert_eq!(stats.whisker_low, 1.0);
        assert_eq!(stats.whisker_high, 9.0);
        assert_eq!(stats.outliers, vec![50.0]);
        assert_eq!(stats.extent(), (1.0, 50.0));
    }

    #[test]
    fn test_box_stats_empty() {
        let stats = StatsCalculator::box_stats(&[]);
        assert_eq!(stats.count, 0);
        assert!(stats.median.is_nan());
    }

    #[test]
    fn test_group_counts_ordering() {
        let levels = [6, 5, 6, 5, 7];
        let cats: Vec<String> = ["white", "red", "red", "red", "white"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let counts = StatsCalculator::group_counts(&levels, &cats);

        assert_eq!(counts.total, 5);
        assert_eq!(counts.levels, vec![5, 6, 7]);
        assert_eq!(counts.categories, vec!["red", "white"]);
        assert_eq!(counts.count(5, "red"), 2);
        assert_eq!(counts.count(7, "red"), 0);
        assert_eq!(
            counts.category_totals(),
            vec![("red".to_string(), 3), ("white".to_string(), 2)]
        );
        let keys: Vec<(i64, String)> = counts.by_level.keys().cloned().collect();
        assert_eq!(keys[0], (5, "red".to_string()));
        assert_eq!(keys[1], (6, "red".to_string()));
        assert_eq!(keys[2], (6, "white".to_string()));
    }

    #[test]
    fn test_correlation_matrix_properties() {
        let values = DMatrix::from_row_slice(
            5,
            3,
            &[
                1.0, 2.0, 5.0, //
                2.0, 4.1, 3.0, //
                3.0, 6.2, 4.0, //
                4.0, 7.9, 1.0, //
                5.0, 10.0, 2.0,
            ],
        );
        let matrix = NumericMatrix {
            columns: vec!["a".into(), "b".into(), "c".into()],
            values,
        };
        let corr = StatsCalculator::correlation_matrix(&matrix);

        assert_eq!(corr.size(), 3);
        for i in 0..3 {
            assert_eq!(corr.get(i, i), 1.0);
            for j in 0..3 {
                assert_eq!(corr.get(i, j), corr.get(j, i));
                assert!((-1.0..=1.0).contains(&corr.get(i, j)));
            }
        }
        assert!(corr.get(0, 1) > 0.99);
        assert!(corr.get(0, 2) < 0.0);
    }

    #[test]
    fn test_pearson_constant_is_nan() {
        assert!(StatsCalculator::pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
        let r = StatsCalculator::pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]);
        assert!((r + 1.0).abs() < 1e-12);
    }
}
