//! Chart Plotter Module
//! Figure-ready data series, color maps and jitter shared by the renderer.

use crate::stats::BoxStats;
use plotters::style::RGBColor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Color palette for categories
pub const PALETTE: [RGBColor; 10] = [
    RGBColor(52, 152, 219),  // Blue
    RGBColor(231, 76, 60),   // Red
    RGBColor(46, 204, 113),  // Green
    RGBColor(155, 89, 182),  // Purple
    RGBColor(243, 156, 18),  // Orange
    RGBColor(26, 188, 156),  // Teal
    RGBColor(233, 30, 99),   // Pink
    RGBColor(0, 188, 212),   // Cyan
    RGBColor(121, 85, 72),   // Brown
    RGBColor(96, 125, 139),  // Blue Grey
];

const VIRIDIS: [(u8, u8, u8); 5] = [
    (68, 1, 84),
    (59, 82, 139),
    (33, 145, 140),
    (94, 201, 98),
    (253, 231, 37),
];

const COOLWARM: [(u8, u8, u8); 3] = [(59, 76, 192), (221, 221, 221), (180, 4, 38)];

/// One observation of a strip plot. `level` is the target value on the x axis.
#[derive(Debug, Clone, PartialEq)]
pub struct StripPoint {
    pub level: i64,
    pub value: f64,
    pub category: String,
}

/// One numeric predictor against the target, split by category.
#[derive(Debug, Clone)]
pub struct StripSeries {
    pub column: String,
    pub categories: Vec<String>,
    pub points: Vec<StripPoint>,
}

/// Box statistics of one attribute, one entry per target level.
#[derive(Debug, Clone)]
pub struct AttributeBoxes {
    pub attribute: String,
    pub groups: Vec<(i64, BoxStats)>,
}

impl AttributeBoxes {
    /// Smallest and largest drawn value across every group.
    pub fn extent(&self) -> Option<(f64, f64)> {
        self.groups
            .iter()
            .filter(|(_, stats)| stats.count > 0)
            .map(|(_, stats)| stats.extent())
            .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))
    }
}

/// Get color for a category by its index.
pub fn category_color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

fn interpolate(anchors: &[(u8, u8, u8)], t: f64) -> RGBColor {
    let t = if t.is_nan() { 0.5 } else { t.clamp(0.0, 1.0) };
    let scaled = t * (anchors.len() - 1) as f64;
    let lower = (scaled.floor() as usize).min(anchors.len() - 2);
    let frac = scaled - lower as f64;
    let (a, b) = (anchors[lower], anchors[lower + 1]);
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// Sequential color map, `t` in [0, 1].
pub fn viridis(t: f64) -> RGBColor {
    interpolate(&VIRIDIS, t)
}

/// Diverging color map for correlations, `r` in [-1, 1].
pub fn coolwarm(r: f64) -> RGBColor {
    interpolate(&COOLWARM, (r + 1.0) / 2.0)
}

/// Horizontal offsets in `[-width, width]` for de-overlapping strip points.
/// Deterministic for a given seed.
pub fn jitter_offsets(n: usize, width: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-width..=width)).collect()
}

/// Range covering all finite values with `pad` fraction of headroom on each side.
pub fn padded_range(values: impl IntoIterator<Item = f64>, pad: f64) -> (f64, f64) {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if min.is_infinite() {
        return (0.0, 1.0);
    }
    let span = max - min;
    let margin = if span > 0.0 { span * pad } else { 0.5 };
    (min - margin, max + margin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_is_bounded_and_deterministic() {
        let a = jitter_offsets(200, 0.25, 7);
        let b = jitter_offsets(200, 0.25, 7);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.abs() <= 0.25));
        assert!(jitter_offsets(5, 0.0, 1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_color_maps_hit_anchors() {
        assert_eq!(viridis(0.0), RGBColor(68, 1, 84));
        assert_eq!(viridis(1.0), RGBColor(253, 231, 37));
        assert_eq!(coolwarm(-1.0), RGBColor(59, 76, 192));
        assert_eq!(coolwarm(0.0), RGBColor(221, 221, 221));
        assert_eq!(coolwarm(1.0), RGBColor(180, 4, 38));
        // out of range and NaN stay inside the map
        assert_eq!(coolwarm(3.0), RGBColor(180, 4, 38));
        assert_eq!(viridis(f64::NAN), viridis(0.5));
    }

    #[test]
    fn test_padded_range() {
        assert_eq!(padded_range([1.0, 3.0], 0.5), (0.0, 4.0));
        assert_eq!(padded_range([2.0, 2.0], 0.1), (1.5, 2.5));
        assert_eq!(padded_range([f64::NAN], 0.1), (0.0, 1.0));
    }

    #[test]
    fn test_attribute_extent_skips_empty_groups() {
        let boxes = AttributeBoxes {
            attribute: "pH".into(),
            groups: vec![
                (5, crate::stats::StatsCalculator::box_stats(&[3.0, 3.2, 3.4])),
                (6, BoxStats::default()),
                (7, crate::stats::StatsCalculator::box_stats(&[2.9, 3.6])),
            ],
        };
        assert_eq!(boxes.extent(), Some((2.9, 3.6)));
    }
}
