//! Static Chart Renderer
//! Draws every analysis figure to a PNG file with plotters.
//!
//! Layout follows the figure kind:
//! - counts, strip and diagnostics: a single cartesian panel
//! - attribute boxplots: a 2x2 grid under one shared title
//! - correlation heatmap: a segmented grid with annotated cells

use super::plotter::{
    category_color, coolwarm, jitter_offsets, padded_range, viridis, AttributeBoxes, StripSeries,
    PALETTE,
};
use super::{ChartSink, Figure, RenderError};
use crate::config::AnalysisConfig;
use crate::stats::{CorrelationMatrix, OlsFit, PcaResult, QualityCounts};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const FONT: &str = "sans-serif";

/// Fraction of the plotting span used for an arrow head.
const ARROW_HEAD: f64 = 0.025;

/// Renders figures into a fixed output directory.
pub struct StaticChartRenderer {
    output_dir: PathBuf,
    point_alpha: f64,
    jitter_width: f64,
    jitter_seed: u64,
    arrow_scale: f64,
}

fn integer_label(v: &f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{:.0}", v)
    } else {
        String::new()
    }
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a straight line into `dashes` visible pieces.
fn dashed_line(
    from: (f64, f64),
    to: (f64, f64),
    dashes: usize,
    style: ShapeStyle,
) -> Vec<PathElement<(f64, f64)>> {
    let steps = dashes * 2;
    let at = |t: f64| (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t);
    (0..steps)
        .step_by(2)
        .map(|i| {
            let a = at(i as f64 / steps as f64);
            let b = at((i + 1) as f64 / steps as f64);
            PathElement::new(vec![a, b], style)
        })
        .collect()
}

impl StaticChartRenderer {
    /// Create the output directory if it is missing, otherwise reuse it.
    pub fn new(config: &AnalysisConfig) -> Result<Self, RenderError> {
        let output_dir = config.output_dir.clone();
        let existed = output_dir.is_dir();
        std::fs::create_dir_all(&output_dir).map_err(|source| RenderError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;
        if existed {
            debug!("Reusing output directory {}", output_dir.display());
        } else {
            info!("Created output directory {}", output_dir.display());
        }

        Ok(Self {
            output_dir,
            point_alpha: config.point_alpha,
            jitter_width: config.jitter_width,
            jitter_seed: config.jitter_seed,
            arrow_scale: config.arrow_scale,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn canvas_size(figure: &Figure<'_>) -> (u32, u32) {
        match figure {
            Figure::QualityCounts(_) | Figure::QualityScatter(_) => (800, 500),
            Figure::AttributeBoxplots(_) => (1000, 860),
            Figure::CorrelationHeatmap(_) => (1000, 860),
            Figure::PcaBiplot { .. } => (800, 600),
            Figure::PcaScree(_) | Figure::ResidualsVsFitted(_) | Figure::FittedVsActual(_) => {
                (640, 420)
            }
        }
    }

    fn draw_quality_counts(
        &self,
        path: &Path,
        size: (u32, u32),
        title: &str,
        counts: &QualityCounts,
    ) -> Result<(), RenderError> {
        let (Some(&first), Some(&last)) = (counts.levels.first(), counts.levels.last()) else {
            return Err(RenderError::EmptyData("no quality levels".into()));
        };

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        let y_max = (counts.max_count() as f64 * 1.1).max(1.0);
        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT, 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d((first as f64 - 0.5)..(last as f64 + 0.5), 0f64..y_max)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(counts.levels.len() + 1)
            .x_label_formatter(&integer_label)
            .x_desc("Quality Score")
            .y_desc("Count")
            .draw()?;

        let bar_width = 0.8 / counts.categories.len().max(1) as f64;
        for (ci, category) in counts.categories.iter().enumerate() {
            let color = category_color(ci);
            let bars: Vec<Rectangle<(f64, f64)>> = counts
                .levels
                .iter()
                .map(|&level| {
                    let x0 = level as f64 - 0.4 + ci as f64 * bar_width;
                    let height = counts.count(level, category) as f64;
                    Rectangle::new([(x0, 0.0), (x0 + bar_width, height)], color.filled())
                })
                .collect();
            chart
                .draw_series(bars)?
                .label(category.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
        root.present()?;
        Ok(())
    }

    fn draw_quality_scatter(
        &self,
        path: &Path,
        size: (u32, u32),
        title: &str,
        series: &StripSeries,
    ) -> Result<(), RenderError> {
        if series.points.is_empty() {
            return Err(RenderError::EmptyData(format!("no values for {}", series.column)));
        }
        let (lo_level, hi_level) = series
            .points
            .iter()
            .fold((i64::MAX, i64::MIN), |(lo, hi), p| (lo.min(p.level), hi.max(p.level)));
        let (y_lo, y_hi) = padded_range(series.points.iter().map(|p| p.value), 0.05);

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT, 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d((lo_level as f64 - 0.5)..(hi_level as f64 + 0.5), y_lo..y_hi)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels((hi_level - lo_level) as usize + 2)
            .x_label_formatter(&integer_label)
            .x_desc("Quality Score")
            .y_desc("Alcohol (%)")
            .draw()?;

        // Offsets only move the drawn marker; stored values stay untouched.
        let offsets = jitter_offsets(series.points.len(), self.jitter_width, self.jitter_seed);
        for (ci, category) in series.categories.iter().enumerate() {
            let color = category_color(ci);
            let style = color.mix(self.point_alpha).filled();
            let points: Vec<Circle<(f64, f64), i32>> = series
                .points
                .iter()
                .zip(&offsets)
                .filter(|(p, _)| &p.category == category)
                .map(|(p, dx)| Circle::new((p.level as f64 + dx, p.value), 3, style))
                .collect();
            chart
                .draw_series(points)?
                .label(category.as_str())
                .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
        root.present()?;
        Ok(())
    }

    fn draw_attribute_boxplots(
        &self,
        path: &Path,
        size: (u32, u32),
        title: &str,
        attributes: &[AttributeBoxes],
    ) -> Result<(), RenderError> {
        if attributes.is_empty() {
            return Err(RenderError::EmptyData("no attributes".into()));
        }

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;
        let body = root.titled(title, (FONT, 26))?;
        let columns = 2;
        let rows = attributes.len().div_ceil(columns);
        let panels = body.split_evenly((rows, columns));

        let fill = PALETTE[0].mix(0.35);
        let edge = PALETTE[0];

        for (panel, boxes) in panels.iter().zip(attributes) {
            let Some(extent) = boxes.extent() else {
                continue;
            };
            let (y_lo, y_hi) = padded_range([extent.0, extent.1], 0.05);
            let first = boxes.groups.first().map(|(l, _)| *l).unwrap_or(0);
            let last = boxes.groups.last().map(|(l, _)| *l).unwrap_or(0);

            let mut chart = ChartBuilder::on(panel)
                .caption(&boxes.attribute, (FONT, 18))
                .margin(8)
                .x_label_area_size(35)
                .y_label_area_size(50)
                .build_cartesian_2d((first as f64 - 0.5)..(last as f64 + 0.5), y_lo..y_hi)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels((last - first) as usize + 2)
                .x_label_formatter(&integer_label)
                .x_desc("Quality")
                .y_desc(title_case(&boxes.attribute))
                .draw()?;

            for (level, stats) in &boxes.groups {
                if stats.count == 0 {
                    continue;
                }
                let x = *level as f64;
                let half = 0.3;
                let cap = half / 2.0;

                chart.draw_series(std::iter::once(Rectangle::new(
                    [(x - half, stats.q1), (x + half, stats.q3)],
                    fill.filled(),
                )))?;
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(x - half, stats.q1), (x + half, stats.q3)],
                    edge.stroke_width(1),
                )))?;

                let segments = vec![
                    vec![(x - half, stats.median), (x + half, stats.median)],
                    vec![(x, stats.q1), (x, stats.whisker_low)],
                    vec![(x, stats.q3), (x, stats.whisker_high)],
                    vec![(x - cap, stats.whisker_low), (x + cap, stats.whisker_low)],
                    vec![(x - cap, stats.whisker_high), (x + cap, stats.whisker_high)],
                ];
                chart.draw_series(
                    segments
                        .into_iter()
                        .map(|pts| PathElement::new(pts, BLACK.stroke_width(1))),
                )?;
                chart.draw_series(
                    stats
                        .outliers
                        .iter()
                        .map(|&v| Circle::new((x, v), 2, BLACK.stroke_width(1))),
                )?;
            }
        }

        root.present()?;
        Ok(())
    }

    fn draw_correlation_heatmap(
        &self,
        path: &Path,
        size: (u32, u32),
        title: &str,
        corr: &CorrelationMatrix,
    ) -> Result<(), RenderError> {
        let k = corr.size();
        if k == 0 {
            return Err(RenderError::EmptyData("no numeric columns".into()));
        }
        let names = &corr.columns;
        // Row 0 is drawn at the top.
        let row_y = |i: usize| (k - 1 - i) as i32;

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT, 24))
            .margin(10)
            .x_label_area_size(150)
            .y_label_area_size(150)
            // Integer ranges are inclusive here: k segments span 0..=k-1.
            .build_cartesian_2d(
                (0..k as i32 - 1).into_segmented(),
                (0..k as i32 - 1).into_segmented(),
            )?;

        let x_fmt = |v: &SegmentValue<i32>| match v {
            SegmentValue::CenterOf(j) if (*j as usize) < k => names[*j as usize].clone(),
            _ => String::new(),
        };
        let y_fmt = |v: &SegmentValue<i32>| match v {
            SegmentValue::CenterOf(y) if (*y as usize) < k => names[k - 1 - *y as usize].clone(),
            _ => String::new(),
        };

        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(k)
            .y_labels(k)
            .x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt)
            .x_label_style((FONT, 12).into_font().transform(FontTransform::Rotate90))
            .y_label_style((FONT, 12))
            .draw()?;

        let cells: Vec<(usize, usize)> = (0..k).flat_map(|i| (0..k).map(move |j| (i, j))).collect();

        chart.draw_series(cells.iter().map(|&(i, j)| {
            let (x, y) = (j as i32, row_y(i));
            Rectangle::new(
                [
                    (SegmentValue::Exact(x), SegmentValue::Exact(y)),
                    (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1)),
                ],
                coolwarm(corr.get(i, j)).filled(),
            )
        }))?;

        let text_style = TextStyle::from((FONT, 12).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
        chart.draw_series(cells.iter().map(|&(i, j)| {
            Text::new(
                format!("{:.2}", corr.get(i, j)),
                (SegmentValue::CenterOf(j as i32), SegmentValue::CenterOf(row_y(i))),
                text_style.clone(),
            )
        }))?;

        root.present()?;
        Ok(())
    }

    fn draw_pca_scree(
        &self,
        path: &Path,
        size: (u32, u32),
        title: &str,
        pca: &PcaResult,
    ) -> Result<(), RenderError> {
        let cumulative = pca.cumulative_variance_percent();
        let k = cumulative.len();
        if k == 0 {
            return Err(RenderError::EmptyData("no components".into()));
        }

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT, 22))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0.5f64..(k as f64 + 0.5), 0f64..105f64)?;

        chart
            .configure_mesh()
            .x_labels(k + 1)
            .x_label_formatter(&integer_label)
            .x_desc("Number of Components")
            .y_desc("Cumulative Explained Variance (%)")
            .draw()?;

        let points: Vec<(f64, f64)> = cumulative
            .iter()
            .enumerate()
            .map(|(i, &v)| ((i + 1) as f64, v))
            .collect();
        chart.draw_series(LineSeries::new(points.clone(), PALETTE[0].stroke_width(2)))?;
        chart.draw_series(points.iter().map(|&p| Circle::new(p, 4, PALETTE[0].filled())))?;

        root.present()?;
        Ok(())
    }

    fn draw_pca_biplot(
        &self,
        path: &Path,
        size: (u32, u32),
        title: &str,
        pca: &PcaResult,
        levels: &[i64],
    ) -> Result<(), RenderError> {
        if pca.n_components() < 2 {
            return Err(RenderError::EmptyData("biplot needs two components".into()));
        }
        let pc1 = pca.component_scores(0);
        let pc2 = pca.component_scores(1);
        let tips: Vec<(f64, f64)> = (0..pca.features.len())
            .map(|f| {
                (
                    pca.loading(f, 0) * self.arrow_scale,
                    pca.loading(f, 1) * self.arrow_scale,
                )
            })
            .collect();

        let (x_lo, x_hi) = padded_range(
            pc1.iter().copied().chain(tips.iter().map(|t| t.0 * 1.1)),
            0.05,
        );
        let (y_lo, y_hi) = padded_range(
            pc2.iter().copied().chain(tips.iter().map(|t| t.1 * 1.1)),
            0.05,
        );

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT, 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

        chart.configure_mesh().x_desc("PC1").y_desc("PC2").draw()?;

        let mut distinct: Vec<i64> = levels.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        let (lo, hi) = match (distinct.first(), distinct.last()) {
            (Some(&lo), Some(&hi)) => (lo as f64, hi as f64),
            _ => (0.0, 1.0),
        };
        let shade = |level: i64| {
            if hi > lo {
                viridis((level as f64 - lo) / (hi - lo))
            } else {
                viridis(0.5)
            }
        };

        for &level in &distinct {
            let color = shade(level);
            let style = color.mix(self.point_alpha).filled();
            let points: Vec<Circle<(f64, f64), i32>> = pc1
                .iter()
                .zip(&pc2)
                .zip(levels)
                .filter(|(_, &l)| l == level)
                .map(|((&a, &b), _)| Circle::new((a, b), 3, style))
                .collect();
            chart
                .draw_series(points)?
                .label(format!("quality {}", level))
                .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
        }

        let arrow_style = RED.mix(0.7);
        let (span_x, span_y) = (x_hi - x_lo, y_hi - y_lo);
        for (feature, &(tx, ty)) in pca.features.iter().zip(&tips) {
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(0.0, 0.0), (tx, ty)],
                arrow_style.stroke_width(2),
            )))?;

            // Head built in axis-normalized space so it keeps its shape.
            let (nx, ny) = (tx / span_x, ty / span_y);
            let len = nx.hypot(ny);
            if len > 0.0 {
                let (ux, uy) = (nx / len, ny / len);
                let (bx, by) = (nx - ARROW_HEAD * ux, ny - ARROW_HEAD * uy);
                let (px, py) = (-uy * ARROW_HEAD * 0.5, ux * ARROW_HEAD * 0.5);
                let head = vec![
                    (tx, ty),
                    ((bx + px) * span_x, (by + py) * span_y),
                    ((bx - px) * span_x, (by - py) * span_y),
                ];
                chart.draw_series(std::iter::once(Polygon::new(head, arrow_style.filled())))?;
            }

            chart.draw_series(std::iter::once(Text::new(
                feature.clone(),
                (tx * 1.04, ty * 1.04),
                (FONT, 12).into_font().color(&RED),
            )))?;
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
        root.present()?;
        Ok(())
    }

    fn draw_residuals_vs_fitted(
        &self,
        path: &Path,
        size: (u32, u32),
        title: &str,
        fit: &OlsFit,
    ) -> Result<(), RenderError> {
        if fit.fitted.is_empty() {
            return Err(RenderError::EmptyData("no fitted values".into()));
        }
        let (x_lo, x_hi) = padded_range(fit.fitted.iter().copied(), 0.05);
        let (y_lo, y_hi) = padded_range(fit.residuals.iter().copied().chain([0.0]), 0.05);

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT, 22))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

        chart
            .configure_mesh()
            .x_desc("Fitted Values")
            .y_desc("Residuals")
            .draw()?;

        let style = PALETTE[0].mix(self.point_alpha).filled();
        chart.draw_series(
            fit.fitted
                .iter()
                .zip(&fit.residuals)
                .map(|(&f, &r)| Circle::new((f, r), 3, style)),
        )?;
        chart.draw_series(dashed_line((x_lo, 0.0), (x_hi, 0.0), 40, RED.stroke_width(1)))?;

        root.present()?;
        Ok(())
    }

    fn draw_fitted_vs_actual(
        &self,
        path: &Path,
        size: (u32, u32),
        title: &str,
        fit: &OlsFit,
    ) -> Result<(), RenderError> {
        if fit.actual.is_empty() {
            return Err(RenderError::EmptyData("no observations".into()));
        }
        let (a_min, a_max) = fit
            .actual
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let (x_lo, x_hi) = padded_range(fit.fitted.iter().copied().chain([a_min, a_max]), 0.05);
        let (y_lo, y_hi) = padded_range(fit.actual.iter().copied(), 0.05);

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT, 22))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

        chart
            .configure_mesh()
            .x_desc("Fitted Quality")
            .y_desc("Actual Quality")
            .draw()?;

        let style = PALETTE[0].mix(self.point_alpha).filled();
        chart.draw_series(
            fit.fitted
                .iter()
                .zip(&fit.actual)
                .map(|(&f, &a)| Circle::new((f, a), 3, style)),
        )?;
        chart.draw_series(dashed_line((a_min, a_min), (a_max, a_max), 30, BLACK.stroke_width(2)))?;

        root.present()?;
        Ok(())
    }
}

impl ChartSink for StaticChartRenderer {
    fn render(&self, figure: &Figure<'_>) -> Result<PathBuf, RenderError> {
        let path = self.output_dir.join(figure.file_name());
        let size = Self::canvas_size(figure);
        let title = figure.title();

        match *figure {
            Figure::QualityCounts(counts) => self.draw_quality_counts(&path, size, title, counts)?,
            Figure::QualityScatter(series) => {
                self.draw_quality_scatter(&path, size, title, series)?
            }
            Figure::AttributeBoxplots(boxes) => {
                self.draw_attribute_boxplots(&path, size, title, boxes)?
            }
            Figure::CorrelationHeatmap(corr) => {
                self.draw_correlation_heatmap(&path, size, title, corr)?
            }
            Figure::PcaScree(pca) => self.draw_pca_scree(&path, size, title, pca)?,
            Figure::PcaBiplot { pca, levels } => {
                self.draw_pca_biplot(&path, size, title, pca, levels)?
            }
            Figure::ResidualsVsFitted(fit) => {
                self.draw_residuals_vs_fitted(&path, size, title, fit)?
            }
            Figure::FittedVsActual(fit) => self.draw_fitted_vs_actual(&path, size, title, fit)?,
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("figures");
        let config = AnalysisConfig::default().with_output_dir(&dir);

        let renderer = StaticChartRenderer::new(&config).unwrap();
        assert!(dir.is_dir());
        assert_eq!(renderer.output_dir(), dir.as_path());

        // second construction reuses it
        assert!(StaticChartRenderer::new(&config).is_ok());
    }

    #[test]
    fn test_new_fails_when_path_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("figures");
        std::fs::write(&file, b"not a directory").unwrap();
        let config = AnalysisConfig::default().with_output_dir(&file);

        let err = StaticChartRenderer::new(&config).err().unwrap();
        assert!(matches!(err, RenderError::OutputDir { .. }));
    }

    #[test]
    fn test_empty_figures_are_rejected_before_drawing() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AnalysisConfig::default().with_output_dir(tmp.path());
        let renderer = StaticChartRenderer::new(&config).unwrap();

        let boxes: Vec<AttributeBoxes> = Vec::new();
        let err = renderer.render(&Figure::AttributeBoxplots(&boxes)).unwrap_err();
        assert!(matches!(err, RenderError::EmptyData(_)));
        assert!(!tmp.path().join("attributes_by_quality.png").exists());
    }

    #[test]
    fn test_helpers() {
        assert_eq!(integer_label(&4.0), "4");
        assert_eq!(integer_label(&4.5), "");
        assert_eq!(title_case("residual sugar"), "Residual Sugar");
        assert_eq!(title_case("pH"), "Ph");

        let dashes = dashed_line((0.0, 0.0), (1.0, 1.0), 5, BLACK.stroke_width(1));
        assert_eq!(dashes.len(), 5);
    }
}
