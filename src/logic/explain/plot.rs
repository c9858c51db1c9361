//! Summary Plot - renders attributions into an in-memory PNG
//!
//! One row per feature, largest |attribution| on top. Hosts without a
//! usable system font get the same chart without any text.

use std::panic::{self, AssertUnwindSafe};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{codecs::png::PngEncoder, ColorType, ImageEncoder};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};

use super::types::{Explanation, FeatureContribution};
use super::ExplainError;

/// Pushes the prediction up
const POSITIVE: RGBColor = RGBColor(255, 0, 82);
/// Pushes the prediction down
const NEGATIVE: RGBColor = RGBColor(0, 139, 251);

pub const DEFAULT_PLOT_WIDTH: u32 = 800;
pub const DEFAULT_PLOT_HEIGHT: u32 = 520;
pub const MIN_PLOT_SIDE: u32 = 200;
/// Upper bound per side; the RGB buffer is allocated per request
pub const MAX_PLOT_SIDE: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_PLOT_WIDTH,
            height: DEFAULT_PLOT_HEIGHT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryPlot {
    config: PlotConfig,
}

impl SummaryPlot {
    pub fn new(config: PlotConfig) -> Self {
        Self {
            config: PlotConfig {
                width: config.width.clamp(MIN_PLOT_SIDE, MAX_PLOT_SIDE),
                height: config.height.clamp(MIN_PLOT_SIDE, MAX_PLOT_SIDE),
            },
        }
    }

    /// Render the explanation and return PNG bytes
    pub fn render_png(&self, explanation: &Explanation, probability: f64) -> Result<Vec<u8>, ExplainError> {
        let size = (self.config.width, self.config.height);
        let mut pixels = vec![0u8; size.0 as usize * size.1 as usize * 3];

        // The font backend can panic when the system font library is absent.
        let labelled = panic::catch_unwind(AssertUnwindSafe(|| {
            draw_labelled(&mut pixels, size, explanation, probability)
        }))
        .unwrap_or_else(|_| Err(ExplainError::Render("font backend panicked".to_string())));

        if let Err(e) = labelled {
            tracing::debug!("Labelled plot failed ({}), rendering without text", e);
            draw_plain(&mut pixels, size, explanation)?;
        }

        encode_png(&pixels, size.0, size.1)
    }
}

impl Default for SummaryPlot {
    fn default() -> Self {
        Self::new(PlotConfig::default())
    }
}

/// Encode a packed RGB buffer as PNG
pub fn encode_png(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ExplainError> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(pixels, width, height, ColorType::Rgb8)?;
    Ok(png)
}

pub fn to_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

fn render_err<E: std::fmt::Display>(e: E) -> ExplainError {
    ExplainError::Render(e.to_string())
}

fn color_of(c: &FeatureContribution) -> RGBColor {
    if c.shap >= 0.0 {
        POSITIVE
    } else {
        NEGATIVE
    }
}

/// Symmetric x range that always contains every attribution
fn axis_limit(ranked: &[&FeatureContribution]) -> f64 {
    let max = ranked.iter().map(|c| c.shap.abs()).fold(0.0, f64::max);
    (max * 1.15).max(1e-3)
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e9 {
        format!("{:.0}", v)
    } else {
        format!("{:.2}", v)
    }
}

fn draw_labelled(
    buf: &mut [u8],
    size: (u32, u32),
    explanation: &Explanation,
    probability: f64,
) -> Result<(), ExplainError> {
    let ranked = explanation.ranked();
    if ranked.is_empty() {
        return Err(ExplainError::Render("nothing to plot".to_string()));
    }
    let rows = ranked.len() as i32;
    let limit = axis_limit(&ranked);

    // Row 0 sits at the bottom of the chart, so labels are read back to front.
    let labels: Vec<String> = ranked
        .iter()
        .rev()
        .map(|c| format!("{} = {}", c.name, format_value(c.value)))
        .collect();

    let root = BitMapBackend::with_buffer(buf, size).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Predicted probability {:.3}", probability),
            ("sans-serif", 20).into_font(),
        )
        .margin(12)
        .x_label_area_size(45)
        .y_label_area_size(150)
        .build_cartesian_2d(-limit..limit, (0..rows).into_segmented())
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(rows as usize)
        .y_label_formatter(&|seg: &SegmentValue<i32>| match seg {
            SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .x_desc(explanation.output_space.axis_label())
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(0.0, SegmentValue::Exact(0)), (0.0, SegmentValue::Last)],
            BLACK.mix(0.6).stroke_width(1),
        )))
        .map_err(render_err)?;

    for (r, c) in ranked.iter().enumerate() {
        let y = SegmentValue::CenterOf(rows - 1 - r as i32);
        let color = color_of(c);

        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(0.0, y.clone()), (c.shap, y.clone())],
                color.stroke_width(3),
            )))
            .map_err(render_err)?;
        chart
            .draw_series(std::iter::once(Circle::new((c.shap, y), 6, color.filled())))
            .map_err(render_err)?;
    }

    root.present().map_err(render_err)?;
    Ok(())
}

fn draw_plain(buf: &mut [u8], size: (u32, u32), explanation: &Explanation) -> Result<(), ExplainError> {
    let ranked = explanation.ranked();
    let rows = (ranked.len() as i32).max(1);
    let limit = axis_limit(&ranked);

    let (w, h) = (size.0 as i32, size.1 as i32);
    let margin = 20;
    let plot_w = (w - 2 * margin) as f64;
    let row_h = (h - 2 * margin) / rows;
    let x_of = |v: f64| margin + ((v + limit) / (2.0 * limit) * plot_w).round() as i32;
    let zero = x_of(0.0);

    let root = BitMapBackend::with_buffer(buf, size).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;
    root.draw(&PathElement::new(
        vec![(zero, margin), (zero, h - margin)],
        BLACK.mix(0.6).stroke_width(1),
    ))
    .map_err(render_err)?;

    for (r, c) in ranked.iter().enumerate() {
        let cy = margin + row_h * r as i32 + row_h / 2;
        let x = x_of(c.shap);
        let color = color_of(c);

        root.draw(&Rectangle::new([(zero.min(x), cy - 2), (zero.max(x), cy + 2)], color.filled()))
            .map_err(render_err)?;
        root.draw(&Circle::new((x, cy), 5, color.filled())).map_err(render_err)?;
    }

    root.present().map_err(render_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::explain::types::OutputSpace;

    fn explanation() -> Explanation {
        let contributions = [("age", 63.0, 0.08), ("cp", 3.0, 0.12), ("thal", 1.0, -0.05), ("ca", 0.0, 0.0)]
            .iter()
            .map(|(name, value, shap)| FeatureContribution {
                name: name.to_string(),
                value: *value,
                shap: *shap,
            })
            .collect();
        Explanation {
            expected_value: 0.55,
            output_space: OutputSpace::Probability,
            contributions,
        }
    }

    fn decode(png: &[u8]) -> image::RgbImage {
        image::load_from_memory(png).expect("valid png").to_rgb8()
    }

    #[test]
    fn test_render_png_is_decodable() {
        let png = SummaryPlot::default().render_png(&explanation(), 0.7).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let img = decode(&png);
        assert_eq!(img.dimensions(), (DEFAULT_PLOT_WIDTH, DEFAULT_PLOT_HEIGHT));
    }

    #[test]
    fn test_plain_render_draws_both_colors() {
        let size = (400u32, 300u32);
        let mut pixels = vec![0u8; 400 * 300 * 3];
        draw_plain(&mut pixels, size, &explanation()).unwrap();

        let img = decode(&encode_png(&pixels, size.0, size.1).unwrap());
        let has = |c: RGBColor| img.pixels().any(|p| p.0 == [c.0, c.1, c.2]);
        assert!(has(POSITIVE));
        assert!(has(NEGATIVE));
    }

    #[test]
    fn test_all_zero_attributions_still_render() {
        let mut e = explanation();
        for c in &mut e.contributions {
            c.shap = 0.0;
        }
        let png = SummaryPlot::default().render_png(&e, 0.5).unwrap();
        assert!(!png.is_empty());
    }

    #[test]
    fn test_sizes_are_clamped() {
        let plot = SummaryPlot::new(PlotConfig { width: 10, height: 10 });
        assert_eq!(plot.config, PlotConfig { width: MIN_PLOT_SIDE, height: MIN_PLOT_SIDE });

        let plot = SummaryPlot::new(PlotConfig { width: 100_000, height: 100_000 });
        assert_eq!(plot.config, PlotConfig { width: MAX_PLOT_SIDE, height: MAX_PLOT_SIDE });

        let plot = SummaryPlot::new(PlotConfig { width: 1024, height: 100_000 });
        assert_eq!(plot.config, PlotConfig { width: 1024, height: MAX_PLOT_SIDE });
    }

    #[test]
    fn test_base64_round_trip() {
        let png = SummaryPlot::default().render_png(&explanation(), 0.2).unwrap();
        let encoded = to_base64(&png);
        assert_eq!(BASE64.decode(encoded).unwrap(), png);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(63.0), "63");
        assert_eq!(format_value(2.3), "2.30");
    }
}
