use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::debug;

use common::{Error, Result};

const WIDTH: u32 = 960;
const HEIGHT: u32 = 540;

/// Render a close-price history as a PNG line chart (x = tick) and return
/// the encoded image.
///
/// Falls back to an unlabeled chart when no font is available to lay out
/// the title and axis labels, which is common on headless hosts.
pub fn render_price_chart(title: &str, prices: &[f64]) -> Result<Vec<u8>> {
    if prices.is_empty() {
        return Err(Error::Report(format!("{title}: no prices to chart")));
    }

    // The bitmap encoder only writes to files.
    let path = std::env::temp_dir().join(format!("trailbot-chart-{}.png", uuid::Uuid::new_v4()));
    let rendered = render_png(&path, title, prices).and_then(|()| Ok(std::fs::read(&path)?));
    let _ = std::fs::remove_file(&path);
    rendered
}

fn render_png(path: &Path, title: &str, prices: &[f64]) -> Result<()> {
    let labeled = {
        let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
        draw(&root, Some(title), prices)
    };
    if let Err(e) = labeled {
        debug!(error = %e, "Labeled chart failed, rendering without text");
        let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
        draw(&root, None, prices)?;
    }
    Ok(())
}

/// Draw the price line onto any plotters backend. `None` skips every text
/// element (caption, axis labels).
fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: Option<&str>,
    prices: &[f64],
) -> Result<()> {
    let (x_range, y_range) = ranges(prices);
    root.fill(&WHITE).map_err(plot_err)?;

    let mut builder = ChartBuilder::on(root);
    builder.margin(10);
    if let Some(title) = title {
        builder
            .caption(title, ("sans-serif", 24).into_font())
            .x_label_area_size(40)
            .y_label_area_size(70);
    }
    let mut chart = builder
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;

    if title.is_some() {
        chart
            .configure_mesh()
            .x_desc("Tick")
            .y_desc("Close Price")
            .draw()
            .map_err(plot_err)?;
    }

    chart
        .draw_series(LineSeries::new(points(prices), &BLUE))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)
}

fn points(prices: &[f64]) -> impl Iterator<Item = (i32, f64)> + '_ {
    prices.iter().enumerate().map(|(i, &p)| (i as i32, p))
}

fn ranges(prices: &[f64]) -> (std::ops::Range<i32>, std::ops::Range<f64>) {
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let padding = if max > min {
        (max - min) * 0.1
    } else {
        (max.abs() * 0.01).max(1.0)
    };
    let ticks = (prices.len() as i32).max(2);
    (0..ticks, (min - padding)..(max + padding))
}

fn plot_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Report(format!("chart rendering failed: {e}"))
}
