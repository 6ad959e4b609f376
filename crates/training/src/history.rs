use std::fs;
use std::ops::Range;
use std::path::Path;

use plotters::prelude::*;

pub const PLOT_SIZE: (u32, u32) = (640, 480);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossRecord {
    pub iteration: usize,
    pub loss: f32,
}

/// Loss per global iteration, in the order steps ran.
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    records: Vec<LossRecord>,
}

impl TrainingHistory {
    pub fn push(&mut self, iteration: usize, loss: f32) {
        self.records.push(LossRecord { iteration, loss });
    }

    pub fn records(&self) -> &[LossRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&LossRecord> {
        self.records.last()
    }

    /// Red-dot scatter of loss against iteration, written as PNG.
    pub fn save_plot(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let points: Vec<(f32, f32)> = self
            .records
            .iter()
            .filter(|r| r.loss.is_finite())
            .map(|r| (r.iteration as f32, r.loss))
            .collect();

        let root = BitMapBackend::new(path, PLOT_SIZE).into_drawing_area();
        root.fill(&WHITE)
            .map_err(|e| anyhow::anyhow!("backend error: {e}"))?;
        {
            let mut chart = ChartBuilder::on(&root)
                .margin(10)
                .set_label_area_size(LabelAreaPosition::Left, 50)
                .set_label_area_size(LabelAreaPosition::Bottom, 40)
                .build_cartesian_2d(
                    padded_range(points.iter().map(|p| p.0)),
                    padded_range(points.iter().map(|p| p.1)),
                )
                .map_err(|e| anyhow::anyhow!("chart build error: {e}"))?;
            chart
                .configure_mesh()
                .x_desc("iteration")
                .y_desc("training loss")
                .draw()
                .map_err(|e| anyhow::anyhow!("mesh error: {e}"))?;
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|&point| Circle::new(point, 3, RED.filled())),
                )
                .map_err(|e| anyhow::anyhow!("draw error: {e}"))?;
        }
        root.present()
            .map_err(|e| anyhow::anyhow!("failed to write loss plot {}: {e}", path.display()))
    }
}

/// Bounding range of `values`, widened when empty or degenerate.
fn padded_range(values: impl Iterator<Item = f32>) -> Range<f32> {
    let (lo, hi) = values.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo > hi {
        return 0.0..1.0;
    }
    if hi - lo <= f32::EPSILON {
        return (lo - 1.0)..(hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad)..(hi + pad)
}
