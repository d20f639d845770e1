use crate::ir::HistogramBin;
use serde::{Deserialize, Serialize};

/// Summary statistics of one weight segment. Standard deviation is the
/// population one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

pub fn compute_stats(values: &[f32]) -> SegmentStats {
    if values.is_empty() {
        return SegmentStats::default();
    }

    let (min, max) = bounds(values);
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;

    SegmentStats {
        min,
        max,
        mean,
        std_dev: variance.sqrt(),
    }
}

/// Equal-width histogram over `[min, max]`. The last bucket ends exactly at
/// `max` and absorbs values that land on the upper edge. A zero range yields
/// one bucket holding every value.
pub fn compute_histogram(values: &[f32], num_bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || num_bins == 0 {
        return Vec::new();
    }

    let (min, max) = bounds(values);
    let range = max - min;
    if range == 0.0 {
        return vec![HistogramBin {
            min,
            max,
            count: values.len(),
        }];
    }

    let width = range / num_bins as f64;
    let mut bins: Vec<HistogramBin> = (0..num_bins)
        .map(|i| {
            let lo = min + i as f64 * width;
            let hi = if i == num_bins - 1 { max } else { (lo + width).min(max) };
            HistogramBin {
                min: lo,
                max: hi,
                count: 0,
            }
        })
        .collect();

    for &v in values {
        let idx = (((v as f64 - min) / width).floor() as usize).min(num_bins - 1);
        bins[idx].count += 1;
    }

    bins
}

fn bounds(values: &[f32]) -> (f64, f64) {
    values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        let v = v as f64;
        (lo.min(v), hi.max(v))
    })
}
