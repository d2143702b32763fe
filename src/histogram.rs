// src/histogram.rs - Fixed-width distribution of accepted region areas

use serde::Serialize;

use crate::config::HistogramConfig;
use crate::contours::RegionSegmentation;

/// Counts of accepted regions per area bin; the last bin is open-ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaHistogram {
    pub bins: Vec<u32>,
    pub total: u32,
}

impl AreaHistogram {
    pub fn new(bin_count: usize) -> Self {
        Self {
            bins: vec![0; bin_count],
            total: 0,
        }
    }

    /// Record one area. `f64::round` rounds half away from zero.
    pub fn add(&mut self, area: f64, bin_width: u32) {
        if self.bins.is_empty() {
            return;
        }
        let rounded = area.round().max(0.0) as u64;
        let index = (rounded / bin_width.max(1) as u64).min(self.bins.len() as u64 - 1) as usize;
        self.bins[index] += 1;
        self.total += 1;
    }
}

/// Bin the net area of every accepted region
pub fn bin_region_areas(segmentation: &RegionSegmentation, config: &HistogramConfig) -> AreaHistogram {
    let mut histogram = AreaHistogram::new(config.bin_count);
    for index in segmentation.accepted() {
        histogram.add(segmentation.areas[index], config.bin_width);
    }
    histogram
}

/// Column headers of one binned population, count column first
pub fn histogram_headers(label: &str, config: &HistogramConfig) -> Vec<String> {
    let mut headers = Vec::with_capacity(config.bin_count + 1);
    headers.push(format!("{} count", label));

    let width = config.bin_width as usize;
    for i in 0..config.bin_count.saturating_sub(1) {
        headers.push(format!("{} <= {} area < {}", i * width, label, (i + 1) * width));
    }
    if config.bin_count > 0 {
        headers.push(format!("{} area >= {}", label, (config.bin_count - 1) * width));
    }
    headers
}
