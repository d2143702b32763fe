// src/lib.rs - Library interface for glia_census

pub mod channel;
pub mod classification;
pub mod config;
pub mod contours;
pub mod enhancement;
pub mod errors;
pub mod histogram;
pub mod image_io;
pub mod image_utils;
pub mod output;
pub mod pipeline;
pub mod point_analysis;
pub mod render;
pub mod shape_analysis;
pub mod zstack;

// Re-export commonly used types and functions
pub use channel::{Band, Channel, ExtractionMode};
pub use config::Config;
pub use errors::{GliaCensusError, Result};
pub use pipeline::{process_image, process_manifest, BatchOutcome};

// Re-export the processing stages
pub use classification::{classify_contours, coverage_ratio, Bucket, Classification};
pub use contours::{find_contour_set, label_regions, segment_mask, RegionLabel, RegionSegmentation};
pub use enhancement::{enhance_channel, enhance_named_channel};
pub use histogram::{bin_region_areas, AreaHistogram};
pub use zstack::{layer_groups, merge_enhanced, merge_masks, LayerGroup};

// Re-export output helpers
pub use output::{ErrorLog, ImageMetrics, MetricsWriter};
