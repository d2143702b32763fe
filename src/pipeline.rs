// src/pipeline.rs - Per-image processing: merge, segment, classify, measure, write

use std::path::{Path, PathBuf};

use image::GrayImage;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::channel::Channel;
use crate::classification::classify_contours;
use crate::config::Config;
use crate::contours::{segment_mask, RegionSegmentation};
use crate::errors::{GliaCensusError, Result};
use crate::histogram::bin_region_areas;
use crate::image_io::{image_id_from_entry, load_layer_stack, save_png, LayerStack};
use crate::image_utils::{mask_and, merge_channels};
use crate::output::{write_summary, ChannelHistogram, ImageMetrics};
use crate::point_analysis::proximity_stats;
use crate::render::{render_classification, render_segmentation, ClassifiedCells, RegionPalette};
use crate::shape_analysis::fit_ellipse;
use crate::zstack::{layer_groups, merge_enhanced, LayerGroup};

/// Merged mask and its segmentation for one channel
struct ChannelResult {
    merged: GrayImage,
    segmentation: RegionSegmentation,
}

struct GroupResults {
    blue: ChannelResult,
    green: ChannelResult,
    red: ChannelResult,
}

impl GroupResults {
    fn get(&self, channel: Channel) -> &ChannelResult {
        match channel {
            Channel::Blue => &self.blue,
            Channel::Green => &self.green,
            Channel::Red => &self.red,
        }
    }
}

/// Process the image stored in `image_dir`, one metrics row per layer group.
/// Artifacts go to `<results_root>/<image_id>/`.
pub fn process_image(
    image_dir: &Path,
    image_id: &str,
    results_root: &Path,
    config: &Config,
    debug: bool,
) -> Result<Vec<ImageMetrics>> {
    info!("Processing {}", image_dir.display());

    let stack = load_layer_stack(image_dir, image_id, &config.layer_extension)?;
    let groups = layer_groups(stack.len(), config.layers_per_group);
    debug!("{}: {} layers in {} group(s)", image_id, stack.len(), groups.len());

    let mut rows = Vec::with_capacity(groups.len());
    for group in &groups {
        let out_dir = group_output_dir(results_root, image_id, group, groups.len());
        let row_name = if groups.len() > 1 {
            format!("{}_{}", image_id, group.label())
        } else {
            image_id.to_string()
        };

        rows.push(process_group(&stack, group, &row_name, &out_dir, config, debug)?);
    }

    Ok(rows)
}

/// Run every stage over one layer group of a loaded stack
pub fn process_group(
    stack: &LayerStack,
    group: &LayerGroup,
    row_name: &str,
    out_dir: &Path,
    config: &Config,
    debug: bool,
) -> Result<ImageMetrics> {
    if debug {
        for z in group.layers.clone() {
            save_png(&stack.originals[z], out_dir.join(format!("layer_z{:02}.png", z + 1)))?;
        }
    }

    let blue = merge_and_segment(stack, group, Channel::Blue, out_dir, config, debug)?;
    let green = merge_and_segment(stack, group, Channel::Green, out_dir, config, debug)?;
    let red = merge_and_segment(stack, group, Channel::Red, out_dir, config, debug)?;
    let results = GroupResults { blue, green, red };

    let blue_red = mask_and(&results.blue.merged, &results.red.merged);
    let blue_green = mask_and(&results.blue.merged, &results.green.merged);
    if debug {
        save_png(&blue_red, out_dir.join("blue_red_layers_merged_enhanced.png"))?;
        save_png(&blue_green, out_dir.join("blue_green_layers_merged_enhanced.png"))?;
    }

    // Every nucleus is a candidate; the neural pass only sees what the microglial pass rejected
    let nuclei = results.blue.segmentation.contours.clone();
    let total_nuclei = nuclei.len();
    let microglial = classify_contours(nuclei, &blue_red, &config.microglial);
    let neural = classify_contours(microglial.other, &blue_green, &config.neural);

    info!(
        "{}: {} nuclei, {} microglial, {} neural, {} other",
        row_name,
        total_nuclei,
        microglial.target.len(),
        neural.target.len(),
        neural.other.len()
    );

    let histograms = config
        .histogram
        .channels
        .iter()
        .map(|&channel| ChannelHistogram {
            channel,
            histogram: bin_region_areas(&results.get(channel).segmentation, &config.histogram),
        })
        .collect();

    let proximity = if config.proximity.enabled {
        let stats = proximity_stats(&microglial.target, &neural.target, config.proximity.roi_factor);
        debug!(
            "{}: proximity mean {:.3}, stddev {:.3} within {:.1} px",
            row_name, stats.mean_count, stats.stddev_count, stats.roi_radius
        );
        Some(stats)
    } else {
        None
    };

    let flattened = merge_channels(&results.red.merged, &results.green.merged, &results.blue.merged);
    save_png(&flattened, out_dir.join("original_enhanced_and_flattened.png"))?;

    let microglial_ellipses: Vec<_> = microglial.target.iter().filter_map(|c| fit_ellipse(c)).collect();
    let neural_ellipses: Vec<_> = neural.target.iter().filter_map(|c| fit_ellipse(c)).collect();
    let classification = render_classification(
        &results.blue.merged,
        &ClassifiedCells {
            microglial: &microglial_ellipses,
            neural: &neural_ellipses,
            other: &neural.other,
        },
        &config.annotation,
    );
    save_png(&classification, out_dir.join("cell_classification.png"))?;

    let metrics = ImageMetrics {
        image: row_name.to_string(),
        layer_group: group.label(),
        total_nuclei,
        microglial_nuclei: microglial.target.len(),
        neural_nuclei: neural.target.len(),
        other_nuclei: neural.other.len(),
        histograms,
        proximity,
    };
    write_summary(&metrics, out_dir)?;

    Ok(metrics)
}

fn merge_and_segment(
    stack: &LayerStack,
    group: &LayerGroup,
    channel: Channel,
    out_dir: &Path,
    config: &Config,
    debug: bool,
) -> Result<ChannelResult> {
    let planes = &stack.planes(channel)[group.layers.clone()];
    let band = config.channels.get(channel).band();
    let merged = merge_enhanced(planes, channel, band, &config.channels)?;
    let segmentation = segment_mask(&merged, channel.extraction_mode(), config.min_region_area);

    let counts = segmentation.label_counts();
    debug!(
        "{} {}: {} contours, {} accepted {}",
        stack.image_id,
        channel,
        counts.total(),
        counts.accepted,
        channel.population()
    );

    if debug {
        let base = format!("{}_layer_merged_enhanced", channel);
        save_png(&merged, out_dir.join(format!("{}.png", base)))?;

        let (width, height) = merged.dimensions();
        let mut palette = RegionPalette::new(config.color_seed);
        let rendered = render_segmentation(&segmentation, width, height, &mut palette);
        save_png(&rendered, out_dir.join(format!("{}_segmented.png", base)))?;
    }

    Ok(ChannelResult { merged, segmentation })
}

/// Result directory of one image and layer group
pub fn group_output_dir(results_root: &Path, image_id: &str, group: &LayerGroup, group_count: usize) -> PathBuf {
    let dir = results_root.join(image_id);
    if group_count > 1 {
        dir.join(group.label())
    } else {
        dir
    }
}

/// Rows of every image that succeeded, in manifest order, and the entries that failed
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub rows: Vec<ImageMetrics>,
    pub failures: Vec<(String, GliaCensusError)>,
}

/// Process one manifest entry relative to `data_root`
pub fn process_entry(
    data_root: &Path,
    entry: &str,
    results_root: &Path,
    config: &Config,
    debug: bool,
) -> Result<Vec<ImageMetrics>> {
    let image_dir = data_root.join(entry);
    let image_id = image_id_from_entry(entry).ok_or_else(|| GliaCensusError::ImageDirectory(image_dir.clone()))?;
    process_image(&image_dir, &image_id, results_root, config, debug)
}

/// Process every manifest entry; a failing image never stops the others
pub fn process_manifest(
    data_root: &Path,
    entries: &[String],
    results_root: &Path,
    config: &Config,
    debug: bool,
) -> BatchOutcome {
    let run = |entry: &String| process_entry(data_root, entry, results_root, config, debug);

    // Indexed collection keeps manifest order regardless of completion order
    let results: Vec<Result<Vec<ImageMetrics>>> = if config.use_parallel {
        entries.par_iter().map(run).collect()
    } else {
        entries.iter().map(run).collect()
    };

    let mut outcome = BatchOutcome::default();
    for (entry, result) in entries.iter().zip(results) {
        match result {
            Ok(rows) => outcome.rows.extend(rows),
            Err(e) => {
                warn!("Skipping {}: {}", entry, e);
                outcome.failures.push((entry.clone(), e));
            }
        }
    }
    outcome
}
