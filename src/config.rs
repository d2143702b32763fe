// src/config.rs - Thresholds and layout settings for the census pipeline

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::channel::{Band, Channel};
use crate::errors::{GliaCensusError, Result};

/// Configuration for glia_census
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Root directory for per-image result folders
    #[serde(default = "default_results_dir")]
    pub results_dir: String,

    /// Extension of the layer files, without the dot
    #[serde(default = "default_layer_extension")]
    pub layer_extension: String,

    /// Number of consecutive z layers merged into one group; all layers when unset
    #[serde(default)]
    pub layers_per_group: Option<usize>,

    #[serde(default = "default_parallel")]
    pub use_parallel: bool,

    /// Minimum net area of an accepted region
    #[serde(default = "default_min_region_area")]
    pub min_region_area: f64,

    /// Seed of the palette used for segmented debug renderings
    #[serde(default = "default_color_seed")]
    pub color_seed: u64,

    #[serde(default)]
    pub channels: ChannelSet,

    /// Blue nuclei overlapping the blue/red intersection
    #[serde(default)]
    pub microglial: ClassifierRule,

    /// Remaining blue nuclei overlapping the blue/green intersection
    #[serde(default)]
    pub neural: ClassifierRule,

    #[serde(default)]
    pub histogram: HistogramConfig,

    #[serde(default)]
    pub proximity: ProximityConfig,

    #[serde(default)]
    pub annotation: AnnotationConfig,
}

/// Enhancement parameters of every channel
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChannelSet {
    #[serde(default = "default_blue_channel")]
    pub blue: ChannelConfig,
    #[serde(default = "default_green_channel")]
    pub green: ChannelConfig,
    #[serde(default = "default_red_channel")]
    pub red: ChannelConfig,
}

/// Enhancement parameters of a single channel
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ChannelConfig {
    /// Samples at or below this value are background noise
    pub low_threshold: u8,
    /// Cutoff applied to the inverted, smoothed image
    pub high_threshold: u8,
    /// Radius of the binomial smoothing kernel; 0 disables smoothing
    #[serde(default = "default_blur_radius")]
    pub blur_radius: u32,
    /// Enhance with the low intensity band instead of the full band
    #[serde(default)]
    pub use_low_band: bool,
    #[serde(default)]
    pub low_band: Option<LowBandConfig>,
}

/// Faint-structure variant of a channel
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LowBandConfig {
    pub high_threshold: u8,
    #[serde(default = "default_blur_radius")]
    pub light_blur_radius: u32,
    /// Smoothed samples at or above this value count as saturated
    pub saturation_threshold: u8,
}

/// Coverage rule of one classification pairing
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClassifierRule {
    pub coverage_threshold: f64,
    pub min_arc_length: f64,
    pub min_points: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct HistogramConfig {
    pub bin_count: usize,
    pub bin_width: u32,
    /// Channels whose accepted region areas are binned, in column order
    pub channels: Vec<Channel>,
}

/// Microglia to neural neighbourhood statistics
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProximityConfig {
    pub enabled: bool,
    /// ROI diameter as a multiple of the mean microglial diameter
    pub roi_factor: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnnotationConfig {
    pub ellipse_thickness: u32,
    pub microglial_color: [u8; 3],
    pub neural_color: [u8; 3],
    pub other_color: [u8; 3],
    /// Outline thickness of unclassified nuclei; 0 leaves them unmarked
    pub other_thickness: u32,
}

fn default_results_dir() -> String {
    "result".to_string()
}

fn default_layer_extension() -> String {
    "tif".to_string()
}

fn default_parallel() -> bool {
    true
}

fn default_min_region_area() -> f64 {
    1.0
}

fn default_color_seed() -> u64 {
    12345
}

fn default_blur_radius() -> u32 {
    1
}

fn default_blue_channel() -> ChannelConfig {
    ChannelConfig {
        low_threshold: 50,
        high_threshold: 240,
        blur_radius: 1,
        use_low_band: false,
        low_band: None,
    }
}

fn default_green_channel() -> ChannelConfig {
    default_blue_channel()
}

// The microglial stain has a much lower noise floor
fn default_red_channel() -> ChannelConfig {
    ChannelConfig {
        low_threshold: 5,
        ..default_blue_channel()
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self {
            blue: default_blue_channel(),
            green: default_green_channel(),
            red: default_red_channel(),
        }
    }
}

impl ChannelSet {
    pub fn get(&self, channel: Channel) -> &ChannelConfig {
        match channel {
            Channel::Blue => &self.blue,
            Channel::Green => &self.green,
            Channel::Red => &self.red,
        }
    }
}

impl ChannelConfig {
    pub fn band(&self) -> Band {
        if self.use_low_band {
            Band::Low
        } else {
            Band::Full
        }
    }
}

impl Default for ClassifierRule {
    fn default() -> Self {
        Self {
            coverage_threshold: 0.75,
            min_arc_length: 10.0,
            min_points: 5,
        }
    }
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            bin_count: 21,
            bin_width: 25,
            channels: vec![Channel::Red],
        }
    }
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            roi_factor: 20.0,
        }
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            ellipse_thickness: 4,
            microglial_color: [255, 0, 255],
            neural_color: [0, 255, 255],
            other_color: [255, 255, 0],
            other_thickness: 1,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            layer_extension: default_layer_extension(),
            layers_per_group: None,
            use_parallel: default_parallel(),
            min_region_area: default_min_region_area(),
            color_seed: default_color_seed(),
            channels: ChannelSet::default(),
            microglial: ClassifierRule::default(),
            neural: ClassifierRule::default(),
            histogram: HistogramConfig::default(),
            proximity: ProximityConfig::default(),
            annotation: AnnotationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            GliaCensusError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        Self::from_toml_str(&content).map_err(|source| GliaCensusError::ConfigLoad {
            source,
            path: path.to_path_buf(),
        })
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.layer_extension.trim_start_matches('.').is_empty() {
            return Err(GliaCensusError::Config(
                "layer_extension must not be empty".to_string(),
            ));
        }

        if self.layers_per_group == Some(0) {
            return Err(GliaCensusError::Config(
                "layers_per_group must be > 0 when set".to_string(),
            ));
        }

        if self.min_region_area.is_nan() || self.min_region_area < 0.0 {
            return Err(GliaCensusError::Config(
                "min_region_area must be >= 0.0".to_string(),
            ));
        }

        for channel in Channel::ALL {
            let params = self.channels.get(channel);
            if params.low_threshold >= params.high_threshold {
                return Err(GliaCensusError::Config(format!(
                    "{} channel: low_threshold must be < high_threshold",
                    channel
                )));
            }
            if let Some(low_band) = &params.low_band {
                if low_band.saturation_threshold == 0 {
                    return Err(GliaCensusError::Config(format!(
                        "{} channel: low_band.saturation_threshold must be > 0",
                        channel
                    )));
                }
            } else if params.use_low_band {
                return Err(GliaCensusError::Config(format!(
                    "{} channel: use_low_band requires a [channels.{}.low_band] table",
                    channel, channel
                )));
            }
        }

        for (name, rule) in [("microglial", &self.microglial), ("neural", &self.neural)] {
            if !(0.0..=1.0).contains(&rule.coverage_threshold) {
                return Err(GliaCensusError::Config(format!(
                    "{}.coverage_threshold must be between 0.0 and 1.0",
                    name
                )));
            }
            if rule.min_arc_length < 0.0 {
                return Err(GliaCensusError::Config(format!(
                    "{}.min_arc_length must be >= 0.0",
                    name
                )));
            }
        }

        if self.histogram.bin_count == 0 || self.histogram.bin_width == 0 {
            return Err(GliaCensusError::Config(
                "histogram.bin_count and histogram.bin_width must be > 0".to_string(),
            ));
        }

        if self.histogram.channels.is_empty() {
            return Err(GliaCensusError::Config(
                "histogram.channels must name at least one channel".to_string(),
            ));
        }

        if self.proximity.roi_factor <= 0.0 {
            return Err(GliaCensusError::Config(
                "proximity.roi_factor must be > 0.0".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            GliaCensusError::Config(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, content)?;

        Ok(())
    }
}
