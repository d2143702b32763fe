// src/image_io.rs - Locate, decode and save z-stack layers
use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageBuffer, ImageFormat, Luma, Pixel, RgbImage};
use log::debug;

use crate::channel::Channel;
use crate::errors::{GliaCensusError, Result};

/// Highest z index the two-digit file naming can express
pub const MAX_LAYERS: usize = 99;

/// Decoded layers of one image, split into channel planes
pub struct LayerStack {
    pub image_id: String,
    pub originals: Vec<RgbImage>,
    pub blue: Vec<GrayImage>,
    pub green: Vec<GrayImage>,
    pub red: Vec<GrayImage>,
}

impl LayerStack {
    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.originals.first().map(|img| img.dimensions()).unwrap_or((0, 0))
    }

    pub fn planes(&self, channel: Channel) -> &[GrayImage] {
        match channel {
            Channel::Blue => &self.blue,
            Channel::Green => &self.green,
            Channel::Red => &self.red,
        }
    }

    /// Split already decoded layers into planes, checking that every layer has the same size
    pub fn from_layers(image_id: &str, originals: Vec<RgbImage>) -> Result<Self> {
        let expected = originals.first().map(|img| img.dimensions()).unwrap_or((0, 0));
        for (index, layer) in originals.iter().enumerate() {
            if layer.dimensions() != expected {
                return Err(GliaCensusError::LayerSizeMismatch {
                    layer: index + 1,
                    expected,
                    actual: layer.dimensions(),
                });
            }
        }

        let blue = originals.iter().map(|img| extract_plane(img, Channel::Blue)).collect();
        let green = originals.iter().map(|img| extract_plane(img, Channel::Green)).collect();
        let red = originals.iter().map(|img| extract_plane(img, Channel::Red)).collect();

        Ok(LayerStack {
            image_id: image_id.to_string(),
            originals,
            blue,
            green,
            red,
        })
    }
}

/// Image identity of a manifest entry: its last path component
pub fn image_id_from_entry(entry: &str) -> Option<String> {
    Path::new(entry.trim_end_matches('/'))
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

/// Read the manifest, one image directory per line; blank lines are skipped
pub fn read_manifest<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| GliaCensusError::Manifest {
        source: e,
        path: path.to_path_buf(),
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// File name of layer `z` (one-based)
pub fn layer_file_name(image_id: &str, z: usize, padded: bool, extension: &str) -> String {
    if padded {
        format!("{}_z{:02}c1+2+3.{}", image_id, z, extension)
    } else {
        format!("{}_z{}c1+2+3.{}", image_id, z, extension)
    }
}

fn is_layer_file(name: &str, image_id: &str, extension: &str) -> bool {
    let prefix = format!("{}_z", image_id);
    let suffix = format!("c1+2+3.{}", extension);
    name.len() > prefix.len() + suffix.len()
        && name.starts_with(&prefix)
        && name.ends_with(&suffix)
        && name[prefix.len()..name.len() - suffix.len()].chars().all(|c| c.is_ascii_digit())
}

/// Count the layer files of `image_id` in `dir`
pub fn count_layers(dir: &Path, image_id: &str, extension: &str) -> Result<usize> {
    let entries = fs::read_dir(dir).map_err(|_| GliaCensusError::ImageDirectory(dir.to_path_buf()))?;

    let mut count = 0;
    for entry in entries {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if is_layer_file(name, image_id, extension) {
                count += 1;
            }
        }
    }
    Ok(count)
}

/// Path of layer `z`, preferring the zero-padded name
pub fn resolve_layer_path(dir: &Path, image_id: &str, z: usize, extension: &str) -> Result<PathBuf> {
    [true, false]
        .iter()
        .map(|&padded| dir.join(layer_file_name(image_id, z, padded, extension)))
        .find(|path| path.is_file())
        .ok_or_else(|| GliaCensusError::MissingLayer {
            layer: z,
            dir: dir.to_path_buf(),
        })
}

/// Load every layer of the image stored in `dir`
pub fn load_layer_stack(dir: &Path, image_id: &str, extension: &str) -> Result<LayerStack> {
    if !dir.is_dir() {
        return Err(GliaCensusError::ImageDirectory(dir.to_path_buf()));
    }

    let count = count_layers(dir, image_id, extension)?;
    if count == 0 {
        return Err(GliaCensusError::NoLayers(dir.to_path_buf()));
    }
    if count > MAX_LAYERS {
        return Err(GliaCensusError::TooManyLayers(count));
    }

    let mut originals = Vec::with_capacity(count);
    for z in 1..=count {
        let path = resolve_layer_path(dir, image_id, z, extension)?;
        debug!("Loading layer {} from {}", z, path.display());
        originals.push(image::open(&path)?.to_rgb8());
    }

    LayerStack::from_layers(image_id, originals)
}

/// One channel of an RGB layer as a grayscale plane
pub fn extract_plane(image: &RgbImage, channel: Channel) -> GrayImage {
    let (width, height) = image.dimensions();
    ImageBuffer::from_fn(width, height, |x, y| Luma([channel.sample(image.get_pixel(x, y))]))
}

/// Save an image as PNG, creating parent directories as needed
pub fn save_png<P, Q>(image: &ImageBuffer<P, Vec<u8>>, path: Q) -> Result<()>
where
    P: Pixel<Subpixel = u8> + image::PixelWithColorType,
    Q: AsRef<Path>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
