// src/zstack.rs - Flatten enhanced masks across consecutive depth layers

use std::ops::Range;

use image::GrayImage;

use crate::channel::{Band, Channel};
use crate::config::ChannelSet;
use crate::enhancement::enhance_channel;
use crate::errors::Result;
use crate::image_utils::mask_or;

/// A run of consecutive z layers that is merged and measured as one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerGroup {
    /// Zero-based layer indices covered by the group
    pub layers: Range<usize>,
}

impl LayerGroup {
    /// One-based z numbers of the first and last layer
    pub fn z_span(&self) -> (usize, usize) {
        (self.layers.start + 1, self.layers.end)
    }

    /// Suffix distinguishing this group's row and output folder
    pub fn label(&self) -> String {
        let (first, last) = self.z_span();
        format!("z{:02}-z{:02}", first, last)
    }
}

/// Split `layer_count` layers into consecutive groups of `per_group`; one group when unset
pub fn layer_groups(layer_count: usize, per_group: Option<usize>) -> Vec<LayerGroup> {
    let size = match per_group {
        Some(n) if n > 0 => n,
        _ => layer_count.max(1),
    };

    (0..layer_count)
        .step_by(size)
        .map(|start| LayerGroup {
            layers: start..(start + size).min(layer_count),
        })
        .collect()
}

/// Union of binary masks; `None` for an empty slice
pub fn merge_masks(masks: &[GrayImage]) -> Option<GrayImage> {
    let (first, rest) = masks.split_first()?;
    Some(rest.iter().fold(first.clone(), |merged, mask| mask_or(&merged, mask)))
}

/// Enhance every plane of a group and OR the results into one mask
pub fn merge_enhanced(
    planes: &[GrayImage],
    channel: Channel,
    band: Band,
    channels: &ChannelSet,
) -> Result<GrayImage> {
    let enhanced = planes
        .iter()
        .map(|plane| enhance_channel(plane, channel, band, channels))
        .collect::<Result<Vec<_>>>()?;

    // An empty group only happens for an empty stack, which the loader rejects
    Ok(merge_masks(&enhanced).unwrap_or_else(|| GrayImage::new(0, 0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn single_group_by_default() {
        let groups = layer_groups(7, None);
        assert_eq!(groups, vec![LayerGroup { layers: 0..7 }]);
        assert_eq!(groups[0].label(), "z01-z07");
    }

    #[test]
    fn trailing_group_may_be_short() {
        let groups = layer_groups(7, Some(3));
        let ranges: Vec<_> = groups.iter().map(|g| g.layers.clone()).collect();
        assert_eq!(ranges, vec![0..3, 3..6, 6..7]);
        assert_eq!(groups[2].z_span(), (7, 7));
    }

    #[test]
    fn merge_is_a_union() {
        let mut a = GrayImage::new(3, 1);
        let mut b = GrayImage::new(3, 1);
        a.put_pixel(0, 0, Luma([255]));
        b.put_pixel(2, 0, Luma([255]));

        let merged = merge_masks(&[a, b]).unwrap();
        assert_eq!(merged.into_raw(), vec![255, 0, 255]);
        assert!(merge_masks(&[]).is_none());
    }

    #[test]
    fn merged_enhancement_covers_every_layer() {
        let mut top = GrayImage::new(30, 12);
        let mut bottom = GrayImage::new(30, 12);
        for y in 3..9 {
            for x in 3..9 {
                top.put_pixel(x, y, Luma([200]));
                bottom.put_pixel(x + 15, y, Luma([200]));
            }
        }

        let merged = merge_enhanced(&[top, bottom], Channel::Blue, Band::Full, &ChannelSet::default()).unwrap();
        assert_eq!(merged.get_pixel(5, 5)[0], 255);
        assert_eq!(merged.get_pixel(20, 5)[0], 255);
        assert_eq!(merged.get_pixel(14, 5)[0], 0);
    }
}
