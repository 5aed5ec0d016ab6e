use serde::{Deserialize, Serialize};
use sizepreview_core::Dimensions;

mod info;

pub use info::{
    closest_ratio_name, optimal_size, resolution_info, Orientation, ResolutionInfo, ResolutionLevel, SizeTarget,
    OPTIMAL_MIN_SIDE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeMode {
    Longest,
    Shortest,
}

/// Resizes so the selected edge becomes `target_len`, keeping the aspect ratio.
///
/// The other side is truncated toward zero and clamped to at least 1. On a
/// square target the width is treated as the selected edge.
pub fn scale_by_edge(dimensions: Dimensions, mode: EdgeMode, target_len: u32) -> Dimensions {
    let (w, h) = (dimensions.width() as u64, dimensions.height() as u64);
    let target = target_len.max(1) as u64;
    let width_is_edge = match mode {
        EdgeMode::Longest => w >= h,
        EdgeMode::Shortest => w <= h,
    };
    let (new_w, new_h) = if width_is_edge {
        (target, (h * target / w).max(1))
    } else {
        ((w * target / h).max(1), target)
    };
    Dimensions::new(clamp_u32(new_w), clamp_u32(new_h)).unwrap_or(dimensions)
}

fn clamp_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}

/// Shape of the empty latent a sampler allocates for a target resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatentShape {
    pub batch: u32,
    pub channels: u32,
    pub height: u32,
    pub width: u32,
}

pub const LATENT_CHANNELS: u32 = 4;
pub const LATENT_DOWNSCALE: u32 = 8;

pub fn latent_shape(dimensions: Dimensions) -> LatentShape {
    LatentShape {
        batch: 1,
        channels: LATENT_CHANNELS,
        height: dimensions.height() / LATENT_DOWNSCALE,
        width: dimensions.width() / LATENT_DOWNSCALE,
    }
}

/// Bounds and granularity of the host's width/height widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionRange {
    pub min: u32,
    pub max: u32,
    pub step: u32,
}

impl Default for DimensionRange {
    fn default() -> Self {
        Self {
            min: 64,
            max: 8192,
            step: 8,
        }
    }
}

impl DimensionRange {
    pub fn contains(&self, value: u32) -> bool {
        value >= self.min && value <= self.max && (self.step == 0 || value % self.step == 0)
    }

    /// Rounds to the nearest step (ties up), then clamps into `[min, max]`.
    pub fn snap(&self, value: u32) -> u32 {
        let snapped = if self.step <= 1 {
            value as u64
        } else {
            let step = self.step as u64;
            (value as u64 + step / 2) / step * step
        };
        snapped.clamp(self.min as u64, self.max as u64) as u32
    }

    pub fn snap_dimensions(&self, dimensions: Dimensions) -> Dimensions {
        let width = self.snap(dimensions.width()).max(1);
        let height = self.snap(dimensions.height()).max(1);
        Dimensions::new(width, height).unwrap_or(dimensions)
    }
}

/// Bytes of an 8-bit RGB buffer for these dimensions, saturating.
pub fn estimate_rgb_bytes(dimensions: Dimensions) -> u64 {
    dimensions.pixel_count().saturating_mul(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions::new(width, height).expect("positive test dimensions")
    }

    #[test]
    fn longest_edge_scales_landscape_by_width() {
        assert_eq!(scale_by_edge(dims(1920, 1080), EdgeMode::Longest, 1024), dims(1024, 576));
    }

    #[test]
    fn longest_edge_scales_portrait_by_height() {
        assert_eq!(scale_by_edge(dims(1080, 1920), EdgeMode::Longest, 1024), dims(576, 1024));
    }

    #[test]
    fn shortest_edge_scales_the_smaller_side() {
        assert_eq!(scale_by_edge(dims(1920, 1080), EdgeMode::Shortest, 540), dims(960, 540));
        assert_eq!(scale_by_edge(dims(1000, 3000), EdgeMode::Shortest, 512), dims(512, 1536));
    }

    #[test]
    fn edge_scaling_truncates_and_never_reaches_zero() {
        assert_eq!(scale_by_edge(dims(1000, 333), EdgeMode::Longest, 100), dims(100, 33));
        assert_eq!(scale_by_edge(dims(10_000, 1), EdgeMode::Longest, 64), dims(64, 1));
    }

    #[test]
    fn square_uses_width_as_edge() {
        assert_eq!(scale_by_edge(dims(512, 512), EdgeMode::Shortest, 768), dims(768, 768));
    }

    #[test]
    fn latent_is_an_eighth_per_side() {
        assert_eq!(
            latent_shape(dims(1024, 768)),
            LatentShape {
                batch: 1,
                channels: 4,
                height: 96,
                width: 128,
            }
        );
        assert_eq!(latent_shape(dims(1021, 7)).width, 127);
        assert_eq!(latent_shape(dims(1021, 7)).height, 0);
    }

    #[test]
    fn widget_range_snaps_and_clamps() {
        let range = DimensionRange::default();
        assert_eq!(range.snap(1021), 1024);
        assert_eq!(range.snap(1019), 1016);
        assert_eq!(range.snap(10), 64);
        assert_eq!(range.snap(100_000), 8192);
        assert!(range.contains(1024));
        assert!(!range.contains(1020));
        assert!(!range.contains(8200));
        assert_eq!(range.snap_dimensions(dims(1021, 3)), dims(1024, 64));
    }

    #[test]
    fn rgb_estimate_saturates() {
        assert_eq!(estimate_rgb_bytes(dims(2, 2)), 12);
        assert_eq!(estimate_rgb_bytes(dims(u32::MAX, u32::MAX)), u64::MAX);
    }
}
