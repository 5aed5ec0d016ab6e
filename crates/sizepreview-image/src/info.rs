use serde::{Deserialize, Serialize};
use sizepreview_core::Dimensions;

/// Coarse quality tier by megapixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionLevel {
    VeryLow,
    Low,
    Sd,
    Hd,
    TwoK,
    FourK,
    UltraHigh,
}

const LEVEL_BOUNDS: [(f64, ResolutionLevel); 6] = [
    (0.3, ResolutionLevel::VeryLow),
    (0.9, ResolutionLevel::Low),
    (2.0, ResolutionLevel::Sd),
    (3.7, ResolutionLevel::Hd),
    (8.3, ResolutionLevel::TwoK),
    (14.7, ResolutionLevel::FourK),
];

impl ResolutionLevel {
    pub fn from_megapixels(megapixels: f64) -> Self {
        LEVEL_BOUNDS
            .iter()
            .find(|(bound, _)| megapixels < *bound)
            .map(|(_, level)| *level)
            .unwrap_or(Self::UltraHigh)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::VeryLow => "very low",
            Self::Low => "low",
            Self::Sd => "SD",
            Self::Hd => "HD",
            Self::TwoK => "2K/2.5K",
            Self::FourK => "4K",
            Self::UltraHigh => "ultra high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

impl Orientation {
    pub fn of(dimensions: Dimensions) -> Self {
        match dimensions.width().cmp(&dimensions.height()) {
            std::cmp::Ordering::Greater => Self::Landscape,
            std::cmp::Ordering::Less => Self::Portrait,
            std::cmp::Ordering::Equal => Self::Square,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Square => "square",
        }
    }
}

/// Named ratios, in match priority order: the first of two equally close
/// entries wins.
const COMMON_RATIOS: [(u32, u32, &str); 8] = [
    (1, 1, "1:1 (square)"),
    (4, 3, "4:3"),
    (3, 2, "3:2"),
    (16, 9, "16:9"),
    (2, 3, "2:3"),
    (3, 4, "3:4"),
    (9, 16, "9:16"),
    (21, 9, "21:9 (ultrawide)"),
];

/// Name of the common ratio closest to width/height.
pub fn closest_ratio_name(dimensions: Dimensions) -> &'static str {
    let actual = dimensions.aspect_ratio();
    let mut best = COMMON_RATIOS[0];
    let mut best_distance = f64::INFINITY;
    for entry in COMMON_RATIOS {
        let distance = (entry.0 as f64 / entry.1 as f64 - actual).abs();
        if distance < best_distance {
            best = entry;
            best_distance = distance;
        }
    }
    best.2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionInfo {
    pub width: u32,
    pub height: u32,
    pub total_pixels: u64,
    /// Rounded to two decimals.
    pub megapixels: f64,
    /// Rounded to three decimals.
    pub aspect_ratio: f64,
    pub aspect_name: String,
    pub level: ResolutionLevel,
    pub orientation: Orientation,
}

impl ResolutionInfo {
    pub fn is_landscape(&self) -> bool {
        self.orientation == Orientation::Landscape
    }

    pub fn is_portrait(&self) -> bool {
        self.orientation == Orientation::Portrait
    }

    pub fn is_square(&self) -> bool {
        self.orientation == Orientation::Square
    }
}

pub fn resolution_info(dimensions: Dimensions) -> ResolutionInfo {
    let megapixels = dimensions.megapixels();
    ResolutionInfo {
        width: dimensions.width(),
        height: dimensions.height(),
        total_pixels: dimensions.pixel_count(),
        megapixels: round_to(megapixels, 2),
        aspect_ratio: round_to(dimensions.aspect_ratio(), 3),
        aspect_name: closest_ratio_name(dimensions).to_string(),
        level: ResolutionLevel::from_megapixels(megapixels),
        orientation: Orientation::of(dimensions),
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Inputs for [`optimal_size`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeTarget {
    pub scale: f64,
    /// Crop to this `(w, h)` ratio instead of scaling.
    pub target_aspect: Option<(u32, u32)>,
    /// Longest side cap; 0 disables it.
    pub max_side: u32,
    pub multiple_of: u32,
}

pub const OPTIMAL_MIN_SIDE: u32 = 512;

impl Default for SizeTarget {
    fn default() -> Self {
        Self {
            scale: 1.0,
            target_aspect: None,
            max_side: 4096,
            multiple_of: 8,
        }
    }
}

/// Picks a generation size from a source size.
///
/// Steps run in order: crop to the target aspect (or scale), cap the longest
/// side, raise each side to at least [`OPTIMAL_MIN_SIDE`], then floor each
/// side to a multiple of `multiple_of`. The minimum is applied after the cap,
/// so a `max_side` below 512 is not honored.
pub fn optimal_size(dimensions: Dimensions, target: &SizeTarget) -> Dimensions {
    let (w, h) = (dimensions.width() as f64, dimensions.height() as f64);
    let ratio = target
        .target_aspect
        .filter(|(rw, rh)| *rw > 0 && *rh > 0)
        .map(|(rw, rh)| rw as f64 / rh as f64);
    let (mut new_w, mut new_h) = match ratio {
        Some(ratio) if w / h > ratio => (truncate(h * ratio), dimensions.height() as u64),
        Some(ratio) => (dimensions.width() as u64, truncate(w / ratio)),
        None => (truncate(w * target.scale), truncate(h * target.scale)),
    };

    let longest = new_w.max(new_h);
    if target.max_side > 0 && longest > target.max_side as u64 {
        let scale = target.max_side as f64 / longest as f64;
        new_w = truncate(new_w as f64 * scale);
        new_h = truncate(new_h as f64 * scale);
    }

    let floor_side = |side: u64| -> u32 {
        let side = side.max(OPTIMAL_MIN_SIDE as u64).min(u32::MAX as u64);
        let step = target.multiple_of.max(1) as u64;
        (side - side % step).max(step).min(u32::MAX as u64) as u32
    };
    Dimensions::new(floor_side(new_w), floor_side(new_h)).unwrap_or(dimensions)
}

fn truncate(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions::new(width, height).expect("positive test dimensions")
    }

    #[test]
    fn info_for_full_hd() {
        let info = resolution_info(dims(1920, 1080));
        assert_eq!(info.total_pixels, 2_073_600);
        assert_eq!(info.megapixels, 2.07);
        assert_eq!(info.aspect_ratio, 1.778);
        assert_eq!(info.aspect_name, "16:9");
        assert_eq!(info.level, ResolutionLevel::Hd);
        assert!(info.is_landscape() && !info.is_portrait() && !info.is_square());
    }

    #[test]
    fn info_names_square_and_portrait() {
        let square = resolution_info(dims(512, 512));
        assert_eq!(square.aspect_name, "1:1 (square)");
        assert_eq!(square.level, ResolutionLevel::VeryLow);
        assert!(square.is_square());

        let portrait = resolution_info(dims(1080, 1920));
        assert_eq!(portrait.aspect_name, "9:16");
        assert_eq!(portrait.orientation, Orientation::Portrait);
    }

    #[test]
    fn wide_sizes_map_to_ultrawide() {
        assert_eq!(closest_ratio_name(dims(3440, 1440)), "21:9 (ultrawide)");
        assert_eq!(closest_ratio_name(dims(10_000, 1)), "21:9 (ultrawide)");
    }

    #[test]
    fn levels_follow_megapixel_bounds() {
        assert_eq!(ResolutionLevel::from_megapixels(0.29), ResolutionLevel::VeryLow);
        assert_eq!(ResolutionLevel::from_megapixels(0.3), ResolutionLevel::Low);
        assert_eq!(ResolutionLevel::from_megapixels(1.99), ResolutionLevel::Sd);
        assert_eq!(ResolutionLevel::from_megapixels(8.29), ResolutionLevel::TwoK);
        assert_eq!(ResolutionLevel::from_megapixels(8.3), ResolutionLevel::FourK);
        assert_eq!(ResolutionLevel::from_megapixels(14.7), ResolutionLevel::UltraHigh);
    }

    #[test]
    fn optimal_size_scales_and_floors_to_multiple() {
        let target = SizeTarget {
            scale: 1.5,
            ..SizeTarget::default()
        };
        assert_eq!(optimal_size(dims(1000, 701), &target), dims(1496, 1048));
    }

    #[test]
    fn optimal_size_caps_longest_side() {
        assert_eq!(optimal_size(dims(8192, 6144), &SizeTarget::default()), dims(4096, 3072));
    }

    #[test]
    fn optimal_size_raises_small_sides_to_minimum() {
        assert_eq!(optimal_size(dims(100, 50), &SizeTarget::default()), dims(512, 512));
    }

    #[test]
    fn optimal_size_crops_to_target_aspect() {
        let wide = SizeTarget {
            target_aspect: Some((16, 9)),
            ..SizeTarget::default()
        };
        assert_eq!(optimal_size(dims(2000, 2000), &wide), dims(2000, 1120));

        let tall = SizeTarget {
            target_aspect: Some((1, 1)),
            ..SizeTarget::default()
        };
        assert_eq!(optimal_size(dims(3000, 1000), &tall), dims(1000, 1000));
    }

    #[test]
    fn optimal_size_tolerates_degenerate_targets() {
        let target = SizeTarget {
            scale: f64::NAN,
            target_aspect: Some((0, 9)),
            max_side: 0,
            multiple_of: 0,
        };
        assert_eq!(optimal_size(dims(1920, 1080), &target), dims(512, 512));
    }
}
