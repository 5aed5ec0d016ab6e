use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::Dimensions;

/// Typical use case for an image of a given pixel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Suggestion {
    Thumbnail,
    Web,
    HdWallpaper,
    UltraHd,
    LargeFormat,
}

// Exclusive upper bounds in megapixels, ascending. Anything above the last
// bound is `LargeFormat`.
const UPPER_BOUNDS: [(f64, Suggestion); 4] = [
    (0.5, Suggestion::Thumbnail),
    (2.0, Suggestion::Web),
    (5.0, Suggestion::HdWallpaper),
    (10.0, Suggestion::UltraHd),
];

impl Suggestion {
    pub fn all() -> [Suggestion; 5] {
        [
            Suggestion::Thumbnail,
            Suggestion::Web,
            Suggestion::HdWallpaper,
            Suggestion::UltraHd,
            Suggestion::LargeFormat,
        ]
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Thumbnail => "icon / thumbnail / preview image",
            Self::Web => "social media / web image",
            Self::HdWallpaper => "HD wallpaper / small-format print",
            Self::UltraHd => "4K display / medium-format print",
            Self::LargeFormat => "large-format print / professional photography",
        }
    }

    /// Half-open megapixel range `[lower, upper)`; `None` means unbounded.
    pub fn range(self) -> (f64, Option<f64>) {
        match self {
            Self::Thumbnail => (0.0, Some(0.5)),
            Self::Web => (0.5, Some(2.0)),
            Self::HdWallpaper => (2.0, Some(5.0)),
            Self::UltraHd => (5.0, Some(10.0)),
            Self::LargeFormat => (10.0, None),
        }
    }

    pub fn contains(self, megapixels: f64) -> bool {
        let (lower, upper) = self.range();
        megapixels >= lower && upper.map_or(true, |upper| megapixels < upper)
    }
}

impl Display for Suggestion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub fn classify_megapixels(megapixels: f64) -> Suggestion {
    UPPER_BOUNDS
        .iter()
        .find(|(upper, _)| megapixels < *upper)
        .map(|(_, suggestion)| *suggestion)
        .unwrap_or(Suggestion::LargeFormat)
}

pub fn classify(dimensions: Dimensions) -> Suggestion {
    classify_megapixels(dimensions.megapixels())
}
