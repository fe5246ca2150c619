//! Node visual encoding
//!
//! Pure mapping from (year, collection membership) to a fill color and from
//! citation count to a display size. Re-renders compare colors for equality,
//! so the same inputs must always produce the same value.

use chrono::Datelike;
use serde::Serialize;
use std::fmt;

/// Hex fill color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Color(&'static str);

impl Color {
    pub const fn hex(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Fixed color of papers already saved to the collection
pub const IN_COLLECTION_COLOR: Color = Color("#f59e0b");

/// Saturation point of the size scale
const SIZE_SATURATION_CITATIONS: f32 = 10_000.0;

/// Semantic class of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    InCollection,
    Suggested,
}

/// Recency tier, most recent first. Colors run dark to light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeTier {
    UpToOneYear,
    UpToThreeYears,
    UpToFiveYears,
    UpToTenYears,
    Older,
}

impl AgeTier {
    /// Future years count as the most recent tier
    pub fn from_age(age: i32) -> Self {
        match age {
            i32::MIN..=1 => AgeTier::UpToOneYear,
            2..=3 => AgeTier::UpToThreeYears,
            4..=5 => AgeTier::UpToFiveYears,
            6..=10 => AgeTier::UpToTenYears,
            _ => AgeTier::Older,
        }
    }

    pub const fn color(&self) -> Color {
        match self {
            AgeTier::UpToOneYear => Color("#08306b"),
            AgeTier::UpToThreeYears => Color("#2171b5"),
            AgeTier::UpToFiveYears => Color("#4292c6"),
            AgeTier::UpToTenYears => Color("#9ecae1"),
            AgeTier::Older => Color("#deebf7"),
        }
    }
}

/// Encoder pinned to a reference year so it stays referentially stable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeEncoder {
    current_year: i32,
    min_size: f32,
    max_size: f32,
}

impl NodeEncoder {
    pub fn new(current_year: i32) -> Self {
        Self {
            current_year,
            min_size: 4.0,
            max_size: 24.0,
        }
    }

    /// Encoder for the current calendar year (UTC)
    pub fn for_current_year() -> Self {
        Self::new(chrono::Utc::now().year())
    }

    pub fn with_size_bounds(mut self, min_size: f32, max_size: f32) -> Self {
        self.min_size = min_size.min(max_size);
        self.max_size = max_size.max(min_size);
        self
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    pub fn age_tier(&self, year: i32) -> AgeTier {
        AgeTier::from_age(self.current_year.saturating_sub(year))
    }

    pub fn color_for(&self, year: i32, in_collection: bool) -> Color {
        if in_collection {
            return IN_COLLECTION_COLOR;
        }
        self.age_tier(year).color()
    }

    pub fn class_for(&self, in_collection: bool) -> NodeClass {
        if in_collection {
            NodeClass::InCollection
        } else {
            NodeClass::Suggested
        }
    }

    /// Log-scaled, non-decreasing in `citation_count`, clamped to the bounds
    pub fn size_for(&self, citation_count: u32) -> f32 {
        let scale = (1.0 + citation_count as f32).ln() / (1.0 + SIZE_SATURATION_CITATIONS).ln();
        let size = self.min_size + (self.max_size - self.min_size) * scale;
        size.clamp(self.min_size, self.max_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_is_deterministic() {
        let encoder = NodeEncoder::new(2025);
        assert_eq!(encoder.color_for(2024, false), encoder.color_for(2024, false));
    }

    #[test]
    fn test_in_collection_ignores_year() {
        let encoder = NodeEncoder::new(2025);
        for year in [1950, 2000, 2024, 2025, 2030] {
            assert_eq!(encoder.color_for(year, true), IN_COLLECTION_COLOR);
        }
    }

    #[test]
    fn test_tier_boundaries() {
        let encoder = NodeEncoder::new(2025);
        assert_eq!(encoder.age_tier(2026), AgeTier::UpToOneYear);
        assert_eq!(encoder.age_tier(2024), AgeTier::UpToOneYear);
        assert_eq!(encoder.age_tier(2022), AgeTier::UpToThreeYears);
        assert_eq!(encoder.age_tier(2020), AgeTier::UpToFiveYears);
        assert_eq!(encoder.age_tier(2015), AgeTier::UpToTenYears);
        assert_eq!(encoder.age_tier(2014), AgeTier::Older);
    }

    #[test]
    fn test_tier_colors_are_distinct() {
        let tiers = [
            AgeTier::UpToOneYear,
            AgeTier::UpToThreeYears,
            AgeTier::UpToFiveYears,
            AgeTier::UpToTenYears,
            AgeTier::Older,
        ];
        let colors: std::collections::HashSet<_> = tiers.iter().map(|t| t.color()).collect();
        assert_eq!(colors.len(), 5);
        assert!(!colors.contains(&IN_COLLECTION_COLOR));
    }

    #[test]
    fn test_size_is_monotonic_and_clamped() {
        let encoder = NodeEncoder::new(2025).with_size_bounds(2.0, 10.0);
        let mut prev = 0.0;
        for count in [0, 1, 10, 100, 1_000, 10_000, 1_000_000] {
            let size = encoder.size_for(count);
            assert!(size >= prev);
            assert!((2.0..=10.0).contains(&size));
            prev = size;
        }
        assert_eq!(encoder.size_for(0), 2.0);
        assert_eq!(encoder.size_for(u32::MAX), 10.0);
    }
}
