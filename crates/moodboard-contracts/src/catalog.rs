use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::board::{BoardItem, ItemKind, Point};

pub const COLOR_SWATCHES: &[&str] = &["#B3001B", "#E9B949", "#F5F5F5", "#5A3E36", "#C77D33"];
pub const NAMED_COLORS: &[&str] = &["Red", "Gold", "White"];
pub const ELEMENTS: &[&str] = &["Mandap", "Flowers", "Lights"];
pub const MOTIFS: &[&str] = &["Garland", "Diyas", "Elephant", "Peacock Feather"];
pub const THEMES: &[&str] = &["Traditional", "Modern"];

pub const NORTH_CEREMONIES: &[&str] = &[
    "Haldi",
    "Mehendi",
    "Sangeet",
    "Baraat",
    "Pheras",
    "Kanyadaan",
    "Vidaai",
    "Reception",
];

pub const SOUTH_CEREMONIES: &[&str] = &[
    "Vratham",
    "Nalangu",
    "Kashi Yatra",
    "Oonjal",
    "Muhurtham",
    "Kanyadanam",
    "Saptapadi",
    "Griha Pravesham",
    "Reception",
];

/// Area seeded items are scattered across, in board coordinates.
pub const SEED_AREA_WIDTH: f64 = 1000.0;
pub const SEED_AREA_HEIGHT: f64 = 800.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    North,
    South,
}

impl Region {
    pub fn ceremonies(self) -> &'static [&'static str] {
        match self {
            Self::North => NORTH_CEREMONIES,
            Self::South => SOUTH_CEREMONIES,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::North => "North Indian Ceremonies",
            Self::South => "South Indian Ceremonies",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::North => f.write_str("north"),
            Self::South => f.write_str("south"),
        }
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "north" => Ok(Self::North),
            "south" => Ok(Self::South),
            _ => Err(format!("Unknown region '{raw}' (expected north or south).")),
        }
    }
}

/// One item per swatch, element, motif, theme and regional ceremony,
/// scattered over the seed area. Same `seed` gives the same positions.
pub fn seed_board_items(region: Region, seed: u64) -> Vec<BoardItem> {
    let mut rng = StdRng::seed_from_u64(seed);
    let entries = COLOR_SWATCHES
        .iter()
        .map(|value| (ItemKind::Color, *value))
        .chain(ELEMENTS.iter().map(|value| (ItemKind::Element, *value)))
        .chain(MOTIFS.iter().map(|value| (ItemKind::Motif, *value)))
        .chain(THEMES.iter().map(|value| (ItemKind::Theme, *value)))
        .chain(
            region
                .ceremonies()
                .iter()
                .map(|value| (ItemKind::Ceremony, *value)),
        );

    entries
        .enumerate()
        .map(|(idx, (kind, content))| {
            let position = Point::new(
                rng.gen_range(0.0..SEED_AREA_WIDTH),
                rng.gen_range(0.0..SEED_AREA_HEIGHT),
            );
            BoardItem::with_id(format!("seed-{seed}-{idx}"), kind, content, position)
        })
        .collect()
}
