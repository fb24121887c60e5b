use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Color,
    Element,
    Motif,
    Theme,
    Ceremony,
    Image,
}

impl ItemKind {
    pub const ALL: [ItemKind; 6] = [
        Self::Color,
        Self::Element,
        Self::Motif,
        Self::Theme,
        Self::Ceremony,
        Self::Image,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Element => "element",
            Self::Motif => "motif",
            Self::Theme => "theme",
            Self::Ceremony => "ceremony",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("Unknown board item kind '{raw}'."))
    }
}

/// A location in board coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardItem {
    pub id: String,
    pub kind: ItemKind,
    /// Hex color, label, or image URL depending on `kind`.
    pub content: String,
    pub position: Point,
}

impl BoardItem {
    /// New item with a fresh random id.
    pub fn new(kind: ItemKind, content: impl Into<String>, position: Point) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            content: content.into(),
            position,
        }
    }

    pub fn with_id(
        id: impl Into<String>,
        kind: ItemKind,
        content: impl Into<String>,
        position: Point,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            content: content.into(),
            position,
        }
    }
}
