use serde::{Deserialize, Serialize};

use super::item::{BoardItem, ItemKind};

pub const MAX_CONTEXT_COLORS: usize = 8;
pub const MAX_CONTEXT_ELEMENTS: usize = 8;
pub const MAX_CONTEXT_MOTIFS: usize = 8;
pub const MAX_CONTEXT_THEMES: usize = 4;
pub const MAX_CONTEXT_CEREMONIES: usize = 10;

/// Board contents summarized per kind for one generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationContext {
    pub colors: Vec<String>,
    pub elements: Vec<String>,
    pub motifs: Vec<String>,
    pub themes: Vec<String>,
    pub ceremonies: Vec<String>,
}

impl GenerationContext {
    /// Collects item contents by kind in board order, capped per kind.
    /// Images are not part of the context.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a BoardItem>) -> Self {
        let mut context = Self::default();
        for item in items {
            let (bucket, cap) = match item.kind {
                ItemKind::Color => (&mut context.colors, MAX_CONTEXT_COLORS),
                ItemKind::Element => (&mut context.elements, MAX_CONTEXT_ELEMENTS),
                ItemKind::Motif => (&mut context.motifs, MAX_CONTEXT_MOTIFS),
                ItemKind::Theme => (&mut context.themes, MAX_CONTEXT_THEMES),
                ItemKind::Ceremony => (&mut context.ceremonies, MAX_CONTEXT_CEREMONIES),
                ItemKind::Image => continue,
            };
            if bucket.len() < cap {
                bucket.push(item.content.clone());
            }
        }
        context
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
            && self.elements.is_empty()
            && self.motifs.is_empty()
            && self.themes.is_empty()
            && self.ceremonies.is_empty()
    }
}
