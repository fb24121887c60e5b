mod context;
mod item;
mod state;
mod viewport;

pub use context::{
    GenerationContext, MAX_CONTEXT_CEREMONIES, MAX_CONTEXT_COLORS, MAX_CONTEXT_ELEMENTS,
    MAX_CONTEXT_MOTIFS, MAX_CONTEXT_THEMES,
};
pub use item::{BoardItem, ItemKind, Point};
pub use state::Board;
pub use viewport::{Viewport, MAX_SCALE, MIN_SCALE};
