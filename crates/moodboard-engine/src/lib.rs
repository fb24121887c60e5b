pub mod briefs;
pub mod candidates;
pub mod config;
pub mod layout;
pub mod validator;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use moodboard_contracts::board::{Board, BoardItem, GenerationContext, Point, Viewport};
use moodboard_contracts::log::Logger;
use moodboard_contracts::prompt::build_prompt;
use serde_json::json;

pub use briefs::{
    acquire_briefs, BriefBatch, BriefClient, GeminiBriefClient, PlaceholderTag, TextResponse,
};
pub use candidates::{synthesize, CANDIDATES_PER_BRIEF};
pub use config::EngineConfig;
pub use layout::{GridLayout, GridShape};
pub use validator::{GeneratedImage, HttpImageProbe, ImageProbe, ImageValidator, PendingImage};

pub const MAX_IMAGE_COUNT: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("a generation is already in progress")]
    Busy,
    #[error("requested {requested} images; at most {max} per generation")]
    TooManyImages { requested: usize, max: usize },
    #[error("generated items could not be placed: {0}")]
    Placement(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub context: GenerationContext,
    /// Falls back to the configured image count.
    pub count: Option<usize>,
    pub viewport_center: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub prompt: String,
    pub images: Vec<GeneratedImage>,
    pub items: Vec<BoardItem>,
    pub shape: GridShape,
    pub placeholder: Option<PlaceholderTag>,
}

/// Prompt to placed image items. At most one generation runs at a time.
pub struct MoodboardEngine {
    config: EngineConfig,
    brief_client: Arc<dyn BriefClient>,
    validator: ImageValidator,
    logger: Logger,
    in_flight: AtomicBool,
    last_time_base: AtomicU64,
}

impl MoodboardEngine {
    pub fn new(config: EngineConfig, logger: Logger) -> Result<Self> {
        let brief_client = Arc::new(GeminiBriefClient::from_config(&config)?);
        let probe = Arc::new(HttpImageProbe::new(config.probe_timeout)?);
        Ok(Self::with_collaborators(config, brief_client, probe, logger))
    }

    pub fn with_collaborators(
        config: EngineConfig,
        brief_client: Arc<dyn BriefClient>,
        probe: Arc<dyn ImageProbe>,
        logger: Logger,
    ) -> Self {
        let validator = ImageValidator::new(probe, config.probe_timeout, logger.clone());
        Self {
            config,
            brief_client,
            validator,
            logger,
            in_flight: AtomicBool::new(false),
            last_time_base: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs one generation for exactly the requested number of images.
    /// Fails fast with [`GenerationError::Busy`] while an earlier call has
    /// not returned; every other failure degrades to placeholder images
    /// inside the outcome.
    pub fn start_generation(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GenerationOutcome, GenerationError> {
        let count = request.count.unwrap_or(self.config.image_count);
        if count > MAX_IMAGE_COUNT {
            return Err(GenerationError::TooManyImages {
                requested: count,
                max: MAX_IMAGE_COUNT,
            });
        }
        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or(GenerationError::Busy)?;
        Ok(self.run(request, count))
    }

    /// Generates from the board's own context and appends the grid around
    /// the viewport center in one step. `count` falls back to the config.
    pub fn generate_onto(
        &self,
        board: &mut Board,
        viewport: &Viewport,
        prompt: &str,
        count: Option<usize>,
    ) -> std::result::Result<GenerationOutcome, GenerationError> {
        let request = GenerationRequest {
            prompt: prompt.to_string(),
            context: GenerationContext::from_items(board.items()),
            count,
            viewport_center: viewport.center(),
        };
        let outcome = self.start_generation(&request)?;
        board
            .append_many(outcome.items.clone())
            .map_err(|err| GenerationError::Placement(error_chain_text(&err, 512)))?;
        Ok(outcome)
    }

    fn run(&self, request: &GenerationRequest, count: usize) -> GenerationOutcome {
        let time_base = self.next_time_base();
        let prompt = build_prompt(&request.prompt, &request.context);
        self.logger.info(
            "Starting generation",
            json!({ "count": count, "hasKey": self.config.has_api_key() }),
        );
        if count == 0 {
            return GenerationOutcome {
                prompt,
                images: Vec::new(),
                items: Vec::new(),
                shape: GridShape::for_count(0),
                placeholder: None,
            };
        }

        let batch = acquire_briefs(
            self.brief_client.as_ref(),
            &prompt,
            count,
            self.config.api_key.as_deref(),
            &self.logger,
        );
        let images = match batch.placeholder {
            Some(tag) => placeholder_images(tag, &batch.briefs),
            None => {
                let pending = pending_images(&batch.briefs, time_base);
                self.logger.info(
                    "Validating candidate image URLs",
                    json!({ "total": pending.len(), "maxAttemptsPer": CANDIDATES_PER_BRIEF }),
                );
                self.validator.validate(&pending)
            }
        };

        let shape = GridShape::for_count(images.len());
        let items = self
            .config
            .layout
            .place(&images, request.viewport_center, time_base);
        self.logger.info(
            "Generation placed",
            json!({ "items": items.len(), "columns": shape.columns, "rows": shape.rows }),
        );

        GenerationOutcome {
            prompt,
            images,
            items,
            shape,
            placeholder: batch.placeholder,
        }
    }

    /// Wall-clock millis, bumped when needed so no two requests share a base.
    fn next_time_base(&self) -> u64 {
        let now = u64::try_from(timestamp_millis()).unwrap_or(u64::MAX);
        let bump = |last: u64| now.max(last.saturating_add(1));
        match self
            .last_time_base
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(bump(last)))
        {
            Ok(previous) | Err(previous) => bump(previous),
        }
    }
}

struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn pending_images(briefs: &[String], time_base: u64) -> Vec<PendingImage> {
    briefs
        .iter()
        .enumerate()
        .map(|(idx, brief)| PendingImage {
            id: format!("brief-{time_base}-{idx}"),
            alt_text: brief.clone(),
            candidates: synthesize(brief, idx as u64, time_base),
        })
        .collect()
}

/// Stand-in images for placeholder briefs; these go straight to placement.
fn placeholder_images(tag: PlaceholderTag, briefs: &[String]) -> Vec<GeneratedImage> {
    briefs
        .iter()
        .enumerate()
        .map(|(idx, brief)| GeneratedImage {
            id: format!("placeholder-{}-{idx}", tag.slug()),
            url: candidates::placeholder_url(&format!("{} {}", tag.label(), idx + 1)),
            alt_text: brief.clone(),
        })
        .collect()
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() || parts.last().is_some_and(|last| last == trimmed) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

pub(crate) fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}
