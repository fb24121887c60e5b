use std::collections::VecDeque;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use moodboard_contracts::log::Logger;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::candidates::{is_placeholder_url, placeholder_url};
use crate::{error_chain_text, timestamp_millis, truncate_text};

pub const FALLBACK_TEXT: &str = "image failed";

/// Loads an image URL to completion or fails.
///
/// The validator bounds every call with its own timeout, so implementations
/// may block for as long as their transport allows.
pub trait ImageProbe: Send + Sync {
    fn load(&self, url: &str) -> Result<()>;
}

/// Probe that GETs the URL and requires an image payload.
pub struct HttpImageProbe {
    http: HttpClient,
}

impl HttpImageProbe {
    /// `timeout` caps the transport itself so abandoned probes do not linger.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed to build image probe HTTP client")?;
        Ok(Self { http })
    }
}

impl ImageProbe for HttpImageProbe {
    fn load(&self, url: &str) -> Result<()> {
        let response = self
            .http
            .get(url)
            .send()
            .with_context(|| format!("image request failed ({url})"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("image request failed ({}): {url}", status.as_u16());
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase);
        if let Some(content_type) = content_type {
            if !content_type.starts_with("image/") {
                bail!(
                    "image request returned {}: {url}",
                    truncate_text(&content_type, 64)
                );
            }
        }
        response
            .bytes()
            .with_context(|| format!("image body read failed ({url})"))?;
        Ok(())
    }
}

/// An image awaiting validation: candidate URLs in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    pub id: String,
    pub alt_text: String,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub id: String,
    pub url: String,
    pub alt_text: String,
}

impl GeneratedImage {
    /// Guaranteed-displayable stand-in once every candidate failed.
    pub fn fallback_for(image: &PendingImage) -> Self {
        Self {
            id: format!("{}-fallback", image.id),
            url: placeholder_url(FALLBACK_TEXT),
            alt_text: format!("{} (fallback)", image.alt_text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Loaded,
    Failed(String),
    TimedOut,
    /// Placeholder URLs are rejected without a probe.
    Skipped,
}

impl ProbeOutcome {
    fn reason(&self) -> String {
        match self {
            Self::Loaded => "loaded".to_string(),
            Self::Failed(reason) => reason.clone(),
            Self::TimedOut => "timed out".to_string(),
            Self::Skipped => "placeholder source".to_string(),
        }
    }
}

/// Per-image candidate state.
///
/// `Pending -> Attempting -> Accepted`, or `Attempting -> Pending` on a
/// rejected probe, until `Pending` runs dry and becomes `Exhausted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateState {
    Pending {
        remaining: VecDeque<String>,
        attempts: usize,
        last_failure: Option<String>,
    },
    Attempting {
        url: String,
        attempt: usize,
        remaining: VecDeque<String>,
    },
    Accepted {
        url: String,
        attempts: usize,
    },
    Exhausted {
        attempts: usize,
    },
}

impl CandidateState {
    pub fn new(candidates: impl IntoIterator<Item = String>) -> Self {
        Self::Pending {
            remaining: candidates.into_iter().collect(),
            attempts: 0,
            last_failure: None,
        }
    }

    /// `Pending` moves to the next candidate or to `Exhausted`; other states are unchanged.
    pub fn begin_next(self) -> Self {
        match self {
            Self::Pending {
                mut remaining,
                attempts,
                ..
            } => match remaining.pop_front() {
                Some(url) => Self::Attempting {
                    url,
                    attempt: attempts + 1,
                    remaining,
                },
                None => Self::Exhausted { attempts },
            },
            other => other,
        }
    }

    /// Applies a probe result to `Attempting`; other states are unchanged.
    pub fn settle(self, outcome: &ProbeOutcome) -> Self {
        match self {
            Self::Attempting {
                url,
                attempt,
                remaining,
            } => match outcome {
                ProbeOutcome::Loaded => Self::Accepted {
                    url,
                    attempts: attempt,
                },
                rejected => Self::Pending {
                    remaining,
                    attempts: attempt,
                    last_failure: Some(rejected.reason()),
                },
            },
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted { .. } | Self::Exhausted { .. })
    }

    /// Candidates tried so far, including one in flight.
    pub fn attempts(&self) -> usize {
        match self {
            Self::Pending { attempts, .. }
            | Self::Accepted { attempts, .. }
            | Self::Exhausted { attempts } => *attempts,
            Self::Attempting { attempt, .. } => *attempt,
        }
    }
}

/// Validates images concurrently, trying each image's candidates in order.
#[derive(Clone)]
pub struct ImageValidator {
    probe: Arc<dyn ImageProbe>,
    probe_timeout: Duration,
    logger: Logger,
}

impl ImageValidator {
    pub fn new(probe: Arc<dyn ImageProbe>, probe_timeout: Duration, logger: Logger) -> Self {
        Self {
            probe,
            probe_timeout,
            logger,
        }
    }

    /// One result per input, in input order. Every image validates on its
    /// own thread; the call returns once all of them settled.
    pub fn validate(&self, images: &[PendingImage]) -> Vec<GeneratedImage> {
        thread::scope(|scope| {
            let handles: Vec<_> = images
                .iter()
                .map(|image| {
                    thread::Builder::new()
                        .name("image-validate".to_string())
                        .spawn_scoped(scope, move || self.validate_one(image))
                })
                .collect();

            handles
                .into_iter()
                .zip(images)
                .map(|(handle, image)| match handle {
                    Ok(handle) => handle
                        .join()
                        .unwrap_or_else(|_| GeneratedImage::fallback_for(image)),
                    // Could not get a thread; validate inline instead.
                    Err(_) => self.validate_one(image),
                })
                .collect()
        })
    }

    pub fn validate_one(&self, image: &PendingImage) -> GeneratedImage {
        let first_url = image.candidates.first().cloned().unwrap_or_default();
        let mut state = CandidateState::new(image.candidates.iter().cloned());

        while !state.is_terminal() {
            state = match state {
                CandidateState::Pending {
                    remaining,
                    attempts,
                    last_failure,
                } => {
                    let next = CandidateState::Pending {
                        remaining,
                        attempts,
                        last_failure: None,
                    }
                    .begin_next();
                    if let (CandidateState::Attempting { url, attempt, .. }, Some(reason)) =
                        (&next, last_failure)
                    {
                        self.logger.info(
                            "Retrying image candidate",
                            json!({
                                "id": image.id,
                                "next": url,
                                "attempt": attempt,
                                "reason": reason,
                            }),
                        );
                    }
                    next
                }
                CandidateState::Attempting {
                    url,
                    attempt,
                    remaining,
                } => {
                    let outcome = self.run_probe(&url);
                    CandidateState::Attempting {
                        url,
                        attempt,
                        remaining,
                    }
                    .settle(&outcome)
                }
                terminal => terminal,
            };
        }

        match state {
            CandidateState::Accepted { url, attempts } => {
                self.logger.info(
                    "Image validated",
                    json!({ "id": image.id, "url": url, "attempts": attempts }),
                );
                GeneratedImage {
                    id: image.id.clone(),
                    url,
                    alt_text: image.alt_text.clone(),
                }
            }
            exhausted => {
                self.logger.error(
                    "All image candidates failed",
                    json!({
                        "id": image.id,
                        "original": first_url,
                        "attempts": exhausted.attempts(),
                    }),
                );
                GeneratedImage::fallback_for(image)
            }
        }
    }

    /// First settled wins: a probe still running at the deadline is
    /// abandoned and its late result dropped with the channel.
    fn run_probe(&self, url: &str) -> ProbeOutcome {
        if is_placeholder_url(url) {
            return ProbeOutcome::Skipped;
        }

        let (tx, rx) = mpsc::channel();
        let probe = Arc::clone(&self.probe);
        let busted = cache_busted(url, timestamp_millis());
        let spawned = thread::Builder::new()
            .name("image-probe".to_string())
            .spawn(move || {
                let _ = tx.send(probe.load(&busted));
            });
        if let Err(err) = spawned {
            return ProbeOutcome::Failed(format!("probe thread spawn failed: {err}"));
        }

        match rx.recv_timeout(self.probe_timeout) {
            Ok(Ok(())) => ProbeOutcome::Loaded,
            Ok(Err(err)) => ProbeOutcome::Failed(error_chain_text(&err, 256)),
            Err(mpsc::RecvTimeoutError::Timeout) => ProbeOutcome::TimedOut,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                ProbeOutcome::Failed("probe exited without a result".to_string())
            }
        }
    }
}

/// Adds a `cb` query parameter so a cached failure is not replayed. A
/// `#fragment` stays at the end.
pub fn cache_busted(url: &str, stamp: u128) -> String {
    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };
    let separator = if base.contains('?') { '&' } else { '?' };
    match fragment {
        Some(fragment) => format!("{base}{separator}cb={stamp}#{fragment}"),
        None => format!("{base}{separator}cb={stamp}"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use anyhow::{bail, Result};
    use moodboard_contracts::log::{LogLevel, Logger, MemorySink};
    use serde_json::json;

    use super::{
        cache_busted, CandidateState, GeneratedImage, ImageProbe, ImageValidator, PendingImage,
        ProbeOutcome,
    };

    #[derive(Debug, Clone, Copy)]
    pub(crate) enum Behavior {
        Load,
        Error,
        LoadAfter(Duration),
    }

    /// Scripted probe keyed by URL without the cache-buster; unknown URLs load.
    #[derive(Default)]
    pub(crate) struct FakeProbe {
        behaviors: HashMap<String, Behavior>,
        pub(crate) seen: Mutex<Vec<String>>,
    }

    impl FakeProbe {
        pub(crate) fn with(mut self, url: &str, behavior: Behavior) -> Self {
            self.behaviors.insert(url.to_string(), behavior);
            self
        }

        pub(crate) fn seen(&self) -> Vec<String> {
            self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
        }
    }

    impl ImageProbe for FakeProbe {
        fn load(&self, url: &str) -> Result<()> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(url.to_string());
            }
            let key = url.split("cb=").next().unwrap_or(url);
            let key = key.trim_end_matches(|ch: char| ch == '?' || ch == '&');
            match self.behaviors.get(key).copied().unwrap_or(Behavior::Load) {
                Behavior::Load => Ok(()),
                Behavior::Error => bail!("404 from {key}"),
                Behavior::LoadAfter(delay) => {
                    thread::sleep(delay);
                    Ok(())
                }
            }
        }
    }

    fn pending(id: &str, candidates: &[&str]) -> PendingImage {
        PendingImage {
            id: id.to_string(),
            alt_text: format!("alt {id}"),
            candidates: candidates.iter().map(|url| url.to_string()).collect(),
        }
    }

    fn validator(
        probe: FakeProbe,
        timeout: Duration,
    ) -> (Arc<FakeProbe>, Arc<MemorySink>, ImageValidator) {
        let probe = Arc::new(probe);
        let sink = Arc::new(MemorySink::new());
        let validator = ImageValidator::new(probe.clone(), timeout, Logger::new(sink.clone()));
        (probe, sink, validator)
    }

    #[test]
    fn first_loading_candidate_is_accepted_verbatim() {
        let (probe, sink, validator) = validator(FakeProbe::default(), Duration::from_secs(2));
        let results = validator.validate(&[pending(
            "brief-1",
            &["https://a.test/one?x=1", "https://b.test/two"],
        )]);

        assert_eq!(
            results,
            vec![GeneratedImage {
                id: "brief-1".to_string(),
                url: "https://a.test/one?x=1".to_string(),
                alt_text: "alt brief-1".to_string(),
            }]
        );
        let validated: Vec<_> = sink
            .entries()
            .into_iter()
            .filter(|entry| entry.message == "Image validated")
            .collect();
        assert_eq!(validated.len(), 1);
        assert_eq!(
            validated[0].data.as_ref().map(|data| data["attempts"].clone()),
            Some(json!(1))
        );
        assert_eq!(sink.count("Retrying image candidate"), 0);

        let seen = probe.seen();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with("https://a.test/one?x=1&cb="));
    }

    #[test]
    fn placeholder_candidate_is_never_probed_and_forces_fallback() {
        let probe = FakeProbe::default()
            .with("https://a.test/1", Behavior::Error)
            .with("https://b.test/2", Behavior::Error);
        let (probe, sink, validator) = validator(probe, Duration::from_secs(2));
        let image = pending(
            "brief-2",
            &[
                "https://a.test/1",
                "https://b.test/2",
                "https://placehold.co/400x300?text=fine",
            ],
        );
        let results = validator.validate(std::slice::from_ref(&image));

        assert_eq!(results, vec![GeneratedImage::fallback_for(&image)]);
        assert_eq!(results[0].id, "brief-2-fallback");
        assert_eq!(results[0].url, "https://placehold.co/400x300?text=image+failed");
        assert_eq!(results[0].alt_text, "alt brief-2 (fallback)");
        assert!(probe.seen().iter().all(|url| !url.contains("placehold.co")));
        assert_eq!(probe.seen().len(), 2);
        assert_eq!(sink.count("Retrying image candidate"), 2);
        let failed: Vec<_> = sink
            .entries()
            .into_iter()
            .filter(|entry| entry.message == "All image candidates failed")
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].level, LogLevel::Error);
    }

    #[test]
    fn retry_logs_carry_next_url_and_attempt_number() {
        let probe = FakeProbe::default().with("https://a.test/1", Behavior::Error);
        let (_, sink, validator) = validator(probe, Duration::from_secs(2));
        let results =
            validator.validate(&[pending("b", &["https://a.test/1", "https://b.test/2"])]);
        assert_eq!(results[0].url, "https://b.test/2");

        let retry = sink
            .entries()
            .into_iter()
            .find(|entry| entry.message == "Retrying image candidate")
            .and_then(|entry| entry.data)
            .unwrap_or_default();
        assert_eq!(retry["next"], json!("https://b.test/2"));
        assert_eq!(retry["attempt"], json!(2));
        let validated = sink
            .entries()
            .into_iter()
            .find(|entry| entry.message == "Image validated")
            .and_then(|entry| entry.data)
            .unwrap_or_default();
        assert_eq!(validated["attempts"], json!(2));
    }

    #[test]
    fn hung_probe_times_out_and_late_success_is_ignored() {
        let probe = FakeProbe::default()
            .with("https://slow.test/1", Behavior::LoadAfter(Duration::from_millis(600)));
        let (_, sink, validator) = validator(probe, Duration::from_millis(100));
        let started = Instant::now();
        let results = validator.validate(&[pending(
            "slow",
            &["https://slow.test/1", "https://fast.test/2"],
        )]);

        assert!(started.elapsed() < Duration::from_millis(550));
        assert_eq!(results[0].url, "https://fast.test/2");
        let retry = sink
            .entries()
            .into_iter()
            .find(|entry| entry.message == "Retrying image candidate")
            .and_then(|entry| entry.data)
            .unwrap_or_default();
        assert_eq!(retry["reason"], json!("timed out"));

        // Let the abandoned probe finish; nothing changes.
        thread::sleep(Duration::from_millis(700));
        assert_eq!(sink.count("Image validated"), 1);
    }

    #[test]
    fn images_validate_concurrently_and_keep_input_order() {
        let delay = Duration::from_millis(200);
        let mut probe = FakeProbe::default();
        let urls: Vec<String> = (0..4).map(|idx| format!("https://p.test/{idx}")).collect();
        for (idx, url) in urls.iter().enumerate() {
            // Later images finish first.
            let scaled = delay - Duration::from_millis(40 * idx as u64);
            probe = probe.with(url, Behavior::LoadAfter(scaled));
        }
        let (_, _, validator) = validator(probe, Duration::from_secs(2));
        let images: Vec<PendingImage> = urls
            .iter()
            .enumerate()
            .map(|(idx, url)| pending(&format!("img-{idx}"), &[url.as_str()]))
            .collect();

        let started = Instant::now();
        let results = validator.validate(&images);
        let elapsed = started.elapsed();

        // Serial would be 200 + 160 + 120 + 80 = 560ms.
        assert!(elapsed < Duration::from_millis(450), "took {elapsed:?}");
        let ids: Vec<&str> = results.iter().map(|image| image.id.as_str()).collect();
        assert_eq!(ids, vec!["img-0", "img-1", "img-2", "img-3"]);
        assert_eq!(results[3].url, "https://p.test/3");
    }

    #[test]
    fn image_without_candidates_falls_back() {
        let (probe, sink, validator) = validator(FakeProbe::default(), Duration::from_secs(1));
        let image = pending("empty", &[]);
        assert_eq!(
            validator.validate_one(&image),
            GeneratedImage::fallback_for(&image)
        );
        assert!(probe.seen().is_empty());
        assert_eq!(sink.count("All image candidates failed"), 1);
    }

    #[test]
    fn state_machine_transitions() {
        let state = CandidateState::new(vec!["a".to_string(), "b".to_string()]);
        let state = state.begin_next();
        assert!(matches!(
            &state,
            CandidateState::Attempting { url, attempt: 1, .. } if url == "a"
        ));
        let state = state.settle(&ProbeOutcome::TimedOut);
        assert!(matches!(
            &state,
            CandidateState::Pending { attempts: 1, last_failure: Some(reason), .. } if reason == "timed out"
        ));
        let state = state.begin_next().settle(&ProbeOutcome::Skipped).begin_next();
        assert_eq!(state, CandidateState::Exhausted { attempts: 2 });
        assert!(state.is_terminal());
        assert_eq!(state.attempts(), 2);

        let accepted = CandidateState::new(vec!["x".to_string()])
            .begin_next()
            .settle(&ProbeOutcome::Loaded);
        assert_eq!(
            accepted,
            CandidateState::Accepted {
                url: "x".to_string(),
                attempts: 1
            }
        );
        // Terminal states ignore further input.
        assert_eq!(accepted.clone().begin_next(), accepted);
        assert_eq!(accepted.clone().settle(&ProbeOutcome::TimedOut), accepted);
    }

    #[test]
    fn cache_buster_picks_the_right_separator() {
        assert_eq!(cache_busted("https://a/b", 5), "https://a/b?cb=5");
        assert_eq!(cache_busted("https://a/b?q=1", 5), "https://a/b?q=1&cb=5");
    }

    #[test]
    fn cache_buster_stays_ahead_of_the_fragment() {
        assert_eq!(cache_busted("https://a/b#x", 5), "https://a/b?cb=5#x");
        assert_eq!(
            cache_busted("https://a/b?q=1#top", 5),
            "https://a/b?q=1&cb=5#top"
        );
        assert_eq!(cache_busted("https://a/b?q=1#", 5), "https://a/b?q=1&cb=5#");
    }
}
