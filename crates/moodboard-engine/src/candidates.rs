use url::form_urlencoded::byte_serialize;
use url::Url;

pub const CANDIDATES_PER_BRIEF: usize = 3;

const KEYWORD_WORDS: usize = 4;
const SEED_WORDS: usize = 2;
const FALLBACK_TERM: &str = "wedding";
const PLACEHOLDER_HOST: &str = "placehold.co";

/// Ordered fallback image URLs for one brief, most preferred first.
///
/// 1. Unsplash featured keyword search
/// 2. Unsplash query-form variant of the same search
/// 3. Picsum seeded photo (independent provider)
///
/// `time_base + unique_index` becomes the uniqueness token; identical inputs give identical output.
pub fn synthesize(brief: &str, unique_index: u64, time_base: u64) -> Vec<String> {
    let words: Vec<&str> = brief
        .split(|ch: char| ch == ' ' || ch == ',')
        .filter(|word| !word.is_empty())
        .collect();
    let token = time_base.wrapping_add(unique_index);

    let keyword = match encode(&words[..words.len().min(KEYWORD_WORDS)].join(" ")) {
        encoded if encoded.is_empty() => FALLBACK_TERM.to_string(),
        encoded => encoded,
    };
    let seed_stem = match encode(&words[..words.len().min(SEED_WORDS)].join("-")) {
        encoded if encoded.is_empty() => FALLBACK_TERM.to_string(),
        encoded => encoded,
    };

    vec![
        format!("https://source.unsplash.com/featured/400x300?{keyword}&sig={token}"),
        format!("https://source.unsplash.com/400x300/?{keyword}&sig={token}"),
        format!("https://picsum.photos/seed/{seed_stem}-{token}/400/300"),
    ]
}

/// The always-available placeholder endpoint rendering `text`.
pub fn placeholder_url(text: &str) -> String {
    format!("https://{PLACEHOLDER_HOST}/400x300?text={}", encode(text))
}

/// Placeholder URLs are final fallbacks only and are never probed.
pub fn is_placeholder_url(url: &str) -> bool {
    url.contains(PLACEHOLDER_HOST)
}

/// Host of a candidate URL, e.g. `picsum.photos`.
pub fn provider_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
}

fn encode(raw: &str) -> String {
    byte_serialize(raw.as_bytes()).collect()
}
