//! Human readable public identifiers such as `sunny-otter-42`.

use chrono::Utc;
use rand::Rng;
use std::future::Future;
use tracing::{debug, warn};

const ADJECTIVES: &[&str] = &[
    "amber", "brave", "calm", "clever", "cosy", "crisp", "curious", "daring", "eager", "fancy",
    "gentle", "golden", "happy", "jolly", "kind", "lively", "lucky", "mellow", "merry", "misty",
    "nimble", "proud", "quick", "quiet", "rapid", "rosy", "shiny", "silver", "snowy", "sunny",
    "swift", "witty",
];

const NOUNS: &[&str] = &[
    "badger", "beaver", "bison", "crane", "falcon", "ferret", "finch", "fox", "gecko", "heron",
    "ibis", "koala", "lemur", "lynx", "marten", "moose", "newt", "otter", "owl", "panda", "puffin",
    "quail", "raven", "robin", "salmon", "seal", "sparrow", "stork", "tapir", "tiger", "walrus",
    "wren",
];

/// One random `<adjective>-<noun>-<10..=99>` identifier.
pub fn candidate<R: Rng>(rng: &mut R) -> String {
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
    let number: u8 = rng.gen_range(10..=99);
    format!("{adjective}-{noun}-{number}")
}

/// Draws candidates until `taken` reports a free one, up to `max_attempts`.
///
/// When every attempt collides the last candidate gets a timestamp suffix, so
/// collisions alone never fail. Errors from `taken` itself are returned.
pub async fn mint<R, F, Fut, E>(rng: &mut R, mut taken: F, max_attempts: u32) -> Result<String, E>
where
    R: Rng,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let mut last = None;
    for attempt in 1..=max_attempts {
        let next = candidate(rng);
        if !taken(next.clone()).await? {
            return Ok(next);
        }
        debug!(attempt, candidate = %next, "share id already taken");
        last = Some(next);
    }

    let base = last.unwrap_or_else(|| candidate(rng));
    let fallback = format!("{base}-{:x}", Utc::now().timestamp_millis());
    warn!(attempts = max_attempts, share_id = %fallback, "share ids exhausted, using timestamp suffix");
    Ok(fallback)
}
