// ── Debug-dump redaction ──
//
// Whole-value text substitutions over a serialized JSON document, applied
// in a fixed order. Identifiers keep their linkage (one replacement per
// distinct value); timestamps keep their relative order. Text that matches
// no pattern is left byte-for-byte intact.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::{Captures, Regex};
use uuid::Builder;

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("valid regex")
});

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{13}\b").expect("valid regex"));

static COORDINATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(-?\d{1,3})\.(\d{4,})""#).expect("valid regex"));

static FRIENDLY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"("friendlyName"\s*:\s*")((?:[^"\\]|\\.)*)(")"#).expect("valid regex")
});

static MAC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([0-9a-fA-F]{12})""#).expect("valid regex"));

static SSID_CLASS_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"("functionClass"\s*:\s*"wifi-ssid"[^{}]*?"value"\s*:\s*")((?:[^"\\]|\\.)*)(")"#)
        .expect("valid regex")
});

static SSID_VALUE_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"("value"\s*:\s*")((?:[^"\\]|\\.)*)("[^{}]*?"functionClass"\s*:\s*"wifi-ssid")"#)
        .expect("valid regex")
});

/// Largest step added between consecutive distinct timestamps (one day).
const MAX_TIMESTAMP_STEP_MS: u64 = 86_400_000;

/// Redacts identifying values from a JSON dump.
pub struct Anonymizer {
    rng: StdRng,
}

impl Default for Anonymizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Anonymizer {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible output, for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn redact(&mut self, text: &str) -> String {
        let text = self.replace_uuids(text);
        let text = self.shift_timestamps(&text);
        let text = self.replace_coordinates(&text);
        let text = relabel(&FRIENDLY_NAME, &text, "Friendly Name");
        let text = self.replace_macs(&text);
        redact_ssids(&text)
    }

    fn replace_uuids(&mut self, text: &str) -> String {
        let mut seen: HashMap<String, String> = HashMap::new();
        UUID.replace_all(text, |caps: &Captures<'_>| {
            let original = caps[0].to_owned();
            seen.entry(original)
                .or_insert_with(|| {
                    let mut bytes = [0u8; 16];
                    self.rng.fill(&mut bytes);
                    Builder::from_random_bytes(bytes).into_uuid().to_string()
                })
                .clone()
        })
        .into_owned()
    }

    /// Each distinct timestamp, taken in ascending order, gets a running
    /// offset that grows by at least one per step. Order is preserved.
    fn shift_timestamps(&mut self, text: &str) -> String {
        let distinct: BTreeSet<u64> = TIMESTAMP
            .find_iter(text)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();

        let mut offset = 0u64;
        let mut shifted: BTreeMap<u64, u64> = BTreeMap::new();
        for ts in distinct {
            offset = offset.saturating_add(self.rng.gen_range(1..=MAX_TIMESTAMP_STEP_MS));
            shifted.insert(ts, ts.saturating_add(offset));
        }

        TIMESTAMP
            .replace_all(text, |caps: &Captures<'_>| {
                caps[0]
                    .parse::<u64>()
                    .ok()
                    .and_then(|ts| shifted.get(&ts))
                    .map_or_else(|| caps[0].to_owned(), u64::to_string)
            })
            .into_owned()
    }

    fn replace_coordinates(&mut self, text: &str) -> String {
        COORDINATE
            .replace_all(text, |caps: &Captures<'_>| {
                let decimals = caps[2].len();
                let value: f64 = self.rng.gen_range(-90.0..90.0);
                format!("\"{value:.decimals$}\"")
            })
            .into_owned()
    }

    fn replace_macs(&mut self, text: &str) -> String {
        MAC.replace_all(text, |_: &Captures<'_>| {
            let digits: String = (0..12)
                .map(|_| {
                    let nibble: u32 = self.rng.gen_range(0..16);
                    char::from_digit(nibble, 16).unwrap_or('0')
                })
                .collect();
            format!("\"{digits}\"")
        })
        .into_owned()
    }
}

/// Redact with a fresh random generator.
pub fn redact(text: &str) -> String {
    Anonymizer::new().redact(text)
}

/// Replace group 2 of every match with `"{label} {n}"`, numbering distinct
/// values in first-seen order.
fn relabel(pattern: &Regex, text: &str, label: &str) -> String {
    let mut seen: HashMap<String, usize> = HashMap::new();
    pattern
        .replace_all(text, |caps: &Captures<'_>| {
            let next = seen.len();
            let n = *seen.entry(caps[2].to_owned()).or_insert(next);
            format!("{}{label} {n}{}", &caps[1], &caps[3])
        })
        .into_owned()
}

fn redact_ssids(text: &str) -> String {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut label = |caps: &Captures<'_>| {
        let next = seen.len();
        let n = *seen.entry(caps[2].to_owned()).or_insert(next);
        format!("{}SSID {n}{}", &caps[1], &caps[3])
    };
    let text = SSID_CLASS_FIRST.replace_all(text, &mut label).into_owned();
    SSID_VALUE_FIRST.replace_all(&text, &mut label).into_owned()
}
