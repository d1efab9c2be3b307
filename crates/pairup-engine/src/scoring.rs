use std::collections::HashSet;

use pairup_types::models::{Group, Intent};

pub const INTENT_WEIGHT: u8 = 40;
pub const NEIGHBORHOOD_WEIGHT: u8 = 30;
pub const VIBE_WEIGHT: u8 = 20;
pub const SIZE_WEIGHT: u8 = 10;

const VIBE_POINTS_PER_TOKEN: u8 = 10;
const MIN_SHARED_PREFIX: usize = 3;

/// The fields of a group that take part in scoring.
#[derive(Debug, Clone, Copy)]
pub struct Profile<'a> {
    pub intent: Intent,
    pub neighborhood: &'a str,
    pub vibe: &'a str,
    pub size: u32,
}

impl<'a> From<&'a Group> for Profile<'a> {
    fn from(g: &'a Group) -> Self {
        Self {
            intent: g.intent,
            neighborhood: &g.neighborhood,
            vibe: &g.vibe,
            size: g.size,
        }
    }
}

/// Hard gate: the two exclusive intents never pair with each other.
pub fn intents_compatible(a: Intent, b: Intent) -> bool {
    a == b || !(a.is_exclusive() && b.is_exclusive())
}

pub fn intent_score(a: Intent, b: Intent) -> u8 {
    if !intents_compatible(a, b) {
        0
    } else if a == b {
        INTENT_WEIGHT
    } else if a == Intent::Any || b == Intent::Any {
        30
    } else {
        20
    }
}

pub fn neighborhood_score(a: &str, b: &str) -> u8 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    if a == b {
        return NEIGHBORHOOD_WEIGHT;
    }
    if a.contains(&b) || b.contains(&a) {
        return 20;
    }
    let shared_prefix = a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count();
    if shared_prefix >= MIN_SHARED_PREFIX { 10 } else { 0 }
}

fn vibe_tokens(vibe: &str) -> HashSet<String> {
    vibe.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

pub fn vibe_score(a: &str, b: &str) -> u8 {
    let shared = vibe_tokens(a).intersection(&vibe_tokens(b)).count();
    let points = shared.saturating_mul(VIBE_POINTS_PER_TOKEN as usize);
    points.min(VIBE_WEIGHT as usize) as u8
}

pub fn size_score(a: u32, b: u32) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    match a.abs_diff(b) {
        0 => SIZE_WEIGHT,
        1 => 7,
        2 => 4,
        3 => 1,
        _ => 0,
    }
}

/// 0–100 fit score; 0 when the intent gate fails.
pub fn score_profiles(a: &Profile<'_>, b: &Profile<'_>) -> u8 {
    if !intents_compatible(a.intent, b.intent) {
        return 0;
    }
    let total = intent_score(a.intent, b.intent) as u32
        + neighborhood_score(a.neighborhood, b.neighborhood) as u32
        + vibe_score(a.vibe, b.vibe) as u32
        + size_score(a.size, b.size) as u32;
    total.min(100) as u8
}

pub fn score(a: &Group, b: &Group) -> u8 {
    score_profiles(&Profile::from(a), &Profile::from(b))
}
