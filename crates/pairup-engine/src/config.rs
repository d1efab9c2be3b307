use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// What ending a match does to the swipe history between the two groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochPolicy {
    /// Clear decisions and likes between the pair in both directions, so the
    /// two groups can surface for each other again.
    ResetOnTeardown,
    /// Keep prior decisions; the pair stays hidden from each other.
    KeepHistory,
}

impl FromStr for EpochPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" | "reset-on-teardown" => Ok(Self::ResetOnTeardown),
            "keep" | "keep-history" => Ok(Self::KeepHistory),
            other => Err(format!("unknown epoch policy '{}'", other)),
        }
    }
}

/// Engine tunables. The server overlays environment values on `Default`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Candidates scoring below this are dropped.
    pub min_score: u8,
    /// Upper bound on the ranked list returned to a client.
    pub max_candidates: usize,
    /// Upper bound on groups examined per search.
    pub scan_limit: usize,
    pub search_timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: u64,
    pub retry: RetryPolicy,
    pub epoch_policy: EpochPolicy,
    pub venue_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_score: 30,
            max_candidates: 10,
            scan_limit: 200,
            search_timeout: Duration::from_secs(3),
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 10_000,
            retry: RetryPolicy::default(),
            epoch_policy: EpochPolicy::ResetOnTeardown,
            venue_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_policy_parses_short_and_long_names() {
        assert_eq!("reset".parse::<EpochPolicy>(), Ok(EpochPolicy::ResetOnTeardown));
        assert_eq!("Keep-History".parse::<EpochPolicy>(), Ok(EpochPolicy::KeepHistory));
        assert!("sometimes".parse::<EpochPolicy>().is_err());
    }
}
