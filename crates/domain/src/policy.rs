use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Lower bound for cached policy TTLs (seconds). Resolver results below this
/// are lifted so Postfix does not hammer the resolvers.
pub const CACHE_MIN_TTL: u32 = 180;

/// Upper bound for cached policy TTLs (seconds, 30 days).
pub const CACHE_MAX_TTL: u32 = 2_592_000;

/// TTL used when no policy exists for a domain (negative caching).
pub const CACHE_NOTFOUND_TTL: u32 = 600;

/// Entries that have not been requested for this long (seconds) stop being
/// prefetched and are removed once expired.
pub const CACHE_MAX_AGE: u64 = 86_400;

/// Prefetcher sweep interval in seconds; entries whose remaining TTL falls
/// below this are refreshed early.
pub const PREFETCH_INTERVAL: u64 = 30;

/// Per-exchange deadline for DNS and HTTPS requests. A combined resolution
/// runs under twice this budget.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause before the single retry granted to transient DNS/HTTP failures.
pub const RETRY_DELAY: Duration = Duration::from_millis(750);

/// Upper bound of the uniform jitter added to `expires_at` (seconds), so
/// batches of entries do not expire in lockstep.
pub const EXPIRY_JITTER_MAX: u64 = 15;

/// Policy string signalling a transient resolution failure. Returned to the
/// MTA but never cached.
pub const POLICY_TEMP: &str = "TEMP";

/// Canonical cache-key form of a domain: trimmed, lowercased, with a single
/// trailing dot stripped.
pub fn normalize_domain(input: &str) -> String {
    let domain = input.trim().to_ascii_lowercase();
    match domain.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => domain,
    }
}

/// One cached policy decision, keyed by its normalised `domain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub domain: String,
    /// Policy string as delivered to the MTA, or empty for "no policy".
    pub policy: String,
    /// TLS-RPT report fragment, may be empty.
    pub report: String,
    /// Policy TTL in seconds at the time of resolution.
    pub ttl: u32,
    pub expires_at: SystemTime,
    pub last_update: SystemTime,
}

impl PolicyEntry {
    /// Seconds since the entry was created by an actual MTA query.
    /// Prefetch refreshes do not reset this.
    pub fn age(&self, now: SystemTime) -> u64 {
        now.duration_since(self.last_update)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }

    /// Seconds until expiry, saturating at zero.
    pub fn remaining_ttl(&self, now: SystemTime) -> u32 {
        self.expires_at
            .duration_since(now)
            .map(|d| d.as_secs().min(u32::MAX as u64) as u32)
            .unwrap_or(0)
    }

    /// Signed seconds until expiry; negative once the entry has expired.
    pub fn remaining_secs(&self, now: SystemTime) -> i64 {
        match self.expires_at.duration_since(now) {
            Ok(d) => d.as_secs().min(i64::MAX as u64) as i64,
            Err(e) => -(e.duration().as_secs().min(i64::MAX as u64) as i64),
        }
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.remaining_ttl(now) == 0
    }

    pub fn is_aged_out(&self, now: SystemTime) -> bool {
        self.age(now) >= CACHE_MAX_AGE
    }
}
