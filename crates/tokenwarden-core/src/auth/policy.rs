use std::time::Duration;

/// Renewal cadence: every 14 minutes against a 15-minute token.
const DEFAULT_RENEWAL_INTERVAL_SECS: u64 = 14 * 60;

/// Renew at least this long before the token actually expires.
const DEFAULT_RENEWAL_MARGIN_SECS: u64 = 60;

/// Lifetime assumed when the backend does not report one.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 15 * 60;

/// Never arm a timer shorter than this, even for tokens that are nearly spent.
const MIN_RENEWAL_DELAY: Duration = Duration::from_secs(1);

/// When to renew an access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalPolicy {
    pub interval: Duration,
    pub margin: Duration,
    pub default_token_lifetime: Duration,
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_RENEWAL_INTERVAL_SECS),
            margin: Duration::from_secs(DEFAULT_RENEWAL_MARGIN_SECS),
            default_token_lifetime: Duration::from_secs(DEFAULT_TOKEN_LIFETIME_SECS),
        }
    }
}

impl RenewalPolicy {
    /// Delay before renewing a token that lives for `lifetime`.
    ///
    /// The fixed interval wins unless the token would expire within the
    /// margin first; tokens shorter than the margin renew at half-life.
    pub fn delay_for(&self, lifetime: Duration) -> Duration {
        let before_expiry = if lifetime > self.margin {
            lifetime - self.margin
        } else {
            lifetime / 2
        };
        self.interval.min(before_expiry).max(MIN_RENEWAL_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_fifteen_minute_token_renews_at_fourteen() {
        let policy = RenewalPolicy::default();
        assert_eq!(policy.delay_for(secs(900)), secs(840));
    }

    #[test]
    fn test_long_token_uses_fixed_interval() {
        let policy = RenewalPolicy::default();
        assert_eq!(policy.delay_for(secs(3600)), secs(840));
    }

    #[test]
    fn test_short_tokens() {
        let policy = RenewalPolicy::default();
        assert_eq!(policy.delay_for(secs(120)), secs(60));
        assert_eq!(policy.delay_for(secs(30)), secs(15));
        assert_eq!(policy.delay_for(secs(1)), MIN_RENEWAL_DELAY);
        assert_eq!(policy.delay_for(Duration::ZERO), MIN_RENEWAL_DELAY);
    }
}
