use std::time::Duration;

use tokio::time::Instant;

/// Token bucket for click messages.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tokens: u32,
    max_tokens: u32,
    refill_rate: Duration,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::new_with_limits(30, Duration::from_millis(100)) // Refill 1 token every 100ms
    }

    /// `clicks_per_second` tokens, refilled at that rate.
    pub fn per_second(clicks_per_second: u32) -> Self {
        let clicks_per_second = clicks_per_second.max(1);
        Self::new_with_limits(
            clicks_per_second,
            Duration::from_millis(1000 / u64::from(clicks_per_second)).max(Duration::from_millis(1)),
        )
    }

    pub fn new_with_limits(max_tokens: u32, refill_rate: Duration) -> Self {
        Self {
            tokens: max_tokens,
            max_tokens,
            refill_rate: refill_rate.max(Duration::from_millis(1)),
            last_refill: Instant::now(),
        }
    }

    pub fn check_rate_limit(&mut self) -> bool {
        self.refill_tokens();

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill_tokens(&mut self) {
        let time_passed = self.last_refill.elapsed();

        if time_passed >= self.refill_rate {
            let refills = time_passed.as_millis() / self.refill_rate.as_millis();
            let tokens_to_add = u32::try_from(refills).unwrap_or(u32::MAX);
            self.tokens = self.tokens.saturating_add(tokens_to_add).min(self.max_tokens);
            // Keep the remainder so partial intervals still count
            self.last_refill += self.refill_rate * tokens_to_add;
        }
    }

    pub fn get_remaining_tokens(&mut self) -> u32 {
        self.refill_tokens();
        self.tokens
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bucket_drains_and_refills() {
        let mut limiter = RateLimiter::new_with_limits(3, Duration::from_millis(500));

        assert!(limiter.check_rate_limit());
        assert!(limiter.check_rate_limit());
        assert!(limiter.check_rate_limit());
        assert!(!limiter.check_rate_limit());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(limiter.get_remaining_tokens(), 1);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(limiter.get_remaining_tokens(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_second_refill() {
        let mut limiter = RateLimiter::per_second(10);
        for _ in 0..10 {
            assert!(limiter.check_rate_limit());
        }
        assert!(!limiter.check_rate_limit());

        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(limiter.get_remaining_tokens(), 2);
    }
}
