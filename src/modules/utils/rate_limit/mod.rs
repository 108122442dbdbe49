use dashmap::DashMap;
use governor::{
    clock::{QuantaClock, QuantaInstant},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    NotUntil, Quota, RateLimiter,
};
use std::{
    num::NonZeroU32,
    sync::{Arc, LazyLock},
};

/// Per-provider call throttling, keyed by a stable provider/connection tag
/// (e.g. "gmail", "graph", "openai"). Grounded in the donor's per-token
/// limiter, repurposed for outbound provider calls instead of inbound API
/// tokens since there is no REST surface in this core.
pub static PROVIDER_RATE_LIMITER: LazyLock<ProviderRateLimiter> =
    LazyLock::new(ProviderRateLimiter::new);

type Limiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock, NoOpMiddleware>;

pub struct ProviderRateLimiter {
    limiters: DashMap<String, Arc<Limiter>>,
}

impl ProviderRateLimiter {
    pub fn new() -> Self {
        ProviderRateLimiter {
            limiters: DashMap::new(),
        }
    }

    pub fn check(&self, key: &str, requests_per_second: u32) -> Result<(), NotUntil<QuantaInstant>> {
        let limiter = self.get_or_insert(key, requests_per_second);
        limiter.check()
    }

    fn get_or_insert(&self, key: &str, requests_per_second: u32) -> Arc<Limiter> {
        self.limiters
            .entry(key.to_string())
            .or_insert_with(|| {
                let quota =
                    Quota::per_second(NonZeroU32::new(requests_per_second.max(1)).unwrap());
                Arc::new(RateLimiter::direct_with_clock(quota, QuantaClock::default()))
            })
            .value()
            .clone()
    }
}
