use failsafe::{backoff, failure_policy, Config, StateMachine};
use std::time::Duration;

/// Consecutive failed lookups that open the breaker.
pub const LOOKUP_FAILURE_THRESHOLD: u32 = 5;

/// Breaker type shared by the HTTP enrichment source.
pub type LookupCircuitBreaker =
    StateMachine<failure_policy::ConsecutiveFailures<backoff::Exponential>, ()>;

/// Creates a circuit breaker for external enrichment lookups.
///
/// After 5 consecutive failures the breaker opens and calls fail fast;
/// it retries after an exponential backoff of 10s growing to 60s.
/// Clones share state, so one breaker guards every lookup of a source.
pub fn create_lookup_circuit_breaker() -> LookupCircuitBreaker {
    let backoff_strategy = backoff::exponential(Duration::from_secs(10), Duration::from_secs(60));

    let failure_policy =
        failure_policy::consecutive_failures(LOOKUP_FAILURE_THRESHOLD, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}
