use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{Config, StateMachine};
use std::time::Duration;

/// Circuit breaker guarding the language-model endpoint.
pub type LlmCircuitBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates the circuit breaker used around language-model calls.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures trigger the OPEN state.
/// - **Backoff**: exponential from 10s to 60s before a trial call is let through.
///
/// While OPEN, calls are rejected without touching the network and the
/// conversation gets the warming-up reply instead.
pub fn create_llm_circuit_breaker() -> LlmCircuitBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use failsafe::{CircuitBreaker, Error};

    #[test]
    fn test_circuit_breaker_opens_after_failures() {
        let cb = create_llm_circuit_breaker();

        for _ in 0..5 {
            let result: Result<(), Error<&str>> = cb.call(|| Err::<(), &str>("model loading"));
            assert!(result.is_err());
        }

        let result: Result<(), Error<&str>> = cb.call(|| Ok::<(), &str>(()));

        match result {
            Err(Error::Rejected) => {}
            _ => panic!("Expected circuit to be open and reject requests"),
        }
    }

    #[test]
    fn test_circuit_breaker_allows_success() {
        let cb = create_llm_circuit_breaker();

        let result: Result<&str, Error<&str>> = cb.call(|| Ok::<&str, &str>("Bonjour"));

        assert_eq!(result.unwrap(), "Bonjour");
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = create_llm_circuit_breaker();

        for _ in 0..4 {
            let _: Result<(), Error<&str>> = cb.call(|| Err::<(), &str>("timeout"));
        }
        let _: Result<(), Error<&str>> = cb.call(|| Ok::<(), &str>(()));
        for _ in 0..4 {
            let _: Result<(), Error<&str>> = cb.call(|| Err::<(), &str>("timeout"));
        }

        assert!(cb.is_call_permitted());
    }
}
