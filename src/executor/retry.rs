//! Retry harness
//!
//! Invokes a task function until it stops returning `Errored` or the retry
//! budget is spent. The wait between attempts is fixed.

use crate::pipeline::{ResultState, WorkerResult};
use std::time::{Duration, Instant};

/// Runs `f` with up to `retry_count` retries, sleeping `wait` between them
///
/// `f` receives the 1-based attempt number. Without a function the result is
/// `Ignored`. Only `Errored` results are retried; the last failure is
/// returned once the budget is spent. The returned result records the
/// number of attempts and the duration of the last one.
pub fn retry_run<F>(f: Option<F>, retry_count: u32, wait: Duration) -> WorkerResult
where
    F: FnMut(u32) -> WorkerResult,
{
    let Some(mut f) = f else {
        return WorkerResult::ignored();
    };

    let mut attempt = 1;
    loop {
        let started = Instant::now();
        let mut result = f(attempt);
        result.attempts = attempt;
        result.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if result.state != ResultState::Errored || attempt > retry_count {
            if result.state == ResultState::Errored && retry_count > 0 {
                tracing::warn!(attempts = attempt, code = %result.error_code, "Retries exhausted");
            }
            return result;
        }

        tracing::info!(
            attempt,
            remaining = retry_count + 1 - attempt,
            wait_secs = wait.as_secs(),
            error = %result.error_message(),
            "Attempt failed, retrying"
        );
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::codes;
    use pretty_assertions::assert_eq;

    type Task = fn(u32) -> WorkerResult;

    #[test]
    fn test_success_runs_once() {
        let mut calls = 0;
        let result = retry_run(
            Some(|_| {
                calls += 1;
                WorkerResult::executed("ok")
            }),
            5,
            Duration::ZERO,
        );
        assert_eq!(calls, 1);
        assert_eq!(result.state, ResultState::Executed);
        assert_eq!(result.attempts, 1);
    }

    #[test]
    fn test_always_failing_runs_retry_count_plus_one() {
        let mut calls = 0;
        let result = retry_run(
            Some(|attempt| {
                calls += 1;
                WorkerResult::errored(codes::EXECUTION_FAILED, format!("attempt {attempt}"))
            }),
            3,
            Duration::ZERO,
        );
        assert_eq!(calls, 4);
        assert_eq!(result.attempts, 4);
        assert_eq!(result.error_message(), "attempt 4");
    }

    #[test]
    fn test_missing_function_is_ignored() {
        let result = retry_run(None::<Task>, 3, Duration::ZERO);
        assert_eq!(result.state, ResultState::Ignored);
        assert_eq!(result.error_code, codes::IGNORED);
    }

    #[test]
    fn test_ignored_is_not_retried() {
        let mut calls = 0;
        let result = retry_run(
            Some(|_| {
                calls += 1;
                WorkerResult::ignored()
            }),
            3,
            Duration::ZERO,
        );
        assert_eq!(calls, 1);
        assert!(result.state.is_ignored());
    }

    #[test]
    fn test_recovers_after_failures() {
        let result = retry_run(
            Some(|attempt| {
                if attempt < 3 {
                    WorkerResult::errored(codes::CONNECTION_FAILED, "down")
                } else {
                    WorkerResult::executed("up")
                }
            }),
            5,
            Duration::ZERO,
        );
        assert_eq!(result.state, ResultState::Executed);
        assert_eq!(result.attempts, 3);
    }

    #[test]
    fn test_waits_between_attempts() {
        let started = Instant::now();
        let _ = retry_run(
            Some(|_| WorkerResult::errored(codes::EXECUTION_FAILED, "no")),
            1,
            Duration::from_millis(50),
        );
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
