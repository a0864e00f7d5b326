//! State convergence
//!
//! Polls a remote object until it reports a target state a required number of
//! times in a row. The remote API is read-replicated: a read can return a
//! stale "Succeeded" followed by "Provisioning" on the next read, so a single
//! target observation is not trusted on its own.
//!
//! Every poll fetches fresh state through the caller's refresh function; no
//! observation is cached between polls.

use crate::error::{CloudError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// Default lower bound between two refreshes
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(10);

/// Ceiling of the backoff between two refreshes when no fixed interval is set
pub const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Default number of "gone" observations tolerated before giving up
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// What a single refresh saw
#[derive(Debug, Clone, PartialEq)]
pub enum Observation<T> {
    /// The object exists and reports `state`
    Found { object: T, state: String },
    /// The object does not exist (yet, or any more)
    Gone,
}

impl<T> Observation<T> {
    pub fn found(object: T, state: impl Into<String>) -> Self {
        Observation::Found {
            object,
            state: state.into(),
        }
    }

    pub fn state(&self) -> Option<&str> {
        match self {
            Observation::Found { state, .. } => Some(state),
            Observation::Gone => None,
        }
    }

    pub fn into_object(self) -> Option<T> {
        match self {
            Observation::Found { object, .. } => Some(object),
            Observation::Gone => None,
        }
    }
}

/// Classification of one observation
#[derive(Debug)]
pub enum Poll<T> {
    Pending,
    Converged(T),
    Failed(CloudError),
}

/// Parameters of one convergence wait
#[derive(Debug, Clone)]
pub struct ReconcileSpec {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    /// Treat a gone object as the target (waiting for a deletion)
    pub target_gone: bool,
    /// Absolute deadline
    pub deadline: Instant,
    /// Wait before the first refresh
    pub delay: Duration,
    pub min_interval: Duration,
    /// Fixed interval between refreshes; exponential backoff when unset
    pub poll_interval: Option<Duration>,
    /// Consecutive target observations required to converge (≥ 1)
    pub continuous_target_occurrence: u32,
    pub not_found_checks: u32,
}

impl ReconcileSpec {
    pub fn new<P, T>(pending: P, target: T, deadline: Instant) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            target_gone: false,
            deadline,
            delay: Duration::ZERO,
            min_interval: DEFAULT_MIN_INTERVAL,
            poll_interval: None,
            continuous_target_occurrence: 1,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
        }
    }

    /// Wait for an object to disappear while it reports one of `pending`
    pub fn until_gone<P>(pending: P, deadline: Instant) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
    {
        let mut spec = Self::new(pending, Vec::<String>::new(), deadline);
        spec.target_gone = true;
        spec
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Option<Duration>) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_continuous_target_occurrence(mut self, occurrence: u32) -> Self {
        self.continuous_target_occurrence = occurrence;
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.continuous_target_occurrence == 0 {
            return Err(CloudError::InvalidConfig(
                "continuous target occurrence must be at least 1".to_string(),
            ));
        }
        if self.target.is_empty() && !self.target_gone {
            return Err(CloudError::InvalidConfig(
                "a reconcile needs at least one target state".to_string(),
            ));
        }
        if self.min_interval.is_zero() {
            return Err(CloudError::InvalidConfig(
                "minimum poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Time to sleep after the given (1-based) refresh attempt
    pub fn wait_after(&self, attempt: u32) -> Duration {
        if let Some(interval) = self.poll_interval {
            return interval.max(self.min_interval);
        }
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self.min_interval.saturating_mul(1 << exponent);
        backoff.min(MAX_BACKOFF).max(self.min_interval)
    }

    fn classify<T>(&self, observation: Observation<T>, not_found: &mut u32) -> Poll<Observation<T>> {
        let Some(state) = observation.state().map(str::to_string) else {
            if self.target_gone {
                return Poll::Converged(observation);
            }
            *not_found += 1;
            if *not_found > self.not_found_checks {
                return Poll::Failed(CloudError::NotFound(format!(
                    "object not found after {} checks while waiting for {:?}",
                    not_found, self.target
                )));
            }
            return Poll::Pending;
        };
        *not_found = 0;

        if self.target.contains(&state) {
            Poll::Converged(observation)
        } else if self.pending.contains(&state) {
            Poll::Pending
        } else {
            Poll::Failed(CloudError::UnexpectedState {
                state,
                expected: self.pending.iter().chain(&self.target).cloned().collect(),
            })
        }
    }
}

/// Poll `refresh` until the target state has been observed
/// `continuous_target_occurrence` times in a row.
///
/// - A refresh error aborts immediately.
/// - A state outside both sets aborts with [`CloudError::UnexpectedState`].
/// - The deadline is checked before every refresh; a deadline that has
///   already passed returns [`CloudError::Timeout`] without calling `refresh`.
///
/// Returns the final (target) observation.
pub async fn reconcile<T, F, Fut>(spec: &ReconcileSpec, mut refresh: F) -> Result<Observation<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation<T>>>,
{
    spec.validate()?;

    let started = Instant::now();
    let timeout = spec.deadline.saturating_duration_since(started);

    if !spec.delay.is_zero() {
        sleep_until((started + spec.delay).min(spec.deadline)).await;
    }

    let mut attempt: u32 = 0;
    let mut hits: u32 = 0;
    let mut not_found: u32 = 0;
    let mut last_state: Option<String> = None;

    loop {
        if Instant::now() >= spec.deadline {
            tracing::debug!(
                "Deadline reached waiting for {:?} after {} refreshes",
                spec.target,
                attempt
            );
            return Err(CloudError::Timeout {
                timeout,
                last_state,
                target: spec.target.clone(),
            });
        }

        attempt = attempt.saturating_add(1);
        let observation = refresh().await?;
        last_state = observation.state().map(str::to_string);
        tracing::debug!(
            "Refresh {}: state {:?} (waiting for {:?})",
            attempt,
            last_state,
            spec.target
        );

        match spec.classify(observation, &mut not_found) {
            Poll::Converged(observation) => {
                hits += 1;
                if hits >= spec.continuous_target_occurrence {
                    return Ok(observation);
                }
            }
            Poll::Pending => hits = 0,
            Poll::Failed(e) => return Err(e),
        }

        let wake = Instant::now() + spec.wait_after(attempt);
        sleep_until(wake.min(spec.deadline)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn seen(object: usize, state: &str) -> Result<Observation<usize>> {
        Ok(Observation::found(object, state))
    }

    fn in_secs(secs: u64) -> Instant {
        Instant::now() + Duration::from_secs(secs)
    }

    fn sequence(states: &[&'static str]) -> impl FnMut() -> std::future::Ready<Result<Observation<usize>>> {
        let states = states.to_vec();
        let mut n = 0;
        move || {
            let state = states.get(n).or(states.last()).copied().unwrap_or("Succeeded");
            n += 1;
            std::future::ready(seen(n, state))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_after_consecutive_targets() {
        let spec = ReconcileSpec::new(["Provisioning"], ["Succeeded"], in_secs(600))
            .with_min_interval(Duration::from_secs(1))
            .with_continuous_target_occurrence(3);

        let k = 4;
        let calls = AtomicUsize::new(0);
        let result = reconcile(&spec, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let state = if n < k { "Provisioning" } else { "Succeeded" };
            std::future::ready(seen(n + 1, state))
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), k + 3);
        assert_eq!(result, Observation::found(k + 3, "Succeeded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flap_resets_the_counter() {
        let spec = ReconcileSpec::new(["Provisioning"], ["Succeeded"], in_secs(600))
            .with_min_interval(Duration::from_secs(1))
            .with_continuous_target_occurrence(3);

        let result = reconcile(
            &spec,
            sequence(&[
                "Succeeded",
                "Provisioning",
                "Succeeded",
                "Succeeded",
                "Succeeded",
                "Provisioning",
            ]),
        )
        .await
        .unwrap();

        // converged on the fifth refresh, before the trailing "Provisioning"
        assert_eq!(result.into_object(), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_never_refreshes() {
        let spec = ReconcileSpec::new(["Provisioning"], ["Succeeded"], Instant::now());

        let calls = AtomicUsize::new(0);
        let err = reconcile(&spec, || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(seen(0, "Succeeded"))
        })
        .await
        .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_error_aborts() {
        let spec = ReconcileSpec::new(["Provisioning"], ["Succeeded"], in_secs(600));

        let calls = AtomicUsize::new(0);
        let err = reconcile(&spec, || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err::<Observation<usize>, _>(CloudError::Transport(
                "connection reset".to_string(),
            )))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, CloudError::Transport(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_state_carries_raw_value() {
        let spec = ReconcileSpec::new(["Provisioning"], ["Succeeded"], in_secs(600))
            .with_min_interval(Duration::from_secs(1));

        let err = reconcile(&spec, sequence(&["Provisioning", "Failed"]))
            .await
            .unwrap_err();

        match err {
            CloudError::UnexpectedState { state, expected } => {
                assert_eq!(state, "Failed");
                assert_eq!(expected, vec!["Provisioning", "Succeeded"]);
            }
            other => panic!("expected UnexpectedState, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_last_state_and_respects_interval() {
        let spec = ReconcileSpec::new(["Provisioning"], ["Succeeded"], in_secs(30))
            .with_min_interval(Duration::from_secs(1));

        let seen_at = Mutex::new(Vec::new());
        let err = reconcile(&spec, || {
            seen_at.lock().unwrap().push(Instant::now());
            std::future::ready(seen(0, "Provisioning"))
        })
        .await
        .unwrap_err();

        match err {
            CloudError::Timeout {
                timeout,
                last_state,
                target,
            } => {
                assert_eq!(timeout, Duration::from_secs(30));
                assert_eq!(last_state.as_deref(), Some("Provisioning"));
                assert_eq!(target, vec!["Succeeded"]);
            }
            other => panic!("expected Timeout, got {other:?}"),
        }

        // backoff 1, 2, 4, 8, 10 -> refreshes at t = 0, 1, 3, 7, 15, 25
        let seen_at = seen_at.into_inner().unwrap();
        assert_eq!(seen_at.len(), 6);
        for pair in seen_at.windows(2) {
            assert!(pair[1] - pair[0] >= spec.min_interval);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_poll_interval() {
        let spec = ReconcileSpec::new(["Provisioning"], ["Succeeded"], in_secs(600))
            .with_min_interval(Duration::from_secs(1))
            .with_poll_interval(Some(Duration::from_secs(5)));

        let start = Instant::now();
        reconcile(&spec, sequence(&["Provisioning", "Provisioning", "Succeeded"]))
            .await
            .unwrap();
        assert_eq!(Instant::now() - start, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_before_first_refresh() {
        let spec = ReconcileSpec::new(["Provisioning"], ["Succeeded"], in_secs(600))
            .with_delay(Duration::from_secs(30));

        let start = Instant::now();
        let first = Mutex::new(None);
        reconcile(&spec, || {
            first.lock().unwrap().get_or_insert(Instant::now());
            std::future::ready(seen(0, "Succeeded"))
        })
        .await
        .unwrap();

        let first = first.into_inner().unwrap().unwrap();
        assert!(first - start >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gone_counts_toward_not_found_checks() {
        let spec = ReconcileSpec::new(["Provisioning"], ["Succeeded"], in_secs(600))
            .with_min_interval(Duration::from_secs(1))
            .with_not_found_checks(2);

        let calls = AtomicUsize::new(0);
        let err = reconcile(&spec, || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok::<Observation<usize>, CloudError>(Observation::Gone))
        })
        .await
        .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_gone() {
        let spec = ReconcileSpec::until_gone(["Deleting"], in_secs(600))
            .with_min_interval(Duration::from_secs(1));

        let mut n = 0;
        let result = reconcile(&spec, || {
            n += 1;
            let observation = if n < 3 {
                Observation::found(n, "Deleting")
            } else {
                Observation::Gone
            };
            std::future::ready(Ok::<_, CloudError>(observation))
        })
        .await
        .unwrap();

        assert_eq!(result, Observation::Gone);
        assert_eq!(n, 3);
    }

    #[test]
    fn test_validate() {
        let deadline = Instant::now();
        let spec = ReconcileSpec::new(["A"], ["B"], deadline).with_continuous_target_occurrence(0);
        assert!(matches!(spec.validate(), Err(CloudError::InvalidConfig(_))));

        let spec = ReconcileSpec::new(["A"], Vec::<String>::new(), deadline);
        tokio_test::assert_err!(spec.validate());

        let spec = ReconcileSpec::new(["A"], ["B"], deadline).with_min_interval(Duration::ZERO);
        tokio_test::assert_err!(spec.validate());

        tokio_test::assert_ok!(ReconcileSpec::until_gone(["Deleting"], deadline).validate());
    }

    #[test]
    fn test_backoff_schedule() {
        let spec = ReconcileSpec::new(["A"], ["B"], Instant::now())
            .with_min_interval(Duration::from_millis(500));
        assert_eq!(spec.wait_after(1), Duration::from_millis(500));
        assert_eq!(spec.wait_after(2), Duration::from_secs(1));
        assert_eq!(spec.wait_after(3), Duration::from_secs(2));
        assert_eq!(spec.wait_after(10), MAX_BACKOFF);

        let slow = spec.clone().with_min_interval(Duration::from_secs(30));
        assert_eq!(slow.wait_after(5), Duration::from_secs(30));
    }
}
