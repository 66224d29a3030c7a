#[cfg(test)]
mod tests {
    use super::super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio_test::{assert_err, assert_ok};

    /// Replays `states` in order, repeating the last one. The value of each
    /// observation is its 1-based call number.
    fn scripted(
        states: &'static [&'static str],
        calls: Arc<AtomicUsize>,
    ) -> impl FnMut() -> std::future::Ready<Result<Observation<usize>, io::Error>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let state = states.get(n).or(states.last()).copied().unwrap_or("");
            std::future::ready(Ok(Observation::new(n + 1, state)))
        }
    }

    fn build_waiter() -> Waiter {
        Waiter::new(&["BUILD"], &["ACTIVE"])
            .unwrap()
            .delay(Duration::ZERO)
            .poll_interval(Duration::ZERO)
    }

    #[tokio::test(start_paused = true)]
    async fn returns_third_snapshot_after_two_pending() {
        let calls = Arc::new(AtomicUsize::new(0));

        let value = build_waiter()
            .wait(&Context::new(), scripted(&["BUILD", "BUILD", "ACTIVE"], calls.clone()))
            .await
            .unwrap();

        assert_eq!(value, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn success_within_timing_bound() {
        let calls = Arc::new(AtomicUsize::new(0));
        let waiter = Waiter::new(&["BUILD"], &["ACTIVE"])
            .unwrap()
            .delay(Duration::from_secs(5))
            .poll_interval(Duration::from_secs(10))
            .timeout(Duration::from_secs(600));

        let start = Instant::now();
        let value = waiter
            .wait(
                &Context::new(),
                scripted(&["BUILD", "BUILD", "BUILD", "ACTIVE"], calls.clone()),
            )
            .await;

        assert_eq!(assert_ok!(value), Some(4));
        assert!(start.elapsed() <= Duration::from_secs(5 + 3 * 10));
    }

    #[tokio::test(start_paused = true)]
    async fn error_state_fails_with_fault() {
        let calls = Arc::new(AtomicUsize::new(0));
        let waiter = build_waiter();

        let err = waiter
            .wait(&Context::new(), {
                let calls = calls.clone();
                move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    std::future::ready(Ok::<_, io::Error>(
                        Observation::new((), "ERROR").with_fault("quota exceeded"),
                    ))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, WaitError::UnexpectedState { ref state, .. } if state == "ERROR"));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_stops_refreshing_at_deadline() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let waiter = Waiter::new(&["BUILD"], &["ACTIVE"])
            .unwrap()
            .poll_interval(Duration::from_secs(10))
            .timeout(Duration::from_secs(35));

        let start = Instant::now();
        let err = waiter
            .wait(&Context::new(), {
                let seen = seen.clone();
                move || {
                    if let Ok(mut seen) = seen.lock() {
                        seen.push(Instant::now());
                    }
                    std::future::ready(Ok::<_, io::Error>(Observation::new((), "BUILD")))
                }
            })
            .await
            .unwrap_err();

        match &err {
            WaitError::Timeout { last_state, .. } => {
                assert_eq!(last_state.as_deref(), Some("BUILD"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(err.is_timeout());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|t| *t < start + Duration::from_secs(35)));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_refresh_is_abandoned_at_deadline() {
        let waiter = build_waiter().timeout(Duration::from_secs(30));

        let start = Instant::now();
        let result = waiter
            .wait(&Context::new(), || async {
                time::sleep(Duration::from_secs(3600)).await;
                Ok::<_, io::Error>(Observation::new((), "ACTIVE"))
            })
            .await;

        assert!(assert_err!(result).is_timeout());
        assert!(start.elapsed() <= Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_error_aborts_on_that_call() {
        let calls = Arc::new(AtomicUsize::new(0));

        let err = build_waiter()
            .wait(&Context::new(), {
                let calls = calls.clone();
                move || {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    std::future::ready(if n == 3 {
                        Err(io::Error::new(io::ErrorKind::Other, "connection reset"))
                    } else {
                        Ok(Observation::new((), "BUILD"))
                    })
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, WaitError::Refresh(_)));
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_state_fails_by_default() {
        let calls = Arc::new(AtomicUsize::new(0));

        let err = build_waiter()
            .wait(&Context::new(), scripted(&["BUILD", "WARMING", "ACTIVE"], calls.clone()))
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::UnexpectedState { ref state, .. } if state == "WARMING"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn tolerated_states_keep_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let waiter = build_waiter()
            .unknown_states(UnknownStatePolicy::Tolerate(vec!["WARMING".to_string()]));

        let value = waiter
            .wait(&Context::new(), scripted(&["BUILD", "WARMING", "ACTIVE"], calls.clone()))
            .await
            .unwrap();
        assert_eq!(value, Some(3));

        let other = Arc::new(AtomicUsize::new(0));
        let err = waiter
            .wait(&Context::new(), scripted(&["BUILD", "MIGRATING", "ACTIVE"], other))
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::UnexpectedState { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn keep_polling_accepts_any_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let waiter = build_waiter().unknown_states(UnknownStatePolicy::KeepPolling);

        let value = waiter
            .wait(
                &Context::new(),
                scripted(&["BUILD", "WARMING", "MIGRATING", "ACTIVE"], calls.clone()),
            )
            .await
            .unwrap();

        assert_eq!(value, Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_wait() {
        let ctx = Context::new();
        let waiter = Waiter::new(&["BUILD"], &["ACTIVE"])
            .unwrap()
            .poll_interval(Duration::from_secs(10))
            .timeout(Duration::from_secs(600));

        let canceller = ctx.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(15)).await;
            canceller.cancel();
        });

        let calls = Arc::new(AtomicUsize::new(0));
        let err = waiter
            .wait(&ctx, scripted(&["BUILD"], calls.clone()))
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn context_deadline_bounds_the_wait() {
        let ctx = Context::new().with_timeout(Duration::from_secs(20));
        let waiter = Waiter::new(&["BUILD"], &["ACTIVE"])
            .unwrap()
            .poll_interval(Duration::from_secs(10))
            .timeout(Duration::from_secs(600));

        let start = Instant::now();
        let calls = Arc::new(AtomicUsize::new(0));
        let err = waiter
            .wait(&ctx, scripted(&["BUILD"], calls.clone()))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(start.elapsed() <= Duration::from_secs(21));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gone_object_reaches_not_found_target() {
        let waiter = Waiter::new(&["DELETING"], &[NOT_FOUND]).unwrap();
        let value = waiter
            .wait(&Context::new(), || {
                std::future::ready(Ok::<_, io::Error>(Observation::<()>::gone()))
            })
            .await
            .unwrap();

        assert!(value.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_override_replaces_delay_and_interval() {
        let waiter = Waiter::new(&["BUILD"], &["ACTIVE"])
            .unwrap()
            .delay(Duration::from_secs(30))
            .poll_interval(Duration::from_secs(120))
            .poll_override(Some(Duration::from_millis(1)));

        let start = Instant::now();
        let calls = Arc::new(AtomicUsize::new(0));
        waiter
            .wait(&Context::new(), scripted(&["BUILD", "BUILD", "ACTIVE"], calls))
            .await
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn overlapping_states_are_rejected() {
        let err = Waiter::new(&["BUILD", "ACTIVE"], &["ACTIVE"]).unwrap_err();
        assert!(matches!(err, WaitError::OverlappingStates(ref s) if s == "ACTIVE"));
    }

    #[test]
    fn timeout_message_names_target_and_last_state() {
        let err = WaitError::Timeout {
            last_state: Some("BUILD".to_string()),
            target: vec!["ACTIVE".to_string()],
            timeout: Duration::from_secs(60),
        };
        let msg = err.to_string();
        assert!(msg.contains("ACTIVE"));
        assert!(msg.contains("BUILD"));
    }
}
