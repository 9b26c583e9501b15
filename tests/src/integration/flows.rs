//! # Filter Manager Flows
//!
//! Startup, static elements, resizing and peer synchronisation as seen from
//! a connected peer.
//!
//! ## Flows Tested:
//!
//! 1. **Startup**: first filter built and broadcast, then `Initialized`, `Ready`
//! 2. **Static elements**: one `filteradd` per element once the filter exists
//! 3. **Resize**: crossing the threshold rebuilds and broadcasts one `filterload`
//! 4. **Peer join**: a new peer receives the current filter, and only that peer

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use spv_filter::{
        FilterConfig, FilterConfigBuilder, FilterError, FilterEvent, Lifecycle,
    };
    use tokio::time::timeout;

    use crate::integration::support::*;

    fn resize_config() -> FilterConfig {
        FilterConfigBuilder::new()
            .false_positive_rate(0.1)
            .resize_threshold(0.5)
            .build()
            .unwrap()
    }

    // =============================================================================
    // STARTUP
    // =============================================================================

    #[tokio::test]
    async fn test_startup_signals_fire_once_in_order() {
        let (_group, mut peer, manager) = setup(FilterConfig::default());
        let mut events = manager.subscribe();
        assert_eq!(manager.lifecycle(), Lifecycle::Uninitialized);

        manager.wait_ready().await;
        manager.add(b"after-ready").await.unwrap();

        let signals: Vec<&'static str> = pending_events(&mut events)
            .iter()
            .filter_map(|event| match event {
                FilterEvent::Initialized => Some("initialized"),
                FilterEvent::Ready => Some("ready"),
                _ => None,
            })
            .collect();
        assert_eq!(signals, vec!["initialized", "ready"]);

        // The peer connected before startup gets the first filter broadcast.
        let inbox = drain(&mut peer);
        assert_eq!(inbox.loads.len(), 1);
        assert_eq!(inbox.loads[0].size(), manager.filter_payload().unwrap().size());
    }

    #[tokio::test]
    async fn test_resize_precedes_initialized() {
        let (_group, _peer, manager) = setup(FilterConfig::default());
        let mut events = manager.subscribe();
        manager.wait_ready().await;

        let order: Vec<String> = pending_events(&mut events)
            .iter()
            .map(|event| match event {
                FilterEvent::Resized { .. } => "resized".to_string(),
                FilterEvent::Initialized => "initialized".to_string(),
                FilterEvent::Ready => "ready".to_string(),
                FilterEvent::Error(e) => format!("error: {}", e),
            })
            .collect();
        assert_eq!(order, vec!["resized", "initialized", "ready"]);
    }

    #[tokio::test]
    async fn test_once_ready_waits_for_startup() {
        let (_group, _peer, manager) = setup(FilterConfig::default());
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        manager.once_ready(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        manager.wait_ready().await;
        timeout(WAIT, async {
            while fired.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Already ready: runs inline.
        let counter = fired.clone();
        manager.once_ready(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    // =============================================================================
    // STATIC ELEMENTS
    // =============================================================================

    #[tokio::test]
    async fn test_static_add_sends_exactly_one_filteradd() {
        let (_group, mut peer, manager) = setup(FilterConfig::default());
        manager.wait_ready().await;
        drain(&mut peer);

        manager.add(b"76a914deadbeef88ac").await.unwrap();

        let inbox = drain(&mut peer);
        assert_eq!(inbox.adds, vec![b"76a914deadbeef88ac".to_vec()]);
        assert!(inbox.loads.is_empty());
        assert_eq!(manager.insertion_count(), 1);
    }

    #[tokio::test]
    async fn test_static_add_before_startup_is_replayed() {
        let (_group, mut peer, manager) = setup(FilterConfig::default());

        manager.add(b"early").await.unwrap();
        assert_eq!(manager.lifecycle(), Lifecycle::Uninitialized);
        assert_eq!(manager.insertion_count(), 0);
        assert_eq!(manager.element_count(), 1);

        manager.wait_ready().await;

        assert_eq!(manager.insertion_count(), 1);
        assert!(manager.contains(b"early"));
        let inbox = drain(&mut peer);
        assert!(inbox.adds.is_empty(), "replay must not stream filteradds");
        assert_eq!(inbox.loads.len(), 1);
    }

    #[tokio::test]
    async fn test_first_filter_sized_for_elements_added_before_startup() {
        let config = FilterConfigBuilder::new()
            .false_positive_rate(0.001)
            .resize_threshold(0.5)
            .build()
            .unwrap();
        let (_group, mut peer, manager) = setup(config);

        for i in 0..1000 {
            manager.add(format!("{:04}", i).into_bytes()).await.unwrap();
        }
        manager.wait_ready().await;

        let inbox = drain(&mut peer);
        assert_eq!(inbox.loads.len(), 1);
        assert_eq!(inbox.loads[0].size(), 1797);
        assert_eq!(inbox.loads[0].hash_funcs, 9);
        assert_eq!(manager.insertion_count(), 1000);

        let estimate = manager.estimated_false_positive_rate().unwrap();
        assert!(estimate < 0.001 * 1.5, "estimate {} drifted past threshold", estimate);
    }

    #[tokio::test]
    async fn test_filterables_before_startup_trigger_follow_up_resize() {
        let config = FilterConfigBuilder::new()
            .false_positive_rate(0.1)
            .resize_threshold(0.5)
            .build()
            .unwrap();
        let (_group, mut peer, manager) = setup(config);
        let mut events = manager.subscribe();

        let scripts: Vec<Vec<u8>> = (0..300).map(|i| format!("script-{}", i).into_bytes()).collect();
        manager
            .add(Scripted::always(Answer::Now(Some(scripts))))
            .await
            .unwrap();
        manager.wait_ready().await;

        let resizes = pending_events(&mut events)
            .iter()
            .filter(|event| matches!(event, FilterEvent::Resized { .. }))
            .count();
        assert_eq!(resizes, 2);
        assert_eq!(drain(&mut peer).loads.len(), 2);
        assert_eq!(manager.insertion_count(), 300);
        assert!(manager.estimated_false_positive_rate().unwrap() < 0.1 * 1.5);
    }

    #[tokio::test]
    async fn test_oversized_static_element_rejected() {
        let (_group, mut peer, manager) = setup(FilterConfig::default());
        manager.wait_ready().await;
        drain(&mut peer);

        let err = manager
            .add(vec![0u8; spv_filter::MAX_ELEMENT_SIZE + 1])
            .await
            .unwrap_err();

        assert!(matches!(err, FilterError::ElementTooLarge { size: 521, max: 520 }));
        assert_eq!(manager.element_count(), 0);
        assert_eq!(manager.insertion_count(), 0);
        assert!(drain(&mut peer).adds.is_empty());

        manager.add(vec![0u8; spv_filter::MAX_ELEMENT_SIZE]).await.unwrap();
        assert_eq!(drain(&mut peer).adds.len(), 1);
    }

    #[tokio::test]
    async fn test_static_elements_are_copied() {
        let (_group, _peer, manager) = setup(FilterConfig::default());
        manager.wait_ready().await;

        let mut script = b"script-a".to_vec();
        manager.add(script.as_slice()).await.unwrap();
        script[7] = b'b';
        manager.resize().await.unwrap();

        assert!(manager.contains(b"script-a"));
    }

    #[tokio::test]
    async fn test_remove_fails_loudly() {
        let (_group, _peer, manager) = setup(FilterConfig::default());
        manager.wait_ready().await;
        manager.add(b"kept").await.unwrap();

        let err = manager.remove(b"kept").unwrap_err();

        assert!(matches!(err, FilterError::RemoveUnsupported));
        assert!(manager.contains(b"kept"));
        assert_eq!(manager.insertion_count(), 1);
    }

    // =============================================================================
    // RESIZE
    // =============================================================================

    #[tokio::test]
    async fn test_resize_triggered_exactly_at_threshold() {
        let (_group, mut peer, manager) = setup(resize_config());
        manager.wait_ready().await;
        let initial = drain(&mut peer);
        assert_eq!(initial.loads.len(), 1);
        assert_eq!(initial.loads[0].data.len(), 59);
        assert_eq!(initial.loads[0].hash_funcs, 3);

        for i in 0..119 {
            manager.add(format!("{:04}", i).into_bytes()).await.unwrap();
        }

        let inbox = drain(&mut peer);
        assert_eq!(inbox.adds.len(), 119);
        assert!(inbox.loads.is_empty(), "119 elements must not resize");
        assert_eq!(manager.insertion_count(), 119);

        manager.add(b"lol").await.unwrap();

        let inbox = drain(&mut peer);
        assert_eq!(inbox.adds, vec![b"lol".to_vec()]);
        assert_eq!(inbox.loads.len(), 1);
        assert_eq!(inbox.last_command, Some("filterload"));

        let resized = &inbox.loads[0];
        assert_eq!(resized.data.len(), 71);
        assert_eq!(manager.insertion_count(), 120);
        assert!(manager.contains(b"lol") && manager.contains(b"0000"));
        assert_eq!(manager.metrics().snapshot().resizes, 2);
    }

    #[tokio::test]
    async fn test_counter_resets_on_resize() {
        let (_group, _peer, manager) = setup(FilterConfig::default());
        manager.wait_ready().await;

        for element in [b"a", b"b", b"c"] {
            manager.add(element).await.unwrap();
        }
        manager.resize().await.unwrap();
        assert_eq!(manager.insertion_count(), 3);

        manager.add(b"d").await.unwrap();
        assert_eq!(manager.insertion_count(), 4);
    }

    #[tokio::test]
    async fn test_forced_resize_uses_fresh_tweak_and_flags() {
        let config = FilterConfigBuilder::new()
            .flags(peer_bus::BloomFlags::All)
            .build()
            .unwrap();
        let (_group, mut peer, manager) = setup(config);
        manager.wait_ready().await;
        drain(&mut peer);

        manager.add(b"x").await.unwrap();
        manager.resize().await.unwrap();

        let inbox = drain(&mut peer);
        assert_eq!(inbox.loads.len(), 1);
        assert_eq!(inbox.loads[0].flags, peer_bus::BloomFlags::All);
        assert_eq!(Some(inbox.loads[0].clone()), manager.filter_payload());
    }

    #[tokio::test]
    async fn test_failed_replay_keeps_live_filter() {
        let (_group, mut peer, manager) = setup(FilterConfig::default());
        manager.wait_ready().await;

        let flaky = Scripted::new([
            Answer::Now(Some(vec![b"first".to_vec()])),
            Answer::Deferred(Err(spv_filter::FilterableError::new("replay failed"))),
        ]);
        manager.add(flaky.clone()).await.unwrap();
        manager.add(b"static").await.unwrap();
        drain(&mut peer);
        let before = manager.filter_payload();

        let err = manager.resize().await.unwrap_err();

        assert_eq!(err.to_string(), "replay failed");
        assert_eq!(manager.filter_payload(), before);
        assert_eq!(manager.insertion_count(), 2);
        assert!(drain(&mut peer).loads.is_empty());
        assert_eq!(manager.metrics().snapshot().resizes_failed, 1);
    }

    // =============================================================================
    // PEERS
    // =============================================================================

    #[tokio::test]
    async fn test_new_peer_receives_current_filter() {
        let (group, mut existing, manager) = setup(FilterConfig::default());
        manager.wait_ready().await;
        manager.add(b"watched").await.unwrap();
        drain(&mut existing);

        let mut newcomer = group.connect("10.1.1.1:8333");
        let message = timeout(WAIT, newcomer.recv())
            .await
            .expect("timed out waiting for filterload")
            .unwrap();

        match message {
            peer_bus::PeerMessage::FilterLoad(load) => {
                assert_eq!(Some(load), manager.filter_payload());
            }
            other => panic!("expected filterload, got {:?}", other),
        }
        tokio::task::yield_now().await;
        assert!(drain(&mut existing).loads.is_empty(), "only the new peer is addressed");
    }

    #[tokio::test]
    async fn test_spawn_add_reports_errors_on_channel() {
        let (_group, _peer, manager) = setup(FilterConfig::default());
        manager.wait_ready().await;
        let mut events = manager.subscribe();

        let bad = Scripted::always(Answer::Now(Some(vec![vec![0u8; spv_filter::MAX_ELEMENT_SIZE + 1]])));
        manager.spawn_add(bad).await.unwrap();

        let event = next_event(&mut events, FilterEvent::is_error).await;
        assert!(matches!(
            event,
            FilterEvent::Error(FilterError::InvalidElements { .. })
        ));
        assert_eq!(manager.filterable_count(), 0);
    }
}
