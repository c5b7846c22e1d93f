#![allow(dead_code, unused_imports)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fieldcall_core::directory::{DirectoryClient, RequestDraft};
use fieldcall_core::models::{Identity, RequestStatus, Role, Urgency};
use fieldcall_core::poller::{PollFact, PollFactCallback, ReconciliationPoller};
use fieldcall_core::testing::MemoryDirectory;

fn farmer() -> Identity {
    Identity::new("f-1", "Ravi", Role::Requester)
}

fn specialist() -> Identity {
    Identity::new("s-7", "Dr. Rao", Role::Responder)
}

fn collector() -> (PollFactCallback, Arc<Mutex<Vec<PollFact>>>) {
    let facts = Arc::new(Mutex::new(Vec::new()));
    let sink = facts.clone();
    let callback: PollFactCallback = Arc::new(move |fact| sink.lock().unwrap().push(fact));
    (callback, facts)
}

fn poller_for(
    directory: &MemoryDirectory,
    identity: &Identity,
    on_fact: PollFactCallback,
) -> ReconciliationPoller {
    ReconciliationPoller::new(
        directory.client_for(identity),
        identity.role,
        Duration::from_secs(5),
        on_fact,
    )
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_is_immediate_then_every_interval() {
        let directory = MemoryDirectory::new();
        let (callback, facts) = collector();
        let poller = poller_for(&directory, &farmer(), callback);

        assert!(poller.start().await);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(facts.lock().unwrap().len(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(facts.lock().unwrap().len(), 3);
        assert_eq!(poller.status().await.polls, 3);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_report_transitions() {
        let directory = MemoryDirectory::new();
        let (callback, _facts) = collector();
        let poller = poller_for(&directory, &specialist(), callback);

        assert!(!poller.stop().await);
        assert!(poller.start().await);
        assert!(!poller.start().await);
        assert!(poller.is_running().await);
        assert!(poller.status().await.is_running);

        assert!(poller.stop().await);
        assert!(!poller.is_running().await);
        assert!(!poller.status().await.is_running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_fact_after_stop() {
        let directory = MemoryDirectory::new();
        let (callback, facts) = collector();
        let poller = poller_for(&directory, &specialist(), callback);

        poller.start().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        poller.stop().await;
        let delivered = facts.lock().unwrap().len();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(facts.lock().unwrap().len(), delivered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let directory = MemoryDirectory::new();
        let (callback, facts) = collector();
        let poller = poller_for(&directory, &farmer(), callback);

        poller.start().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        poller.stop().await;

        assert!(poller.start().await);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(facts.lock().unwrap().len(), 2);
        poller.stop().await;
    }
}

mod fact_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_responder_sees_pending_and_active() {
        let directory = MemoryDirectory::new();
        let request = directory
            .client_for(&farmer())
            .create_request(
                "s-7",
                &RequestDraft {
                    topic: "pest".to_string(),
                    description: None,
                    urgency: Urgency::Urgent,
                },
            )
            .await
            .unwrap();

        let (callback, facts) = collector();
        let poller = poller_for(&directory, &specialist(), callback);
        poller.start().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        poller.stop().await;

        let facts = facts.lock().unwrap().clone();
        match &facts[0] {
            PollFact::PendingRequests(requests) => {
                assert_eq!(requests.len(), 1);
                assert_eq!(requests[0].id, request.id);
            }
            other => panic!("unexpected fact: {:?}", other),
        }
        assert_eq!(facts[1], PollFact::ActiveCalls(vec![]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_fetch_keeps_polling() {
        let directory = MemoryDirectory::new();
        directory.fail_operation("list_pending_requests").await;

        let (callback, facts) = collector();
        let poller = poller_for(&directory, &specialist(), callback);
        poller.start().await;
        tokio::time::sleep(Duration::from_secs(6)).await;

        let status = poller.status().await;
        assert_eq!(status.polls, 2);
        assert_eq!(status.failures, 2);
        assert!(status.last_error.unwrap().contains("list_pending_requests"));
        // Active calls still arrive on each round.
        assert_eq!(facts.lock().unwrap().len(), 2);

        directory.recover("list_pending_requests").await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(poller.status().await.failures, 2);
        poller.stop().await;
    }
}
