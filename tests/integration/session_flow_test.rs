use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fieldcall_core::{
    Delivery, FieldcallConfig, HttpDirectoryClient, Identity, MemoryHub, NotificationAction,
    NotificationKind, RequestStatus, Role, SessionController, SessionKind, SessionState, Urgency,
};

fn farmer() -> Identity {
    Identity::new("f-1", "Ravi", Role::Requester)
}

async fn controller_against(server: &MockServer) -> SessionController {
    let mut config = FieldcallConfig::default();
    config.polling.enabled = false;

    let directory =
        HttpDirectoryClient::with_base_url(server.uri(), Some("t-123".to_string())).unwrap();

    SessionController::builder()
        .identity(farmer())
        .config(config)
        .directory(Arc::new(directory))
        .connector(Arc::new(MemoryHub::new()))
        .build()
        .await
        .unwrap()
}

fn own_request(status: &str) -> serde_json::Value {
    json!([{
        "_id": "req-1",
        "farmer_id": "f-1",
        "farmer_name": "Ravi",
        "specialist_id": "s-7",
        "specialist_name": "Dr. Rao",
        "topic": "Leaf curl",
        "urgency": "normal",
        "status": status,
        "created_at": "2024-03-01T10:00:00"
    }])
}

mod video_flow_tests {
    use super::*;

    #[tokio::test]
    async fn test_accepted_request_on_headless_host_ends_with_media_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/consultations/request-video/s-7"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "message": "Request sent", "request_id": "req-1" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/consultations/video-requests/my-requests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(own_request("pending")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/consultations/video-requests/my-requests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(own_request("accepted")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/consultations/req-1/start-video"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "room_id": "room-req-1" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/consultations/req-1/end"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let controller = controller_against(&server).await;

        let request = controller
            .request_call("s-7", "Leaf curl", None, Urgency::Normal)
            .await
            .unwrap();
        assert_eq!(request.id, "req-1");

        controller.refresh_requests().await.unwrap();
        controller.refresh_requests().await.unwrap();
        assert_eq!(controller.requests().await[0].status, RequestStatus::Accepted);

        let action = controller
            .notifications()
            .history()
            .into_iter()
            .find_map(|n| n.action)
            .expect("acceptance should offer to start the call");
        assert_eq!(
            action,
            NotificationAction::StartCall {
                request_id: "req-1".to_string()
            }
        );

        let err = controller.perform_action(&action).await.unwrap_err();
        assert!(err.is_media_error());
        assert_eq!(controller.state().await, SessionState::Idle);
        assert!(controller.session().await.is_none());

        let current = controller.notifications().current().unwrap();
        assert_eq!(current.kind, NotificationKind::Error);
        assert_eq!(current.message, "Failed to access camera/microphone");

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejected_request_surfaces_service_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/consultations/request-video/s-7"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "detail": "Specialist is not available" })),
            )
            .mount(&server)
            .await;

        let controller = controller_against(&server).await;
        let err = controller
            .request_call("s-7", "Leaf curl", None, Urgency::Normal)
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "E4002");
        assert!(controller.requests().await.is_empty());
        assert_eq!(
            controller.notifications().current().unwrap().message,
            "Specialist is not available"
        );
        controller.shutdown().await;
    }
}

mod chat_flow_tests {
    use super::*;

    async fn mount_chat(server: &MockServer, send_status: u16, end_status: u16) {
        Mock::given(method("POST"))
            .and(path("/api/consultations/start-chat/s-7"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "session_id": "chat-1" })),
            )
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/consultations/chat-1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "_id": "msg-1",
                "session_id": "chat-1",
                "sender_id": "s-7",
                "sender_role": "specialist",
                "sender_name": "Dr. Rao",
                "message_text": "Hello, how can I help?",
                "timestamp": "2024-03-01T10:00:00"
            }])))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/consultations/chat-1/messages"))
            .respond_with(ResponseTemplate::new(send_status).set_body_json(json!({})))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/consultations/chat-1/end"))
            .respond_with(ResponseTemplate::new(end_status).set_body_json(json!({})))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_chat_loads_history_and_confirms_sent_message() {
        let server = MockServer::start().await;
        mount_chat(&server, 200, 200).await;

        let controller = controller_against(&server).await;
        let session = controller.start_chat("s-7", "").await.unwrap();
        assert_eq!(session.kind, SessionKind::Chat);
        assert_eq!(controller.state().await, SessionState::Active);

        controller.send_chat("The leaves are curling").await.unwrap();

        let messages = controller.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "Hello, how can I help?");
        assert_eq!(messages[1].text, "The leaves are curling");
        assert_eq!(messages[1].delivery, Delivery::Confirmed);

        controller.end_session().await.unwrap();
        assert!(controller.session().await.is_none());
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_send_keeps_message_marked_failed() {
        let server = MockServer::start().await;
        mount_chat(&server, 500, 200).await;

        let controller = controller_against(&server).await;
        controller.start_chat("s-7", "Soil").await.unwrap();

        assert!(controller.send_chat("Anyone there?").await.is_err());

        let messages = controller.messages().await;
        let last = messages.last().unwrap();
        assert_eq!(last.text, "Anyone there?");
        assert_eq!(last.delivery, Delivery::Failed);
        assert_eq!(controller.state().await, SessionState::Active);

        controller.end_session().await.unwrap();
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_end_is_local_even_when_service_fails() {
        let server = MockServer::start().await;
        mount_chat(&server, 200, 503).await;

        let controller = controller_against(&server).await;
        controller.start_chat("s-7", "").await.unwrap();
        controller.send_chat("Thanks").await.unwrap();

        controller.end_session().await.unwrap();
        assert!(controller.session().await.is_none());
        assert_eq!(controller.state().await, SessionState::Idle);

        // Nothing left to end, so the service is not contacted again.
        controller.end_session().await.unwrap();
        controller.shutdown().await;
    }
}
