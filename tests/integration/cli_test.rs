use std::process::{Command, Output};

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FIELDCALL_VARS: &[&str] = &[
    "FIELDCALL_TOKEN",
    "FIELDCALL_API_URL",
    "FIELDCALL_LOG_LEVEL",
    "FIELDCALL_IDENTITY__USER_ID",
    "FIELDCALL_IDENTITY__ROLE",
    "FIELDCALL_IDENTITY__DISPLAY_NAME",
    "FIELDCALL_POLLING__INTERVAL_SECS",
    "RUST_LOG",
];

fn fieldcall() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fieldcall"));
    for var in FIELDCALL_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn run_fieldcall(args: &[&str]) -> Output {
    fieldcall()
        .args(args)
        .output()
        .expect("Failed to execute fieldcall command")
}

fn run_fieldcall_with_env(args: &[&str], env_vars: Vec<(&str, &str)>) -> Output {
    let mut cmd = fieldcall();
    cmd.args(args);
    for (key, value) in env_vars {
        cmd.env(key, value);
    }
    cmd.output().expect("Failed to execute fieldcall command")
}

fn output_to_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr_to_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

mod version_command_tests {
    use super::*;

    #[test]
    fn test_version_command_basic() {
        let output = run_fieldcall(&["version"]);
        let stdout = output_to_string(&output);

        assert!(output.status.success(), "version command should succeed");
        assert!(stdout.contains("fieldcall"));
        assert!(stdout.contains("0.1.0"), "output should contain version number");
    }

    #[test]
    fn test_version_command_detailed() {
        let output = run_fieldcall(&["version", "--detailed"]);
        let stdout = output_to_string(&output);

        assert!(output.status.success());
        assert!(stdout.contains("Version"));
        assert!(stdout.contains("Apache-2.0"));
    }
}

mod help_tests {
    use super::*;

    #[test]
    fn test_help_lists_commands() {
        let output = run_fieldcall(&["--help"]);
        let stdout = output_to_string(&output);

        assert!(output.status.success());
        for command in [
            "responders", "requests", "calls", "chats", "request", "accept", "chat", "watch",
            "demo", "config", "version",
        ] {
            assert!(stdout.contains(command), "help should list '{}'", command);
        }
    }

    #[test]
    fn test_request_help_shows_urgency() {
        let output = run_fieldcall(&["request", "--help"]);
        let stdout = output_to_string(&output);

        assert!(output.status.success());
        assert!(stdout.contains("--topic"));
        assert!(stdout.contains("--urgency"));
    }

    #[test]
    fn test_invalid_command() {
        let output = run_fieldcall(&["not-a-command"]);
        assert!(!output.status.success());
    }

    #[test]
    fn test_request_requires_topic() {
        let output = run_fieldcall(&["request", "s-7"]);
        assert!(!output.status.success());
        assert!(stderr_to_string(&output).contains("--topic"));
    }
}

mod config_command_tests {
    use super::*;

    #[test]
    fn test_config_show_applies_env_overrides() {
        let output = run_fieldcall_with_env(
            &["config", "show", "--format", "json"],
            vec![
                ("FIELDCALL_API_URL", "http://consult.example:9000"),
                ("FIELDCALL_TOKEN", "supersecret"),
                ("FIELDCALL_IDENTITY__USER_ID", "f-1"),
                ("FIELDCALL_IDENTITY__ROLE", "farmer"),
            ],
        );
        let stdout = output_to_string(&output);

        assert!(output.status.success(), "stderr: {}", stderr_to_string(&output));
        let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
        assert_eq!(value["api"]["base_url"], "http://consult.example:9000");
        assert_eq!(value["identity"]["user_id"], "f-1");
        assert_eq!(value["identity"]["token"], "****");
        assert!(!stdout.contains("supersecret"));
    }

    #[test]
    fn test_config_show_toml_by_default() {
        let output = run_fieldcall(&["config"]);
        let stdout = output_to_string(&output);

        assert!(output.status.success());
        assert!(stdout.contains("[api]"));
        assert!(stdout.contains("offer_delay_ms = 500"));
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let output = run_fieldcall_with_env(
            &["config", "show"],
            vec![("FIELDCALL_POLLING__INTERVAL_SECS", "0")],
        );

        assert!(!output.status.success());
        assert!(stderr_to_string(&output).contains("polling.interval_secs"));
    }

    #[test]
    fn test_config_check_without_identity() {
        let output = run_fieldcall(&["config", "check"]);
        let stdout = output_to_string(&output);

        assert!(output.status.success());
        assert!(stdout.contains("Configuration is valid"));
        assert!(stdout.contains("identity.user_id"));
    }
}

mod service_command_tests {
    use super::*;

    #[test]
    fn test_responders_without_identity_fails_gracefully() {
        let output = run_fieldcall(&["responders"]);
        let stderr = stderr_to_string(&output);

        assert!(!output.status.success());
        assert!(stderr.contains("identity"), "stderr: {}", stderr);
    }

    #[test]
    fn test_request_rejects_unknown_urgency() {
        let output = run_fieldcall_with_env(
            &["request", "s-7", "--topic", "pest", "--urgency", "whenever"],
            vec![
                ("FIELDCALL_IDENTITY__USER_ID", "f-1"),
                ("FIELDCALL_IDENTITY__ROLE", "farmer"),
            ],
        );

        assert!(!output.status.success());
        assert!(stderr_to_string(&output).contains("unknown urgency"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_responders_against_service() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/specialists/available"))
            .and(header("Authorization", "Bearer t-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "_id": "s-7", "name": "Dr. Rao", "specialization": "Plant pathology", "is_online": true }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        let output = tokio::task::spawn_blocking(move || {
            run_fieldcall_with_env(
                &["responders", "--format", "json"],
                vec![
                    ("FIELDCALL_API_URL", uri.as_str()),
                    ("FIELDCALL_TOKEN", "t-123"),
                    ("FIELDCALL_IDENTITY__USER_ID", "f-1"),
                    ("FIELDCALL_IDENTITY__ROLE", "farmer"),
                ],
            )
        })
        .await
        .unwrap();

        assert!(output.status.success(), "stderr: {}", stderr_to_string(&output));
        let value: serde_json::Value = serde_json::from_str(&output_to_string(&output)).unwrap();
        assert_eq!(value[0]["id"], "s-7");
        assert_eq!(value[0]["name"], "Dr. Rao");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_service_error_is_shown_with_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/consultations/video-requests/pending"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "detail": "Not authenticated" })),
            )
            .mount(&server)
            .await;

        let uri = server.uri();
        let output = tokio::task::spawn_blocking(move || {
            run_fieldcall_with_env(
                &["requests"],
                vec![
                    ("FIELDCALL_API_URL", uri.as_str()),
                    ("FIELDCALL_IDENTITY__USER_ID", "s-7"),
                    ("FIELDCALL_IDENTITY__ROLE", "specialist"),
                ],
            )
        })
        .await
        .unwrap();

        let stderr = stderr_to_string(&output);
        assert!(!output.status.success());
        assert!(stderr.contains("Not authenticated"), "stderr: {}", stderr);
        assert!(stderr.contains("[E4"), "stderr: {}", stderr);
    }
}

mod demo_command_tests {
    use super::*;

    #[test]
    fn test_demo_runs_a_full_call() {
        let output = run_fieldcall(&["demo", "--seconds", "1"]);
        let stdout = output_to_string(&output);

        assert!(output.status.success(), "stderr: {}", stderr_to_string(&output));
        assert!(stdout.contains("Dr. Rao accepted the request"));
        assert!(stdout.contains("Both sides connected"));
        assert!(stdout.contains("released"));
    }

    #[test]
    fn test_demo_json_report() {
        let output = run_fieldcall(&["demo", "--seconds", "1", "--chat", "--format", "json"]);

        assert!(output.status.success(), "stderr: {}", stderr_to_string(&output));
        let report: serde_json::Value = serde_json::from_str(&output_to_string(&output)).unwrap();
        assert_eq!(report["accepted"], true);
        assert_eq!(report["offers"], 1);
        assert_eq!(report["answers"], 1);
        assert_eq!(report["chat_messages"], 2);
        assert_eq!(report["farmer_state"], "idle");
        assert_eq!(report["specialist_state"], "idle");
    }

    #[test]
    fn test_demo_with_denied_camera() {
        let output = run_fieldcall(&["demo", "--deny-media", "--format", "json"]);

        assert!(output.status.success(), "stderr: {}", stderr_to_string(&output));
        let report: serde_json::Value = serde_json::from_str(&output_to_string(&output)).unwrap();
        assert_eq!(report["media_denied"], true);
        assert_eq!(report["farmer_state"], "idle");
        assert_eq!(report["offers"], 0);
    }
}
