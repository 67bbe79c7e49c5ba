use super::*;
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert!(config.server.default_site.is_none());
    assert!(config.sites.is_empty());
}

#[test]
fn test_stream_config_default() {
    let stream = StreamConfig::default();
    assert_eq!(stream.silence_threshold_secs, 6.0);
    assert_eq!(stream.stability_threshold, 5);
    assert_eq!(stream.hard_timeout_secs, 600);
    assert_eq!(stream.confirm_window_secs, 1.5);
    assert_eq!(stream.confirm_poll_secs, 0.3);
    assert_eq!(stream.shrink_tolerance, 3);
    assert_eq!(stream.hard_timeout().as_secs(), 600);
}

#[test]
fn test_input_config_default() {
    let input = InputConfig::default();
    assert_eq!(input.chunk_size, 30_000);
    assert_eq!(input.verify_attempts, 3);
    assert_eq!(input.locate_poll().as_millis(), 250);
}

#[test]
fn test_request_config_default() {
    let request = RequestConfig::default();
    assert_eq!(request.acquire_timeout().as_secs(), 60);
    assert_eq!(request.poll_interval().as_millis(), 100);
    assert_eq!(request.history_limit, 100);
}

#[test]
fn test_negative_duration_is_zero() {
    let stream = StreamConfig {
        poll_interval_secs: -1.0,
        ..StreamConfig::default()
    };
    assert!(stream.poll_interval().is_zero());
}

#[test]
fn test_tab_config_as_pool() {
    let tabs = TabConfig {
        max_tabs: 3,
        min_tabs: 1,
        idle_timeout_secs: 42,
    };
    let pool = tabs.as_pool();
    assert_eq!(pool.max_instances, 3);
    assert_eq!(pool.min_instances, 1);
    assert_eq!(pool.idle_timeout().as_secs(), 42);
}

#[test]
fn test_browser_profile_root_default() {
    let browser = BrowserConfig::default();
    assert!(browser.profile_root().ends_with(".web2api/browser-profile"));
}

#[test]
fn test_step_action_toml_names() {
    let step: WorkflowStep = toml::from_str(
        r#"
        action = "FILL_INPUT"
        target = "input_box"
        "#,
    )
    .unwrap();
    assert_eq!(step.action, StepAction::FillInput);
    assert_eq!(step.target.as_deref(), Some("input_box"));
    assert!(!step.optional);
    assert_eq!(StepAction::StreamWait.to_string(), "STREAM_WAIT");
}

#[test]
fn test_step_value_number_and_text() {
    assert_eq!(StepValue::Number(1.5).as_seconds(), Some(1.5));
    assert_eq!(StepValue::from("2").as_seconds(), Some(2.0));
    assert_eq!(StepValue::from("soon").as_seconds(), None);
    assert_eq!(StepValue::Number(-1.0).as_seconds(), None);
    assert_eq!(StepValue::from("Enter").as_text(), "Enter");
}

#[test]
fn test_selector_entry_candidates() {
    let one = SelectorEntry::One("#send".to_string());
    assert_eq!(one.candidates(), vec!["#send"]);

    let many = SelectorEntry::Many(vec!["#a".to_string(), ".b".to_string()]);
    assert_eq!(many.candidates(), vec!["#a", ".b"]);
}

#[test]
fn test_site_config_parse() {
    let site: SiteConfig = toml::from_str(
        r#"
        url = "https://chat.example.com/"
        stealth = true
        extractor = "deep"

        [selectors]
        input_box = "textarea"
        send_btn = ["button[type=submit]", "button.send"]
        result_container = ".message"

        [[workflow]]
        action = "FILL_INPUT"
        target = "input_box"

        [[workflow]]
        action = "CLICK"
        target = "send_btn"
        optional = true

        [[workflow]]
        action = "STREAM_WAIT"
        target = "result_container"
        "#,
    )
    .unwrap();

    assert!(site.stealth);
    assert_eq!(site.extractor, ExtractorKind::Deep);
    assert_eq!(site.workflow.len(), 3);
    assert!(site.workflow[1].optional);
    assert_eq!(site.selectors_for("send_btn").len(), 2);
    assert!(site.selectors_for("missing").is_empty());
    assert_eq!(site.reply_target(), Some("result_container"));
}

#[test]
fn test_extractor_default_is_hybrid() {
    assert_eq!(ExtractorKind::default(), ExtractorKind::Hybrid);
}

#[test]
fn test_config_serialization() {
    let config = Config::default();
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("127.0.0.1"));
    assert!(json.contains("8080"));
}

#[test]
fn test_durations_are_capped() {
    assert_eq!(secs_f64(1.5), Duration::from_millis(1500));
    assert_eq!(secs_f64(-1.0), Duration::ZERO);
    assert_eq!(secs_f64(f64::NAN), Duration::ZERO);
    assert_eq!(secs_f64(1e300), MAX_DURATION);

    let stream = StreamConfig {
        hard_timeout_secs: u64::MAX,
        poll_interval_secs: f64::INFINITY,
        ..Default::default()
    };
    assert_eq!(stream.hard_timeout(), MAX_DURATION);
    assert_eq!(stream.poll_interval(), Duration::ZERO);
    assert_eq!(StepValue::Number(1e300).as_duration(), Some(MAX_DURATION));
}
