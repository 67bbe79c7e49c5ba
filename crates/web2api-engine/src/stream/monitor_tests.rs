use super::*;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use web2api_config::ExtractorKind;

use crate::testing::FakePage;

#[derive(Default)]
struct Collect {
    chunks: Mutex<Vec<String>>,
    /// Cancel this signal on the first delta.
    cancel_on_first: Option<StopSignal>,
    closed: bool,
}

#[async_trait]
impl ChunkSink for Collect {
    async fn send_delta(&self, text: String) -> bool {
        if self.closed {
            return false;
        }
        self.chunks.lock().push(text);
        if let Some(stop) = &self.cancel_on_first {
            stop.cancel();
        }
        true
    }
}

impl Collect {
    fn chunks(&self) -> Vec<String> {
        self.chunks.lock().clone()
    }
}

fn config() -> StreamConfig {
    StreamConfig {
        poll_interval_secs: 0.1,
        silence_threshold_secs: 1.0,
        stability_threshold: 2,
        hard_timeout_secs: 30,
        confirm_window_secs: 1.0,
        confirm_poll_secs: 0.1,
        confirm_stable_polls: 2,
        shrink_tolerance: 3,
        response_start_timeout_secs: 5,
    }
}

fn extractor() -> Extractor {
    Extractor::new(ExtractorKind::Shallow)
}

#[tokio::test(start_paused = true)]
async fn test_streams_growing_reply() {
    let page = FakePage::new();
    page.push_snapshots(1, &["", "", "", "Hel", "Hello", "Hello wor", "Hello world"]);
    let config = config();
    let stop = StopSignal::new();
    let sink = Collect::default();

    let outcome = StreamMonitor::new(&page, extractor(), &config, &stop)
        .run(".reply", "greet me", Some(0), &sink)
        .await;

    assert_eq!(outcome.end, StreamEnd::Completed);
    assert_eq!(outcome.emitted_chars, 11);
    assert_eq!(sink.chunks(), vec!["Hel", "lo", " wor", "ld"]);
}

#[tokio::test(start_paused = true)]
async fn test_jitter_emits_nothing() {
    let page = FakePage::new();
    page.push_snapshots(1, &["", "", "", "Hello world", "Hello wor", "Hello world"]);
    let config = config();
    let stop = StopSignal::new();
    let sink = Collect::default();

    let outcome = StreamMonitor::new(&page, extractor(), &config, &stop)
        .run(".reply", "", Some(0), &sink)
        .await;

    assert_eq!(outcome.end, StreamEnd::Completed);
    assert_eq!(sink.chunks(), vec!["Hello world"]);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_shrink_still_completes() {
    let page = FakePage::new();
    page.push_snapshots(1, &["", "", "", "Hello **world** again", "Hello world again"]);
    let config = StreamConfig {
        hard_timeout_secs: 10,
        ..config()
    };
    let stop = StopSignal::new();
    let sink = Collect::default();

    let start = tokio::time::Instant::now();
    let outcome = StreamMonitor::new(&page, extractor(), &config, &stop)
        .run(".reply", "", Some(0), &sink)
        .await;

    assert_eq!(outcome.end, StreamEnd::Completed);
    assert_eq!(sink.chunks(), vec!["Hello **world** again"]);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_recovers_text_hidden_after_confirmation() {
    let page = FakePage::new();
    // The reply flashes in, then the region regresses to the prompt alone.
    page.push_snapshots(1, &["Q? Answer", "Q?", "Q?"]);
    let config = config();
    let stop = StopSignal::new();
    let sink = Collect::default();

    let outcome = StreamMonitor::new(&page, extractor(), &config, &stop)
        .run(".reply", "Q?", Some(0), &sink)
        .await;

    assert_eq!(outcome.end, StreamEnd::Completed);
    assert_eq!(sink.chunks(), vec!["Answer"]);
    assert_eq!(outcome.emitted_chars, 6);
}

#[tokio::test(start_paused = true)]
async fn test_strips_echoed_prompt() {
    let page = FakePage::new();
    page.push_snapshots(1, &["", "", "", "What is 2+2?\n\nIt is 4."]);
    let config = config();
    let stop = StopSignal::new();
    let sink = Collect::default();

    StreamMonitor::new(&page, extractor(), &config, &stop)
        .run(".reply", "What is 2+2?", Some(0), &sink)
        .await;

    assert_eq!(sink.chunks(), vec!["It is 4."]);
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_user_turn_is_baseline() {
    let page = FakePage::new();
    page.push_snapshots(2, &["Hi", "Hi", "Hi", "Hi", "Hi\n\nHello"]);
    let config = config();
    let stop = StopSignal::new();
    let sink = Collect::default();

    let outcome = StreamMonitor::new(&page, extractor(), &config, &stop)
        .run(".reply", "Hi", Some(1), &sink)
        .await;

    assert_eq!(sink.chunks(), vec!["Hello"]);
    assert_eq!(outcome.emitted_chars, 5);
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_turn_uses_last_snapshot() {
    let page = FakePage::new();
    let growing: Vec<String> = (1..=15).map(|n| "x".repeat(n)).collect();
    let growing: Vec<&str> = growing.iter().map(String::as_str).collect();
    page.push_snapshots(1, &growing);
    let config = config();
    let stop = StopSignal::new();
    let sink = Collect::default();

    let outcome = StreamMonitor::new(&page, extractor(), &config, &stop)
        .run(".reply", "", Some(0), &sink)
        .await;

    assert_eq!(outcome.end, StreamEnd::Completed);
    let text = sink.chunks().concat();
    assert!(!text.is_empty());
    assert!(text.len() < 15);
    assert!(text.chars().all(|c| c == 'x'));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_before_next_chunk() {
    let page = FakePage::new();
    page.push_snapshots(1, &["", "", "", "one", "one two", "one two three"]);
    let config = config();
    let stop = StopSignal::new();
    let sink = Collect {
        cancel_on_first: Some(stop.clone()),
        ..Default::default()
    };

    let outcome = StreamMonitor::new(&page, extractor(), &config, &stop)
        .run(".reply", "", Some(0), &sink)
        .await;

    assert_eq!(outcome.end, StreamEnd::Cancelled);
    assert_eq!(sink.chunks(), vec!["one"]);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_receiver_cancels() {
    let page = FakePage::new();
    page.push_snapshots(1, &["", "", "", "text"]);
    let config = config();
    let stop = StopSignal::new();
    let sink = Collect {
        closed: true,
        ..Default::default()
    };

    let outcome = StreamMonitor::new(&page, extractor(), &config, &stop)
        .run(".reply", "", Some(0), &sink)
        .await;

    assert_eq!(outcome.end, StreamEnd::Cancelled);
    assert!(stop.is_stopped());
}

#[tokio::test(start_paused = true)]
async fn test_hard_timeout() {
    let page = FakePage::new();
    page.push_snapshot(1, "");
    let config = StreamConfig {
        hard_timeout_secs: 2,
        ..config()
    };
    let stop = StopSignal::new();
    let sink = Collect::default();

    let start = tokio::time::Instant::now();
    let outcome = StreamMonitor::new(&page, extractor(), &config, &stop)
        .run(".reply", "", Some(0), &sink)
        .await;

    assert_eq!(outcome.end, StreamEnd::TimedOut);
    assert_eq!(outcome.emitted_chars, 0);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_silence_waits_for_first_content() {
    let page = FakePage::new();
    page.push_snapshot(1, "");
    let config = StreamConfig {
        response_start_timeout_secs: 4,
        ..config()
    };
    let stop = StopSignal::new();
    let sink = Collect::default();

    let start = tokio::time::Instant::now();
    let outcome = StreamMonitor::new(&page, extractor(), &config, &stop)
        .run(".reply", "", Some(0), &sink)
        .await;

    assert_eq!(outcome.end, StreamEnd::Completed);
    assert!(start.elapsed() >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_read_failures_are_idle_ticks() {
    let page = FakePage::new();
    page.push_snapshots(1, &["", "", "", "Hi"]);
    page.push_snapshot_failure();
    let config = config();
    let stop = StopSignal::new();
    let sink = Collect::default();

    let outcome = StreamMonitor::new(&page, extractor(), &config, &stop)
        .run(".reply", "", Some(0), &sink)
        .await;

    assert_eq!(outcome.end, StreamEnd::Completed);
    assert_eq!(sink.chunks(), vec!["Hi"]);
}

#[tokio::test(start_paused = true)]
async fn test_baseline_measured_when_absent() {
    let page = FakePage::new();
    page.push_snapshot(3, "old turns");
    let config = config();
    let stop = StopSignal::new();

    let monitor = StreamMonitor::new(&page, extractor(), &config, &stop);
    assert_eq!(monitor.group_count(".reply").await, 3);
}

#[test]
fn test_strip_echo() {
    assert_eq!(strip_echo("  Hi\n\nHello", "Hi"), "Hello");
    assert_eq!(strip_echo("Hello", "Hi"), "Hello");
    assert_eq!(strip_echo("\nHello", ""), "Hello");
}
