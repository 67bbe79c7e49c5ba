//! Reply region monitor.
//!
//! The page gives no "done" event, so completion is inferred from the shape
//! of repeated snapshots: a reply is finished once it has stayed unchanged
//! for `stability_threshold` samples and then produced nothing new for the
//! silence threshold.

use tokio::time::Instant;
use tracing::{debug, info, warn};
use web2api_browser::PageDriver;
use web2api_config::StreamConfig;

use super::context::{Observation, StreamContext};
use super::{ChunkSink, StreamEnd, StreamOutcome};
use crate::extractor::Extractor;
use crate::signal::StopSignal;

/// Watches one reply region and forwards new text to a sink.
pub struct StreamMonitor<'a> {
    page: &'a dyn PageDriver,
    extractor: Extractor,
    config: &'a StreamConfig,
    stop: &'a StopSignal,
}

impl<'a> StreamMonitor<'a> {
    pub fn new(
        page: &'a dyn PageDriver,
        extractor: Extractor,
        config: &'a StreamConfig,
        stop: &'a StopSignal,
    ) -> Self {
        Self {
            page,
            extractor,
            config,
            stop,
        }
    }

    /// Number of message groups currently in the region.
    pub async fn group_count(&self, selector: &str) -> usize {
        self.extractor
            .snapshot(self.page, selector, 0)
            .await
            .map(|s| s.groups)
            .unwrap_or(0)
    }

    async fn read(&self, selector: &str, from_group: usize) -> Option<String> {
        self.extractor
            .snapshot(self.page, selector, from_group)
            .await
            .map(|s| s.text)
    }

    /// Monitor the reply to `user_input` until it completes, the stop signal
    /// trips, or the hard timeout passes.
    ///
    /// `baseline` is the group count taken before the prompt was sent;
    /// it is measured here when absent.
    pub async fn run(
        &self,
        selector: &str,
        user_input: &str,
        baseline: Option<usize>,
        sink: &dyn ChunkSink,
    ) -> StreamOutcome {
        let from_group = match baseline {
            Some(groups) => groups,
            None => self.group_count(selector).await,
        };
        debug!("Monitoring '{}' from group {}", selector, from_group);

        let Some(mut ctx) = self.confirm_user_turn(selector, from_group).await else {
            return self.outcome(StreamEnd::Cancelled, 0);
        };
        self.response_loop(selector, from_group, user_input, &mut ctx, sink)
            .await
    }

    /// Wait until the region stops growing after the prompt is sent.
    ///
    /// Returns `None` if stopped meanwhile.
    async fn confirm_user_turn(&self, selector: &str, from_group: usize) -> Option<StreamContext> {
        let deadline = Instant::now() + self.config.confirm_window();
        let mut last: Option<String> = None;
        let mut longest = String::new();
        let mut steady = 0u32;

        loop {
            if self.stop.is_stopped() {
                return None;
            }

            let text = self.read(selector, from_group).await.unwrap_or_default();
            let len = text.chars().count();
            if let Some(prev) = &last {
                if len <= prev.chars().count() {
                    steady += 1;
                } else {
                    steady = 0;
                }
            }
            if len > longest.chars().count() {
                longest = text.clone();
            }
            last = Some(text);

            if steady >= self.config.confirm_stable_polls {
                break;
            }
            if Instant::now() >= deadline {
                warn!(
                    "User message not confirmed within {:?}; using last snapshot",
                    self.config.confirm_window()
                );
                break;
            }
            if !self.stop.sleep(self.config.confirm_poll()).await {
                return None;
            }
        }

        let text = last.unwrap_or_default();
        let mut ctx = StreamContext::for_turn(&text, self.config.shrink_tolerance);
        // Text the region showed past the turn and then hid is recoverable later.
        if longest.starts_with(text.as_str()) {
            ctx.remember(&longest);
        }
        debug!("Active turn baseline: {} chars", ctx.baseline_len());
        Some(ctx)
    }

    async fn response_loop(
        &self,
        selector: &str,
        from_group: usize,
        user_input: &str,
        ctx: &mut StreamContext,
        sink: &dyn ChunkSink,
    ) -> StreamOutcome {
        let started = Instant::now();
        let hard_deadline = started + self.config.hard_timeout();
        let start_deadline = started + self.config.response_start_timeout();
        let echo = user_input.trim();

        let mut emitted = 0usize;
        let mut first = true;
        let mut armed_at: Option<Instant> = None;

        loop {
            if self.stop.is_stopped() {
                return self.outcome(StreamEnd::Cancelled, emitted);
            }
            if Instant::now() >= hard_deadline {
                warn!(
                    "Reply on '{}' hit the hard timeout of {:?}",
                    selector,
                    self.config.hard_timeout()
                );
                return self.outcome(StreamEnd::TimedOut, emitted);
            }
            if !self.stop.sleep(self.config.poll_interval()).await {
                return self.outcome(StreamEnd::Cancelled, emitted);
            }

            let observation = match self.read(selector, from_group).await {
                Some(text) => ctx.observe(&text),
                None => Observation::Stable(ctx.idle_tick()),
            };

            match observation {
                Observation::Emit(delta) => {
                    armed_at = None;
                    let delta = if first {
                        strip_echo(&delta, echo)
                    } else {
                        delta
                    };
                    if delta.is_empty() {
                        continue;
                    }
                    first = false;
                    emitted += delta.chars().count();
                    if !sink.send_delta(delta).await {
                        debug!("Chunk receiver dropped; stopping");
                        self.stop.cancel();
                        return self.outcome(StreamEnd::Cancelled, emitted);
                    }
                }
                Observation::Rerender => {
                    debug!("Reply region re-rendering");
                    armed_at = None;
                }
                Observation::Jitter => {}
                Observation::Stable(count) => {
                    if count >= self.config.stability_threshold && armed_at.is_none() {
                        armed_at = Some(Instant::now());
                    }
                }
            }

            let Some(since) = armed_at else {
                continue;
            };
            let now = Instant::now();
            if emitted == 0 && now < start_deadline {
                continue;
            }
            if now.duration_since(since) >= self.config.silence_threshold() {
                return self.outcome(StreamEnd::Completed, emitted);
            }
        }
    }

    fn outcome(&self, end: StreamEnd, emitted_chars: usize) -> StreamOutcome {
        info!("Stream ended: {:?} ({} chars)", end, emitted_chars);
        StreamOutcome { end, emitted_chars }
    }
}

/// Drop the user's own text if the site rendered it ahead of the reply.
fn strip_echo(delta: &str, echo: &str) -> String {
    let rest = match delta.trim_start().strip_prefix(echo) {
        Some(rest) if !echo.is_empty() => rest,
        _ => delta,
    };
    rest.trim_start().to_string()
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
