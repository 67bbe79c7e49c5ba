//! Step execution.

use rand::Rng;
use tracing::{debug, info, warn};
use web2api_browser::PageDriver;
use web2api_config::{SEND_BUTTON_TARGET, SiteConfig, StepAction, WorkflowStep, secs_f64};

use crate::engine::EngineSettings;
use crate::error::EngineError;
use crate::extractor::Extractor;
use crate::locator::Locator;
use crate::signal::StopSignal;
use crate::stream::{ChunkSink, StreamEnd, StreamMonitor};

/// Per-run data the steps read.
#[derive(Debug, Clone, Default)]
pub struct StepContext {
    /// Flattened conversation text typed by `FILL_INPUT`.
    pub prompt: String,
    /// Reply-region group count before the first step.
    pub baseline: Option<usize>,
}

impl StepContext {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            baseline: None,
        }
    }
}

/// Replays workflow steps against one page.
pub struct WorkflowExecutor<'a> {
    pub(super) page: &'a dyn PageDriver,
    pub(super) site: &'a SiteConfig,
    pub(super) settings: &'a EngineSettings,
    pub(super) stop: &'a StopSignal,
    sink: &'a dyn ChunkSink,
}

impl<'a> WorkflowExecutor<'a> {
    pub fn new(
        page: &'a dyn PageDriver,
        site: &'a SiteConfig,
        settings: &'a EngineSettings,
        stop: &'a StopSignal,
        sink: &'a dyn ChunkSink,
    ) -> Self {
        Self {
            page,
            site,
            settings,
            stop,
            sink,
        }
    }

    fn locator(&self) -> Locator<'a> {
        Locator::new(self.site, &self.settings.input)
    }

    fn monitor(&self) -> StreamMonitor<'_> {
        StreamMonitor::new(
            self.page,
            Extractor::new(self.site.extractor),
            &self.settings.stream,
            self.stop,
        )
    }

    /// CSS selector list covering every candidate of `target`.
    fn region_selector(&self, target: &str) -> Option<String> {
        let candidates = self.locator().candidates(target);
        (!candidates.is_empty()).then(|| candidates.join(", "))
    }

    /// Run `steps` in order. Returns the number of reply characters emitted.
    pub async fn run(
        &self,
        steps: &[WorkflowStep],
        ctx: &mut StepContext,
    ) -> Result<usize, EngineError> {
        if ctx.baseline.is_none() {
            if let Some(selector) = self.site.reply_target().and_then(|t| self.region_selector(t)) {
                let groups = self.monitor().group_count(&selector).await;
                debug!("Reply region baseline: {} group(s)", groups);
                ctx.baseline = Some(groups);
            }
        }

        let mut emitted = 0;
        for (index, step) in steps.iter().enumerate() {
            if self.stop.is_stopped() {
                return Err(EngineError::Cancelled);
            }
            debug!("Step {}: {}", index + 1, step.action);

            match self.execute_step(step, ctx).await {
                Ok(chars) => emitted += chars,
                Err(e) if step.optional && !e.is_cancelled() => {
                    warn!("Optional step {} ({}) skipped: {}", index + 1, step.action, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(emitted)
    }

    /// Execute one step.
    pub async fn execute_step(
        &self,
        step: &WorkflowStep,
        ctx: &StepContext,
    ) -> Result<usize, EngineError> {
        match step.action {
            StepAction::Wait => {
                let wait = step
                    .value
                    .as_ref()
                    .and_then(|v| v.as_duration())
                    .ok_or_else(|| EngineError::Execution("WAIT needs a duration".into()))?;
                if !self.stop.sleep(wait).await {
                    return Err(EngineError::Cancelled);
                }
                Ok(0)
            }
            StepAction::KeyPress => {
                let key = step
                    .value
                    .as_ref()
                    .map(|v| v.as_text())
                    .ok_or_else(|| EngineError::Execution("KEY_PRESS needs a key".into()))?;
                self.page.press_key(&key).await?;
                self.stealth_pause().await?;
                Ok(0)
            }
            StepAction::Click => {
                let target = required_target(step)?;
                self.click(target).await?;
                Ok(0)
            }
            StepAction::FillInput => {
                let target = required_target(step)?;
                let element = self.locate(target).await?;
                self.fill_input(&element, &ctx.prompt).await?;
                Ok(0)
            }
            StepAction::StreamWait => {
                let target = required_target(step)?;
                let selector = self
                    .region_selector(target)
                    .ok_or_else(|| not_found(target, &[]))?;
                let outcome = self
                    .monitor()
                    .run(&selector, &ctx.prompt, ctx.baseline, self.sink)
                    .await;
                match outcome.end {
                    StreamEnd::Completed => Ok(outcome.emitted_chars),
                    StreamEnd::Cancelled => Err(EngineError::Cancelled),
                    StreamEnd::TimedOut => {
                        Err(EngineError::StreamTimeout(self.settings.stream.hard_timeout()))
                    }
                }
            }
        }
    }

    pub(super) async fn locate(
        &self,
        target: &str,
    ) -> Result<web2api_browser::ElementHandle, EngineError> {
        let locator = self.locator();
        match locator.find(self.page, target, self.stop).await? {
            Some(element) => Ok(element),
            None => Err(not_found(target, &locator.candidates(target))),
        }
    }

    async fn click(&self, target: &str) -> Result<(), EngineError> {
        let locator = self.locator();
        match locator.find(self.page, target, self.stop).await? {
            Some(element) => {
                self.page.click(&element).await?;
                Ok(())
            }
            None if target == SEND_BUTTON_TARGET => {
                info!("Send button not found; pressing Enter instead");
                self.page.press_key("Enter").await?;
                Ok(())
            }
            None => Err(not_found(target, &locator.candidates(target))),
        }
    }

    /// Randomized delay after a key press on stealth sites.
    async fn stealth_pause(&self) -> Result<(), EngineError> {
        if !self.site.stealth {
            return Ok(());
        }
        let stealth = &self.settings.stealth;
        let lo = stealth.min_delay_secs;
        let hi = stealth.max_delay_secs;
        if !(lo.is_finite() && hi.is_finite()) || lo < 0.0 {
            return Ok(());
        }
        let secs = rand::rng().random_range(lo..=hi.max(lo));
        if !self.stop.sleep(secs_f64(secs)).await {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }
}

fn required_target(step: &WorkflowStep) -> Result<&str, EngineError> {
    step.target
        .as_deref()
        .ok_or_else(|| EngineError::Execution(format!("{} needs a target", step.action)))
}

fn not_found(target: &str, candidates: &[String]) -> EngineError {
    EngineError::ElementNotFound {
        target: target.to_string(),
        selectors: candidates.join(", "),
    }
}
