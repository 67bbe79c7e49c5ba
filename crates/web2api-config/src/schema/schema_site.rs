//! Per-site automation profiles.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::secs_f64;

/// Target name that falls back to pressing Enter when it cannot be located.
pub const SEND_BUTTON_TARGET: &str = "send_btn";

/// How a site is driven: where to go, what to touch, how to read replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub url: String,

    /// Logical target name to selector(s).
    #[serde(default)]
    pub selectors: HashMap<String, SelectorEntry>,

    #[serde(default)]
    pub workflow: Vec<WorkflowStep>,

    /// Randomized human-like delays after key presses.
    #[serde(default)]
    pub stealth: bool,

    #[serde(default)]
    pub extractor: ExtractorKind,

    /// Model names routed to this site in addition to the domain itself.
    #[serde(default)]
    pub models: Vec<String>,
}

impl SiteConfig {
    /// Selector candidates for a logical target, primary first.
    pub fn selectors_for(&self, target: &str) -> Vec<String> {
        self.selectors
            .get(target)
            .map(SelectorEntry::candidates)
            .unwrap_or_default()
    }

    /// Target of the first stream-wait step, if any.
    pub fn reply_target(&self) -> Option<&str> {
        self.workflow
            .iter()
            .find(|step| step.action == StepAction::StreamWait)
            .and_then(|step| step.target.as_deref())
    }
}

/// A single selector or an ordered list of fallbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorEntry {
    One(String),
    Many(Vec<String>),
}

impl SelectorEntry {
    pub fn candidates(&self) -> Vec<String> {
        match self {
            SelectorEntry::One(s) => vec![s.clone()],
            SelectorEntry::Many(list) => list.clone(),
        }
    }
}

/// One declarative workflow step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub action: StepAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<StepValue>,

    /// Failures of optional steps are logged and skipped.
    #[serde(default)]
    pub optional: bool,
}

impl WorkflowStep {
    pub fn new(action: StepAction) -> Self {
        Self {
            action,
            target: None,
            value: None,
            optional: false,
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn value(mut self, value: impl Into<StepValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepAction {
    Wait,
    KeyPress,
    Click,
    FillInput,
    StreamWait,
}

impl StepAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepAction::Wait => "WAIT",
            StepAction::KeyPress => "KEY_PRESS",
            StepAction::Click => "CLICK",
            StepAction::FillInput => "FILL_INPUT",
            StepAction::StreamWait => "STREAM_WAIT",
        }
    }

    /// Whether the action operates on a located element.
    pub fn needs_target(&self) -> bool {
        matches!(
            self,
            StepAction::Click | StepAction::FillInput | StepAction::StreamWait
        )
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step argument: TOML strings and numbers are both accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepValue {
    Number(f64),
    Text(String),
}

impl StepValue {
    pub fn as_text(&self) -> String {
        match self {
            StepValue::Number(n) => n.to_string(),
            StepValue::Text(s) => s.clone(),
        }
    }

    pub fn as_seconds(&self) -> Option<f64> {
        let secs = match self {
            StepValue::Number(n) => *n,
            StepValue::Text(s) => s.trim().parse().ok()?,
        };
        (secs.is_finite() && secs >= 0.0).then_some(secs)
    }

    /// [`as_seconds`](Self::as_seconds) as a capped [`Duration`].
    pub fn as_duration(&self) -> Option<Duration> {
        self.as_seconds().map(secs_f64)
    }
}

impl From<&str> for StepValue {
    fn from(s: &str) -> Self {
        StepValue::Text(s.to_string())
    }
}

impl From<String> for StepValue {
    fn from(s: String) -> Self {
        StepValue::Text(s)
    }
}

impl From<f64> for StepValue {
    fn from(n: f64) -> Self {
        StepValue::Number(n)
    }
}

/// Reply text extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// Visible text of each group.
    Shallow,
    /// Recursive text-node walk.
    Deep,
    /// Shallow, falling back to deep on empty text.
    #[default]
    Hybrid,
}
