//! `FILL_INPUT`: clear, type, activate, then verify and fix.
//!
//! Chat boxes are often rich-text editors that reformat what they receive,
//! so the typed text is read back and compared leniently before sending.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};
use web2api_browser::ElementHandle;

use super::executor::WorkflowExecutor;
use crate::error::EngineError;
use crate::extractor::js_string;

const READ_INPUT_JS: &str = r#"
  function readInputValue(sel) {
    const el = document.querySelector(sel);
    if (!el) return null;
    if (el.isContentEditable) return { text: el.innerText || '', rich: true };
    return { text: el.value ?? el.textContent ?? '', rich: false };
  }
"#;

#[derive(Debug, Deserialize)]
struct InputReadback {
    text: String,
    #[serde(default)]
    rich: bool,
}

fn excess_newlines() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").ok()).as_ref()
}

fn normalize(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = match excess_newlines() {
        Some(re) => re.replace_all(&text, "\n\n").into_owned(),
        None => text,
    };
    text.trim().to_string()
}

/// Whether the control's content counts as the expected text.
pub(crate) fn input_matches(expected: &str, actual: &str, rich: bool) -> bool {
    if expected == actual || normalize(expected) == normalize(actual) {
        return true;
    }
    if rich {
        let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        return strip(expected) == strip(actual);
    }
    false
}

impl WorkflowExecutor<'_> {
    /// Type `text` into `element` and make sure it arrived intact.
    pub(super) async fn fill_input(
        &self,
        element: &ElementHandle,
        text: &str,
    ) -> Result<(), EngineError> {
        let attempts = self.settings.input.verify_attempts.max(1);
        for attempt in 1..=attempts {
            self.clear_input(element).await?;
            self.type_text(text).await?;
            self.activate_input().await?;

            match self.read_input(&element.selector).await {
                Some(read) if input_matches(text, &read.text, read.rich) => {
                    debug!("Input verified on attempt {}", attempt);
                    return Ok(());
                }
                Some(read) => warn!(
                    "Input mismatch on attempt {}/{}: expected {} chars, found {}",
                    attempt,
                    attempts,
                    text.chars().count(),
                    read.text.chars().count()
                ),
                None => warn!(
                    "Could not read back '{}' on attempt {}/{}",
                    element.selector, attempt, attempts
                ),
            }
        }
        Err(EngineError::InputMismatch { attempts })
    }

    async fn clear_input(&self, element: &ElementHandle) -> Result<(), EngineError> {
        self.page.focus(element).await?;
        self.page.press_key("Control+a").await?;
        self.page.press_key("Delete").await?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), EngineError> {
        let chunk_size = self.settings.input.chunk_size.max(1);
        if text.chars().count() <= chunk_size {
            self.page.insert_text(text).await?;
            return Ok(());
        }

        let chars: Vec<char> = text.chars().collect();
        let total = chars.len().div_ceil(chunk_size);
        for (index, chunk) in chars.chunks(chunk_size).enumerate() {
            if self.stop.is_stopped() {
                return Err(EngineError::Cancelled);
            }
            let piece: String = chunk.iter().collect();
            self.page.insert_text(&piece).await?;
            debug!("Typed chunk {}/{}", index + 1, total);

            if index + 1 < total && !self.stop.sleep(self.settings.input.chunk_pause()).await {
                return Err(EngineError::Cancelled);
            }
        }
        Ok(())
    }

    /// Real key events so frameworks listening for keystrokes enable sending.
    async fn activate_input(&self) -> Result<(), EngineError> {
        self.page.press_key(" ").await?;
        self.page.press_key("Backspace").await?;
        Ok(())
    }

    async fn read_input(&self, selector: &str) -> Option<InputReadback> {
        let script = format!(
            "(() => {{{}\n  return readInputValue({});\n}})()",
            READ_INPUT_JS,
            js_string(selector)
        );
        match self.page.evaluate(&script).await {
            Ok(value) => serde_json::from_value(value).ok(),
            Err(e) => {
                debug!("Read-back of '{}' failed: {}", selector, e);
                None
            }
        }
    }
}
