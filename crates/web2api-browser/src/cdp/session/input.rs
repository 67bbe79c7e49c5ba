//! Input (mouse and keyboard) operations for CDP page session.

use serde_json::json;
use tracing::debug;

use crate::cdp::error::CdpError;
use crate::cdp::protocol::{KeyEventType, MouseButton, MouseEventType};

use super::core::PageSession;

/// What `Input.dispatchKeyEvent` needs to produce a trusted key event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDefinition {
    pub key: String,
    pub code: String,
    pub key_code: i64,
    /// Character inserted by the key, if any.
    pub text: Option<String>,
}

impl KeyDefinition {
    fn named(key: &str, code: &str, key_code: i64, text: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            code: code.to_string(),
            key_code,
            text: text.map(str::to_string),
        }
    }

    /// Resolve a key name (`Enter`, `Backspace`, `a`, ...) to its definition.
    pub fn resolve(key: &str) -> Self {
        match key {
            "Enter" | "Return" => Self::named("Enter", "Enter", 13, Some("\r")),
            "Backspace" => Self::named("Backspace", "Backspace", 8, None),
            "Delete" => Self::named("Delete", "Delete", 46, None),
            "Tab" => Self::named("Tab", "Tab", 9, None),
            "Escape" | "Esc" => Self::named("Escape", "Escape", 27, None),
            " " | "Space" => Self::named(" ", "Space", 32, Some(" ")),
            "ArrowLeft" => Self::named("ArrowLeft", "ArrowLeft", 37, None),
            "ArrowUp" => Self::named("ArrowUp", "ArrowUp", 38, None),
            "ArrowRight" => Self::named("ArrowRight", "ArrowRight", 39, None),
            "ArrowDown" => Self::named("ArrowDown", "ArrowDown", 40, None),
            "Home" => Self::named("Home", "Home", 36, None),
            "End" => Self::named("End", "End", 35, None),
            other => Self::character(other),
        }
    }

    fn character(key: &str) -> Self {
        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => {
                let upper = c.to_ascii_uppercase();
                Self::named(key, &format!("Key{}", upper), upper as i64, Some(key))
            }
            (Some(c), None) if c.is_ascii_digit() => {
                Self::named(key, &format!("Digit{}", c), c as i64, Some(key))
            }
            (Some(_), None) => Self::named(key, "", 0, Some(key)),
            _ => Self::named(key, key, 0, None),
        }
    }
}

impl PageSession {
    /// Click at coordinates.
    pub async fn click(&self, x: f64, y: f64) -> Result<(), CdpError> {
        for event_type in [MouseEventType::MousePressed, MouseEventType::MouseReleased] {
            self.call(
                "Input.dispatchMouseEvent",
                Some(json!({
                    "type": event_type,
                    "x": x,
                    "y": y,
                    "button": MouseButton::Left,
                    "clickCount": 1,
                })),
            )
            .await?;
        }

        debug!("Clicked at ({}, {})", x, y);
        Ok(())
    }

    /// Move mouse to coordinates.
    pub async fn mouse_move(&self, x: f64, y: f64) -> Result<(), CdpError> {
        self.call(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": MouseEventType::MouseMoved,
                "x": x,
                "y": y,
                "button": MouseButton::None,
            })),
        )
        .await?;
        Ok(())
    }

    /// Insert text at the caret as if it were typed or pasted.
    pub async fn insert_text(&self, text: &str) -> Result<(), CdpError> {
        self.call("Input.insertText", Some(json!({"text": text})))
            .await?;
        debug!("Inserted {} characters", text.chars().count());
        Ok(())
    }

    /// Press a key or key combination (e.g., `Enter`, `Control+a`).
    pub async fn press_key(&self, combo: &str) -> Result<(), CdpError> {
        let (modifier_names, key) = Self::split_combo(combo);
        let modifiers = Self::get_modifiers(&modifier_names);
        let def = KeyDefinition::resolve(key);

        let down_type = if def.text.is_some() && modifiers == 0 {
            KeyEventType::KeyDown
        } else {
            KeyEventType::RawKeyDown
        };

        let mut down = json!({
            "type": down_type,
            "key": def.key,
            "code": def.code,
            "windowsVirtualKeyCode": def.key_code,
            "nativeVirtualKeyCode": def.key_code,
            "modifiers": modifiers,
        });

        // Modified keys must not insert their character.
        if modifiers == 0 {
            if let Some(ref text) = def.text {
                down["text"] = json!(text);
                down["unmodifiedText"] = json!(text);
            }
        }

        if Self::is_select_all(modifiers, &def.key) {
            down["commands"] = json!(["selectAll"]);
        }

        self.call("Input.dispatchKeyEvent", Some(down)).await?;

        self.call(
            "Input.dispatchKeyEvent",
            Some(json!({
                "type": KeyEventType::KeyUp,
                "key": def.key,
                "code": def.code,
                "windowsVirtualKeyCode": def.key_code,
                "nativeVirtualKeyCode": def.key_code,
                "modifiers": modifiers,
            })),
        )
        .await?;

        debug!("Pressed {}", combo);
        Ok(())
    }

    /// Split `Control+Shift+a` into modifiers and the final key.
    ///
    /// A literal `+` key is kept (`Control++`).
    pub(super) fn split_combo(combo: &str) -> (Vec<&str>, &str) {
        if combo.len() > 1 && combo.ends_with("++") {
            let head = &combo[..combo.len() - 2];
            let modifiers = head.split('+').filter(|s| !s.is_empty()).collect();
            return (modifiers, "+");
        }
        if combo == "+" {
            return (Vec::new(), "+");
        }

        let mut parts: Vec<&str> = combo.split('+').collect();
        let key = parts.pop().unwrap_or("");
        (parts, key)
    }

    /// Get modifier flags from modifier names.
    pub(super) fn get_modifiers(modifiers: &[&str]) -> i32 {
        let mut flags = 0;
        for m in modifiers {
            match m.to_lowercase().as_str() {
                "alt" => flags |= 1,
                "control" | "ctrl" => flags |= 2,
                "meta" | "command" | "cmd" => flags |= 4,
                "shift" => flags |= 8,
                _ => {}
            }
        }
        flags
    }

    /// Ctrl+A / Cmd+A are editing commands, not characters, under CDP.
    pub(super) fn is_select_all(modifiers: i32, key: &str) -> bool {
        (modifiers & (2 | 4)) != 0 && key.eq_ignore_ascii_case("a")
    }
}
