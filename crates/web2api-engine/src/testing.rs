//! Scripted in-memory page for engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use web2api_browser::{BoundingBox, BrowserError, Cookie, ElementHandle, PageDriver};

type Mangle = Arc<dyn Fn(&str) -> String + Send + Sync>;

struct FakeState {
    url: String,
    /// Where `goto` ends up instead of the requested URL.
    landing: Option<String>,
    goto_fails: bool,
    elements: HashMap<String, i64>,
    /// Region snapshots; the last one repeats. `None` is a script error.
    snapshots: VecDeque<Option<(usize, String)>>,
    last_group: Option<String>,
    input: String,
    selected: bool,
    rich: bool,
    mangle: Option<Mangle>,
    actions: Vec<String>,
    scripts: Vec<String>,
    browser_cookies: Vec<Cookie>,
    cookies_set: Vec<Cookie>,
}

/// A page whose DOM is a script of snapshots and a simulated text box.
pub(crate) struct FakePage {
    state: Mutex<FakeState>,
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                url: "about:blank".to_string(),
                landing: None,
                goto_fails: false,
                elements: HashMap::new(),
                snapshots: VecDeque::new(),
                last_group: None,
                input: String::new(),
                selected: false,
                rich: false,
                mangle: None,
                actions: Vec::new(),
                scripts: Vec::new(),
                browser_cookies: Vec::new(),
                cookies_set: Vec::new(),
            }),
        }
    }

    pub fn at(url: &str) -> Self {
        let page = Self::new();
        page.state.lock().url = url.to_string();
        page
    }

    pub fn add_element(&self, selector: &str) {
        let mut state = self.state.lock();
        let node_id = state.elements.len() as i64 + 1;
        state.elements.insert(selector.to_string(), node_id);
    }

    pub fn push_snapshot(&self, groups: usize, text: &str) {
        self.state
            .lock()
            .snapshots
            .push_back(Some((groups, text.to_string())));
    }

    pub fn push_snapshots(&self, groups: usize, texts: &[&str]) {
        for text in texts {
            self.push_snapshot(groups, text);
        }
    }

    pub fn push_snapshot_failure(&self) {
        self.state.lock().snapshots.push_back(None);
    }

    pub fn set_last_group(&self, text: Option<&str>) {
        self.state.lock().last_group = text.map(str::to_string);
    }

    pub fn set_rich(&self, rich: bool) {
        self.state.lock().rich = rich;
    }

    /// Distort what the text box reports on read-back.
    pub fn set_mangle(&self, mangle: impl Fn(&str) -> String + Send + Sync + 'static) {
        self.state.lock().mangle = Some(Arc::new(mangle));
    }

    pub fn set_input(&self, text: &str) {
        self.state.lock().input = text.to_string();
    }

    pub fn set_landing(&self, url: &str) {
        self.state.lock().landing = Some(url.to_string());
    }

    pub fn fail_navigation(&self) {
        self.state.lock().goto_fails = true;
    }

    pub fn set_browser_cookies(&self, cookies: Vec<Cookie>) {
        self.state.lock().browser_cookies = cookies;
    }

    pub fn input_value(&self) -> String {
        self.state.lock().input.clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.state.lock().scripts.clone()
    }

    pub fn cookies_set(&self) -> Vec<Cookie> {
        self.state.lock().cookies_set.clone()
    }

    pub fn url(&self) -> String {
        self.state.lock().url.clone()
    }

    fn next_snapshot(state: &mut FakeState) -> Option<(usize, String)> {
        if state.snapshots.len() > 1 {
            state.snapshots.pop_front().flatten()
        } else {
            match state.snapshots.front() {
                Some(entry) => entry.clone(),
                None => Some((0, String::new())),
            }
        }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        state.actions.push(format!("goto:{}", url));
        if state.goto_fails {
            return Err(BrowserError::NavigationFailed(url.to_string()));
        }
        state.url = state.landing.clone().unwrap_or_else(|| url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.state.lock().url.clone())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let mut state = self.state.lock();
        state.scripts.push(script.to_string());

        if script.contains("return regionSnapshot(") {
            return match Self::next_snapshot(&mut state) {
                Some((groups, text)) => Ok(json!({ "groups": groups, "text": text })),
                None => Err(BrowserError::Script("region unavailable".to_string())),
            };
        }
        if script.contains("return lastGroupText(") {
            return Ok(state.last_group.clone().map(Value::String).unwrap_or(Value::Null));
        }
        if script.contains("return readInputValue(") {
            let text = match &state.mangle {
                Some(mangle) => mangle(&state.input),
                None => state.input.clone(),
            };
            return Ok(json!({ "text": text, "rich": state.rich }));
        }
        Ok(Value::Null)
    }

    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, BrowserError> {
        Ok(self
            .state
            .lock()
            .elements
            .get(selector)
            .map(|&node_id| ElementHandle {
                selector: selector.to_string(),
                node_id,
            }))
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.state
            .lock()
            .actions
            .push(format!("click:{}", element.selector));
        Ok(())
    }

    async fn focus(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.state
            .lock()
            .actions
            .push(format!("focus:{}", element.selector));
        Ok(())
    }

    async fn bounding_box(
        &self,
        _element: &ElementHandle,
    ) -> Result<Option<BoundingBox>, BrowserError> {
        Ok(Some(BoundingBox {
            x: 10.0,
            y: 10.0,
            width: 100.0,
            height: 20.0,
        }))
    }

    async fn insert_text(&self, text: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        if state.selected {
            state.input.clear();
            state.selected = false;
        }
        state.input.push_str(text);
        state.actions.push(format!("insert:{}", text.chars().count()));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        state.actions.push(format!("key:{}", key));
        match key {
            "Control+a" | "Meta+a" => state.selected = true,
            "Delete" | "Backspace" => {
                if state.selected {
                    state.input.clear();
                } else {
                    state.input.pop();
                }
                state.selected = false;
            }
            " " | "Space" => {
                if state.selected {
                    state.input.clear();
                }
                state.input.push(' ');
                state.selected = false;
            }
            _ => {}
        }
        Ok(())
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), BrowserError> {
        self.state.lock().actions.push(format!("move:{},{}", x, y));
        Ok(())
    }

    async fn get_cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
        Ok(self.state.lock().browser_cookies.clone())
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        state.actions.push(format!("set_cookies:{}", cookies.len()));
        state.cookies_set.extend_from_slice(cookies);
        Ok(())
    }
}

pub(crate) fn cookie(name: &str, domain: &str) -> Cookie {
    Cookie {
        name: name.to_string(),
        value: format!("{}-value", name),
        domain: domain.to_string(),
        path: "/".to_string(),
        expires: None,
        http_only: false,
        secure: true,
        same_site: None,
    }
}
