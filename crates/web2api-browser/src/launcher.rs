//! Chrome discovery, launch and attach.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use web2api_config::BrowserConfig;

use crate::cdp::CdpClient;
use crate::error::BrowserError;
use crate::pool::ResourceFactory;

const READY_POLL: Duration = Duration::from_millis(200);

/// A running (or attached) browser.
pub struct ChromeInstance {
    pub client: Arc<CdpClient>,
    pub port: u16,
    /// `None` when attached to a browser we did not start.
    process: Mutex<Option<Child>>,
}

impl ChromeInstance {
    pub fn is_launched(&self) -> bool {
        self.process.lock().is_some()
    }

    async fn shutdown(&self) {
        let child = self.process.lock().take();
        if let Some(mut child) = child {
            info!("Shutting down Chrome on port {}", self.port);
            if let Err(e) = child.kill().await {
                warn!("Failed to kill Chrome on port {}: {}", self.port, e);
            }
        }
    }
}

/// Launches Chrome instances with remote debugging, one profile each.
///
/// With `browser.endpoint` set, every instance attaches to that endpoint
/// instead.
pub struct ChromeLauncher {
    config: BrowserConfig,
    ports_in_use: Mutex<BTreeSet<u16>>,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            ports_in_use: Mutex::new(BTreeSet::new()),
        }
    }

    /// Find Chrome executable path.
    pub fn find_chrome() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        let paths: &[&str] = &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ];

        #[cfg(target_os = "linux")]
        let paths: &[&str] = &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ];

        #[cfg(target_os = "windows")]
        let paths: &[&str] = &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        let paths: &[&str] = &[];

        paths.iter().map(PathBuf::from).find(|p| p.exists())
    }

    fn chrome_path(&self) -> Result<PathBuf, BrowserError> {
        match &self.config.chrome_path {
            Some(path) => Ok(PathBuf::from(shellexpand::tilde(path).to_string())),
            None => Self::find_chrome().ok_or(BrowserError::ChromeNotFound),
        }
    }

    /// Lowest free port at or above the configured base.
    fn reserve_port(&self) -> u16 {
        let mut ports = self.ports_in_use.lock();
        let mut port = self.config.debug_port;
        while ports.contains(&port) {
            port = port.saturating_add(1);
        }
        ports.insert(port);
        port
    }

    fn free_port(&self, port: u16) {
        self.ports_in_use.lock().remove(&port);
    }

    /// Profile directory for the instance on `port`; stable across restarts.
    pub fn profile_dir(&self, port: u16) -> PathBuf {
        let slot = port.saturating_sub(self.config.debug_port);
        self.config.profile_root().join(format!("instance-{}", slot))
    }

    pub(crate) fn launch_args(&self, port: u16, profile_dir: &Path) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", port),
            format!("--user-data-dir={}", profile_dir.display()),
            format!(
                "--window-size={},{}",
                self.config.viewport_width, self.config.viewport_height
            ),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-sync".to_string(),
            "--disable-translate".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--metrics-recording-only".to_string(),
        ];
        if self.config.headless {
            args.push("--headless=new".to_string());
        }
        args
    }

    async fn launch(&self, port: u16) -> Result<ChromeInstance, BrowserError> {
        let chrome_path = self.chrome_path()?;
        let profile_dir = self.profile_dir(port);

        if let Err(e) = std::fs::create_dir_all(&profile_dir) {
            warn!("Failed to create profile directory: {}", e);
        }

        info!(
            "Launching Chrome on port {} with profile at: {}",
            port,
            profile_dir.display()
        );

        let mut child = Command::new(&chrome_path)
            .args(self.launch_args(port, &profile_dir))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        debug!("Chrome launched with PID: {:?}", child.id());

        let endpoint = format!("http://127.0.0.1:{}", port);
        match self.wait_until_ready(&endpoint).await {
            Ok(client) => Ok(ChromeInstance {
                client: Arc::new(client),
                port,
                process: Mutex::new(Some(child)),
            }),
            Err(e) => {
                let _ = child.kill().await;
                Err(e)
            }
        }
    }

    /// Poll the debugging endpoint until Chrome accepts a CDP connection.
    async fn wait_until_ready(&self, endpoint: &str) -> Result<CdpClient, BrowserError> {
        let deadline = tokio::time::Instant::now() + self.config.launch_timeout();
        loop {
            match CdpClient::connect(endpoint).await {
                Ok(client) => return Ok(client),
                Err(e) if tokio::time::Instant::now() >= deadline => {
                    return Err(BrowserError::LaunchFailed(format!(
                        "Chrome did not start within {:?}: {}",
                        self.config.launch_timeout(),
                        e
                    )));
                }
                Err(_) => tokio::time::sleep(READY_POLL).await,
            }
        }
    }

    async fn attach(&self, endpoint: &str) -> Result<ChromeInstance, BrowserError> {
        let client = CdpClient::connect(endpoint).await?;
        info!("Attached to Chrome at {}", endpoint);

        let port = url::Url::parse(endpoint)
            .ok()
            .and_then(|u| u.port_or_known_default())
            .unwrap_or(self.config.debug_port);

        Ok(ChromeInstance {
            client: Arc::new(client),
            port,
            process: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ResourceFactory for ChromeLauncher {
    type Handle = ChromeInstance;

    fn kind(&self) -> &'static str {
        "browser"
    }

    async fn create(&self, id: &str) -> Result<ChromeInstance, BrowserError> {
        if let Some(endpoint) = self.config.endpoint.clone() {
            debug!("Browser {} attaches to {}", id, endpoint);
            return self.attach(&endpoint).await;
        }

        let port = self.reserve_port();
        match self.launch(port).await {
            Ok(instance) => Ok(instance),
            Err(e) => {
                self.free_port(port);
                Err(e)
            }
        }
    }

    async fn destroy(&self, id: &str, handle: Arc<ChromeInstance>) {
        debug!("Destroying browser {}", id);
        if handle.is_launched() {
            handle.shutdown().await;
            self.free_port(handle.port);
        }
    }

    fn is_alive(&self, handle: &ChromeInstance) -> bool {
        handle.client.is_connected()
    }
}
