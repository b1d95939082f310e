use crate::lookup_browser::{
    behavioral::BehavioralEngine,
    context::{BrowserEngine, BrowserHandle, BrowsingContext, ContextProfile},
    page::LookupPage,
    stealth::build_stealth_arguments,
};
use anyhow::{anyhow, bail, Context as _, Result};
use async_trait::async_trait;
use fantoccini::ClientBuilder;
use lookup_common::ExtractorConfig;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use url::Url;
use webdriver::capabilities::Capabilities;

const DRIVER_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const DRIVER_STARTUP_POLL: Duration = Duration::from_millis(100);
const DRIVER_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Browser engine backed by chromedriver.
///
/// Either connects to an already running WebDriver endpoint, or spawns
/// chromedriver itself when `chromedriver_path` is configured.
pub struct ChromeDriverEngine {
    webdriver_url: String,
    chromedriver_path: Option<PathBuf>,
    chrome_binary: Option<PathBuf>,
}

impl ChromeDriverEngine {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            webdriver_url: config.webdriver_url.clone(),
            chromedriver_path: config.chromedriver_path.clone(),
            chrome_binary: config.chrome_binary.clone(),
        }
    }
}

#[async_trait]
impl BrowserEngine for ChromeDriverEngine {
    async fn launch(&self) -> Result<Arc<dyn BrowserHandle>> {
        let endpoint = Url::parse(&self.webdriver_url)
            .with_context(|| format!("invalid webdriver url: {}", self.webdriver_url))?;

        let child = match &self.chromedriver_path {
            Some(path) => Some(spawn_chromedriver(path, &endpoint).await?),
            None => {
                ensure_reachable(&endpoint).await?;
                None
            }
        };

        info!(
            target: "browser.session",
            endpoint = %endpoint,
            managed = child.is_some(),
            "webdriver endpoint ready"
        );

        Ok(Arc::new(ChromeDriverBrowser {
            endpoint: endpoint.to_string(),
            chrome_binary: self.chrome_binary.clone(),
            child: Mutex::new(child),
            closed: AtomicBool::new(false),
            behavioral_engine: BehavioralEngine::new(),
        }))
    }
}

fn host_and_port(endpoint: &Url) -> (String, u16) {
    (
        endpoint.host_str().unwrap_or("localhost").to_string(),
        endpoint.port_or_known_default().unwrap_or(9515),
    )
}

/// Fail fast when nothing listens on an externally managed endpoint.
async fn ensure_reachable(endpoint: &Url) -> Result<()> {
    let (host, port) = host_and_port(endpoint);
    let connect = TcpStream::connect((host.as_str(), port));
    match tokio::time::timeout(DRIVER_CONNECT_TIMEOUT, connect).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(err)) => bail!("webdriver endpoint {host}:{port} not reachable: {err}"),
        Err(_) => bail!(
            "webdriver endpoint {host}:{port} not reachable within {DRIVER_CONNECT_TIMEOUT:?}"
        ),
    }
}

async fn spawn_chromedriver(path: &Path, endpoint: &Url) -> Result<Child> {
    let (host, port) = host_and_port(endpoint);

    let child = Command::new(path)
        .arg(format!("--port={port}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn chromedriver at {}", path.display()))?;

    let started = Instant::now();
    loop {
        if TcpStream::connect((host.as_str(), port)).await.is_ok() {
            debug!(target: "browser.session", %host, port, "chromedriver accepting connections");
            return Ok(child);
        }
        if started.elapsed() >= DRIVER_STARTUP_TIMEOUT {
            bail!("chromedriver did not listen on {host}:{port} within {DRIVER_STARTUP_TIMEOUT:?}");
        }
        sleep(DRIVER_STARTUP_POLL).await;
    }
}

/// Running engine: hands out one WebDriver session (a fresh Chrome profile) per context.
pub struct ChromeDriverBrowser {
    endpoint: String,
    chrome_binary: Option<PathBuf>,
    child: Mutex<Option<Child>>,
    closed: AtomicBool,
    behavioral_engine: BehavioralEngine,
}

impl ChromeDriverBrowser {
    fn capabilities(&self, profile: &ContextProfile) -> Capabilities {
        let mut caps = Capabilities::new();
        let mut chrome_opts = Map::new();

        chrome_opts.insert("args".to_string(), json!(build_stealth_arguments(profile)));
        chrome_opts.insert("excludeSwitches".to_string(), json!(["enable-automation"]));
        chrome_opts.insert("useAutomationExtension".to_string(), json!(false));
        if let Some(binary) = &self.chrome_binary {
            chrome_opts.insert("binary".to_string(), json!(binary.display().to_string()));
        }

        caps.insert("goog:chromeOptions".to_string(), Value::Object(chrome_opts));
        // "eager" resolves navigation on DOMContentLoaded.
        caps.insert("pageLoadStrategy".to_string(), json!("eager"));
        caps
    }
}

#[async_trait]
impl BrowserHandle for ChromeDriverBrowser {
    async fn new_context(&self, profile: &ContextProfile) -> Result<Box<dyn BrowsingContext>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(anyhow!("browser session has been released"));
        }

        let client = ClientBuilder::native()
            .capabilities(self.capabilities(profile))
            .connect(&self.endpoint)
            .await?;

        let page = LookupPage::new(client, self.behavioral_engine.clone());
        page.prepare(profile).await;
        Ok(Box::new(page))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(err) = child.kill().await {
                warn!(target: "browser.session", error = %err, "failed to stop chromedriver");
                return Err(err.into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup_browser::fingerprint::UserAgentManager;
    use crate::lookup_browser::stealth::StealthProfile;

    fn browser(binary: Option<&str>) -> ChromeDriverBrowser {
        ChromeDriverBrowser {
            endpoint: "http://localhost:9515".to_string(),
            chrome_binary: binary.map(PathBuf::from),
            child: Mutex::new(None),
            closed: AtomicBool::new(false),
            behavioral_engine: BehavioralEngine::new(),
        }
    }

    #[test]
    fn capabilities_request_eager_loading_without_automation_switch() {
        let profile = UserAgentManager::new().context_profile(StealthProfile::Lightweight);
        let caps = browser(Some("/usr/bin/chromium")).capabilities(&profile);

        assert_eq!(caps["pageLoadStrategy"], json!("eager"));
        let opts = &caps["goog:chromeOptions"];
        assert_eq!(opts["excludeSwitches"], json!(["enable-automation"]));
        assert_eq!(opts["binary"], json!("/usr/bin/chromium"));
        let args = opts["args"].as_array().unwrap();
        assert!(args.contains(&json!("--no-sandbox")));
    }

    #[tokio::test]
    async fn closed_browser_refuses_new_contexts() {
        let browser = browser(None);
        browser.close().await.unwrap();
        browser.close().await.unwrap();
        let profile = UserAgentManager::new().context_profile(StealthProfile::Balanced);
        let err = browser.new_context(&profile).await.err().unwrap();
        assert!(err.to_string().contains("released"));
    }

    fn engine_for(url: String) -> ChromeDriverEngine {
        ChromeDriverEngine::new(&ExtractorConfig {
            webdriver_url: url,
            ..ExtractorConfig::default()
        })
    }

    #[tokio::test]
    async fn launch_fails_when_nothing_listens() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = engine_for(format!("http://127.0.0.1:{port}"))
            .launch()
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("not reachable"), "{err}");
    }

    #[tokio::test]
    async fn launch_accepts_listening_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let browser = engine_for(format!("http://127.0.0.1:{port}"))
            .launch()
            .await
            .unwrap();
        browser.close().await.unwrap();
    }

    #[tokio::test]
    async fn launch_rejects_malformed_endpoint() {
        let engine = ChromeDriverEngine::new(&ExtractorConfig {
            webdriver_url: "not a url".to_string(),
            ..ExtractorConfig::default()
        });
        assert!(engine.launch().await.is_err());
    }
}
