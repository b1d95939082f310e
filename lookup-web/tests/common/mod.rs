//! Scripted in-memory browser for driving the extractor without chromedriver.
#![allow(dead_code)]

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use lookup_drivers::lookup_browser::context::{
    BrowserEngine, BrowserHandle, BrowsingContext, ContextProfile, ElementFacts,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::time::Instant;

use lookup_common::observability::{LogFormat, LoggingSettings, init_logging};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

/// Route extractor logs to a temp dir (and stderr) once per test binary.
pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let settings = LoggingSettings {
            dir: Some(std::env::temp_dir().join("lookup-tests")),
            format: LogFormat::Text,
            stderr: true,
            filter: "debug".to_string(),
        };
        init_logging("lookup-tests", &settings).unwrap_or_default()
    });
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub tag: String,
    pub class: String,
    pub id: String,
    pub role: String,
    pub text: String,
    pub height: f64,
}

impl FakeElement {
    pub fn new(tag: &str, text: impl Into<String>) -> Self {
        Self {
            tag: tag.to_string(),
            class: String::new(),
            id: String::new(),
            role: String::new(),
            text: text.into(),
            height: 400.0,
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        self.class = class.to_string();
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    pub fn height(mut self, height: f64) -> Self {
        self.height = height;
        self
    }

    fn attr(&self, name: &str) -> &str {
        match name {
            "class" => &self.class,
            "id" => &self.id,
            "role" => &self.role,
            _ => "",
        }
    }

    /// Understands the selector shapes the extractor uses: `tag`, `.class`,
    /// `#id`, `[attr='v']` and `[attr*='v']`.
    pub fn matches(&self, selector: &str) -> bool {
        if let Some(class) = selector.strip_prefix('.') {
            return self.class.split_whitespace().any(|c| c == class);
        }
        if let Some(id) = selector.strip_prefix('#') {
            return self.id == id;
        }
        if let Some(inner) = selector
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
        {
            if let Some((attr, value)) = inner.split_once("*=") {
                let value = value.trim_matches(|c| c == '\'' || c == '"');
                return self.attr(attr).contains(value);
            }
            if let Some((attr, value)) = inner.split_once('=') {
                let value = value.trim_matches(|c| c == '\'' || c == '"');
                return self.attr(attr) == value;
            }
            return false;
        }
        self.tag == selector
    }
}

#[derive(Debug, Clone)]
pub enum FakeNavigation {
    Loaded(Option<u16>),
    Fails(String),
    Hangs,
}

#[derive(Debug, Clone)]
pub enum FakeReady {
    Present,
    /// Waits out the whole timeout, then reports absence.
    TimesOut,
    Fails(String),
}

#[derive(Debug, Clone)]
pub enum FakeClose {
    Clean,
    Fails(String),
    Hangs,
}

#[derive(Debug, Clone)]
pub struct FakeChallenge {
    pub title: String,
    pub body: String,
    /// Measured from navigation. `None` never clears.
    pub clears_after: Option<Duration>,
}

impl FakeChallenge {
    pub fn cloudflare(clears_after: Option<Duration>) -> Self {
        Self {
            title: "Just a moment...".into(),
            body: "Checking your browser before accessing the site.".into(),
            clears_after,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageScript {
    pub navigation: FakeNavigation,
    pub ready: FakeReady,
    pub close: FakeClose,
    pub title: String,
    pub elements: Vec<FakeElement>,
    pub challenge: Option<FakeChallenge>,
    /// Selectors whose queries error out.
    pub failing_selectors: Vec<String>,
}

impl PageScript {
    pub fn loaded(title: &str, elements: Vec<FakeElement>) -> Self {
        Self {
            navigation: FakeNavigation::Loaded(Some(200)),
            ready: FakeReady::Present,
            close: FakeClose::Clean,
            title: title.to_string(),
            elements,
            challenge: None,
            failing_selectors: Vec::new(),
        }
    }

    pub fn hanging() -> Self {
        Self {
            navigation: FakeNavigation::Hangs,
            ..Self::loaded("", Vec::new())
        }
    }

    pub fn with_navigation(mut self, navigation: FakeNavigation) -> Self {
        self.navigation = navigation;
        self
    }

    pub fn with_ready(mut self, ready: FakeReady) -> Self {
        self.ready = ready;
        self
    }

    pub fn with_close(mut self, close: FakeClose) -> Self {
        self.close = close;
        self
    }

    pub fn with_challenge(mut self, challenge: FakeChallenge) -> Self {
        self.challenge = Some(challenge);
        self
    }

    pub fn failing(mut self, selector: &str) -> Self {
        self.failing_selectors.push(selector.to_string());
        self
    }
}

/// A typical article page: chrome around one long `<article>`.
pub fn article_page(title: &str, article: &str) -> PageScript {
    PageScript::loaded(
        title,
        vec![
            FakeElement::new("script", "window.tracking = true;"),
            FakeElement::new("nav", "Home News Sport").height(60.0),
            FakeElement::new("article", article),
            FakeElement::new("footer", "Copyright 2024").height(80.0),
        ],
    )
}

pub fn sample_article() -> String {
    [
        "The river council met on Tuesday to review the flood defences along the eastern bank.",
        "Engineers presented survey results showing that the embankment had settled in three places.",
        "Repairs are scheduled to begin next month and should finish before the winter rains arrive.",
    ]
    .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Launched,
    Opened(usize),
    /// Navigation started with this browser-side budget.
    NavigationStarted(usize, Duration),
    Navigated(usize),
    AwaitedReady(usize, Duration),
    Queried(usize, String),
    Pruned(usize, String),
    Closed(usize),
    CloseFailed(usize),
    BrowserClosed,
}

#[derive(Default)]
struct Shared {
    scripts: Mutex<VecDeque<PageScript>>,
    last: Mutex<Option<PageScript>>,
    events: Mutex<Vec<(Instant, Event)>>,
    launches: AtomicUsize,
    next_id: AtomicUsize,
    fail_launch: AtomicBool,
}

impl Shared {
    fn record(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push((Instant::now(), event));
        }
    }

    fn next_script(&self) -> PageScript {
        let mut scripts = self.scripts.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(script) = scripts.pop_front() {
            *last = Some(script.clone());
            return script;
        }
        last.clone()
            .unwrap_or_else(|| PageScript::loaded("", Vec::new()))
    }
}

/// Hands out pages from a queue of scripts; the last script repeats once the queue drains.
#[derive(Clone, Default)]
pub struct FakeEngine {
    shared: Arc<Shared>,
}

impl FakeEngine {
    pub fn new(scripts: Vec<PageScript>) -> Self {
        let engine = Self::default();
        *engine.shared.scripts.lock().unwrap() = scripts.into();
        engine
    }

    pub fn failing_launch() -> Self {
        let engine = Self::default();
        engine.shared.fail_launch.store(true, Ordering::SeqCst);
        engine
    }

    pub fn launches(&self) -> usize {
        self.shared.launches.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<(Instant, Event)> {
        self.shared.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|(_, e)| pred(e)).count()
    }

    pub fn first_time(&self, pred: impl Fn(&Event) -> bool) -> Option<Instant> {
        self.events()
            .into_iter()
            .find(|(_, e)| pred(e))
            .map(|(at, _)| at)
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn launch(&self) -> Result<Arc<dyn BrowserHandle>> {
        if self.shared.fail_launch.load(Ordering::SeqCst) {
            bail!("chromedriver binary not found");
        }
        self.shared.launches.fetch_add(1, Ordering::SeqCst);
        self.shared.record(Event::Launched);
        Ok(Arc::new(FakeBrowser {
            shared: self.shared.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct FakeBrowser {
    shared: Arc<Shared>,
    closed: AtomicBool,
}

#[async_trait]
impl BrowserHandle for FakeBrowser {
    async fn new_context(&self, _profile: &ContextProfile) -> Result<Box<dyn BrowsingContext>> {
        if self.closed.load(Ordering::SeqCst) {
            bail!("browser has been closed");
        }
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.record(Event::Opened(id));
        Ok(Box::new(FakePage::with_recorder(
            self.shared.next_script(),
            id,
            Some(self.shared.clone()),
        )))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.shared.record(Event::BrowserClosed);
        Ok(())
    }
}

pub struct FakePage {
    id: usize,
    script: PageScript,
    removed: Mutex<Vec<bool>>,
    navigated_at: Mutex<Option<Instant>>,
    shared: Option<Arc<Shared>>,
}

impl FakePage {
    /// A standalone page that counts as already navigated.
    pub fn new(script: PageScript) -> Self {
        let page = Self::with_recorder(script, 0, None);
        *page.navigated_at.lock().unwrap() = Some(Instant::now());
        page
    }

    fn with_recorder(script: PageScript, id: usize, shared: Option<Arc<Shared>>) -> Self {
        let removed = vec![false; script.elements.len()];
        Self {
            id,
            script,
            removed: Mutex::new(removed),
            navigated_at: Mutex::new(None),
            shared,
        }
    }

    fn record(&self, event: Event) {
        if let Some(shared) = &self.shared {
            shared.record(event);
        }
    }

    fn check(&self, selector: &str) -> Result<()> {
        if self.script.failing_selectors.iter().any(|s| s == selector) {
            return Err(anyhow!("invalid selector {selector}"));
        }
        Ok(())
    }

    fn challenged(&self) -> bool {
        let Some(challenge) = &self.script.challenge else {
            return false;
        };
        match (challenge.clears_after, *self.navigated_at.lock().unwrap()) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(after), Some(at)) => at.elapsed() < after,
        }
    }

    /// Document-order indices of live elements matching `selector`.
    fn live_matches(&self, selector: &str) -> Vec<usize> {
        let removed = self.removed.lock().unwrap();
        self.script
            .elements
            .iter()
            .enumerate()
            .filter(|(i, el)| !removed[*i] && el.matches(selector))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn live_texts(&self) -> Vec<String> {
        let removed = self.removed.lock().unwrap();
        self.script
            .elements
            .iter()
            .enumerate()
            .filter(|(i, _)| !removed[*i])
            .map(|(_, el)| el.text.clone())
            .collect()
    }
}

#[async_trait]
impl BrowsingContext for FakePage {
    async fn navigate(&mut self, _url: &str, timeout: Duration) -> Result<Option<u16>> {
        self.record(Event::NavigationStarted(self.id, timeout));
        match self.script.navigation.clone() {
            FakeNavigation::Loaded(status) => {
                *self.navigated_at.lock().unwrap() = Some(Instant::now());
                self.record(Event::Navigated(self.id));
                Ok(status)
            }
            FakeNavigation::Fails(reason) => Err(anyhow!(reason)),
            FakeNavigation::Hangs => {
                std::future::pending::<()>().await;
                Ok(None)
            }
        }
    }

    async fn wait_for_selector(&self, _selector: &str, timeout: Duration) -> Result<bool> {
        self.record(Event::AwaitedReady(self.id, timeout));
        match &self.script.ready {
            FakeReady::Present => Ok(true),
            FakeReady::TimesOut => {
                tokio::time::sleep(timeout).await;
                Ok(false)
            }
            FakeReady::Fails(reason) => Err(anyhow!(reason.clone())),
        }
    }

    async fn title(&self) -> Result<String> {
        if self.challenged() {
            if let Some(challenge) = &self.script.challenge {
                return Ok(challenge.title.clone());
            }
        }
        Ok(self.script.title.clone())
    }

    async fn body_text(&self) -> Result<String> {
        if self.challenged() {
            if let Some(challenge) = &self.script.challenge {
                return Ok(challenge.body.clone());
            }
        }
        Ok(self.live_texts().join("\n"))
    }

    async fn element_texts(&self, selector: &str) -> Result<Vec<String>> {
        self.check(selector)?;
        self.record(Event::Queried(self.id, selector.to_string()));
        Ok(self
            .live_matches(selector)
            .into_iter()
            .map(|i| self.script.elements[i].text.clone())
            .collect())
    }

    async fn remove_elements(&self, selector: &str) -> Result<usize> {
        self.check(selector)?;
        self.record(Event::Pruned(self.id, selector.to_string()));
        let matches = self.live_matches(selector);
        let mut removed = self.removed.lock().unwrap();
        for &i in &matches {
            removed[i] = true;
        }
        Ok(matches.len())
    }

    async fn inspect_elements(&self, selector: &str) -> Result<Vec<ElementFacts>> {
        self.check(selector)?;
        Ok(self
            .live_matches(selector)
            .into_iter()
            .map(|i| {
                let el = &self.script.elements[i];
                ElementFacts {
                    class_name: el.class.clone(),
                    id: el.id.clone(),
                    height: el.height,
                    text_length: el.text.trim().chars().count(),
                }
            })
            .collect())
    }

    async fn remove_element_indices(&self, selector: &str, indices: &[usize]) -> Result<usize> {
        self.check(selector)?;
        self.record(Event::Pruned(self.id, selector.to_string()));
        let matches = self.live_matches(selector);
        let mut removed = self.removed.lock().unwrap();
        let mut count = 0;
        for &position in indices {
            if let Some(&i) = matches.get(position) {
                removed[i] = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        match self.script.close.clone() {
            FakeClose::Clean => {
                self.record(Event::Closed(self.id));
                Ok(())
            }
            FakeClose::Fails(reason) => {
                self.record(Event::CloseFailed(self.id));
                Err(anyhow!(reason))
            }
            FakeClose::Hangs => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}
