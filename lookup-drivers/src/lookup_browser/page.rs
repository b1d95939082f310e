use crate::lookup_browser::{
    behavioral::BehavioralEngine,
    context::{BrowsingContext, ContextProfile, ElementFacts},
};
use anyhow::Result;
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::wd::{TimeoutConfiguration, WebDriverCompatibleCommand};
use fantoccini::{Client, Locator};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

const NAVIGATION_STATUS_JS: &str = r#"
    const entry = performance.getEntriesByType('navigation')[0];
    return entry && entry.responseStatus ? entry.responseStatus : null;
"#;

const BODY_TEXT_JS: &str = r#"
    if (!document.body) return '';
    return document.body.innerText || document.body.textContent || '';
"#;

const ELEMENT_TEXTS_JS: &str = r#"
    return Array.from(document.querySelectorAll(arguments[0]))
        .map(el => el.innerText || el.textContent || '');
"#;

const REMOVE_ALL_JS: &str = r#"
    const els = document.querySelectorAll(arguments[0]);
    els.forEach(el => el.remove());
    return els.length;
"#;

const INSPECT_JS: &str = r#"
    return Array.from(document.querySelectorAll(arguments[0])).map(el => ({
        class_name: typeof el.className === 'string' ? el.className : (el.getAttribute('class') || ''),
        id: el.id || '',
        height: el.getBoundingClientRect().height,
        text_length: (el.innerText || '').trim().length
    }));
"#;

const REMOVE_AT_JS: &str = r#"
    const els = document.querySelectorAll(arguments[0]);
    let removed = 0;
    for (const i of arguments[1]) {
        const el = els[i];
        if (el && el.isConnected) { el.remove(); removed++; }
    }
    return removed;
"#;

/// chromedriver's CDP passthrough (`POST /session/{id}/goog/cdp/execute`).
#[derive(Debug)]
struct CdpCommand {
    cmd: &'static str,
    params: Value,
}

impl WebDriverCompatibleCommand for CdpCommand {
    fn endpoint(
        &self,
        base_url: &url::Url,
        session_id: Option<&str>,
    ) -> Result<url::Url, url::ParseError> {
        base_url.join(&format!(
            "session/{}/goog/cdp/execute",
            session_id.unwrap_or_default()
        ))
    }

    fn method_and_body(&self, _request_url: &url::Url) -> (http::Method, Option<String>) {
        let body = json!({ "cmd": self.cmd, "params": self.params });
        (http::Method::POST, Some(body.to_string()))
    }
}

/// Only the page-load limit; script and implicit timeouts keep their values.
fn page_load_timeout(timeout: Duration) -> TimeoutConfiguration {
    TimeoutConfiguration::new(None, Some(timeout), None)
}

/// One WebDriver session viewed as a browsing context.
pub struct LookupPage {
    pub(crate) client: Client,
    pub(crate) behavioral_engine: BehavioralEngine,
}

impl LookupPage {
    pub fn new(client: Client, behavioral_engine: BehavioralEngine) -> Self {
        Self {
            client,
            behavioral_engine,
        }
    }

    /// Install the fingerprint script and extra headers. Failures are logged and ignored.
    pub(crate) async fn prepare(&self, profile: &ContextProfile) {
        if let Err(err) = self
            .cdp(
                "Page.addScriptToEvaluateOnNewDocument",
                json!({ "source": profile.init_script }),
            )
            .await
        {
            warn!(target: "browser.context", error = %err, "init script injection failed");
        }

        let headers: Map<String, Value> = profile
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let installed = async {
            self.cdp("Network.enable", json!({})).await?;
            self.cdp("Network.setExtraHTTPHeaders", json!({ "headers": headers }))
                .await
        }
        .await;
        if let Err(err) = installed {
            warn!(target: "browser.context", error = %err, "extra headers not installed");
        }
    }

    async fn cdp(&self, cmd: &'static str, params: Value) -> Result<Value> {
        self.client
            .issue_cmd(CdpCommand { cmd, params })
            .await
            .map_err(anyhow::Error::from)
    }

    async fn eval(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.client
            .execute(script, args)
            .await
            .map_err(anyhow::Error::from)
    }
}

#[async_trait]
impl BrowsingContext for LookupPage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Option<u16>> {
        self.behavioral_engine.random_delay(300, 1200).await;
        self.client
            .update_timeouts(page_load_timeout(timeout))
            .await?;
        self.client.goto(url).await?;

        let status = match self.eval(NAVIGATION_STATUS_JS, vec![]).await {
            Ok(value) => value.as_u64().and_then(|s| u16::try_from(s).ok()),
            Err(err) => {
                debug!(target: "browser.context", error = %err, "navigation status unavailable");
                None
            }
        };
        Ok(status)
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool> {
        match self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
        {
            Ok(_) => Ok(true),
            Err(CmdError::WaitTimeout) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn title(&self) -> Result<String> {
        self.client.title().await.map_err(anyhow::Error::from)
    }

    async fn body_text(&self) -> Result<String> {
        let value = self.eval(BODY_TEXT_JS, vec![]).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn element_texts(&self, selector: &str) -> Result<Vec<String>> {
        let value = self.eval(ELEMENT_TEXTS_JS, vec![json!(selector)]).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn remove_elements(&self, selector: &str) -> Result<usize> {
        let value = self.eval(REMOVE_ALL_JS, vec![json!(selector)]).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn inspect_elements(&self, selector: &str) -> Result<Vec<ElementFacts>> {
        let value = self.eval(INSPECT_JS, vec![json!(selector)]).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn remove_element_indices(&self, selector: &str, indices: &[usize]) -> Result<usize> {
        if indices.is_empty() {
            return Ok(0);
        }
        let value = self
            .eval(REMOVE_AT_JS, vec![json!(selector), json!(indices)])
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdp_command_targets_session_passthrough() {
        let base = url::Url::parse("http://localhost:9515/").unwrap();
        let cmd = CdpCommand {
            cmd: "Network.enable",
            params: json!({}),
        };
        let endpoint = cmd.endpoint(&base, Some("abc123")).unwrap();
        assert_eq!(
            endpoint.as_str(),
            "http://localhost:9515/session/abc123/goog/cdp/execute"
        );

        let (method, body) = cmd.method_and_body(&endpoint);
        assert_eq!(method, http::Method::POST);
        let body: Value = serde_json::from_str(&body.unwrap()).unwrap();
        assert_eq!(body["cmd"], json!("Network.enable"));
    }

    #[test]
    fn navigation_sets_only_the_page_load_limit() {
        let timeouts = page_load_timeout(Duration::from_millis(27_500));
        assert_eq!(timeouts.page_load(), Some(Duration::from_millis(27_500)));
        assert_eq!(timeouts.script(), None);
        assert_eq!(timeouts.implicit(), None);
    }

    #[test]
    fn inspected_facts_deserialize_from_script_shape() {
        let facts: Vec<ElementFacts> = serde_json::from_value(json!([
            { "class_name": "ad-slot", "id": "", "height": 90.5, "text_length": 12 }
        ]))
        .unwrap();
        assert_eq!(facts[0].class_name, "ad-slot");
        assert_eq!(facts[0].text_length, 12);
    }
}
