use crate::lookup_browser::context::ContextProfile;
use crate::lookup_browser::stealth::{build_init_script, StealthProfile};
use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};

/// Every context renders at this size.
pub const VIEWPORT: (u32, u32) = (1920, 1080);

const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Snapshot of user agent, viewport, and locale characteristics.
pub struct UserAgentProfile {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub platform: String,
    pub languages: Vec<String>,
}

impl UserAgentProfile {
    fn desktop(user_agent: &str, platform: &str, languages: &[&str]) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            viewport: VIEWPORT,
            platform: platform.to_string(),
            languages: languages.iter().map(|l| (*l).to_string()).collect(),
        }
    }

    /// `Accept-Language` value with descending q-weights, e.g. `zh-CN,zh;q=0.9,en;q=0.8`.
    pub fn accept_language(&self) -> String {
        self.languages
            .iter()
            .enumerate()
            .map(|(i, lang)| {
                if i == 0 {
                    lang.clone()
                } else {
                    let q = 10usize.saturating_sub(i).max(1);
                    format!("{lang};q=0.{q}")
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone)]
/// Small pool of plausible desktop fingerprints; one is drawn per context.
pub struct UserAgentManager {
    desktop_profiles: Vec<UserAgentProfile>,
}

impl Default for UserAgentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UserAgentManager {
    /// Create a new manager with built-in desktop profiles.
    pub fn new() -> Self {
        Self {
            desktop_profiles: vec![
                UserAgentProfile::desktop(
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36",
                    "Win32",
                    &["zh-CN", "zh", "en-US", "en"],
                ),
                UserAgentProfile::desktop(
                    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36",
                    "MacIntel",
                    &["zh-CN", "zh", "en-US", "en"],
                ),
                UserAgentProfile::desktop(
                    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36 Edg/136.0.0.0",
                    "MacIntel",
                    &["en-US", "en"],
                ),
                UserAgentProfile::desktop(
                    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
                    "Linux x86_64",
                    &["en-US", "en"],
                ),
            ],
        }
    }

    /// Draw a fingerprint for a new context.
    pub fn next_profile(&self) -> UserAgentProfile {
        let mut rng = rand::thread_rng();
        self.desktop_profiles
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| {
                UserAgentProfile::desktop(
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36",
                    "Win32",
                    &["en-US", "en"],
                )
            })
    }

    /// Draw a fingerprint and expand it into everything a context needs.
    pub fn context_profile(&self, stealth: StealthProfile) -> ContextProfile {
        let ua = self.next_profile();
        ContextProfile {
            headers: vec![
                ("Accept".to_string(), ACCEPT.to_string()),
                ("Accept-Language".to_string(), ua.accept_language()),
                ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
            ],
            init_script: build_init_script(stealth, &ua),
            user_agent: ua.user_agent,
            viewport: ua.viewport,
            languages: ua.languages,
        }
    }
}
