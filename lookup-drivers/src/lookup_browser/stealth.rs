use lookup_common::StealthLevel;
use serde::{Deserialize, Serialize};

use super::context::ContextProfile;
use super::fingerprint::UserAgentProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Levels of stealth applied to each browsing context.
pub enum StealthProfile {
    Lightweight,
    Balanced,
    Maximum,
}

impl From<StealthLevel> for StealthProfile {
    fn from(level: StealthLevel) -> Self {
        match level {
            StealthLevel::Lightweight => Self::Lightweight,
            StealthLevel::Balanced => Self::Balanced,
            StealthLevel::Maximum => Self::Maximum,
        }
    }
}

/// Fixed launch flags: headless, no sandbox, no GPU, automation markers off.
pub const LAUNCH_ARGUMENTS: &[&str] = &[
    "--headless=new",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-extensions",
];

/// Construct Chrome command-line arguments for one context's fingerprint.
pub fn build_stealth_arguments(profile: &ContextProfile) -> Vec<String> {
    let mut args: Vec<String> = LAUNCH_ARGUMENTS.iter().map(|a| (*a).to_string()).collect();
    args.push(format!("--user-agent={}", profile.user_agent));
    args.push(format!(
        "--window-size={},{}",
        profile.viewport.0, profile.viewport.1
    ));
    if let Some(primary) = profile.languages.first() {
        args.push(format!("--lang={primary}"));
    }
    args
}

/// Compose the pre-navigation script for `profile`.
///
/// Core evasions always run; canvas noise is added from `Balanced` up, WebGL
/// vendor and platform spoofing at `Maximum`. Each bundle runs in its own
/// function scope so none of its bindings reach the page's global scope.
pub fn build_init_script(profile: StealthProfile, user_profile: &UserAgentProfile) -> String {
    script_bundles(profile, user_profile)
        .iter()
        .map(|bundle| isolate(bundle))
        .collect()
}

fn script_bundles(profile: StealthProfile, user_profile: &UserAgentProfile) -> Vec<String> {
    let mut bundles = vec![StealthScripts::core_evasions(&user_profile.languages)];
    match profile {
        StealthProfile::Lightweight => {}
        StealthProfile::Balanced => {
            bundles.push(StealthScripts::canvas_evasions().to_string());
        }
        StealthProfile::Maximum => {
            bundles.push(StealthScripts::canvas_evasions().to_string());
            bundles.push(StealthScripts::webgl_evasions().to_string());
            bundles.push(StealthScripts::platform_override(&user_profile.platform));
        }
    }
    bundles
}

/// Wrap `body` in an immediately invoked arrow function.
fn isolate(body: &str) -> String {
    format!("(() => {{\n{}\n}})();\n", body.trim_end())
}

/// JavaScript evasions applied before any page script runs.
pub struct StealthScripts;

impl StealthScripts {
    pub fn core_evasions(languages: &[String]) -> String {
        let languages =
            serde_json::to_string(languages).unwrap_or_else(|_| r#"["en-US","en"]"#.to_string());
        format!(
            r#"
            Object.defineProperty(navigator, 'webdriver', {{ get: () => undefined }});
            Object.defineProperty(navigator, 'plugins', {{
                get: () => [
                    {{ name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer' }},
                    {{ name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai' }},
                    {{ name: 'Native Client', filename: 'internal-nacl-plugin' }}
                ]
            }});
            Object.defineProperty(navigator, 'languages', {{ get: () => {languages} }});
            if (!window.chrome) window.chrome = {{}};
            if (!window.chrome.runtime) window.chrome.runtime = {{}};
        "#
        )
    }

    pub fn webgl_evasions() -> &'static str {
        r#"
            const getParameter = WebGLRenderingContext.prototype.getParameter;
            WebGLRenderingContext.prototype.getParameter = function(parameter) {
                if (parameter === 37445) return 'Intel Inc.';
                if (parameter === 37446) return 'Intel Iris OpenGL Engine';
                return getParameter.call(this, parameter);
            };
        "#
    }

    pub fn canvas_evasions() -> &'static str {
        r#"
            const getContext = HTMLCanvasElement.prototype.getContext;
            HTMLCanvasElement.prototype.getContext = function(type,...args){
                const ctx = getContext.call(this,type,...args);
                if(type==='2d' && ctx) {
                    const origToDataURL=this.toDataURL;
                    this.toDataURL=function(...a){
                        const imgdata=ctx.getImageData(0,0,this.width,this.height);
                        for(let i=0;i<imgdata.data.length;i+=4){
                            if(Math.random()<0.001)imgdata.data[i]+=Math.random()<0.5?-1:1;
                        }
                        ctx.putImageData(imgdata,0,0);
                        return origToDataURL.call(this,...a);
                    };
                }
                return ctx;
            };
        "#
    }

    pub fn platform_override(platform: &str) -> String {
        let platform = serde_json::to_string(platform).unwrap_or_else(|_| "\"Win32\"".to_string());
        format!("Object.defineProperty(navigator, 'platform', {{ get: () => {platform} }});\n")
    }
}
