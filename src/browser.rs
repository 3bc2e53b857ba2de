//! The browser session shared by the client-redirect and download stages.

use anyhow::{anyhow, Context};
use headless_chrome::protocol::cdp::Browser::{
    SetDownloadBehavior, SetDownloadBehaviorBehaviorOption,
};
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },
    #[error("{0}")]
    Automation(String),
}

impl From<anyhow::Error> for BrowserError {
    fn from(e: anyhow::Error) -> Self {
        Self::Automation(format!("{e:#}"))
    }
}

pub type BrowserResult<T> = Result<T, BrowserError>;

/// The handful of page interactions the pipeline needs. One session is
/// launched per run and handed to each browser stage in turn.
pub trait BrowserSession {
    /// Load `url` and wait for the initial navigation to settle.
    fn navigate(&self, url: &str) -> BrowserResult<()>;

    /// `window.location.href` of the current page.
    fn current_url(&self) -> BrowserResult<String>;

    /// Poll the location until it contains `pattern`, returning it.
    fn wait_for_url_containing(&self, pattern: &str, timeout: Duration) -> BrowserResult<String>;

    fn focus_and_press(&self, selector: &str, key: &str) -> BrowserResult<()>;

    /// Clear the input matched by `selector` and type `value` into it.
    fn fill(&self, selector: &str, value: &str) -> BrowserResult<()>;

    fn click(&self, selector: &str) -> BrowserResult<()>;

    fn wait_for_element(&self, selector: &str, timeout: Duration) -> BrowserResult<()>;

    /// Click the first anchor whose text contains `text`.
    fn click_link_containing(&self, text: &str) -> BrowserResult<()>;
}

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headful: bool,
    /// Where Chrome saves downloads without prompting.
    pub download_dir: PathBuf,
}

pub struct ChromeSession {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSession {
    pub fn launch(opts: &BrowserOptions) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&opts.download_dir)
            .with_context(|| format!("creating {}", opts.download_dir.display()))?;
        let download_dir = dunce::canonicalize(&opts.download_dir)?;

        let mut arg_vec: Vec<OsString> = vec![
            OsString::from("--disable-gpu"),
            OsString::from("--disable-dev-shm-usage"),
            OsString::from("--no-first-run"),
            OsString::from("--no-default-browser-check"),
            OsString::from("--hide-scrollbars"),
        ];
        if !opts.headful {
            arg_vec.push(OsString::from("--headless=new"));
        }

        let launch_opts = LaunchOptionsBuilder::default()
            .headless(!opts.headful)
            // Slow conversion pages can leave the connection quiet past the 30 s default.
            .idle_browser_timeout(Duration::from_secs(600))
            .args(
                arg_vec
                    .iter()
                    .map(|s| s.as_os_str())
                    .collect::<Vec<&OsStr>>(),
            )
            .build()
            .map_err(|e| anyhow!("invalid Chrome launch options: {e}"))?;

        let browser = Browser::new(launch_opts)?;
        let tab = browser.new_tab()?;
        tab.set_user_agent(ua_generator::ua::spoof_ua(), None, None)?;
        tab.call_method(SetDownloadBehavior {
            behavior: SetDownloadBehaviorBehaviorOption::Allow,
            browser_context_id: None,
            download_path: Some(download_dir.display().to_string()),
            events_enabled: None,
        })?;

        tracing::info!(
            download_dir = %download_dir.display(),
            headful = opts.headful,
            "Chrome session ready"
        );
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    fn location(&self) -> anyhow::Result<String> {
        let href = self
            .tab
            .evaluate("window.location.href", false)?
            .value
            .and_then(|v| v.as_str().map(str::to_string));
        Ok(href.unwrap_or_else(|| self.tab.get_url()))
    }
}

/// Calls `probe` every [`POLL_INTERVAL`] until it yields a value or `timeout`
/// elapses. Probe errors count as "not yet".
fn poll_until<T>(
    what: impl Into<String>,
    timeout: Duration,
    mut probe: impl FnMut() -> Option<T>,
) -> BrowserResult<T> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(v) = probe() {
            return Ok(v);
        }
        if Instant::now() >= deadline {
            return Err(BrowserError::Timeout {
                what: what.into(),
                after: timeout,
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

impl BrowserSession for ChromeSession {
    fn navigate(&self, url: &str) -> BrowserResult<()> {
        self.tab.navigate_to(url)?.wait_until_navigated()?;
        Ok(())
    }

    fn current_url(&self) -> BrowserResult<String> {
        Ok(self.location()?)
    }

    fn wait_for_url_containing(&self, pattern: &str, timeout: Duration) -> BrowserResult<String> {
        poll_until(format!("URL containing {pattern:?}"), timeout, || {
            self.location().ok().filter(|u| u.contains(pattern))
        })
    }

    fn focus_and_press(&self, selector: &str, key: &str) -> BrowserResult<()> {
        self.tab.find_element(selector)?.focus()?;
        self.tab.press_key(key)?;
        Ok(())
    }

    fn fill(&self, selector: &str, value: &str) -> BrowserResult<()> {
        let input = self.tab.find_element(selector)?;
        input.call_js_fn("function() { this.value = ''; }", vec![], false)?;
        input.type_into(value)?;
        Ok(())
    }

    fn click(&self, selector: &str) -> BrowserResult<()> {
        self.tab.find_element(selector)?.click()?;
        Ok(())
    }

    fn wait_for_element(&self, selector: &str, timeout: Duration) -> BrowserResult<()> {
        poll_until(format!("element {selector:?}"), timeout, || {
            self.tab.find_element(selector).ok().map(|_| ())
        })
    }

    fn click_link_containing(&self, text: &str) -> BrowserResult<()> {
        self.tab
            .find_element_by_xpath(&format!("//a[contains(., {})]", xpath_literal(text)))?
            .click()?;
        Ok(())
    }
}

/// Quote `s` as an XPath 1.0 string literal.
fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}
