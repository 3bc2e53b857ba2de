//! Scripted stand-ins for the network and the browser.

use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::browser::{BrowserError, BrowserResult, BrowserSession};
use crate::redirect::{Fetched, Transport};

/// Answers each URL from its script in order. Unscripted URLs (and
/// exhausted scripts) get a plain 200 without redirect.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Result<Fetched, String>>>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedTransport {
    pub fn script(self, url: &str, responses: Vec<Result<Fetched, String>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    /// Time between consecutive requests.
    pub fn gaps(&self) -> Vec<Duration> {
        let calls = self.calls.lock().unwrap();
        calls.windows(2).map(|w| w[1].1 - w[0].1).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> anyhow::Result<Fetched> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Ok(f)) => Ok(f),
            Some(Err(e)) => Err(anyhow::anyhow!(e)),
            None => Ok(Fetched {
                status: 200,
                final_url: url.to_string(),
                redirected: false,
            }),
        }
    }
}

/// In-memory browser. Navigation lands on the scripted redirect target (or
/// the URL itself); clicking the download link drops a file into
/// `download_dir` whose contents are the page URL.
#[derive(Default)]
pub struct FakeBrowser {
    redirects: HashMap<String, String>,
    broken: HashSet<String>,
    download_dir: Option<PathBuf>,
    location: RefCell<String>,
    actions: RefCell<Vec<String>>,
    downloads: Cell<usize>,
}

impl FakeBrowser {
    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    /// Navigating to `url` fails.
    pub fn broken(mut self, url: &str) -> Self {
        self.broken.insert(url.to_string());
        self
    }

    pub fn downloads_into(mut self, dir: PathBuf) -> Self {
        self.download_dir = Some(dir);
        self
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.borrow().clone()
    }

    fn log(&self, action: String) {
        self.actions.borrow_mut().push(action);
    }
}

impl BrowserSession for FakeBrowser {
    fn navigate(&self, url: &str) -> BrowserResult<()> {
        self.log(format!("navigate {url}"));
        if self.broken.contains(url) {
            return Err(BrowserError::Automation(format!("net::ERR_NAME_NOT_RESOLVED at {url}")));
        }
        let landed = self.redirects.get(url).cloned().unwrap_or_else(|| url.to_string());
        *self.location.borrow_mut() = landed;
        Ok(())
    }

    fn current_url(&self) -> BrowserResult<String> {
        Ok(self.location.borrow().clone())
    }

    fn wait_for_url_containing(&self, pattern: &str, timeout: Duration) -> BrowserResult<String> {
        let here = self.location.borrow().clone();
        if here.contains(pattern) {
            Ok(here)
        } else {
            Err(BrowserError::Timeout {
                what: format!("URL containing {pattern:?}"),
                after: timeout,
            })
        }
    }

    fn focus_and_press(&self, selector: &str, key: &str) -> BrowserResult<()> {
        self.log(format!("press {key} on {selector}"));
        Ok(())
    }

    fn fill(&self, selector: &str, value: &str) -> BrowserResult<()> {
        self.log(format!("fill {selector} = {value}"));
        Ok(())
    }

    fn click(&self, selector: &str) -> BrowserResult<()> {
        self.log(format!("click {selector}"));
        Ok(())
    }

    fn wait_for_element(&self, selector: &str, _timeout: Duration) -> BrowserResult<()> {
        self.log(format!("wait {selector}"));
        Ok(())
    }

    fn click_link_containing(&self, text: &str) -> BrowserResult<()> {
        self.log(format!("click link {text}"));
        if let Some(dir) = &self.download_dir {
            let n = self.downloads.get() + 1;
            self.downloads.set(n);
            let name = if n == 1 {
                "data.gpx".to_string()
            } else {
                format!("data ({n}).gpx")
            };
            std::fs::write(dir.join(name), self.location.borrow().as_bytes())
                .map_err(|e| BrowserError::Automation(e.to_string()))?;
        }
        Ok(())
    }
}
