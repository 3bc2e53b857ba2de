//! Command-line arguments and the run configuration built from them.
//!
//! Every setting is read here once; stages receive their slice of
//! [`Config`] and never look at the environment themselves.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::browser::BrowserOptions;
use crate::convert::ConvertTemplate;
use crate::download::{ApiKey, DownloadOptions};
use crate::pipeline::Stage;
use crate::redirect::ClientOptions;
use crate::retry::RetryPolicy;

pub const SERVER_REDIRECTED_FILE: &str = "server_redirected_urls.csv";
pub const CLIENT_REDIRECTED_FILE: &str = "client_redirected_urls.csv";
pub const CONVERSION_FILE: &str = "gps_vis_urls.csv";

#[derive(Parser, Debug)]
#[command(
    name = "gpxgrab",
    version,
    about = "Resolve shared map links and download their GPX tracks"
)]
pub struct Cli {
    /// Seed CSV with a header and `id,url` rows
    #[arg(long, default_value = "original_map_urls.csv")]
    pub input: PathBuf,
    /// Directory for the intermediate CSV files (overwritten on every run)
    #[arg(long, default_value = ".")]
    pub work_dir: PathBuf,
    /// Where `<id>.gpx` files are written
    #[arg(long, default_value = "../gpx")]
    pub output_dir: PathBuf,
    /// Chrome's download directory (defaults to the user's Downloads folder)
    #[arg(long)]
    pub download_dir: Option<PathBuf>,
    /// Conversion URL template; `{}` receives the encoded map URL
    #[arg(long, env = "CONVERT_URL")]
    pub convert_url: Option<String>,
    /// API key typed into the conversion form
    #[arg(long, env = "GMAPS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// First stage to run; it reads the file the previous stage would have written
    #[arg(long, value_enum, default_value_t = Stage::Server)]
    pub from: Stage,
    /// Last stage to run
    #[arg(long, value_enum, default_value_t = Stage::Download)]
    pub to: Stage,
    /// URL substring that marks a fully resolved directions page
    #[arg(long, default_value = "/dir/")]
    pub url_pattern: String,
    /// Bound on browser waits (URL pattern, result frame)
    #[arg(long, default_value_t = 10_000)]
    pub wait_ms: u64,
    /// Pause after revealing the API key input
    #[arg(long, default_value_t = 2_000)]
    pub reveal_ms: u64,
    /// Pause after clicking the download link
    #[arg(long, default_value_t = 1_000)]
    pub settle_ms: u64,
    /// How long to look for the downloaded file after the pause
    #[arg(long, default_value_t = 10_000)]
    pub download_timeout_ms: u64,
    /// Requests per URL when throttled, counting the first
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: u32,
    /// First backoff delay; doubles on every retry
    #[arg(long, default_value_t = 1_000)]
    pub backoff_ms: u64,
    /// Per-request HTTP timeout
    #[arg(long, default_value_t = 30_000)]
    pub http_timeout_ms: u64,
    /// Run Chrome with a visible window
    #[arg(long)]
    pub headful: bool,
}

#[derive(Debug, Clone)]
pub struct Paths {
    pub input: PathBuf,
    pub work_dir: PathBuf,
}

impl Paths {
    /// The file `stage` reads when the run starts there.
    pub fn stage_input(&self, stage: Stage) -> PathBuf {
        match stage {
            Stage::Server => self.input.clone(),
            Stage::Client => self.work_dir.join(SERVER_REDIRECTED_FILE),
            Stage::Convert => self.work_dir.join(CLIENT_REDIRECTED_FILE),
            Stage::Download => self.work_dir.join(CONVERSION_FILE),
        }
    }

    /// The file `stage` writes; downloads produce tracks, not rows.
    pub fn stage_output(&self, stage: Stage) -> Option<PathBuf> {
        match stage {
            Stage::Server => Some(self.work_dir.join(SERVER_REDIRECTED_FILE)),
            Stage::Client => Some(self.work_dir.join(CLIENT_REDIRECTED_FILE)),
            Stage::Convert => Some(self.work_dir.join(CONVERSION_FILE)),
            Stage::Download => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub from: Stage,
    pub to: Stage,
    pub paths: Paths,
    pub retry: RetryPolicy,
    pub http_timeout: Duration,
    pub client: ClientOptions,
    pub convert_template: Option<ConvertTemplate>,
    pub api_key: Option<ApiKey>,
    pub download: DownloadOptions,
    pub headful: bool,
}

impl Config {
    /// Defaults for every knob, with the given locations.
    pub fn for_dirs(
        input: PathBuf,
        work_dir: PathBuf,
        output_dir: PathBuf,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            from: Stage::Server,
            to: Stage::Download,
            paths: Paths { input, work_dir },
            retry: RetryPolicy::default(),
            http_timeout: Duration::from_secs(30),
            client: ClientOptions::default(),
            convert_template: None,
            api_key: None,
            download: DownloadOptions {
                download_dir,
                output_dir,
                element_wait: Duration::from_secs(10),
                reveal_delay: Duration::from_secs(2),
                settle_delay: Duration::from_secs(1),
                download_timeout: Duration::from_secs(10),
            },
            headful: false,
        }
    }

    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.from > cli.to {
            bail!("--from {} comes after --to {}", cli.from, cli.to);
        }
        let runs = |stage: Stage| (cli.from..=cli.to).contains(&stage);

        let convert_template = match cli.convert_url.as_deref().filter(|s| !s.is_empty()) {
            Some(t) => Some(ConvertTemplate::parse(t)?),
            None if runs(Stage::Convert) => {
                bail!("the convert stage needs a template: set CONVERT_URL or pass --convert-url")
            }
            None => None,
        };
        let api_key = match cli.api_key.filter(|s| !s.is_empty()) {
            Some(k) => Some(ApiKey::new(k)),
            None if runs(Stage::Download) => {
                bail!("the download stage needs an API key: set GMAPS_API_KEY or pass --api-key")
            }
            None => None,
        };

        let download_dir = match cli.download_dir {
            Some(d) => d,
            None => default_download_dir()
                .context("cannot determine a download directory; pass --download-dir")?,
        };
        let wait = Duration::from_millis(cli.wait_ms);

        Ok(Self {
            from: cli.from,
            to: cli.to,
            paths: Paths {
                input: cli.input,
                work_dir: cli.work_dir,
            },
            retry: RetryPolicy {
                max_attempts: cli.max_attempts,
                base_delay: Duration::from_millis(cli.backoff_ms),
            },
            http_timeout: Duration::from_millis(cli.http_timeout_ms),
            client: ClientOptions {
                url_pattern: cli.url_pattern,
                wait,
            },
            convert_template,
            api_key,
            download: DownloadOptions {
                download_dir,
                output_dir: cli.output_dir,
                element_wait: wait,
                reveal_delay: Duration::from_millis(cli.reveal_ms),
                settle_delay: Duration::from_millis(cli.settle_ms),
                download_timeout: Duration::from_millis(cli.download_timeout_ms),
            },
            headful: cli.headful,
        })
    }

    pub fn browser_options(&self) -> BrowserOptions {
        BrowserOptions {
            headful: self.headful,
            download_dir: self.download.download_dir.clone(),
        }
    }
}

fn default_download_dir() -> Option<PathBuf> {
    dirs::download_dir().or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
}
