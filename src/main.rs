use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use gpxgrab::browser::{BrowserSession, ChromeSession};
use gpxgrab::config::{Cli, Config};
use gpxgrab::logging;
use gpxgrab::pipeline::Pipeline;
use gpxgrab::redirect::HttpTransport;

#[tokio::main]
async fn main() -> Result<()> {
    // CONVERT_URL and GMAPS_API_KEY may come from a local .env file.
    dotenvy::dotenv().ok();
    logging::init_logging()?;

    let args = Cli::parse();
    let config = Config::from_cli(args)?;

    let transport = HttpTransport::new(config.http_timeout).context("building HTTP client")?;
    let browser_opts = config.browser_options();
    let launch = move || -> Result<Box<dyn BrowserSession>> {
        let session =
            ChromeSession::launch(&browser_opts).context("headless-chrome launch failed")?;
        Ok(Box::new(session))
    };

    let report = Pipeline::new(config, transport, launch).run().await?;
    print_json(&report)
}

fn print_json<T: Serialize>(v: T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&v)?);
    Ok(())
}
