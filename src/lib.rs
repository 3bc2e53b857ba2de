//! Batch retrieval of GPX tracks for a list of shared map links.
//!
//! The run is a fixed sequence of stages, each reading the previous stage's
//! CSV file and writing the next one:
//!
//! 1. [`redirect::ServerRedirectResolver`] follows HTTP redirects.
//! 2. [`redirect::ClientRedirectResolver`] lets Chrome run the page scripts
//!    until the URL reaches its directions form.
//! 3. [`convert::ConvertTemplate`] turns each map URL into a conversion URL.
//! 4. [`download::DownloadDriver`] submits the conversion form and files the
//!    resulting track as `{id}.gpx`.

pub mod browser;
pub mod config;
pub mod convert;
pub mod download;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod redirect;
pub mod report;
pub mod retry;
pub mod rows;

#[cfg(test)]
pub(crate) mod testing;
