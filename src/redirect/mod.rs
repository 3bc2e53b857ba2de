//! Stages 1 and 2: turning short map links into full directions URLs.

mod client;
mod server;

pub use client::{ClientOptions, ClientRedirectResolver};
pub use server::{Fetched, HttpTransport, ServerRedirectResolver, Transport};
