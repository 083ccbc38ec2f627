//! # Cookie HTTP
//!
//! A small HTTP layer for talking to a cookie-authenticated service through
//! an identity broker:
//!
//! - [`CookieHttpClient::do_request`] makes exactly one call, with automatic
//!   redirects disabled, and merges `Set-Cookie` headers into a [`CookieJar`]
//! - [`CookieHttpClient::do_request_follow_redirects`] walks a redirect chain
//!   by hand, up to a configurable hop limit
//!
//! The jar belongs to the caller, so one login session can span many calls
//! and be persisted afterwards.

mod client;
mod error;
mod jar;
mod request;

pub use client::{CookieHttpClient, DEFAULT_MAX_REDIRECTS};
pub use error::{HttpError, HttpResult, TransportKind};
pub use jar::CookieJar;
pub use request::{HttpExchange, HttpRequest, MultipartField, RequestBody};

pub use cookie::Cookie;
pub use reqwest::Method;
