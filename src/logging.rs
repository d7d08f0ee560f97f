//! Tracing setup and secret masking for logs and `config show`.

use std::fmt;
use tracing_subscriber::{fmt as tracing_fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// `RUST_LOG` wins over `level` when set. `format` is `json` or `pretty`.
/// Can only be called once per process.
pub fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry
            .with(tracing_fmt::layer().json().with_target(true))
            .init();
    } else {
        registry.with(tracing_fmt::layer().with_target(true)).init();
    }
}

/// Masked representation of a secret: first 4 and last 4 characters.
///
/// Values of 11 characters or fewer are fully hidden.
#[derive(Clone, Debug)]
pub struct Secret<'a> {
    inner: &'a str,
}

impl<'a> Secret<'a> {
    pub fn new(value: &'a str) -> Self {
        Self { inner: value }
    }
}

impl fmt::Display for Secret<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chars: Vec<char> = self.inner.chars().collect();
        if chars.is_empty() {
            return write!(f, "(not set)");
        }
        if chars.len() <= 11 {
            return write!(f, "***");
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        write!(f, "{}...{}", head, tail)
    }
}

pub fn mask_secret(value: &str) -> String {
    Secret::new(value).to_string()
}
