//! Page size and pagination style resolution.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use pipeline_core::config::pagination::PaginationConfig;
use pipeline_core::error::AppError;

use crate::extractors::HtmxRequest;

/// How the pagination controls are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStyle {
    /// Numbered page links with ellipses.
    #[default]
    Numbers,
    /// Previous/next links only.
    Simple,
    LoadMore,
    Infinite,
}

impl PaginationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numbers => "numbers",
            Self::Simple => "simple",
            Self::LoadMore => "load_more",
            Self::Infinite => "infinite",
        }
    }
}

impl fmt::Display for PaginationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaginationStyle {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "numbers" => Ok(Self::Numbers),
            "simple" => Ok(Self::Simple),
            "load_more" => Ok(Self::LoadMore),
            "infinite" => Ok(Self::Infinite),
            other => Err(AppError::validation(format!("Unknown pagination style: {other}"))),
        }
    }
}

/// Items per page for a request.
///
/// A requested size above the maximum is capped, a positive size is used
/// as is, and a missing or unusable value falls back to the default.
pub fn get_paginate_by(config: &PaginationConfig, params: &HashMap<String, String>) -> usize {
    let requested = params
        .get(&config.paginate_by_param)
        .and_then(|raw| raw.trim().parse::<i64>().ok());
    match requested {
        Some(n) if n > config.max_paginate_by as i64 => config.max_paginate_by,
        Some(n) if n > 0 => n as usize,
        _ => config.paginate_by,
    }
}

/// Pagination style for a request.
///
/// `pagination_style` in the query wins over the configured style, and an
/// HTMX `load-more` or `infinite-scroll` trigger wins over both.
pub fn setup_pagination(
    config: &PaginationConfig,
    params: &HashMap<String, String>,
    htmx: &HtmxRequest,
) -> PaginationStyle {
    let mut style = config.style.parse().unwrap_or_default();
    if let Some(requested) = params.get("pagination_style").and_then(|s| s.parse().ok()) {
        style = requested;
    }
    if htmx.triggered_by("load-more") {
        style = PaginationStyle::LoadMore;
    } else if htmx.triggered_by("infinite-scroll") {
        style = PaginationStyle::Infinite;
    }
    style
}
