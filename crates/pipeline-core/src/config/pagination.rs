//! List pagination defaults.

use serde::{Deserialize, Serialize};

/// Defaults for paginated list views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Items per page when the request does not ask for a size.
    #[serde(default = "default_paginate_by")]
    pub paginate_by: usize,
    /// Upper bound for a requested page size.
    #[serde(default = "default_max_paginate_by")]
    pub max_paginate_by: usize,
    /// Query parameter carrying the page number.
    #[serde(default = "default_page_kwarg")]
    pub page_kwarg: String,
    /// Query parameter carrying the page size.
    #[serde(default = "default_paginate_by_param")]
    pub paginate_by_param: String,
    /// Trailing items folded into the previous page.
    #[serde(default)]
    pub orphans: usize,
    /// Whether an empty list still renders page 1.
    #[serde(default = "default_true")]
    pub allow_empty_first_page: bool,
    /// `numbers`, `simple`, `load_more` or `infinite`.
    #[serde(default = "default_style")]
    pub style: String,
    /// Pages shown on each side of the current page.
    #[serde(default = "default_delta")]
    pub page_range_delta: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            paginate_by: default_paginate_by(),
            max_paginate_by: default_max_paginate_by(),
            page_kwarg: default_page_kwarg(),
            paginate_by_param: default_paginate_by_param(),
            orphans: 0,
            allow_empty_first_page: default_true(),
            style: default_style(),
            page_range_delta: default_delta(),
        }
    }
}

fn default_paginate_by() -> usize {
    10
}

fn default_max_paginate_by() -> usize {
    100
}

fn default_page_kwarg() -> String {
    "page".to_string()
}

fn default_paginate_by_param() -> String {
    "per_page".to_string()
}

fn default_true() -> bool {
    true
}

fn default_style() -> String {
    "numbers".to_string()
}

fn default_delta() -> usize {
    2
}
