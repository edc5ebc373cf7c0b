use std::time::Duration;

use crate::model::Filter;

use super::cache::DEFAULT_PAGE_SIZE;

const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const DEFAULT_COMMAND_BUFFER: usize = 32;

#[derive(Clone, Debug)]
pub struct ViewConfig {
    pub page_size: u32,
    pub initial_filter: Filter,
    /// Mark everything read once when the view is entered.
    pub mark_all_read_on_enter: bool,
    pub poll_interval: Duration,
    pub command_buffer: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            initial_filter: Filter::All,
            mark_all_read_on_enter: true,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl ViewConfig {
    /// | Variable | Default |
    /// |----------|---------|
    /// | `FEEDVIEW_PAGE_SIZE` | `100` |
    /// | `FEEDVIEW_MARK_ALL_ON_ENTER` | `true` |
    /// | `FEEDVIEW_POLL_INTERVAL_MS` | `2000` |
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(size) = std::env::var("FEEDVIEW_PAGE_SIZE") {
            if let Ok(parsed) = size.parse::<u32>() {
                cfg.page_size = parsed.max(1);
            }
        }
        if let Ok(flag) = std::env::var("FEEDVIEW_MARK_ALL_ON_ENTER") {
            cfg.mark_all_read_on_enter = !matches!(flag.to_ascii_lowercase().as_str(), "0" | "false" | "no");
        }
        if let Ok(ms) = std::env::var("FEEDVIEW_POLL_INTERVAL_MS") {
            if let Ok(parsed) = ms.parse::<u64>() {
                cfg.poll_interval = Duration::from_millis(parsed);
            }
        }
        cfg
    }

    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size.max(1);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.initial_filter = filter;
        self
    }

    pub fn with_mark_all_read(mut self, enabled: bool) -> Self {
        self.mark_all_read_on_enter = enabled;
        self
    }
}
