//! Runtime configuration
//!
//! [`SwrConfig`] holds the process-wide revalidation defaults, [`SwrOverrides`]
//! lets a single query replace any of them, and [`RuntimeConfig`] bundles the
//! API address with those defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default window during which identical keys are not refetched
pub const DEFAULT_DEDUPING_INTERVAL: Duration = Duration::from_secs(60);

/// Default per-request timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval of the realtime poller
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Revalidation options shared by every data query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwrConfig {
    /// Refetch when the window regains focus
    pub revalidate_on_focus: bool,
    /// Refetch when the network comes back
    pub revalidate_on_reconnect: bool,
    /// Keep background refreshing while the window is hidden
    pub refresh_when_hidden: bool,
    /// Keep background refreshing while offline
    pub refresh_when_offline: bool,
    /// Minimum time between two fetches of the same key
    #[serde(with = "duration_ms", rename = "deduping_interval_ms")]
    pub deduping_interval: Duration,
    /// Fail a fetch with `TimedOut` after this long
    #[serde(with = "option_duration_ms", rename = "fetch_timeout_ms")]
    pub fetch_timeout: Option<Duration>,
    /// Background refresh interval for this query, if any
    #[serde(with = "option_duration_ms", rename = "refresh_interval_ms")]
    pub refresh_interval: Option<Duration>,
}

impl Default for SwrConfig {
    fn default() -> Self {
        Self {
            revalidate_on_focus: true,
            revalidate_on_reconnect: true,
            refresh_when_hidden: false,
            refresh_when_offline: false,
            deduping_interval: DEFAULT_DEDUPING_INTERVAL,
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
            refresh_interval: None,
        }
    }
}

impl SwrConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_revalidate_on_focus(mut self, enabled: bool) -> Self {
        self.revalidate_on_focus = enabled;
        self
    }

    pub fn with_revalidate_on_reconnect(mut self, enabled: bool) -> Self {
        self.revalidate_on_reconnect = enabled;
        self
    }

    pub fn with_refresh_when_hidden(mut self, enabled: bool) -> Self {
        self.refresh_when_hidden = enabled;
        self
    }

    pub fn with_refresh_when_offline(mut self, enabled: bool) -> Self {
        self.refresh_when_offline = enabled;
        self
    }

    pub fn with_deduping_interval(mut self, interval: Duration) -> Self {
        self.deduping_interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Applies per-query overrides on top of these defaults.
    pub fn merged(&self, overrides: &SwrOverrides) -> SwrConfig {
        SwrConfig {
            revalidate_on_focus: overrides
                .revalidate_on_focus
                .unwrap_or(self.revalidate_on_focus),
            revalidate_on_reconnect: overrides
                .revalidate_on_reconnect
                .unwrap_or(self.revalidate_on_reconnect),
            refresh_when_hidden: overrides
                .refresh_when_hidden
                .unwrap_or(self.refresh_when_hidden),
            refresh_when_offline: overrides
                .refresh_when_offline
                .unwrap_or(self.refresh_when_offline),
            deduping_interval: overrides
                .deduping_interval
                .unwrap_or(self.deduping_interval),
            fetch_timeout: overrides.fetch_timeout.or(self.fetch_timeout),
            refresh_interval: overrides.refresh_interval.or(self.refresh_interval),
        }
    }

    /// Whether a background refresh may run given window/network state.
    pub fn allows_background_refresh(&self, visible: bool, online: bool) -> bool {
        (visible || self.refresh_when_hidden) && (online || self.refresh_when_offline)
    }
}

/// Per-query replacements for [`SwrConfig`] fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwrOverrides {
    pub revalidate_on_focus: Option<bool>,
    pub revalidate_on_reconnect: Option<bool>,
    pub refresh_when_hidden: Option<bool>,
    pub refresh_when_offline: Option<bool>,
    pub deduping_interval: Option<Duration>,
    pub fetch_timeout: Option<Duration>,
    pub refresh_interval: Option<Duration>,
}

impl SwrOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides for data that should never refetch on its own
    /// (categories, FAQs).
    pub fn immutable() -> Self {
        Self {
            revalidate_on_focus: Some(false),
            revalidate_on_reconnect: Some(false),
            ..Self::default()
        }
    }

    pub fn revalidate_on_focus(mut self, enabled: bool) -> Self {
        self.revalidate_on_focus = Some(enabled);
        self
    }

    pub fn revalidate_on_reconnect(mut self, enabled: bool) -> Self {
        self.revalidate_on_reconnect = Some(enabled);
        self
    }

    pub fn refresh_when_hidden(mut self, enabled: bool) -> Self {
        self.refresh_when_hidden = Some(enabled);
        self
    }

    pub fn refresh_when_offline(mut self, enabled: bool) -> Self {
        self.refresh_when_offline = Some(enabled);
        self
    }

    pub fn deduping_interval(mut self, interval: Duration) -> Self {
        self.deduping_interval = Some(interval);
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }
}

/// Configuration for a [`crate::runtime::StorefrontRuntime`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Base address of the storefront API, without trailing slash
    pub base_url: String,
    /// Revalidation defaults
    pub swr: SwrConfig,
    /// Interval of realtime pollers (chat)
    #[serde(with = "duration_ms", rename = "poll_interval_ms")]
    pub poll_interval: Duration,
    /// Evict unsubscribed entries beyond this many, least recently used first
    pub max_cache_entries: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            swr: SwrConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_cache_entries: None,
        }
    }
}

impl RuntimeConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn with_swr(mut self, swr: SwrConfig) -> Self {
        self.swr = swr;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_cache_entries(mut self, max: usize) -> Self {
        self.max_cache_entries = Some(max);
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod option_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
