//! Freshness classes and cache policy.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::models::{OperationKind, RequestParams};

/// How long a response stays fresh depends on what it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlClass {
    /// Live quotes
    Live,
    /// Intraday series
    Intraday,
    /// Daily and longer series
    Daily,
    Fundamentals,
    /// Profiles and search results
    Reference,
    News,
}

impl TtlClass {
    pub const ALL: [TtlClass; 6] = [
        TtlClass::Live,
        TtlClass::Intraday,
        TtlClass::Daily,
        TtlClass::Fundamentals,
        TtlClass::Reference,
        TtlClass::News,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Intraday => "intraday",
            Self::Daily => "daily",
            Self::Fundamentals => "fundamentals",
            Self::Reference => "reference",
            Self::News => "news",
        }
    }

    /// Class for a request: the operation decides, except for series where
    /// the bar width does.
    pub fn for_request(operation: OperationKind, params: &RequestParams) -> Self {
        match operation {
            OperationKind::Quote => Self::Live,
            OperationKind::Series if params.interval().is_intraday() => Self::Intraday,
            OperationKind::Series => Self::Daily,
            OperationKind::Fundamentals => Self::Fundamentals,
            OperationKind::Profile | OperationKind::Search => Self::Reference,
            OperationKind::News => Self::News,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        match self {
            Self::Live => Duration::from_secs(15),
            Self::Intraday => Duration::from_secs(5 * 60),
            Self::Daily => Duration::from_secs(60 * 60),
            Self::Fundamentals => Duration::from_secs(6 * 60 * 60),
            Self::Reference => Duration::from_secs(24 * 60 * 60),
            Self::News => Duration::from_secs(10 * 60),
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TtlClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default number of entries kept per class.
pub const DEFAULT_CAPACITY_PER_CLASS: usize = 1000;

/// Default interval of the background sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// TTLs, per-class capacity and sweep interval.
#[derive(Clone, Debug)]
pub struct CachePolicy {
    ttls: [Duration; 6],
    pub capacity_per_class: usize,
    /// `None` disables the background sweep; expiry is still enforced lazily
    pub sweep_interval: Option<Duration>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttls: TtlClass::ALL.map(|class| class.default_ttl()),
            capacity_per_class: DEFAULT_CAPACITY_PER_CLASS,
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
        }
    }
}

impl CachePolicy {
    pub fn ttl(&self, class: TtlClass) -> Duration {
        self.ttls[class.index()]
    }

    pub fn with_ttl(mut self, class: TtlClass, ttl: Duration) -> Self {
        self.ttls[class.index()] = ttl;
        self
    }

    pub fn with_capacity(mut self, capacity_per_class: usize) -> Self {
        self.capacity_per_class = capacity_per_class;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval;
        self
    }
}
