use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use stockgate_market_data::cache::{CachePolicy, TtlClass};
use stockgate_market_data::registry::{CircuitBreakerConfig, RouterConfig};

/// Gateway settings, read from `SG_*` environment variables.
pub struct Config {
    pub finnhub_api_key: Option<String>,
    pub tushare_token: Option<String>,
    pub coingecko_api_key: Option<String>,
    /// Upper-cased provider ids
    pub disabled_providers: Vec<String>,
    pub provider_priorities: HashMap<String, i32>,
    pub router: RouterConfig,
    pub circuit: CircuitBreakerConfig,
    pub cache: CachePolicy,
    pub redis_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unparseable values fall back to the
    /// default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = Env { lookup: &lookup };

        let router_defaults = RouterConfig::default();
        let router = RouterConfig {
            attempt_timeout: Duration::from_millis(env.parse(
                "SG_ATTEMPT_TIMEOUT_MS",
                router_defaults.attempt_timeout.as_millis() as u64,
            )),
            race_width: env.parse("SG_RACE_WIDTH", router_defaults.race_width),
        };

        let circuit_defaults = CircuitBreakerConfig::default();
        let circuit = CircuitBreakerConfig {
            failure_threshold: env.parse("SG_CIRCUIT_THRESHOLD", circuit_defaults.failure_threshold),
            failure_window: env.secs("SG_CIRCUIT_WINDOW_SECS", circuit_defaults.failure_window),
            cooldown: env.secs("SG_CIRCUIT_COOLDOWN_SECS", circuit_defaults.cooldown),
            backoff_multiplier: env.parse("SG_CIRCUIT_BACKOFF", circuit_defaults.backoff_multiplier),
            max_cooldown: env.secs("SG_CIRCUIT_MAX_COOLDOWN_SECS", circuit_defaults.max_cooldown),
        };

        let cache_defaults = CachePolicy::default();
        let mut cache = CachePolicy::default()
            .with_capacity(env.parse(
                "SG_CACHE_CAPACITY_PER_CLASS",
                cache_defaults.capacity_per_class,
            ))
            .with_sweep_interval(
                match env.parse(
                    "SG_CACHE_SWEEP_SECS",
                    cache_defaults.sweep_interval.map(|d| d.as_secs()).unwrap_or(0),
                ) {
                    0 => None,
                    secs => Some(Duration::from_secs(secs)),
                },
            );
        for class in TtlClass::ALL {
            let name = format!("SG_CACHE_TTL_{}_SECS", class.as_str().to_uppercase());
            cache = cache.with_ttl(class, env.secs(&name, cache_defaults.ttl(class)));
        }

        Self {
            finnhub_api_key: env.string("SG_FINNHUB_API_KEY"),
            tushare_token: env.string("SG_TUSHARE_TOKEN"),
            coingecko_api_key: env.string("SG_COINGECKO_API_KEY"),
            disabled_providers: env
                .string("SG_DISABLED_PROVIDERS")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),
            provider_priorities: env
                .string("SG_PROVIDER_PRIORITIES")
                .map(|raw| parse_priorities(&raw))
                .unwrap_or_default(),
            router,
            circuit,
            cache,
            redis_url: env.string("SG_REDIS_URL"),
        }
    }

    pub fn is_disabled(&self, provider: &str) -> bool {
        self.disabled_providers
            .iter()
            .any(|p| p.eq_ignore_ascii_case(provider))
    }
}

struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Env<'_> {
    /// Trimmed, non-empty value.
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, name: &str, default: T) -> T {
        match self.string(name) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Invalid {}='{}', using the default", name, raw);
                default
            }),
            None => default,
        }
    }

    fn secs(&self, name: &str, default: Duration) -> Duration {
        Duration::from_secs(self.parse(name, default.as_secs()))
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `YAHOO=1,FINNHUB=2`; malformed pairs are skipped with a warning.
fn parse_priorities(raw: &str) -> HashMap<String, i32> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let parsed = pair
                .split_once('=')
                .and_then(|(id, rank)| Some((id.trim().to_uppercase(), rank.trim().parse().ok()?)));
            if parsed.is_none() {
                tracing::warn!("Ignoring malformed provider priority '{}'", pair);
            }
            parsed
        })
        .collect()
}
