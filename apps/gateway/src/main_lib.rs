use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use stockgate_market_data::errors::MarketDataError;
use stockgate_market_data::{
    BinanceProvider, CoinGeckoProvider, EastMoneyProvider, FinnhubProvider, Gateway,
    MarketDataProvider, ToolRequest, ToolResponse, TushareProvider, YahooProvider,
};

use crate::config::Config;

pub fn init_tracing() {
    let log_format = std::env::var("SG_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries responses, so logs go to stderr
    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Provider clients enabled by the configuration.
///
/// Providers that need a credential are left out when it is missing.
pub fn build_providers(config: &Config) -> Vec<Arc<dyn MarketDataProvider>> {
    let mut providers: Vec<Arc<dyn MarketDataProvider>> = vec![
        Arc::new(YahooProvider::new()),
        Arc::new(EastMoneyProvider::new()),
        Arc::new(CoinGeckoProvider::new(config.coingecko_api_key.clone())),
        Arc::new(BinanceProvider::new()),
    ];

    match &config.finnhub_api_key {
        Some(key) => providers.push(Arc::new(FinnhubProvider::new(key.clone()))),
        None => tracing::info!("SG_FINNHUB_API_KEY not set, Finnhub disabled"),
    }
    match &config.tushare_token {
        Some(token) => providers.push(Arc::new(TushareProvider::new(token.clone()))),
        None => tracing::info!("SG_TUSHARE_TOKEN not set, Tushare disabled"),
    }

    providers.retain(|provider| {
        let disabled = config.is_disabled(provider.id());
        if disabled {
            tracing::info!("Provider {} disabled by configuration", provider.id());
        }
        !disabled
    });
    providers
}

pub async fn build_gateway(config: &Config) -> anyhow::Result<Gateway> {
    let providers = build_providers(config);
    if providers.is_empty() {
        anyhow::bail!("No market data provider is enabled");
    }
    tracing::info!(
        "Enabled providers: {}",
        providers
            .iter()
            .map(|p| p.id())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let builder = Gateway::builder()
        .providers(providers)
        .priorities(config.provider_priorities.clone())
        .router_config(config.router.clone())
        .circuit_breaker(config.circuit.clone())
        .cache_policy(config.cache.clone());

    Ok(with_cache_backend(builder, config).await.build())
}

#[cfg(feature = "redis")]
async fn with_cache_backend(
    builder: stockgate_market_data::GatewayBuilder,
    config: &Config,
) -> stockgate_market_data::GatewayBuilder {
    use stockgate_market_data::cache::RedisBackend;

    let Some(url) = &config.redis_url else {
        return builder;
    };
    match RedisBackend::connect(url).await {
        Ok(backend) => builder.cache_backend(Arc::new(backend)),
        Err(e) => {
            tracing::warn!("Redis unavailable, caching in process only: {}", e);
            builder
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn with_cache_backend(
    builder: stockgate_market_data::GatewayBuilder,
    config: &Config,
) -> stockgate_market_data::GatewayBuilder {
    if config.redis_url.is_some() {
        tracing::warn!("SG_REDIS_URL is set but the gateway was built without the redis feature");
    }
    builder
}

/// Operator commands accepted on the same stream as tool requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum AdminAction {
    Health,
    ResetProvider,
    CacheStats,
}

#[derive(Debug, Deserialize)]
struct AdminCommand {
    admin: AdminAction,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    provider: Option<String>,
}

#[derive(Debug)]
enum Command {
    Admin(AdminCommand),
    Tool(ToolRequest),
}

impl Command {
    /// Lines carrying an `admin` key are operator commands, everything else
    /// is a tool request.
    fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if value.get("admin").is_some() {
            serde_json::from_value(value).map(Command::Admin)
        } else {
            serde_json::from_value(value).map(Command::Tool)
        }
    }
}

fn encode<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        json!({
            "status": "error",
            "error": {"kind": "internal", "message": e.to_string()}
        })
        .to_string()
    })
}

fn admin_ok(id: Option<String>, data: serde_json::Value) -> String {
    encode(&json!({"status": "ok", "id": id, "data": data}))
}

async fn handle_admin(
    gateway: &Gateway,
    action: AdminAction,
    id: Option<String>,
    provider: Option<String>,
) -> String {
    match action {
        AdminAction::Health => admin_ok(id, json!(gateway.provider_health())),
        AdminAction::CacheStats => admin_ok(id, json!(gateway.cache_stats())),
        AdminAction::ResetProvider => {
            let Some(provider) = provider else {
                let error =
                    MarketDataError::InvalidRequest("reset_provider needs a provider".to_string());
                return encode(&ToolResponse::error(id, &error));
            };
            let reset = gateway.reset_provider(&provider);
            tracing::info!("Admin reset of {}: {}", provider, reset);
            admin_ok(id, json!({"provider": provider, "reset": reset}))
        }
    }
}

/// Handle one input line and return the encoded reply.
pub async fn handle_line(gateway: &Gateway, line: &str) -> String {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Malformed request line: {}", e);
            let error = MarketDataError::InvalidRequest(format!("malformed request: {}", e));
            return encode(&ToolResponse::error(None, &error));
        }
    };
    let id = value.get("id").and_then(Value::as_str).map(str::to_string);

    match Command::from_value(value) {
        Ok(Command::Tool(request)) => encode(&gateway.handle(request).await),
        Ok(Command::Admin(command)) => {
            handle_admin(gateway, command.admin, command.id, command.provider).await
        }
        Err(e) => {
            tracing::warn!("Invalid request {:?}: {}", id, e);
            let error = MarketDataError::InvalidRequest(format!("invalid request: {}", e));
            encode(&ToolResponse::error(id, &error))
        }
    }
}

/// Serve newline-delimited JSON requests until `input` ends.
///
/// Requests are handled concurrently; replies are written as they complete,
/// one per line, and carry the request `id` for correlation.
pub async fn run<R, W>(gateway: Arc<Gateway>, input: R, output: &mut W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let reader = tokio::spawn(async move {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            let gateway = gateway.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let reply = handle_line(&gateway, &line).await;
                let _ = tx.send(reply);
            });
        }
        Ok::<_, std::io::Error>(())
    });

    while let Some(reply) = rx.recv().await {
        output.write_all(reply.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }

    reader.await??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use stockgate_market_data::errors::ProviderError;
    use stockgate_market_data::models::{MarketSegment, OperationKind, RawPayload};
    use stockgate_market_data::{FetchRequest, ProviderCapabilities, RateLimit};

    /// Registered under Yahoo's id but knows no symbols.
    struct FakeYahoo;

    #[async_trait]
    impl MarketDataProvider for FakeYahoo {
        fn id(&self) -> &'static str {
            "YAHOO"
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                segments: &[MarketSegment::UsEquity],
                operations: &[OperationKind::Quote],
            }
        }

        fn rate_limit(&self) -> RateLimit {
            RateLimit::default()
        }

        async fn fetch_quote(&self, request: FetchRequest<'_>) -> Result<RawPayload, ProviderError> {
            Err(ProviderError::SymbolNotFound(request.symbol.to_string()))
        }
    }

    fn gateway() -> Arc<Gateway> {
        Arc::new(
            Gateway::builder()
                .provider(Arc::new(FakeYahoo))
                .build(),
        )
    }

    async fn replies(input: &'static str) -> Vec<Value> {
        let mut output: Vec<u8> = Vec::new();
        run(gateway(), input.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn by_id<'a>(replies: &'a [Value], id: &str) -> &'a Value {
        replies
            .iter()
            .find(|r| r["id"] == id)
            .unwrap_or_else(|| panic!("no reply for {}", id))
    }

    #[tokio::test]
    async fn test_run_answers_every_line() {
        let replies = replies(concat!(
            "{\"id\":\"1\",\"operation\":\"quote\",\"ticker\":\"BOGUS\"}\n",
            "\n",
            "{\"id\":\"2\",\"operation\":\"quote\",\"ticker\":\"NASDAQ:AAPL\"}\n",
            "{\"id\":\"3\",\"admin\":\"health\"}\n",
            "not json\n",
        ))
        .await;

        assert_eq!(replies.len(), 4);
        assert_eq!(by_id(&replies, "1")["error"]["kind"], "parse_error");
        assert_eq!(by_id(&replies, "2")["error"]["kind"], "all_providers_failed");
        assert_eq!(
            by_id(&replies, "2")["error"]["causes"][0]["kind"],
            "symbol_not_found"
        );
        assert_eq!(by_id(&replies, "3")["data"][0]["provider"], "YAHOO");
        assert!(replies
            .iter()
            .any(|r| r["error"]["kind"] == "invalid_request"));
    }

    #[tokio::test]
    async fn test_admin_reset() {
        let gateway = gateway();
        let reply: Value = serde_json::from_str(
            &handle_line(&gateway, r#"{"id":"r","admin":"reset_provider","provider":"YAHOO"}"#)
                .await,
        )
        .unwrap();
        assert_eq!(reply["data"]["reset"], true);

        let reply: Value =
            serde_json::from_str(&handle_line(&gateway, r#"{"admin":"reset_provider"}"#).await)
                .unwrap();
        assert_eq!(reply["status"], "error");
    }

    #[tokio::test]
    async fn test_undecodable_request_keeps_its_id() {
        let gateway = gateway();

        let reply: Value =
            serde_json::from_str(&handle_line(&gateway, r#"{"id":"9","operation":"bogus"}"#).await)
                .unwrap();
        assert_eq!(reply["id"], "9");
        assert_eq!(reply["error"]["kind"], "invalid_request");
        assert!(reply["error"]["message"]
            .as_str()
            .unwrap()
            .contains("bogus"));

        let reply: Value = serde_json::from_str(
            &handle_line(&gateway, r#"{"id":"10","admin":"reboot"}"#).await,
        )
        .unwrap();
        assert_eq!(reply["id"], "10");
        assert_eq!(reply["error"]["kind"], "invalid_request");
    }

    #[test]
    fn test_credentials_gate_providers() {
        let config = Config::from_lookup(|name| match name {
            "SG_TUSHARE_TOKEN" => Some("token".to_string()),
            "SG_DISABLED_PROVIDERS" => Some("binance".to_string()),
            _ => None,
        });
        let ids: Vec<_> = build_providers(&config).iter().map(|p| p.id()).collect();

        assert!(ids.contains(&"TUSHARE"));
        assert!(!ids.contains(&"FINNHUB"));
        assert!(!ids.contains(&"BINANCE"));
        assert!(ids.contains(&"YAHOO"));
    }
}
