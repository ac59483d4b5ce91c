//! End-to-end behavior of the gateway over scripted providers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use mockito::Matcher;
use serde_json::json;

use common::{assert_no_raw_fields, normalizer_for, Behavior, StubProvider};
use stockgate_market_data::errors::{MarketDataError, ProviderError};
use stockgate_market_data::models::{MarketSegment, OperationKind, RequestParams};
use stockgate_market_data::{
    CacheStatus, CircuitBreakerConfig, CircuitState, EastMoneyProvider, Gateway,
    MarketDataProvider, ToolRequest,
};

fn gateway_with(providers: Vec<Arc<StubProvider>>) -> Gateway {
    gateway_with_breaker(providers, CircuitBreakerConfig::default())
}

fn gateway_with_breaker(
    providers: Vec<Arc<StubProvider>>,
    breaker: CircuitBreakerConfig,
) -> Gateway {
    let ids: Vec<&str> = providers.iter().map(|p| p.id()).collect();
    let normalizer = normalizer_for(&ids);
    Gateway::builder()
        .providers(
            providers
                .into_iter()
                .map(|p| p as Arc<dyn MarketDataProvider>),
        )
        .normalizer(normalizer)
        .circuit_breaker(breaker)
        .build()
}

#[tokio::test]
async fn test_a_share_quote_is_canonical() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/qt/stock/get")
        .match_query(Matcher::UrlEncoded("secid".into(), "1.600519".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"rc": 0, "data": {
                "f43": 171000, "f44": 172050, "f45": 169000, "f46": 170000,
                "f47": 25000, "f57": "600519", "f58": "贵州茅台", "f59": 2,
                "f60": 169800, "f86": 1710486000, "f169": 1200, "f170": 71
            }})
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let gateway = Gateway::builder()
        .provider(Arc::new(EastMoneyProvider::with_base_urls(
            server.url(),
            server.url(),
        )))
        .build();

    let response = gateway
        .handle(ToolRequest::new(OperationKind::Quote, "SSE:600519"))
        .await;
    assert!(response.is_ok(), "{:?}", response);

    let quote = response.data().and_then(|d| d.as_quote()).unwrap();
    assert_eq!(quote.ticker.segment(), MarketSegment::AShare);
    assert_eq!(quote.ticker.to_string(), "SSE:600519");
    assert_eq!(quote.timestamp.timestamp(), 1_710_486_000);
    assert_eq!(quote.currency.as_deref(), Some("CNY"));

    let encoded = serde_json::to_value(&response).unwrap();
    assert_eq!(encoded["meta"]["provider"], "EASTMONEY");
    assert_eq!(encoded["meta"]["cache"], "miss");
    assert!(encoded["data"]["timestamp"]
        .as_str()
        .unwrap()
        .ends_with('Z'));
    assert_no_raw_fields(&encoded["data"]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_malformed_ticker_never_reaches_a_provider() {
    let yahoo = StubProvider::equity("YAHOO", 1, Behavior::Price(100));
    let gateway = gateway_with(vec![yahoo.clone()]);

    let error = gateway.quote("BOGUS").await.unwrap_err();
    assert!(matches!(error, MarketDataError::Parse(_)));

    let response = gateway
        .handle(ToolRequest::new(OperationKind::Quote, "BOGUS"))
        .await;
    assert_eq!(response.error_detail().unwrap().kind, "parse_error");
    assert_eq!(yahoo.calls(), 0);
}

#[tokio::test]
async fn test_every_crypto_provider_failing_reports_each_cause() {
    let first = StubProvider::crypto(
        "CRYPTO_A",
        1,
        Behavior::Fail(ProviderError::Http {
            status: 503,
            message: "maintenance".to_string(),
        }),
    );
    let second = StubProvider::crypto("CRYPTO_B", 2, Behavior::Fail(ProviderError::RateLimited));
    let third = StubProvider::crypto(
        "CRYPTO_C",
        3,
        Behavior::Fail(ProviderError::Network("connection reset".to_string())),
    );
    let gateway = gateway_with(vec![first.clone(), second.clone(), third.clone()]);

    let error = gateway.quote("CRYPTO:BTC").await.unwrap_err();
    let MarketDataError::AllProvidersFailed {
        attempted, causes, ..
    } = &error
    else {
        panic!("expected AllProvidersFailed, got {:?}", error);
    };
    assert_eq!(attempted.len(), 3);
    assert_eq!(causes.len(), 3);

    let detail = error.detail();
    let mut kinds: Vec<_> = detail.causes.iter().map(|c| c.kind.as_str()).collect();
    kinds.sort();
    assert_eq!(kinds, vec!["http", "network", "rate_limited"]);

    let breaker = gateway.router().circuit_breaker();
    for id in ["CRYPTO_A", "CRYPTO_B", "CRYPTO_C"] {
        assert_eq!(breaker.failure_count(id), 1, "{}", id);
        assert_eq!(breaker.state(id), CircuitState::Closed);
    }
    assert_eq!(first.calls() + second.calls() + third.calls(), 3);
}

#[tokio::test]
async fn test_fundamentals_are_served_from_cache() {
    let provider = StubProvider::equity("FUNDS", 1, Behavior::Price(28));
    let gateway = gateway_with(vec![provider.clone()]);

    let fetch = || {
        gateway.execute(
            OperationKind::Fundamentals,
            Some("NASDAQ:AAPL"),
            RequestParams::default(),
        )
    };
    let first = fetch().await.unwrap();
    let second = fetch().await.unwrap();

    assert_eq!(first.status, CacheStatus::Miss);
    assert_eq!(second.status, CacheStatus::Hit);
    assert_eq!(first.response, second.response);
    assert_eq!(second.provider, "FUNDS");
    assert_eq!(provider.calls(), 1);
    assert_eq!(gateway.cache_stats().hits, 1);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_fetch() {
    let provider = Arc::new(
        StubProvider::new(
            "SLOW",
            1,
            &[MarketSegment::UsEquity],
            common::EQUITY_OPS,
            Behavior::Price(190),
        )
        .with_delay(Duration::from_millis(100)),
    );
    let gateway = gateway_with(vec![provider.clone()]);

    let results = join_all((0..10).map(|_| {
        gateway.execute(
            OperationKind::Quote,
            Some("NASDAQ:AAPL"),
            RequestParams::default(),
        )
    }))
    .await;

    assert_eq!(provider.calls(), 1);
    let statuses: Vec<_> = results
        .into_iter()
        .map(|r| r.unwrap().status)
        .collect();
    assert_eq!(statuses.iter().filter(|s| **s == CacheStatus::Miss).count(), 1);
    assert!(statuses.iter().all(|s| *s != CacheStatus::Hit));
}

#[tokio::test]
async fn test_failover_to_next_provider() {
    let primary = StubProvider::equity(
        "PRIMARY",
        1,
        Behavior::Fail(ProviderError::Http {
            status: 500,
            message: "boom".to_string(),
        }),
    );
    let secondary = StubProvider::equity("SECONDARY", 2, Behavior::Price(31));
    let gateway = gateway_with(vec![primary.clone(), secondary.clone()]);

    let cached = gateway
        .execute(
            OperationKind::Fundamentals,
            Some("NYSE:IBM"),
            RequestParams::default(),
        )
        .await
        .unwrap();

    assert_eq!(cached.provider, "SECONDARY");
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 1);
    let breaker = gateway.router().circuit_breaker();
    assert_eq!(breaker.failure_count("PRIMARY"), 1);
    assert_eq!(breaker.failure_count("SECONDARY"), 0);
}

#[tokio::test]
async fn test_unknown_symbol_moves_on_without_penalty() {
    let primary = StubProvider::equity(
        "PRIMARY",
        1,
        Behavior::Fail(ProviderError::SymbolNotFound("ZZZZ".to_string())),
    );
    let secondary = StubProvider::equity("SECONDARY", 2, Behavior::Price(5));
    let gateway = gateway_with(vec![primary, secondary]);

    let fundamentals = gateway.fundamentals("NYSE:ZZZZ").await.unwrap();
    assert_eq!(fundamentals.pe_ratio.unwrap().to_string(), "5");
    assert_eq!(
        gateway.router().circuit_breaker().failure_count("PRIMARY"),
        0
    );
}

#[tokio::test]
async fn test_schema_drift_counts_against_provider() {
    let drifted = StubProvider::equity("DRIFTED", 1, Behavior::Garbage);
    let healthy = StubProvider::equity("HEALTHY", 2, Behavior::Price(12));
    let gateway = gateway_with(vec![drifted, healthy]);

    let fundamentals = gateway.fundamentals("NASDAQ:MSFT").await.unwrap();
    assert_eq!(fundamentals.pe_ratio.unwrap().to_string(), "12");
    assert_eq!(
        gateway.router().circuit_breaker().failure_count("DRIFTED"),
        1
    );
}

#[tokio::test]
async fn test_open_circuit_admits_a_single_probe() {
    let provider = Arc::new(
        StubProvider::new(
            "FLAKY",
            1,
            &[MarketSegment::UsEquity],
            common::EQUITY_OPS,
            Behavior::Fail(ProviderError::Upstream("overloaded".to_string())),
        )
        .with_delay(Duration::from_millis(50)),
    );
    let gateway = gateway_with_breaker(
        vec![provider.clone()],
        CircuitBreakerConfig {
            failure_threshold: 2,
            cooldown: Duration::from_millis(100),
            ..Default::default()
        },
    );

    for symbol in ["NYSE:F1", "NYSE:F2"] {
        assert!(gateway.fundamentals(symbol).await.is_err());
    }
    let breaker = gateway.router().circuit_breaker();
    assert_eq!(breaker.state("FLAKY"), CircuitState::Open);

    // skipped while open, so no upstream call
    let error = gateway.fundamentals("NYSE:F3").await.unwrap_err();
    assert!(matches!(
        error,
        MarketDataError::AllProvidersFailed { ref attempted, .. } if attempted.is_empty()
    ));
    assert_eq!(provider.calls(), 2);

    tokio::time::sleep(Duration::from_millis(150)).await;
    provider.set_behavior(Behavior::Price(7));

    let tickers = ["NYSE:P1", "NYSE:P2", "NYSE:P3", "NYSE:P4", "NYSE:P5"];
    let results = join_all(tickers.iter().map(|t| gateway.fundamentals(t))).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(provider.calls(), 3);
    assert_eq!(breaker.state("FLAKY"), CircuitState::Closed);
}

#[tokio::test]
async fn test_reset_provider_closes_circuit() {
    let provider = StubProvider::equity(
        "FLAKY",
        1,
        Behavior::Fail(ProviderError::Upstream("overloaded".to_string())),
    );
    let gateway = gateway_with_breaker(
        vec![provider.clone()],
        CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(600),
            ..Default::default()
        },
    );

    assert!(gateway.fundamentals("NYSE:F").await.is_err());
    assert_eq!(
        gateway.router().circuit_breaker().state("FLAKY"),
        CircuitState::Open
    );

    assert!(gateway.reset_provider("FLAKY"));
    assert!(!gateway.reset_provider("NOBODY"));
    provider.set_behavior(Behavior::Price(3));
    assert!(gateway.fundamentals("NYSE:F").await.is_ok());
}

#[tokio::test]
async fn test_batch_quotes_isolate_failures() {
    let provider = StubProvider::equity("BATCH", 1, Behavior::Price(42));
    let gateway = gateway_with(vec![provider]);

    let results = gateway.quotes(&["NASDAQ:AAPL", "BOGUS", "SSE:600519"]).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results["NASDAQ:AAPL"].as_ref().unwrap().price.to_string(), "42");
    assert!(matches!(results["BOGUS"], Err(MarketDataError::Parse(_))));
    assert!(matches!(
        results["SSE:600519"],
        Err(MarketDataError::NoProvider {
            segment: Some(MarketSegment::AShare),
            ..
        })
    ));
}

#[tokio::test]
async fn test_request_validation() {
    let gateway = gateway_with(vec![StubProvider::equity("ANY", 1, Behavior::Price(1))]);

    let missing_ticker = ToolRequest {
        id: Some("7".to_string()),
        operation: OperationKind::Quote,
        ticker: None,
        params: RequestParams::default(),
    };
    let response = gateway.handle(missing_ticker).await;
    assert_eq!(response.error_detail().unwrap().kind, "invalid_request");

    assert!(matches!(
        gateway.search("apple", Some(0)).await,
        Err(MarketDataError::InvalidRequest(_))
    ));
    assert!(matches!(
        gateway.search("   ", None).await,
        Err(MarketDataError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn test_search_echoes_each_callers_query() {
    let provider = StubProvider::searcher("LOOKUP", 1);
    let gateway = gateway_with(vec![provider.clone()]);

    let first = gateway.search("Apple", None).await.unwrap();
    let second = gateway.search("  APPLE ", None).await.unwrap();

    assert_eq!(first.query, "Apple");
    assert_eq!(second.query, "APPLE");
    assert_eq!(second.hits, first.hits);
    assert_eq!(provider.calls(), 1);
}
