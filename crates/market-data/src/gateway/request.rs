//! Request and response envelopes of the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheStatus, CachedResponse};
use crate::errors::{ErrorDetail, MarketDataError};
use crate::models::{NormalizedResponse, OperationKind, RequestParams};

/// One typed request from the tool layer.
///
/// ```json
/// {"id": "7", "operation": "quote", "ticker": "SSE:600519"}
/// {"operation": "search", "params": {"query": "moutai", "limit": 5}}
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Correlation id, echoed back unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub operation: OperationKind,
    /// Raw `EXCHANGE:CODE`; required for every operation except search
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub params: RequestParams,
}

impl ToolRequest {
    pub fn new(operation: OperationKind, ticker: impl Into<String>) -> Self {
        Self {
            id: None,
            operation,
            ticker: Some(ticker.into()),
            params: RequestParams::default(),
        }
    }

    pub fn search(query: impl Into<String>, limit: Option<usize>) -> Self {
        Self {
            id: None,
            operation: OperationKind::Search,
            ticker: None,
            params: RequestParams {
                query: Some(query.into()),
                limit,
                ..Default::default()
            },
        }
    }

    pub fn with_params(mut self, params: RequestParams) -> Self {
        self.params = params;
        self
    }
}

/// Where the data in a successful response came from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResponseMeta {
    /// Provider id; comma-separated for merged search results
    pub provider: String,
    pub cache: CacheStatus,
    pub fetched_at: DateTime<Utc>,
}

/// Envelope returned for every request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResponse {
    Ok {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        data: NormalizedResponse,
        meta: ResponseMeta,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        error: ErrorDetail,
    },
}

impl ToolResponse {
    pub fn ok(id: Option<String>, cached: CachedResponse) -> Self {
        Self::Ok {
            id,
            data: cached.response,
            meta: ResponseMeta {
                provider: cached.provider,
                cache: cached.status,
                fetched_at: cached.fetched_at,
            },
        }
    }

    pub fn error(id: Option<String>, error: &MarketDataError) -> Self {
        Self::Error {
            id,
            error: error.detail(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn data(&self) -> Option<&NormalizedResponse> {
        match self {
            Self::Ok { data, .. } => Some(data),
            Self::Error { .. } => None,
        }
    }

    pub fn error_detail(&self) -> Option<&ErrorDetail> {
        match self {
            Self::Ok { .. } => None,
            Self::Error { error, .. } => Some(error),
        }
    }
}
