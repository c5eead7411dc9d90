use crate::metrics::GatewayMetrics;
use alloy::providers::{DynProvider, Provider};
use alloy::transports::RpcError;
use async_trait::async_trait;
use scout_core::modes::InspectMethod;
use scout_core::normalize::quantity_from_value;
use scout_core::{FormatError, NormalizedAddress, PoolStatus};
use serde_json::{json, Value};
use std::borrow::Cow;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{method} transport failure: {message}")]
    Transport {
        method: &'static str,
        message: String,
    },
    #[error("{method} returned rpc error {code}: {message}")]
    Protocol {
        method: &'static str,
        code: i64,
        message: String,
    },
    #[error("{method} returned a malformed result: {source}")]
    Format {
        method: &'static str,
        #[source]
        source: FormatError,
    },
}

impl GatewayError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Protocol { .. } => "protocol",
            Self::Format { .. } => "format",
        }
    }
}

#[async_trait]
pub trait PoolGateway: Send + Sync {
    async fn call(&self, method: &'static str, params: Value) -> Result<Value, GatewayError>;

    fn inspect_method(&self) -> InspectMethod {
        InspectMethod::Inspect
    }

    async fn pool_status(&self) -> Result<PoolStatus, GatewayError> {
        const METHOD: &str = "txpool_status";
        let result = self.call(METHOD, json!([])).await?;
        let field = |name: &str| match result.get(name) {
            None | Some(Value::Null) => Ok(0),
            Some(value) => quantity_from_value(value)
                .and_then(|quantity| {
                    u64::try_from(quantity).map_err(|_| FormatError::InvalidQuantity {
                        raw: value.to_string(),
                    })
                })
                .map_err(|source| GatewayError::Format {
                    method: METHOD,
                    source,
                }),
        };
        Ok(PoolStatus {
            pending: field("pending")?,
            queued: field("queued")?,
        })
    }

    async fn pool_inspect(&self) -> Result<Value, GatewayError> {
        self.call(self.inspect_method().rpc_method(), json!([]))
            .await
    }

    async fn next_pending_nonce(&self, address: &NormalizedAddress) -> Result<u64, GatewayError> {
        const METHOD: &str = "eth_getTransactionCount";
        let result = self
            .call(METHOD, json!([address.as_str(), "pending"]))
            .await?;
        quantity_from_value(&result)
            .and_then(|quantity| {
                u64::try_from(quantity).map_err(|_| FormatError::InvalidQuantity {
                    raw: result.to_string(),
                })
            })
            .map_err(|source| GatewayError::Format {
                method: METHOD,
                source,
            })
    }

    async fn pending_base_fee(&self) -> Result<u128, GatewayError> {
        const METHOD: &str = "eth_getBlockByNumber";
        let block = self.call(METHOD, json!(["pending", false])).await?;
        let base_fee = match &block {
            Value::Object(fields) => fields.get("baseFeePerGas"),
            _ => None,
        };
        match base_fee {
            Some(value) => quantity_from_value(value).map_err(|source| GatewayError::Format {
                method: METHOD,
                source,
            }),
            None => Err(GatewayError::Format {
                method: METHOD,
                source: FormatError::Shape {
                    what: "pending block baseFeePerGas",
                    found: block.to_string(),
                },
            }),
        }
    }
}

#[derive(Clone)]
pub struct RpcGateway {
    provider: DynProvider,
    timeout: Duration,
    inspect_method: InspectMethod,
    metrics: Option<GatewayMetrics>,
}

impl RpcGateway {
    pub fn new(
        provider: DynProvider,
        timeout_ms: u64,
        inspect_method: InspectMethod,
        metrics: Option<GatewayMetrics>,
    ) -> Self {
        Self {
            provider,
            timeout: Duration::from_millis(timeout_ms),
            inspect_method,
            metrics,
        }
    }
}

#[async_trait]
impl PoolGateway for RpcGateway {
    async fn call(&self, method: &'static str, params: Value) -> Result<Value, GatewayError> {
        let fut = self
            .provider
            .raw_request::<_, Value>(Cow::Borrowed(method), params);
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(RpcError::ErrorResp(payload))) => Err(GatewayError::Protocol {
                method,
                code: payload.code,
                message: payload.message.to_string(),
            }),
            Ok(Err(err)) => Err(GatewayError::Transport {
                method,
                message: err.to_string(),
            }),
            Err(_) => Err(GatewayError::Transport {
                method,
                message: format!("timed out after {}ms", self.timeout.as_millis()),
            }),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        debug!(method, outcome, "rpc call");
        if let Some(metrics) = &self.metrics {
            metrics.record(method, outcome);
        }
        result
    }

    fn inspect_method(&self) -> InspectMethod {
        self.inspect_method
    }
}

#[cfg(test)]
mod tests {
    use super::{GatewayError, PoolGateway, RpcGateway};
    use alloy::providers::{Provider, ProviderBuilder};
    use alloy::transports::mock::Asserter;
    use scout_core::modes::InspectMethod;
    use scout_core::normalize::normalize_address;
    use serde_json::{json, Value};
    use std::time::{Duration, Instant};

    fn gateway(asserter: &Asserter) -> RpcGateway {
        let provider = ProviderBuilder::new()
            .connect_mocked_client(asserter.clone())
            .erased();
        RpcGateway::new(provider, 1_000, InspectMethod::Inspect, None)
    }

    #[tokio::test]
    async fn call_returns_raw_result() {
        let asserter = Asserter::new();
        let gateway = gateway(&asserter);
        asserter.push_success(&json!({"pending": {}, "queued": {}}));

        let result = gateway.pool_inspect().await.unwrap();
        assert_eq!(result, json!({"pending": {}, "queued": {}}));
    }

    #[tokio::test]
    async fn rpc_error_object_is_a_protocol_error() {
        let asserter = Asserter::new();
        let gateway = gateway(&asserter);
        asserter.push_failure_msg("txpool namespace disabled");

        let err = gateway.call("txpool_inspect", json!([])).await.unwrap_err();
        match err {
            GatewayError::Protocol {
                method, message, ..
            } => {
                assert_eq!(method, "txpool_inspect");
                assert!(message.contains("txpool namespace disabled"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_response_is_a_transport_error() {
        let asserter = Asserter::new();
        let gateway = gateway(&asserter);

        let err = gateway.call("txpool_status", json!([])).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn silent_node_hits_the_request_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let provider = ProviderBuilder::new()
            .connect_http(format!("http://{addr}").parse().unwrap())
            .erased();
        let gateway = RpcGateway::new(provider, 200, InspectMethod::Inspect, None);

        let started = Instant::now();
        let err = gateway.pool_status().await.unwrap_err();
        assert_eq!(err.kind(), "transport");
        assert!(err.to_string().contains("timed out after 200ms"), "{err}");
        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }

    #[tokio::test]
    async fn pool_status_decodes_hex_counts() {
        let asserter = Asserter::new();
        let gateway = gateway(&asserter);
        asserter.push_success(&json!({"pending": "0x10", "queued": "0x2"}));

        let status = gateway.pool_status().await.unwrap();
        assert_eq!(status.pending, 16);
        assert_eq!(status.queued, 2);
    }

    #[tokio::test]
    async fn next_pending_nonce_decodes_quantity() {
        let asserter = Asserter::new();
        let gateway = gateway(&asserter);
        asserter.push_success(&"0x5");

        let address = normalize_address("0x0000000000000000000000000000000000000001").unwrap();
        assert_eq!(gateway.next_pending_nonce(&address).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn pending_base_fee_reads_header_field() {
        let asserter = Asserter::new();
        let gateway = gateway(&asserter);
        asserter.push_success(&json!({"number": "0x10", "baseFeePerGas": "0x14"}));
        asserter.push_success(&Value::Null);

        assert_eq!(gateway.pending_base_fee().await.unwrap(), 20);
        let err = gateway.pending_base_fee().await.unwrap_err();
        assert_eq!(err.kind(), "format");
    }
}
