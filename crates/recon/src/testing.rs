use async_trait::async_trait;
use scout_chain::{GatewayError, PoolGateway};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Default)]
pub struct ScriptedGateway {
    responses: Mutex<HashMap<&'static str, VecDeque<Result<Value, GatewayError>>>>,
    calls: Mutex<Vec<(&'static str, Value)>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, method: &'static str, value: Value) -> &Self {
        self.push(method, Ok(value))
    }

    pub fn push_transport_err(&self, method: &'static str) -> &Self {
        self.push(
            method,
            Err(GatewayError::Transport {
                method,
                message: "connection reset".to_string(),
            }),
        )
    }

    pub fn push_protocol_err(&self, method: &'static str) -> &Self {
        self.push(
            method,
            Err(GatewayError::Protocol {
                method,
                code: -32601,
                message: "method not found".to_string(),
            }),
        )
    }

    fn push(&self, method: &'static str, response: Result<Value, GatewayError>) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .entry(method)
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(called, _)| *called == method)
            .count()
    }

    pub fn params_of(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(called, _)| *called == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

#[async_trait]
impl PoolGateway for ScriptedGateway {
    async fn call(&self, method: &'static str, params: Value) -> Result<Value, GatewayError> {
        self.calls.lock().unwrap().push((method, params));
        self.responses
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(GatewayError::Transport {
                    method,
                    message: "no scripted response".to_string(),
                })
            })
    }
}
