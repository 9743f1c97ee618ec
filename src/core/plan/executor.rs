use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result page of a single statement, as returned by the remote store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub done: bool,
    pub total_size: u64,
    #[serde(default)]
    pub records: Vec<Map<String, Value>>,
}

impl QueryResponse {
    pub fn new(records: Vec<Map<String, Value>>) -> Self {
        Self { done: true, total_size: records.len() as u64, records }
    }
}

/// Runs statements against the remote store. Transport and authentication
/// live behind this seam.
#[async_trait::async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn query(&self, soql: &str) -> anyhow::Result<QueryResponse>;
}

#[cfg(test)]
pub use self::tests::MockExecutor;
