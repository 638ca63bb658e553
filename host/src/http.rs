use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{HostError, StartedNode, SubjectLifecycle, UnitReport};

/// HTTP binding to the orchestration host's REST API.
#[derive(Clone, Debug)]
pub struct HttpHost {
    base: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct StartNodeResponse {
    id: String,
    address: String,
}

impl HttpHost {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self {
            base,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base)
    }
}

#[async_trait]
impl SubjectLifecycle for HttpHost {
    async fn list_variants(&self) -> Result<Vec<String>, HostError> {
        let variants = self
            .http
            .get(self.url("clients"))
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<String>>()
            .await?;
        Ok(variants)
    }

    async fn start_node(
        &self,
        env: &HashMap<String, String>,
    ) -> Result<StartedNode, HostError> {
        let response = self
            .http
            .post(self.url("nodes"))
            .json(env)
            .send()
            .await?
            .error_for_status()?
            .json::<StartNodeResponse>()
            .await?;
        debug!(node = %response.id, address = %response.address, "node started");
        Ok(StartedNode {
            node_id: response.id,
            address: response.address,
        })
    }

    async fn report_result(&self, report: UnitReport) -> Result<(), HostError> {
        let body = json!({
            "success": report.success,
            "nodeId": report.node_id,
            "name": report.name,
            "error": report.error,
            "durationMs": report.duration.as_millis() as u64,
        });
        self.http
            .post(self.url("results"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
