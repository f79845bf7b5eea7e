// ABOUTME: HTTP/1.1 JSON transport to the remote control plane.
// ABOUTME: One short-lived hyper connection per call over a plain TCP stream.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Method;
use hyper::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HOST};
use hyper_util::rt::TokioIo;
use snafu::ResultExt;
use std::time::Duration;
use tokio::net::TcpStream;

use super::error::{
    ConnectSnafu, DecodeSnafu, EncodeSnafu, HttpSnafu, RequestSnafu, StatusSnafu, TimeoutSnafu,
};
use super::{ControlPlane, ReportError, StatusUpdate};
use crate::config::ControlPlaneConfig;
use crate::deploy::ExternalCommand;
use crate::error::Result;
use crate::types::{AgentId, DeploymentId};

const API_PREFIX: &str = "/api/v1/deployments";
const AGENT_HEADER: &str = "x-stagehand-agent";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    address: String,
    api_key: Option<String>,
    agent_id: Option<AgentId>,
    timeout: Duration,
}

impl HttpControlPlane {
    pub fn new(address: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            address: address.into(),
            api_key,
            agent_id: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound each call, from connect to the last body byte.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Identify this agent on every request.
    pub fn with_agent_id(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    /// Build from config, resolving the API key from the environment if needed.
    pub fn from_config(config: &ControlPlaneConfig, agent_id: &AgentId) -> Result<Self> {
        let api_key = config.api_key.as_ref().map(|k| k.resolve()).transpose()?;
        Ok(Self::new(config.address.clone(), api_key)
            .with_agent_id(agent_id.clone())
            .with_timeout(config.request_timeout))
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn path(deployment_id: &DeploymentId, resource: &str) -> String {
        format!(
            "{API_PREFIX}/{}/{resource}",
            urlencoding::encode(deployment_id.as_str())
        )
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> std::result::Result<Bytes, ReportError> {
        match tokio::time::timeout(self.timeout, self.exchange(method, path, body)).await {
            Ok(result) => result,
            Err(_) => TimeoutSnafu {
                address: self.address.clone(),
                after: self.timeout,
            }
            .fail(),
        }
    }

    async fn exchange(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> std::result::Result<Bytes, ReportError> {
        let stream = TcpStream::connect(&self.address)
            .await
            .context(ConnectSnafu {
                address: self.address.clone(),
            })?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .context(HttpSnafu)?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("control plane connection error: {}", e);
            }
        });

        let mut builder = hyper::Request::builder()
            .method(method)
            .uri(path)
            .header(HOST, self.address.as_str())
            .header(ACCEPT, "application/json");
        if let Some(ref key) = self.api_key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {key}"));
        }
        if let Some(ref agent) = self.agent_id {
            builder = builder.header(AGENT_HEADER, agent.as_str());
        }
        let body = match body {
            Some(bytes) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Full::new(Bytes::from(bytes))
            }
            None => Full::new(Bytes::new()),
        };
        let req = builder.body(body).context(RequestSnafu)?;

        let resp = sender.send_request(req).await.context(HttpSnafu)?;
        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .context(HttpSnafu)?
            .to_bytes();

        if !status.is_success() {
            return StatusSnafu {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }
            .fail();
        }

        Ok(bytes)
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn report_deployment_status(
        &self,
        update: &StatusUpdate,
    ) -> std::result::Result<(), ReportError> {
        let body = serde_json::to_vec(update).context(EncodeSnafu)?;
        let path = Self::path(&update.deployment_id, "status");
        self.send(Method::POST, &path, Some(body)).await?;
        Ok(())
    }

    async fn poll_commands(
        &self,
        deployment_id: &DeploymentId,
    ) -> std::result::Result<Vec<ExternalCommand>, ReportError> {
        let path = Self::path(deployment_id, "commands");
        let bytes = self.send(Method::GET, &path, None).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes).context(DecodeSnafu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_ids_are_path_encoded() {
        let path = HttpControlPlane::path(&DeploymentId::new("a/b c"), "status");
        assert_eq!(path, "/api/v1/deployments/a%2Fb%20c/status");
    }
}
