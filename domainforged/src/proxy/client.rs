use std::time::Duration;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use crate::error::RouteError;
use super::RouteSync;

/// Admin API path that accepts new server blocks
const SERVER_BLOCKS_PATH: &str = "/server_blocks";

#[derive(Serialize)]
struct ServerBlock<'a> {
    domains: &'a [String],
    port: u16,
}

/// Route synchronizer talking to the reverse proxy's HTTP admin API.
#[derive(Clone)]
pub struct HttpRouteSync {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRouteSync {
    pub fn new(endpoint: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport(&self, source: reqwest::Error) -> RouteError {
        RouteError::Transport {
            endpoint: self.endpoint.clone(),
            source,
        }
    }

    async fn post_server_block(&self, domains: &[String], port: u16) -> Result<(), RouteError> {
        let url = format!("{}{}", self.endpoint, SERVER_BLOCKS_PATH);
        let resp = self
            .client
            .post(&url)
            .json(&ServerBlock { domains, port })
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RouteError::Rejected {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        tracing::debug!("Added server block {:?} -> port {}", domains, port);
        Ok(())
    }
}

impl RouteSync for HttpRouteSync {
    fn add_route<'a>(
        &'a self,
        domains: &'a [String],
        port: u16,
    ) -> BoxFuture<'a, Result<(), RouteError>> {
        self.post_server_block(domains, port).boxed()
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), RouteError>> {
        async move {
            // Any HTTP answer means the admin API is up
            self.client
                .get(format!("{}/", self.endpoint))
                .send()
                .await
                .map_err(|e| self.transport(e))?;
            Ok(())
        }
        .boxed()
    }
}
