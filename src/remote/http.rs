//! HTTP adapter for the Remote Patrol Service
//!
//! Maps a REST-like server onto the `PatrolApi` trait: 409 responses become
//! `RemoteError::Conflict`, other non-success statuses carry their code and
//! body, and send failures (no response at all) become
//! `RemoteError::Connection`. Connection pooling, TLS, and timeouts are the
//! underlying client's concern.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::model::{Officer, Patrol};
use crate::remote::{
    AlertRequest, CancelRequest, CheckInRequest, CompleteRequest, DeployRequest, MutationAck,
    PatrolApi, ReassignRequest, RemoteError,
};

/// REST client for the Remote Patrol Service
#[derive(Debug, Clone)]
pub struct HttpPatrolApi {
    config: Config,
    client: Client,
}

impl HttpPatrolApi {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<MutationAck, RemoteError> {
        let url = self.config.api_url(path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RemoteError::Connection(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 409 {
            return Err(RemoteError::Conflict);
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<MutationAck>().await.map_err(|e| {
            RemoteError::Status {
                status: status.as_u16(),
                message: format!("invalid response body: {}", e),
            }
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let url = self.config.api_url(path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RemoteError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<T>().await.map_err(|e| RemoteError::Status {
            status: status.as_u16(),
            message: format!("invalid response body: {}", e),
        })
    }
}

#[async_trait]
impl PatrolApi for HttpPatrolApi {
    async fn deploy_patrol(&self, req: &DeployRequest) -> Result<MutationAck, RemoteError> {
        self.post_json(&format!("/api/patrols/{}/deploy", req.patrol_id), req)
            .await
    }

    async fn complete_patrol(&self, req: &CompleteRequest) -> Result<MutationAck, RemoteError> {
        self.post_json(&format!("/api/patrols/{}/complete", req.patrol_id), req)
            .await
    }

    async fn reassign_patrol(&self, req: &ReassignRequest) -> Result<MutationAck, RemoteError> {
        self.post_json(&format!("/api/patrols/{}/reassign", req.patrol_id), req)
            .await
    }

    async fn cancel_patrol(&self, req: &CancelRequest) -> Result<MutationAck, RemoteError> {
        self.post_json(&format!("/api/patrols/{}/cancel", req.patrol_id), req)
            .await
    }

    async fn raise_alert(&self, req: &AlertRequest) -> Result<MutationAck, RemoteError> {
        self.post_json("/api/alerts", req).await
    }

    async fn submit_check_in(&self, req: &CheckInRequest) -> Result<MutationAck, RemoteError> {
        self.post_json(
            &format!(
                "/api/patrols/{}/checkpoints/{}/check-in",
                req.patrol_id, req.checkpoint_id
            ),
            req,
        )
        .await
    }

    async fn fetch_officers(&self) -> Result<Vec<Officer>, RemoteError> {
        self.get_json("/api/officers").await
    }

    async fn fetch_patrols(&self) -> Result<Vec<Patrol>, RemoteError> {
        self.get_json("/api/patrols").await
    }
}
