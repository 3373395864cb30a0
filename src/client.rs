use crate::core::info::{ErrorResponse, SchedulerInfo, SubmitResponse};
use crate::core::job::{Job, JobSpec};
use crate::core::JobId;
use crate::tls::ensure_rustls_provider_installed;
use anyhow::{anyhow, Context};
use reqwest::{Client as ReqwestClient, Response, StatusCode};

#[derive(Debug, Clone)]
pub struct Client {
    client: ReqwestClient,
    base_url: String,
}

impl Client {
    pub fn build(config: &crate::config::Config) -> anyhow::Result<Self> {
        ensure_rustls_provider_installed();
        let client = ReqwestClient::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.daemon.base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn publish(&self, spec: &JobSpec) -> anyhow::Result<JobId> {
        tracing::debug!("Publishing job: {:?}", spec);
        let response = self
            .client
            .post(format!("{}/jobs", self.base_url))
            .json(spec)
            .send()
            .await
            .context("Failed to send publish request")?;
        let submitted: SubmitResponse = decode(response).await?;
        Ok(submitted.id)
    }

    pub async fn list_jobs(&self) -> anyhow::Result<Vec<Job>> {
        let response = self
            .client
            .get(format!("{}/jobs", self.base_url))
            .send()
            .await
            .context("Failed to send list jobs request")?;
        decode(response).await
    }

    /// Returns `false` when the daemon does not know the job.
    pub async fn delete_job(&self, job_id: JobId) -> anyhow::Result<bool> {
        tracing::debug!("Deleting job {}", job_id);
        let response = self
            .client
            .delete(format!("{}/jobs/{}", self.base_url, job_id))
            .send()
            .await
            .context("Failed to send delete job request")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(response).await?;
        Ok(true)
    }

    pub async fn get_info(&self) -> anyhow::Result<SchedulerInfo> {
        let response = self
            .client
            .get(format!("{}/info", self.base_url))
            .send()
            .await
            .context("Failed to send info request")?;
        decode(response).await
    }
}

async fn check(response: Response) -> anyhow::Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };
    Err(anyhow!("Daemon returned {status}: {message}"))
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> anyhow::Result<T> {
    check(response)
        .await?
        .json::<T>()
        .await
        .context("Failed to decode daemon response")
}
