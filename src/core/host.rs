use crate::core::middleware::SerializeJson;
use crate::core::transport::{join_path, HttpTransport};
use crate::domain::model::{ActiveJob, ApiResponse, JobEvent};
use crate::domain::ports::{Middleware, OutgoingRequest};
use crate::utils::error::{ClientError, Result};
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::Method;
use std::collections::HashMap;
use std::sync::Arc;

/// Pseudo job id that subscribes to events for every job on the host.
const ALL_JOBS: &str = "all";

/// Client for a single host's job API.
#[derive(Debug, Clone)]
pub struct HostClient {
    base_url: String,
    transport: HttpTransport,
}

impl HostClient {
    pub fn new(base_url: impl Into<String>, transport: HttpTransport) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
        }
    }

    fn jobs_url(&self, job_id: Option<&str>) -> Result<String> {
        match job_id {
            Some(id) => join_path(&self.base_url, &["host", "jobs", id]),
            None => join_path(&self.base_url, &["host", "jobs"]),
        }
    }

    async fn send(&self, method: Method, url: String) -> Result<ApiResponse> {
        let mut response = self
            .transport
            .send(OutgoingRequest::new(method, url.clone()))
            .await?;
        if !response.is_success() {
            if let Err(e) = SerializeJson.after_response(&mut response) {
                tracing::debug!("Could not decode error response from {}: {}", url, e);
            }
            return Err(ClientError::Status {
                status: response.status,
                url,
                response: Arc::new(response),
            });
        }
        SerializeJson.after_response(&mut response)?;
        Ok(response)
    }

    /// All jobs the host knows about, keyed by job id.
    pub async fn list_jobs(&self) -> Result<HashMap<String, ActiveJob>> {
        let url = self.jobs_url(None)?;
        let response = self.send(Method::GET, url).await?;
        if response.body.is_null() {
            return Ok(HashMap::new());
        }
        response.json()
    }

    /// `None` when the host does not know the job; it answers `null` rather than 404.
    pub async fn get_job(&self, job_id: &str) -> Result<Option<ActiveJob>> {
        let url = self.jobs_url(Some(job_id))?;
        let response = self.send(Method::GET, url).await?;
        if response.body.is_null() {
            return Ok(None);
        }
        response.json().map(Some)
    }

    /// Stop a running job, or cancel one that is still starting.
    pub async fn stop_job(&self, job_id: &str) -> Result<()> {
        let url = self.jobs_url(Some(job_id))?;
        self.send(Method::DELETE, url).await?;
        tracing::info!("Stopped job {}", job_id);
        Ok(())
    }

    /// Subscribe to state changes of one job.
    pub async fn stream_events(&self, job_id: &str) -> Result<JobEventStream> {
        let url = self.jobs_url(Some(job_id))?;
        let response = self
            .transport
            .client()
            .get(url.as_str())
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let raw = response.bytes().await?.to_vec();
            let mut rejected = ApiResponse::new(status, headers, raw);
            if let Err(e) = SerializeJson.after_response(&mut rejected) {
                tracing::debug!("Could not decode error response from {}: {}", url, e);
            }
            return Err(ClientError::Status {
                status,
                url,
                response: Arc::new(rejected),
            });
        }

        tracing::debug!("Streaming job events from {}", url);
        Ok(JobEventStream::new(response))
    }

    pub async fn stream_all_events(&self) -> Result<JobEventStream> {
        self.stream_events(ALL_JOBS).await
    }
}

/// Server-sent event stream of [`JobEvent`]s.
pub struct JobEventStream {
    response: reqwest::Response,
    buffer: Vec<u8>,
    finished: bool,
}

impl JobEventStream {
    fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Next event, or `None` once the server closes the stream.
    pub async fn next_event(&mut self) -> Result<Option<JobEvent>> {
        loop {
            if let Some(frame) = take_frame(&mut self.buffer) {
                if let Some(data) = frame_data(&frame) {
                    return Ok(Some(serde_json::from_str(&data)?));
                }
                continue;
            }

            if self.finished {
                let rest = std::mem::take(&mut self.buffer);
                return match frame_data(&String::from_utf8_lossy(&rest)) {
                    Some(data) => Ok(Some(serde_json::from_str(&data)?)),
                    None => Ok(None),
                };
            }

            match self.response.chunk().await? {
                Some(chunk) => self
                    .buffer
                    .extend(chunk.iter().copied().filter(|b| *b != b'\r')),
                None => self.finished = true,
            }
        }
    }
}

/// Split the first complete (blank-line terminated) frame off the buffer.
fn take_frame(buffer: &mut Vec<u8>) -> Option<String> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let frame: Vec<u8> = buffer.drain(..end + 2).collect();
    Some(String::from_utf8_lossy(&frame[..end]).into_owned())
}

/// Joined `data:` lines of a frame; comments and other fields are skipped.
fn frame_data(frame: &str) -> Option<String> {
    let lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
