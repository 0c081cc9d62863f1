use crate::config::HttpSettings;
use crate::domain::model::ApiResponse;
use crate::domain::ports::OutgoingRequest;
use crate::utils::error::{ClientError, Result};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Thin wrapper over `reqwest::Client` that sends fully prepared requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(settings.timeout_seconds));
        if let Some(user_agent) = &settings.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub async fn send(&self, request: OutgoingRequest) -> Result<ApiResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.as_str())
            .headers(request.headers);

        if let Some((user, password)) = request.basic_auth {
            builder = builder.basic_auth(user, password);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        tracing::debug!("Sending {} {}", request.method, request.url);
        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let raw = response.bytes().await?.to_vec();
        tracing::debug!("Response status: {} ({} bytes)", status, raw.len());

        Ok(ApiResponse::new(status, headers, raw))
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }
}

/// Append percent-encoded path segments to `base`.
pub fn join_path(base: &str, segments: &[&str]) -> Result<String> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| ClientError::InvalidRequest {
            message: format!("{} cannot be used as a base URL", base),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url.to_string())
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::from_client(Client::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::Method;

    #[test]
    fn test_join_path_encodes_segments() {
        assert_eq!(
            join_path("https://ctl.test", &["apps", "my app", "routes"]).unwrap(),
            "https://ctl.test/apps/my%20app/routes"
        );
        assert_eq!(
            join_path("https://ctl.test/api/", &["apps", "a/b"]).unwrap(),
            "https://ctl.test/api/apps/a%2Fb"
        );
        assert!(join_path("not a url", &["apps"]).is_err());
        assert!(join_path("mailto:ops@example.com", &["apps"]).is_err());
    }

    #[tokio::test]
    async fn test_send_applies_basic_auth_and_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/apps")
                    .header("authorization", "Basic OmtleQ==")
                    .body("payload");
                then.status(201).body("created");
            })
            .await;

        let mut request = OutgoingRequest::new(Method::POST, server.url("/apps"));
        request.basic_auth = Some((String::new(), Some("key".to_string())));
        request.body = Some(b"payload".to_vec());

        let response = HttpTransport::default().send(request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status.as_u16(), 201);
        assert_eq!(response.text(), "created");
        assert!(response.body.is_null());
    }
}
