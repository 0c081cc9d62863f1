use crate::config::{ClientConfig, Endpoints};
use crate::core::middleware::{BasicAuth, CookieJar, SerializeJson, WithCredentials};
use crate::core::session::RemoteSession;
use crate::core::transport::{join_path, HttpTransport};
use crate::domain::model::{ApiResponse, App, Artifact, Formation, Job, Release, Resource, Route};
use crate::domain::ports::{Middleware, OutgoingRequest, SessionConfig};
use crate::utils::error::{ClientError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// App whose release is used to run one-off jobs.
const TAFFY_APP: &str = "taffy";

/// Arguments for a single call to [`DashboardClient::perform_request`].
#[derive(Clone, Default)]
pub struct RequestArgs {
    pub url: String,
    pub body: Option<serde_json::Value>,
    pub headers: HeaderMap,
    /// Reuse a previous successful response for the same method and URL.
    pub cache_response: bool,
    /// Runs after the client's own middleware.
    pub middleware: Vec<Arc<dyn Middleware>>,
}

impl RequestArgs {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// JSON body, sent with `Content-Type: application/json`.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn cached(mut self) -> Self {
        self.cache_response = true;
        self
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }
}

/// Client for the dashboard session endpoints and the cluster controller API.
pub struct DashboardClient {
    endpoints: Endpoints,
    transport: HttpTransport,
    middleware: Vec<Arc<dyn Middleware>>,
    session: Arc<dyn SessionConfig>,
    cache: Mutex<HashMap<String, Arc<ApiResponse>>>,
}

impl DashboardClient {
    /// Build a client whose session is loaded from `endpoints.config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.http)?;
        let jar = Arc::new(CookieJar::new());
        let session = Arc::new(RemoteSession::new(
            config.endpoints.config.clone(),
            transport.clone(),
            jar.clone(),
        ));
        Ok(Self::with_session(
            config.endpoints.clone(),
            transport,
            jar,
            session,
        ))
    }

    pub fn with_session(
        endpoints: Endpoints,
        transport: HttpTransport,
        jar: Arc<CookieJar>,
        session: Arc<dyn SessionConfig>,
    ) -> Self {
        Self {
            endpoints,
            transport,
            middleware: vec![Arc::new(SerializeJson), Arc::new(WithCredentials::new(jar))],
            session,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn session(&self) -> &Arc<dyn SessionConfig> {
        &self.session
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, Arc<ApiResponse>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_cached(&self, method: &Method, url: &str) -> bool {
        self.cache().contains_key(&cache_key(method, url))
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    /// Send one request through the middleware chain.
    ///
    /// Statuses in `200..400` resolve; anything else is returned as
    /// [`ClientError::Status`]. A 401 also reloads the session config first.
    pub async fn perform_request(
        &self,
        method: Method,
        args: RequestArgs,
    ) -> Result<Arc<ApiResponse>> {
        let RequestArgs {
            url,
            body,
            headers,
            cache_response,
            middleware: extra,
        } = args;

        if url.is_empty() {
            tracing::error!("DashboardClient::perform_request(): Can't make request without URL");
            return Err(ClientError::MissingUrl);
        }

        let key = cache_key(&method, &url);
        if cache_response {
            let cached = self.cache().get(&key).cloned();
            if let Some(cached) = cached {
                tracing::debug!("Serving {} from response cache", key);
                return Ok(cached);
            }
        }

        let chain: Vec<Arc<dyn Middleware>> =
            self.middleware.iter().cloned().chain(extra).collect();

        let mut request = OutgoingRequest::new(method, url.clone());
        request.headers = headers;
        request.json = body;
        tracing::debug!(
            "{} {} via [{}]",
            request.method,
            request.url,
            chain
                .iter()
                .map(|middleware| middleware.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        for middleware in &chain {
            middleware.before_request(&mut request)?;
        }

        let mut response = self.transport.send(request).await?;
        let decoded = run_after_response(&chain, &mut response);

        if response.is_success() {
            decoded?;
            let response = Arc::new(response);
            if cache_response {
                self.cache().insert(key, response.clone());
            }
            return Ok(response);
        }

        if let Err(e) = decoded {
            tracing::debug!("Could not decode error response from {}: {}", url, e);
        }
        if response.status == StatusCode::UNAUTHORIZED {
            tracing::warn!("{} returned 401, reloading session config", url);
            self.refresh_session().await;
        }

        Err(ClientError::Status {
            status: response.status,
            url,
            response: Arc::new(response),
        })
    }

    /// Send a request to the cluster controller, authenticated with the session's controller key.
    pub async fn perform_controller_request(
        &self,
        method: Method,
        path: &[&str],
        args: RequestArgs,
    ) -> Result<Arc<ApiResponse>> {
        let controller_key = self.session.controller_key().unwrap_or_default();
        let url = join_path(&self.endpoints.cluster_controller, path)?;
        let args = RequestArgs { url, ..args }
            .with_middleware(Arc::new(BasicAuth::new("", controller_key)));
        self.perform_request(method, args).await
    }

    async fn refresh_session(&self) {
        if let Err(e) = self.session.fetch().await {
            tracing::warn!("Failed to reload session config: {}", e);
        }
    }

    async fn controller_get<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T> {
        self.perform_controller_request(Method::GET, path, RequestArgs::default())
            .await?
            .json()
    }

    async fn controller_send<B, T>(&self, method: Method, path: &[&str], data: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let args = RequestArgs::default().json(data)?;
        self.perform_controller_request(method, path, args)
            .await?
            .json()
    }

    pub async fn login(&self, token: &str) -> Result<Arc<ApiResponse>> {
        let args = RequestArgs::new(self.endpoints.login.clone())
            .json(&serde_json::json!({ "token": token }))?;
        let response = self.perform_request(Method::POST, args).await?;
        self.session.fetch().await?;
        Ok(response)
    }

    pub async fn logout(&self) -> Result<Arc<ApiResponse>> {
        let args = RequestArgs::new(self.endpoints.logout.clone());
        let response = self.perform_request(Method::DELETE, args).await?;
        self.session.fetch().await?;
        Ok(response)
    }

    pub async fn get_apps(&self) -> Result<Vec<App>> {
        self.controller_get(&["apps"]).await
    }

    pub async fn get_app(&self, app_id: &str) -> Result<App> {
        self.controller_get(&["apps", app_id]).await
    }

    pub async fn get_app_release(&self, app_id: &str) -> Result<Release> {
        self.controller_get(&["apps", app_id, "release"]).await
    }

    pub async fn get_app_formation(&self, app_id: &str, release_id: &str) -> Result<Formation> {
        self.controller_get(&["apps", app_id, "formations", release_id])
            .await
    }

    pub async fn get_app_jobs(&self, app_id: &str) -> Result<Vec<Job>> {
        self.controller_get(&["apps", app_id, "jobs"]).await
    }

    pub async fn get_app_routes(&self, app_id: &str) -> Result<Vec<Route>> {
        self.controller_get(&["apps", app_id, "routes"]).await
    }

    pub async fn get_app_resources(&self, app_id: &str) -> Result<Vec<Resource>> {
        self.controller_get(&["apps", app_id, "resources"]).await
    }

    pub async fn create_app_route<B: Serialize + ?Sized>(
        &self,
        app_id: &str,
        data: &B,
    ) -> Result<Route> {
        self.controller_send(Method::POST, &["apps", app_id, "routes"], data)
            .await
    }

    pub async fn delete_app_route(&self, app_id: &str, route_id: &str) -> Result<Arc<ApiResponse>> {
        self.perform_controller_request(
            Method::DELETE,
            &["apps", app_id, "routes", route_id],
            RequestArgs::default(),
        )
        .await
    }

    pub async fn create_app<B: Serialize + ?Sized>(&self, data: &B) -> Result<App> {
        self.controller_send(Method::POST, &["apps"], data).await
    }

    pub async fn update_app<B: Serialize + ?Sized>(&self, app_id: &str, data: &B) -> Result<App> {
        self.controller_send(Method::POST, &["apps", app_id], data)
            .await
    }

    pub async fn delete_app(&self, app_id: &str) -> Result<Arc<ApiResponse>> {
        self.perform_controller_request(Method::DELETE, &["apps", app_id], RequestArgs::default())
            .await
    }

    /// Provision a postgres database through the resource provider.
    pub async fn create_app_database<B: Serialize + ?Sized>(&self, data: &B) -> Result<Resource> {
        self.controller_send(Method::POST, &["providers", "postgres", "resources"], data)
            .await
    }

    pub async fn create_artifact<B: Serialize + ?Sized>(&self, data: &B) -> Result<Artifact> {
        self.controller_send(Method::POST, &["artifacts"], data).await
    }

    pub async fn create_release<B: Serialize + ?Sized>(&self, data: &B) -> Result<Release> {
        self.controller_send(Method::POST, &["releases"], data).await
    }

    /// Point an app at a release.
    pub async fn create_app_release<B: Serialize + ?Sized>(
        &self,
        app_id: &str,
        data: &B,
    ) -> Result<Release> {
        self.controller_send(Method::PUT, &["apps", app_id, "release"], data)
            .await
    }

    /// Scale an app; the formation's `release` selects the path.
    pub async fn create_app_formation(
        &self,
        app_id: &str,
        formation: &Formation,
    ) -> Result<Formation> {
        let release_id = formation
            .release
            .as_deref()
            .ok_or_else(|| ClientError::InvalidRequest {
                message: "formation has no release".to_string(),
            })?;
        self.controller_send(
            Method::PUT,
            &["apps", app_id, "formations", release_id],
            formation,
        )
        .await
    }

    /// The taffy release never changes, so it is fetched once per client.
    pub async fn get_taffy_release(&self) -> Result<Release> {
        self.perform_controller_request(
            Method::GET,
            &["apps", TAFFY_APP, "release"],
            RequestArgs::default().cached(),
        )
        .await?
        .json()
    }

    pub async fn create_taffy_job<B: Serialize + ?Sized>(&self, data: &B) -> Result<Job> {
        self.controller_send(Method::POST, &["apps", TAFFY_APP, "jobs"], data)
            .await
    }
}

/// Every middleware sees the response, even after an earlier one failed; the first error wins.
fn run_after_response(chain: &[Arc<dyn Middleware>], response: &mut ApiResponse) -> Result<()> {
    let mut first_error = None;
    for middleware in chain {
        if let Err(e) = middleware.after_response(response) {
            tracing::debug!("{} failed on response: {}", middleware.name(), e);
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn cache_key(method: &Method, url: &str) -> String {
    format!("{}{}", method, url)
}
