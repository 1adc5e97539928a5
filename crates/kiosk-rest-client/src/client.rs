//! Main store REST client implementation

use kiosk_api_contract::*;
use kiosk_client_api::{ChannelRegistry, ScreenSubscription};
use reqwest::{Client as HttpClient, Method, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::auth::AuthConfig;
use crate::error::{RestClientError, RestClientResult};
use crate::sse::ScreenChangeFeed;

const SCREENS_PATH: &str = "/rest/v1/screens";
const RETURN_REPRESENTATION: &str = "return=representation";

/// Per-request timeout used by [`RestClient::new`]
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// REST client for the screen table and its change feed
#[derive(Debug, Clone)]
pub struct RestClient {
    http_client: HttpClient,
    base_url: Url,
    auth: AuthConfig,
    channels: ChannelRegistry,
}

impl RestClient {
    /// Create a new REST client
    pub fn new(base_url: Url, auth: AuthConfig) -> RestClientResult<Self> {
        Self::with_timeout(base_url, auth, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: Url, auth: AuthConfig, timeout: Duration) -> RestClientResult<Self> {
        let http_client = HttpClient::builder()
            .user_agent(concat!("kiosk/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            auth,
            channels: ChannelRegistry::new(),
        })
    }

    /// Create a client from a base URL string
    pub fn from_url(base_url: &str, auth: AuthConfig) -> RestClientResult<Self> {
        let base_url = Url::parse(base_url)?;
        Self::new(base_url, auth)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    /// Registry holding the transport state of every open change feed
    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    /// Fetch one screen by id
    pub async fn get_screen(&self, id: &ScreenId) -> RestClientResult<Option<Screen>> {
        let url = self.screens_url(&[("id", format!("eq.{}", id)), ("select", "*".into())])?;
        let rows: Vec<Screen> = self.request(Method::GET, url, None::<&()>).await?;
        Ok(rows.into_iter().next())
    }

    /// Fetch the most recently seen screen with the given name
    pub async fn find_latest_by_name(&self, name: &str) -> RestClientResult<Option<Screen>> {
        let url = self.screens_url(&[
            ("name", format!("eq.{}", name)),
            ("select", "*".into()),
            ("order", "last_seen.desc.nullslast".into()),
            ("limit", "1".into()),
        ])?;
        let rows: Vec<Screen> = self.request(Method::GET, url, None::<&()>).await?;
        Ok(rows.into_iter().next())
    }

    /// Create a screen row and return it as stored
    pub async fn insert_screen(&self, screen: &NewScreen) -> RestClientResult<Screen> {
        screen.checked()?;
        let url = self.screens_url(&[])?;
        let rows: Vec<Screen> = self.request(Method::POST, url, Some(screen)).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RestClientError::UnexpectedResponse("insert returned no rows".into()))
    }

    /// Write liveness fields and read the row back; `None` when no row matched
    pub async fn heartbeat(&self, id: &ScreenId, beat: &Heartbeat) -> RestClientResult<Option<Screen>> {
        let url = self.screens_url(&[("id", format!("eq.{}", id))])?;
        let rows: Vec<Screen> = self.request(Method::PATCH, url, Some(beat)).await?;
        Ok(rows.into_iter().next())
    }

    /// Open the change feed scoped to one screen row
    pub fn stream_screen_changes(&self, id: &ScreenId) -> RestClientResult<ScreenSubscription> {
        ScreenChangeFeed::connect(&self.base_url, id, &self.auth, &self.channels)
    }

    // Private helper methods

    fn screens_url(&self, params: &[(&str, String)]) -> RestClientResult<Url> {
        let mut url = self.base_url.join(SCREENS_PATH)?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn request<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> RestClientResult<T> {
        let mut request = self.http_client.request(method, url);

        let auth_headers = self.auth.headers().map_err(|e| RestClientError::Auth(e.to_string()))?;
        request = request.headers(auth_headers);

        if let Some(body) = body {
            request = request.header("prefer", RETURN_REPRESENTATION).json(body);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> RestClientResult<T> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(RestClientError::from)
        } else {
            match serde_json::from_str::<StoreProblem>(&text) {
                Ok(problem) => Err(RestClientError::ServerError {
                    status,
                    details: problem,
                }),
                Err(_) => Err(RestClientError::UnexpectedResponse(format!("{}: {}", status, text))),
            }
        }
    }
}
