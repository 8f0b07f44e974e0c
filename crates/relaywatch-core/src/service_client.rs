//! HTTP client for the telemetry REST API.
//!
//! [`HttpApi`] implements [`TelemetryApi`] over the service's JSON endpoints
//! with bearer-token authentication. Payloads are normalised here so the
//! engine only ever sees finite values and ordered series.
//!
//! # Example
//!
//! ```no_run
//! use relaywatch_core::{HttpApi, TelemetryApi};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = HttpApi::new("https://telemetry.example.com", Some("secret".into()))?;
//! for sensor in api.list_sensors().await? {
//!     println!("{}", sensor.name);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};
use uuid::Uuid;

use relaywatch_types::{ControlMode, Controller, Reading, Relay, Sensor, User};

use crate::error::{Error, Result};
use crate::traits::TelemetryApi;

/// Default timeout for a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Telemetry service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct RelayStateBody {
    is_working: bool,
}

#[derive(Serialize)]
struct ControlModeBody {
    control_mode: ControlMode,
}

impl HttpApi {
    /// Create a client with the default request timeout.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The service root (e.g., "https://telemetry.example.com")
    /// * `token` - Bearer token sent with every request, if any
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        Self::with_timeout(base_url, token, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let mut api = Self::with_client(base_url, token, client)?;
        api.timeout = timeout;
        Ok(api)
    }

    /// Create a client with a custom reqwest Client.
    pub fn with_client(base_url: &str, token: Option<String>, client: Client) -> Result<Self> {
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
            token: token.filter(|t| !t.trim().is_empty()),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a bearer token is configured.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    // ======================================================================
    // Internal HTTP helpers
    // ======================================================================

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> Result<Response> {
        debug!("Requesting {}", path);
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(path.to_string(), self.timeout)
            } else {
                Error::Transport(format!("{}{}: {}", self.base_url, path, e))
            }
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, path), path).await?;
        handle_response(response).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .send(self.request(method, path).json(body), path)
            .await?;
        handle_response(response).await
    }
}

#[async_trait]
impl TelemetryApi for HttpApi {
    async fn list_sensors(&self) -> Result<Vec<Sensor>> {
        let mut sensors: Vec<Sensor> = self.get("/api/sensors/").await?;
        for sensor in &mut sensors {
            if sensor.normalize() {
                warn!("Sensor '{}' has non-numeric thresholds, ignoring them", sensor.name);
            }
        }
        Ok(sensors)
    }

    async fn list_controllers(&self) -> Result<Vec<Controller>> {
        self.get("/api/controllers/").await
    }

    async fn list_relays(&self) -> Result<Vec<Relay>> {
        self.get("/api/relays/").await
    }

    async fn latest_reading(&self, sensor_uuid: Uuid) -> Result<Option<Reading>> {
        let path = format!("/api/sensors/{}/latest/", sensor_uuid);
        let response = self.send(self.request(Method::GET, &path), &path).await?;
        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT
        ) {
            return Ok(None);
        }
        let reading: Reading = handle_response(response).await?;
        if let Err(e) = reading.validate() {
            warn!("Dropping latest reading of {}: {}", sensor_uuid, e);
            return Ok(None);
        }
        Ok(Some(reading))
    }

    async fn readings_in_range(
        &self,
        sensor_uuid: Uuid,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<Reading>> {
        let path = format!("/api/sensors/{}/messages/", sensor_uuid);
        let query = [("from", format_instant(from)?), ("to", format_instant(to)?)];
        let response = self
            .send(self.request(Method::GET, &path).query(&query), &path)
            .await?;
        let readings: Vec<Reading> = handle_response(response).await?;
        Ok(normalize_series(sensor_uuid, readings))
    }

    async fn set_relay_state(
        &self,
        controller_uuid: Uuid,
        relay_uuid: Uuid,
        desired_state: bool,
    ) -> Result<()> {
        let path = format!(
            "/api/controllers/{}/relays/{}/state/",
            controller_uuid, relay_uuid
        );
        let body = RelayStateBody {
            is_working: desired_state,
        };
        let _: serde_json::Value = self.send_json(Method::POST, &path, &body).await?;
        Ok(())
    }

    async fn set_controller_mode(
        &self,
        controller_id: u64,
        mode: ControlMode,
    ) -> Result<Controller> {
        let path = format!("/api/controllers/{}/mode/", controller_id);
        let body = ControlModeBody { control_mode: mode };
        self.send_json(Method::PATCH, &path, &body).await
    }

    async fn current_user(&self) -> Result<User> {
        self.get("/api/users/me/").await
    }
}

fn normalize_base_url(base_url: &str) -> Result<String> {
    // Normalize URL (remove trailing slash)
    let base_url = base_url.trim().trim_end_matches('/').to_string();

    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(Error::invalid_config(format!(
            "URL must start with http:// or https://, got: {}",
            base_url
        )));
    }
    Ok(base_url)
}

fn format_instant(instant: OffsetDateTime) -> Result<String> {
    instant
        .format(&Rfc3339)
        .map_err(|e| Error::InvalidPayload(format!("cannot format {}: {}", instant, e)))
}

/// Drop non-finite values and order the series by timestamp.
fn normalize_series(sensor_uuid: Uuid, mut readings: Vec<Reading>) -> Vec<Reading> {
    let before = readings.len();
    readings.retain(|r| r.validate().is_ok());
    if readings.len() != before {
        warn!(
            "Dropped {} non-numeric readings of {}",
            before - readings.len(),
            sensor_uuid
        );
    }
    readings.sort_by_key(|r| r.timestamp);
    readings
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        let body = response.bytes().await?;
        // Empty acknowledgements decode as JSON null.
        let body: &[u8] = if body.is_empty() { b"null" } else { &body };
        serde_json::from_slice(body).map_err(|e| Error::InvalidPayload(e.to_string()))
    } else {
        let body = response.json::<serde_json::Value>().await.ok();
        Err(status_error(status, body.as_ref()))
    }
}

/// Map a non-success status and its JSON body to an error.
fn status_error(status: StatusCode, body: Option<&serde_json::Value>) -> Error {
    if status == StatusCode::UNAUTHORIZED {
        return Error::Unauthenticated;
    }
    let message = body
        .and_then(|v| {
            ["detail", "error"]
                .iter()
                .find_map(|key| v.get(key).and_then(|m| m.as_str()))
        })
        .map(String::from)
        .unwrap_or_else(|| status.to_string());
    Error::api(status.as_u16(), message)
}
