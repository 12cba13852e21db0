use crate::config::Config;
use crate::rate::RateTracker;
use crate::resource::{Fixture, Power, Scene};
use crate::selector::SelectorList;
use crate::LightError;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<Power>,
    /// Any colour string the upstream understands, e.g. `red`, `#ff0000`,
    /// `hue:120 saturation:1.0` or `kelvin:2700`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    /// Transition time in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl StateChange {
    pub fn on(self) -> Self {
        Self {
            power: Some(Power::On),
            ..self
        }
    }

    pub fn off(self) -> Self {
        Self {
            power: Some(Power::Off),
            ..self
        }
    }

    pub fn with_brightness(self, brightness: f64) -> Self {
        Self {
            brightness: Some(brightness),
            ..self
        }
    }

    pub fn with_color(self, color: impl Into<String>) -> Self {
        Self {
            color: Some(color.into()),
            ..self
        }
    }

    pub fn with_duration(self, seconds: f64) -> Self {
        Self {
            duration: Some(seconds),
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.power.is_none()
            && self.color.is_none()
            && self.brightness.is_none()
            && self.duration.is_none()
    }
}

/// Outcome for one fixture of a write addressed to several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateResult {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateResults {
    #[serde(default)]
    pub results: Vec<StateResult>,
}

impl StateResults {
    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.status == "ok")
            .count()
    }

    pub fn summary(&self) -> String {
        format!("Updated {}/{} lights", self.succeeded(), self.results.len())
    }
}

/// Client of the LIFX HTTP API. Every call is charged to a [`RateTracker`]
/// that may be shared with other clients.
#[derive(Debug, Clone)]
pub struct LifxClient {
    base_url: String,
    timeout: Duration,
    default_duration: f64,
    rate: Arc<RateTracker>,
    client: reqwest::Client,
}

fn create_reqwest_client(token: &str) -> crate::Result<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    let mut bearer = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| LightError::ConfigError {
            msg: "token contains characters not allowed in a header".into(),
        })?;
    bearer.set_sensitive(true);
    headers.insert(reqwest::header::AUTHORIZATION, bearer);
    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .tcp_keepalive(Some(Duration::from_secs(5)))
        .build()?)
}

fn header<T: std::str::FromStr>(response: &Response, name: &str) -> Option<T> {
    response.headers().get(name)?.to_str().ok()?.parse().ok()
}

/// The `error` field of a JSON error body, or the body itself.
fn error_message(body: String) -> String {
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| value.get("error")?.as_str().map(str::to_string))
        .unwrap_or(body)
}

/// Selectors go into the path; `|` is not escaped by the url parser.
fn selector_path(selector: &SelectorList) -> String {
    selector.to_string().replace('|', "%7C")
}

impl LifxClient {
    /// ### Example
    /// ```no_run
    /// let config = lightscope::Config::default().with_token("c87c...");
    /// let client = lightscope::LifxClient::new(&config).unwrap();
    /// ```
    pub fn new(config: &Config) -> crate::Result<LifxClient> {
        Ok(LifxClient {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
            default_duration: config.default_duration,
            rate: Arc::new(RateTracker::new(config.rate_limit)),
            client: create_reqwest_client(&config.token)?,
        })
    }

    /// Charges calls to `rate` instead of a tracker of its own.
    pub fn with_rate_tracker(self, rate: Arc<RateTracker>) -> LifxClient {
        LifxClient { rate, ..self }
    }

    pub fn rate_tracker(&self) -> &Arc<RateTracker> {
        &self.rate
    }

    async fn send(&self, request: RequestBuilder) -> crate::Result<Response> {
        self.rate.try_acquire()?;
        let response = request.timeout(self.timeout).send().await?;
        self.rate.observe(
            header(&response, "X-RateLimit-Remaining"),
            header(&response, "X-RateLimit-Reset"),
        );
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = header(&response, "Retry-After").unwrap_or(60);
            log::warn!("upstream rate limit exceeded");
            return Err(LightError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    log::debug!("could not read upstream error body: {e}");
                    String::new()
                }
            };
            return Err(LightError::UpstreamError {
                status: status.as_u16(),
                msg: error_message(body),
            });
        }
        Ok(response)
    }

    async fn results(response: Response) -> crate::Result<StateResults> {
        let multi_status = response.status() == StatusCode::MULTI_STATUS;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(StateResults::default());
        }
        let results: StateResults = serde_json::from_str(&body)?;
        if multi_status && results.succeeded() < results.results.len() {
            log::warn!("partial update: {}", results.summary());
        }
        Ok(results)
    }

    /// Returns every light of the account, sorted by id.
    /// ### Example
    /// ```no_run
    /// # tokio_test::block_on(async {
    /// let client = lightscope::LifxClient::new(&lightscope::Config::from_env()).unwrap();
    /// for light in &client.get_all_lights().await.unwrap() {
    ///     println!("{:?}", light);
    /// }
    /// # })
    /// ```
    pub async fn get_all_lights(&self) -> crate::Result<Vec<Fixture>> {
        let url = format!("{}/lights/all", self.base_url);
        let mut lights: Vec<Fixture> = self.send(self.client.get(&url)).await?.json().await?;
        lights.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(lights)
    }

    /// Returns every scene of the account, sorted by id.
    pub async fn get_all_scenes(&self) -> crate::Result<Vec<Scene>> {
        let url = format!("{}/scenes", self.base_url);
        let mut scenes: Vec<Scene> = self.send(self.client.get(&url)).await?.json().await?;
        scenes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(scenes)
    }

    /// Applies `change` to the fixtures of `selector`, with the configured
    /// transition time unless `change` carries one.
    pub async fn set_state(
        &self,
        selector: &SelectorList,
        change: &StateChange,
    ) -> crate::Result<StateResults> {
        let url = format!("{}/lights/{}/state", self.base_url, selector_path(selector));
        let change = StateChange {
            duration: change.duration.or(Some(self.default_duration)),
            ..change.clone()
        };
        log::info!("set state of {selector}: {change:?}");
        let response = self.send(self.client.put(&url).json(&change)).await?;
        Self::results(response).await
    }

    pub async fn toggle(&self, selector: &SelectorList) -> crate::Result<StateResults> {
        let url = format!("{}/lights/{}/toggle", self.base_url, selector_path(selector));
        log::info!("toggle {selector}");
        let response = self.send(self.client.post(&url)).await?;
        Self::results(response).await
    }

    pub async fn activate_scene(&self, scene_id: &str) -> crate::Result<StateResults> {
        let url = format!("{}/scenes/scene_id:{}/activate", self.base_url, scene_id);
        log::info!("activate scene {scene_id}");
        let response = self.send(self.client.put(&url)).await?;
        Self::results(response).await
    }
}
