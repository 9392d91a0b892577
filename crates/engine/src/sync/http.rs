use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use ureq::{Agent, AgentBuilder};

use crate::model::{Character, CharacterId, MoveRequest, NewCharacter, Progress, WorldMap};

use super::{ApiError, GameApi};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_WORKER_THREADS: usize = 2;
const MAX_ERROR_BODY_CHARS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub worker_threads: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }
}

/// Blocking JSON client for the game server.
#[derive(Debug, Clone)]
pub struct HttpGameApi {
    agent: Agent,
    base_url: String,
}

impl HttpGameApi {
    pub fn new(config: &ApiConfig) -> Self {
        let agent = AgentBuilder::new()
            .timeout(config.request_timeout)
            .build();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "api_get");
        let result = self.agent.get(&url).call();
        read_json(&url, result)
    }

    fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "api_post");
        let request = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json");
        let result = match body {
            Some(body) => {
                let encoded =
                    serde_json::to_string(body).map_err(|error| ApiError::Encode(error.to_string()))?;
                request.send_string(&encoded)
            }
            None => request.call(),
        };
        read_json(&url, result)
    }
}

impl GameApi for HttpGameApi {
    fn fetch_map(&self) -> Result<WorldMap, ApiError> {
        self.get("/api/map")
    }

    fn generate_map(&self) -> Result<WorldMap, ApiError> {
        self.post::<(), _>("/api/map/generate", None)
    }

    fn fetch_characters(&self) -> Result<Vec<Character>, ApiError> {
        self.get("/api/characters")
    }

    fn create_character(&self, character: &NewCharacter) -> Result<Character, ApiError> {
        self.post("/api/characters", Some(character))
    }

    fn move_character(&self, id: CharacterId, target: MoveRequest) -> Result<Character, ApiError> {
        self.post(&format!("/api/characters/{}/move", id.0), Some(&target))
    }

    fn reconcile_characters(&self) -> Result<Vec<Character>, ApiError> {
        self.post::<(), _>("/api/characters/update", None)
    }

    fn progress(&self) -> Result<Progress, ApiError> {
        self.get("/api/progress")
    }
}

fn read_json<T: DeserializeOwned>(
    url: &str,
    result: Result<ureq::Response, ureq::Error>,
) -> Result<T, ApiError> {
    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_default();
            return Err(ApiError::Status {
                status,
                body: clip(&body),
            });
        }
        Err(ureq::Error::Transport(transport)) => {
            return Err(ApiError::Transport {
                url: url.to_string(),
                message: transport.to_string(),
            });
        }
    };

    let body = response.into_string().map_err(|error| ApiError::Transport {
        url: url.to_string(),
        message: error.to_string(),
    })?;
    decode_body(&body)
}

pub(crate) fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let mut deserializer = serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        ApiError::Decode {
            path,
            message: error.into_inner().to_string(),
        }
    })
}

fn clip(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
