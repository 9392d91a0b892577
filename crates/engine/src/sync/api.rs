use thiserror::Error;

use crate::model::{Character, CharacterId, MoveRequest, NewCharacter, Progress, WorldMap};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response shape at `{path}`: {message}")]
    Decode { path: String, message: String },
    #[error("failed to encode request body: {0}")]
    Encode(String),
}

/// The game server's HTTP surface. Implementations block; callers that must
/// stay responsive run them on a dispatcher thread.
pub trait GameApi: Send + Sync {
    fn fetch_map(&self) -> Result<WorldMap, ApiError>;
    fn generate_map(&self) -> Result<WorldMap, ApiError>;
    fn fetch_characters(&self) -> Result<Vec<Character>, ApiError>;
    fn create_character(&self, character: &NewCharacter) -> Result<Character, ApiError>;
    fn move_character(&self, id: CharacterId, target: MoveRequest) -> Result<Character, ApiError>;
    fn reconcile_characters(&self) -> Result<Vec<Character>, ApiError>;
    fn progress(&self) -> Result<Progress, ApiError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    FetchMap,
    GenerateMap,
    FetchCharacters,
    CreateCharacter(NewCharacter),
    MoveCharacter { id: CharacterId, target: MoveRequest },
    ReconcileCharacters,
    Progress,
}

impl ApiRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ApiRequest::FetchMap => "fetch_map",
            ApiRequest::GenerateMap => "generate_map",
            ApiRequest::FetchCharacters => "fetch_characters",
            ApiRequest::CreateCharacter(_) => "create_character",
            ApiRequest::MoveCharacter { .. } => "move_character",
            ApiRequest::ReconcileCharacters => "reconcile_characters",
            ApiRequest::Progress => "progress",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Map(WorldMap),
    Characters(Vec<Character>),
    Character(Character),
    Progress(Progress),
}

pub fn execute(api: &dyn GameApi, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    match request {
        ApiRequest::FetchMap => api.fetch_map().map(ApiResponse::Map),
        ApiRequest::GenerateMap => api.generate_map().map(ApiResponse::Map),
        ApiRequest::FetchCharacters => api.fetch_characters().map(ApiResponse::Characters),
        ApiRequest::CreateCharacter(character) => api
            .create_character(character)
            .map(ApiResponse::Character),
        ApiRequest::MoveCharacter { id, target } => {
            api.move_character(*id, *target).map(ApiResponse::Character)
        }
        ApiRequest::ReconcileCharacters => {
            api.reconcile_characters().map(ApiResponse::Characters)
        }
        ApiRequest::Progress => api.progress().map(ApiResponse::Progress),
    }
}
