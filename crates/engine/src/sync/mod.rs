mod api;
mod dispatch;
mod http;
mod synchronizer;

pub use api::{execute, ApiError, ApiRequest, ApiResponse, GameApi};
pub use dispatch::{Completion, RequestSink, ThreadedDispatcher, Ticket};
pub use http::{ApiConfig, HttpGameApi, DEFAULT_BASE_URL};
pub use synchronizer::{
    CharacterProvenance, FieldSource, StateSynchronizer, SyncConfig, ViewState,
};

#[cfg(test)]
mod tests;
