use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::geometry::Vec2;
use crate::input::GameAction;
use crate::model::{
    Character, CharacterId, LoadStatus, MoveRequest, NewCharacter, PathPoint, WorldMap,
};

use super::{ApiError, ApiRequest, ApiResponse, Completion, RequestSink, Ticket};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub poll_interval: Duration,
    /// Poll results whose request is older than this when they arrive are dropped.
    pub stale_after: Duration,
    /// Skip reconciliation polls while no character is known.
    pub poll_requires_characters: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
            poll_requires_characters: true,
        }
    }
}

/// Who last wrote a field: the server, or a local command not yet confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    Server,
    Optimistic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterProvenance {
    pub position: FieldSource,
    pub target: FieldSource,
}

impl CharacterProvenance {
    const SERVER: CharacterProvenance = CharacterProvenance {
        position: FieldSource::Server,
        target: FieldSource::Server,
    };

    pub fn is_confirmed(&self) -> bool {
        *self == Self::SERVER
    }
}

/// Everything the renderer and the input controller read.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    map: Option<WorldMap>,
    characters: Vec<Character>,
    selected: Option<CharacterId>,
    status: LoadStatus,
    last_network_error: Option<String>,
    provenance: HashMap<CharacterId, CharacterProvenance>,
}

impl ViewState {
    pub fn map(&self) -> Option<&WorldMap> {
        self.map.as_ref()
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn selected(&self) -> Option<CharacterId> {
        self.selected
    }

    pub fn selected_character(&self) -> Option<&Character> {
        let id = self.selected?;
        self.character(id)
    }

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.iter().find(|character| character.id == id)
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn last_network_error(&self) -> Option<&str> {
        self.last_network_error.as_deref()
    }

    pub fn provenance(&self, id: CharacterId) -> Option<CharacterProvenance> {
        self.provenance.get(&id).copied()
    }

    pub fn path_points(&self) -> &[PathPoint] {
        self.map
            .as_ref()
            .map(|map| map.paths.points.as_slice())
            .unwrap_or(&[])
    }

    fn replace_characters(&mut self, characters: Vec<Character>) {
        self.provenance = characters
            .iter()
            .map(|character| (character.id, CharacterProvenance::SERVER))
            .collect();
        self.characters = characters;
        if let Some(id) = self.selected {
            if self.character(id).is_none() {
                debug!(character_id = id.0, "selection_cleared_character_gone");
                self.selected = None;
            }
        }
    }

    fn upsert_character(&mut self, character: Character) {
        self.provenance
            .insert(character.id, CharacterProvenance::SERVER);
        match self.characters.iter_mut().find(|c| c.id == character.id) {
            Some(slot) => *slot = character,
            None => self.characters.push(character),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    LoadMap { generation: u64 },
    LoadCharacters { generation: u64 },
    GenerateMap,
    CreateCharacter,
    MoveCharacter { id: CharacterId },
    Poll { seq: u64, issued_at: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPart {
    Map,
    Characters,
}

#[derive(Debug, Clone, Copy, Default)]
struct LoadProgress {
    generation: u64,
    map_done: bool,
    characters_done: bool,
    failed: bool,
}

/// Owns the client's view of the game and keeps it in step with the server.
///
/// Every mutation happens on the caller's thread inside one of these methods.
/// Network calls go through the `RequestSink`; their results are applied in
/// `tick`, in arrival order.
pub struct StateSynchronizer<S: RequestSink> {
    sink: S,
    config: SyncConfig,
    view: ViewState,
    pending: HashMap<Ticket, Pending>,
    next_ticket: u64,
    load: Option<LoadProgress>,
    load_generation: u64,
    next_poll_seq: u64,
    last_applied_poll: Option<u64>,
    next_poll_at: Option<Instant>,
    mounted: bool,
    completions: Vec<Completion>,
}

impl<S: RequestSink> StateSynchronizer<S> {
    pub fn new(sink: S, config: SyncConfig) -> Self {
        Self {
            sink,
            config,
            view: ViewState::default(),
            pending: HashMap::new(),
            next_ticket: 0,
            load: None,
            load_generation: 0,
            next_poll_seq: 0,
            last_applied_poll: None,
            next_poll_at: None,
            mounted: false,
            completions: Vec::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn status(&self) -> &LoadStatus {
        self.view.status()
    }

    pub fn map(&self) -> Option<&WorldMap> {
        self.view.map()
    }

    pub fn characters(&self) -> &[Character] {
        self.view.characters()
    }

    pub fn selected(&self) -> Option<CharacterId> {
        self.view.selected()
    }

    pub fn last_network_error(&self) -> Option<&str> {
        self.view.last_network_error()
    }

    /// Mounts the synchronizer, requests map and characters together and arms
    /// the reconciliation timer.
    pub fn start(&mut self, now: Instant) {
        self.mounted = true;
        self.next_poll_at = Some(now + self.config.poll_interval);
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "sync_started"
        );
        self.begin_load();
    }

    /// Manual return to `Loading`. Results of earlier loads are ignored.
    pub fn refresh(&mut self, now: Instant) {
        if !self.mounted {
            warn!("sync_refresh_after_shutdown");
            return;
        }
        if self.next_poll_at.is_none() {
            self.next_poll_at = Some(now + self.config.poll_interval);
        }
        info!(generation = self.load_generation + 1, "sync_refresh");
        self.begin_load();
    }

    /// Sends a creation request; the map id is filled in from the current map
    /// when the caller leaves it empty.
    pub fn create_character(&mut self, mut character: NewCharacter) {
        if !self.mounted {
            return;
        }
        if character.map_id.is_none() {
            character.map_id = self.view.map.as_ref().and_then(|map| map.id);
        }
        debug!(name = %character.name, role = %character.role, "character_create_requested");
        self.submit(Pending::CreateCharacter, ApiRequest::CreateCharacter(character));
    }

    /// Sets the character's target locally, then asks the server to do the
    /// same. A failed request leaves the local target in place.
    pub fn move_character_to(&mut self, id: CharacterId, target: Vec2) {
        if !self.mounted {
            return;
        }
        if !target.is_finite() {
            warn!(character_id = id.0, "move_target_not_finite");
            return;
        }
        match self.view.characters.iter_mut().find(|c| c.id == id) {
            Some(character) => {
                character.set_target(target);
                let provenance = self
                    .view
                    .provenance
                    .entry(id)
                    .or_insert(CharacterProvenance::SERVER);
                provenance.target = FieldSource::Optimistic;
            }
            None => debug!(character_id = id.0, "move_for_unknown_character"),
        }
        self.submit(
            Pending::MoveCharacter { id },
            ApiRequest::MoveCharacter {
                id,
                target: MoveRequest {
                    target_x: target.x,
                    target_y: target.y,
                },
            },
        );
    }

    /// Sends the character to a random valid path point. Returns the chosen
    /// point, or `None` when the map has no usable path points.
    pub fn move_character_randomly<R: Rng + ?Sized>(
        &mut self,
        id: CharacterId,
        rng: &mut R,
    ) -> Option<Vec2> {
        let points: Vec<Vec2> = self.view.map.as_ref()?.valid_path_points().collect();
        let target = *points.choose(rng)?;
        self.move_character_to(id, target);
        Some(target)
    }

    pub fn regenerate_map(&mut self) {
        if !self.mounted {
            return;
        }
        self.submit(Pending::GenerateMap, ApiRequest::GenerateMap);
    }

    pub fn apply(&mut self, action: GameAction) {
        match action {
            GameAction::SelectCharacter(id) => self.select(id),
            GameAction::MoveCharacterTo { id, target } => self.move_character_to(id, target),
        }
    }

    pub fn select(&mut self, id: CharacterId) {
        if self.view.character(id).is_some() {
            self.view.selected = Some(id);
        } else {
            debug!(character_id = id.0, "select_unknown_character");
        }
    }

    pub fn clear_selection(&mut self) {
        self.view.selected = None;
    }

    /// Applies every finished request, then issues a reconciliation poll if
    /// one is due.
    pub fn tick(&mut self, now: Instant) {
        let mut completions = std::mem::take(&mut self.completions);
        self.sink.drain(&mut completions);
        if self.mounted {
            for completion in completions.drain(..) {
                self.handle_completion(completion, now);
            }
            self.maybe_poll(now);
        } else if !completions.is_empty() {
            debug!(count = completions.len(), "sync_discarded_late_results");
            completions.clear();
        }
        self.completions = completions;
    }

    /// Stops the timer and forgets outstanding requests; whatever they return
    /// later is discarded.
    pub fn shutdown(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.next_poll_at = None;
        self.load = None;
        info!(in_flight = self.pending.len(), "sync_shutdown");
        self.pending.clear();
    }

    fn begin_load(&mut self) {
        self.load_generation += 1;
        let generation = self.load_generation;
        self.load = Some(LoadProgress {
            generation,
            ..LoadProgress::default()
        });
        self.view.status = LoadStatus::Loading;
        self.submit(Pending::LoadMap { generation }, ApiRequest::FetchMap);
        self.submit(
            Pending::LoadCharacters { generation },
            ApiRequest::FetchCharacters,
        );
    }

    fn submit(&mut self, pending: Pending, request: ApiRequest) -> Ticket {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.pending.insert(ticket, pending);
        self.sink.submit(ticket, request);
        ticket
    }

    fn maybe_poll(&mut self, now: Instant) {
        let Some(due) = self.next_poll_at else {
            return;
        };
        if now < due {
            return;
        }
        self.next_poll_at = Some(now + self.config.poll_interval);

        if self.view.status != LoadStatus::Ready {
            return;
        }
        if self.config.poll_requires_characters && self.view.characters.is_empty() {
            return;
        }
        self.next_poll_seq += 1;
        let seq = self.next_poll_seq;
        self.submit(
            Pending::Poll {
                seq,
                issued_at: now,
            },
            ApiRequest::ReconcileCharacters,
        );
    }

    fn handle_completion(&mut self, completion: Completion, now: Instant) {
        let Some(pending) = self.pending.remove(&completion.ticket) else {
            debug!(ticket = completion.ticket.0, "sync_unknown_completion");
            return;
        };
        let result = completion.result;

        match pending {
            Pending::LoadMap { generation } => {
                if !self.is_current_load(generation) {
                    debug!(generation, "sync_stale_load_ignored");
                    return;
                }
                let failure = match expect_map(result) {
                    Ok(map) => {
                        self.install_map(map);
                        None
                    }
                    Err(error) => Some(error),
                };
                self.finish_load_part(LoadPart::Map, failure);
            }
            Pending::LoadCharacters { generation } => {
                if !self.is_current_load(generation) {
                    debug!(generation, "sync_stale_load_ignored");
                    return;
                }
                let failure = match expect_characters(result) {
                    Ok(characters) => {
                        self.view.replace_characters(characters);
                        None
                    }
                    Err(error) => Some(error),
                };
                self.finish_load_part(LoadPart::Characters, failure);
            }
            Pending::GenerateMap => match expect_map(result) {
                Ok(map) => {
                    info!("map_regenerated");
                    self.install_map(map);
                }
                Err(error) => self.record_network_error("generate_map", &error),
            },
            Pending::CreateCharacter => match expect_character(result) {
                Ok(character) => {
                    info!(character_id = character.id.0, name = %character.name, "character_created");
                    self.view.upsert_character(character);
                }
                Err(error) => self.record_network_error("create_character", &error),
            },
            Pending::MoveCharacter { id } => match expect_character(result) {
                Ok(character) => {
                    if self.view.character(character.id).is_some() {
                        self.view.upsert_character(character);
                    } else {
                        debug!(character_id = id.0, "move_result_for_missing_character");
                    }
                }
                Err(error) => {
                    // The optimistic target stays; the next poll reconciles it.
                    warn!(character_id = id.0, error = %error, "move_request_failed");
                    self.view.last_network_error = Some(error.to_string());
                }
            },
            Pending::Poll { seq, issued_at } => self.apply_poll(seq, issued_at, result, now),
        }
    }

    fn apply_poll(
        &mut self,
        seq: u64,
        issued_at: Instant,
        result: Result<ApiResponse, ApiError>,
        now: Instant,
    ) {
        let characters = match expect_characters(result) {
            Ok(characters) => characters,
            Err(error) => {
                if self.view.last_network_error.as_deref() != Some(error.to_string().as_str()) {
                    self.record_network_error("reconcile_characters", &error);
                }
                return;
            }
        };
        if self.last_applied_poll.is_some_and(|last| seq <= last) {
            debug!(seq, "poll_result_out_of_order");
            return;
        }
        let age = now.saturating_duration_since(issued_at);
        if age > self.config.stale_after {
            debug!(seq, age_ms = age.as_millis() as u64, "poll_result_stale");
            return;
        }
        self.last_applied_poll = Some(seq);
        self.view.last_network_error = None;
        self.view.replace_characters(characters);
    }

    fn is_current_load(&self, generation: u64) -> bool {
        self.load
            .is_some_and(|load| load.generation == generation)
    }

    fn finish_load_part(&mut self, part: LoadPart, failure: Option<ApiError>) {
        let Some(load) = self.load.as_mut() else {
            return;
        };
        match part {
            LoadPart::Map => load.map_done = true,
            LoadPart::Characters => load.characters_done = true,
        }
        if let Some(error) = failure {
            load.failed = true;
            warn!(part = ?part, error = %error, "initial_load_failed");
            self.view.last_network_error = Some(error.to_string());
            self.view.status = LoadStatus::Error(error.to_string());
        }

        let Some(load) = self.load else {
            return;
        };
        if load.map_done && load.characters_done {
            self.load = None;
            if !load.failed {
                self.view.status = LoadStatus::Ready;
                self.view.last_network_error = None;
                info!(
                    generation = load.generation,
                    characters = self.view.characters.len(),
                    "initial_load_ready"
                );
            }
        }
    }

    fn install_map(&mut self, map: WorldMap) {
        let malformed = map.malformed_entity_count();
        if malformed > 0 {
            warn!(malformed, "map_contains_malformed_entities");
        }
        info!(width = map.width, height = map.height, "map_loaded");
        self.view.map = Some(map);
    }

    fn record_network_error(&mut self, operation: &'static str, error: &ApiError) {
        warn!(operation, error = %error, "api_request_failed");
        self.view.last_network_error = Some(error.to_string());
    }
}

fn expect_map(result: Result<ApiResponse, ApiError>) -> Result<WorldMap, ApiError> {
    match result? {
        ApiResponse::Map(map) => Ok(map),
        other => Err(unexpected(&other)),
    }
}

fn expect_characters(result: Result<ApiResponse, ApiError>) -> Result<Vec<Character>, ApiError> {
    match result? {
        ApiResponse::Characters(characters) => Ok(characters),
        other => Err(unexpected(&other)),
    }
}

fn expect_character(result: Result<ApiResponse, ApiError>) -> Result<Character, ApiError> {
    match result? {
        ApiResponse::Character(character) => Ok(character),
        other => Err(unexpected(&other)),
    }
}

fn unexpected(response: &ApiResponse) -> ApiError {
    let kind = match response {
        ApiResponse::Map(_) => "map",
        ApiResponse::Characters(_) => "character list",
        ApiResponse::Character(_) => "character",
        ApiResponse::Progress(_) => "progress",
    };
    ApiError::Decode {
        path: ".".to_string(),
        message: format!("unexpected {kind} response"),
    }
}
