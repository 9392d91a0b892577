use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::*;
use crate::geometry::Vec2;
use crate::input::{GameAction, InputController};
use crate::model::{
    Character, CharacterId, LoadStatus, MoveRequest, NewCharacter, PathPoint, Progress, WorldMap,
};

fn character(id: u64, x: f32, y: f32) -> Character {
    Character {
        id: CharacterId(id),
        name: format!("c{id}"),
        role: "Worker".to_string(),
        color: Some("#3498db".to_string()),
        x: Some(x),
        y: Some(y),
        target_x: Some(x),
        target_y: Some(y),
        speed: Some(2.0),
        map_id: Some(1),
    }
}

fn map_with_points(points: &[(f32, f32)]) -> WorldMap {
    let mut map = WorldMap::empty(800.0, 600.0);
    map.id = Some(1);
    map.paths.points = points.iter().map(|(x, y)| PathPoint::at(*x, *y)).collect();
    map
}

/// In-memory server. Creation hands out ids from `next_id`.
struct FakeGameApi {
    state: Mutex<FakeState>,
}

struct FakeState {
    map: WorldMap,
    characters: Vec<Character>,
    next_id: u64,
}

impl FakeGameApi {
    fn new(map: WorldMap, characters: Vec<Character>, next_id: u64) -> Self {
        Self {
            state: Mutex::new(FakeState {
                map,
                characters,
                next_id,
            }),
        }
    }
}

impl GameApi for FakeGameApi {
    fn fetch_map(&self) -> Result<WorldMap, ApiError> {
        Ok(self.state.lock().expect("state").map.clone())
    }

    fn generate_map(&self) -> Result<WorldMap, ApiError> {
        let mut state = self.state.lock().expect("state");
        state.map = map_with_points(&[(10.0, 10.0)]);
        state.map.id = Some(2);
        Ok(state.map.clone())
    }

    fn fetch_characters(&self) -> Result<Vec<Character>, ApiError> {
        Ok(self.state.lock().expect("state").characters.clone())
    }

    fn create_character(&self, new: &NewCharacter) -> Result<Character, ApiError> {
        let mut state = self.state.lock().expect("state");
        let Some(map_id) = new.map_id else {
            return Err(ApiError::Status {
                status: 400,
                body: "map_id is required".to_string(),
            });
        };
        let created = Character {
            id: CharacterId(state.next_id),
            name: new.name.clone(),
            role: new.role.clone(),
            color: Some(new.color.clone()),
            x: Some(400.0),
            y: Some(300.0),
            target_x: Some(400.0),
            target_y: Some(300.0),
            speed: Some(2.0),
            map_id: Some(map_id),
        };
        state.next_id += 1;
        state.characters.push(created.clone());
        Ok(created)
    }

    fn move_character(&self, id: CharacterId, target: MoveRequest) -> Result<Character, ApiError> {
        let mut state = self.state.lock().expect("state");
        let character = state
            .characters
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(ApiError::Status {
                status: 404,
                body: "Character not found".to_string(),
            })?;
        character.target_x = Some(target.target_x);
        character.target_y = Some(target.target_y);
        Ok(character.clone())
    }

    fn reconcile_characters(&self) -> Result<Vec<Character>, ApiError> {
        Ok(self.state.lock().expect("state").characters.clone())
    }

    fn progress(&self) -> Result<Progress, ApiError> {
        Ok(Progress { progress: 100.0 })
    }
}

/// Holds submitted requests until the test decides when and how they finish.
#[derive(Default)]
struct ManualDispatcher {
    submitted: Vec<(Ticket, ApiRequest)>,
    ready: Vec<Completion>,
}

impl ManualDispatcher {
    fn take(&mut self, matches: impl Fn(&ApiRequest) -> bool) -> (Ticket, ApiRequest) {
        let index = self
            .submitted
            .iter()
            .position(|(_, request)| matches(request))
            .expect("matching request submitted");
        self.submitted.remove(index)
    }

    fn respond(&mut self, ticket: Ticket, result: Result<ApiResponse, ApiError>) {
        self.ready.push(Completion { ticket, result });
    }

    fn answer_all(&mut self, api: &dyn GameApi) {
        for (ticket, request) in std::mem::take(&mut self.submitted) {
            let result = execute(api, &request);
            self.ready.push(Completion { ticket, result });
        }
    }

    fn count(&self, matches: impl Fn(&ApiRequest) -> bool) -> usize {
        self.submitted
            .iter()
            .filter(|(_, request)| matches(request))
            .count()
    }
}

impl RequestSink for ManualDispatcher {
    fn submit(&mut self, ticket: Ticket, request: ApiRequest) {
        self.submitted.push((ticket, request));
    }

    fn drain(&mut self, out: &mut Vec<Completion>) {
        out.append(&mut self.ready);
    }
}

fn is_poll(request: &ApiRequest) -> bool {
    matches!(request, ApiRequest::ReconcileCharacters)
}

fn transport_error() -> ApiError {
    ApiError::Transport {
        url: "http://localhost:5000/api/characters".to_string(),
        message: "connection refused".to_string(),
    }
}

fn ready_sync(
    api: &FakeGameApi,
    config: SyncConfig,
    start: Instant,
) -> StateSynchronizer<ManualDispatcher> {
    let mut sync = StateSynchronizer::new(ManualDispatcher::default(), config);
    sync.start(start);
    sync.sink_mut().answer_all(api);
    sync.tick(start);
    assert_eq!(sync.status(), &LoadStatus::Ready);
    sync
}

#[test]
fn start_requests_map_and_characters_together() {
    let mut sync = StateSynchronizer::new(ManualDispatcher::default(), SyncConfig::default());
    sync.start(Instant::now());

    assert_eq!(sync.status(), &LoadStatus::Loading);
    let requests: Vec<&ApiRequest> = sync.sink().submitted.iter().map(|(_, r)| r).collect();
    assert_eq!(
        requests,
        vec![&ApiRequest::FetchMap, &ApiRequest::FetchCharacters]
    );
}

#[test]
fn status_is_ready_only_after_both_loads_succeed() {
    let api = FakeGameApi::new(map_with_points(&[]), vec![character(1, 5.0, 5.0)], 2);
    let start = Instant::now();
    let mut sync = StateSynchronizer::new(ManualDispatcher::default(), SyncConfig::default());
    sync.start(start);

    let (map_ticket, _) = sync
        .sink_mut()
        .take(|r| matches!(r, ApiRequest::FetchMap));
    sync.sink_mut()
        .respond(map_ticket, api.fetch_map().map(ApiResponse::Map));
    sync.tick(start);
    assert_eq!(sync.status(), &LoadStatus::Loading);
    assert!(sync.map().is_some());

    sync.sink_mut().answer_all(&api);
    sync.tick(start);
    assert_eq!(sync.status(), &LoadStatus::Ready);
    assert_eq!(sync.characters().len(), 1);
}

#[test]
fn failed_load_reports_error_and_keeps_partial_data() {
    let api = FakeGameApi::new(map_with_points(&[]), Vec::new(), 1);
    let start = Instant::now();
    let mut sync = StateSynchronizer::new(ManualDispatcher::default(), SyncConfig::default());
    sync.start(start);

    let (characters_ticket, _) = sync
        .sink_mut()
        .take(|r| matches!(r, ApiRequest::FetchCharacters));
    sync.sink_mut()
        .respond(characters_ticket, Err(transport_error()));
    sync.sink_mut().answer_all(&api);
    sync.tick(start);

    assert!(matches!(sync.status(), LoadStatus::Error(message) if message.contains("connection refused")));
    assert!(sync.map().is_some());
    assert!(sync.last_network_error().is_some());
}

#[test]
fn refresh_returns_to_loading_and_ignores_older_loads() {
    let api = FakeGameApi::new(map_with_points(&[]), vec![character(1, 5.0, 5.0)], 2);
    let start = Instant::now();
    let mut sync = StateSynchronizer::new(ManualDispatcher::default(), SyncConfig::default());
    sync.start(start);
    let old_requests = std::mem::take(&mut sync.sink_mut().submitted);

    sync.refresh(start);
    assert_eq!(sync.status(), &LoadStatus::Loading);

    // The first load finishes late with an error; it must not flip the status.
    for (ticket, _) in old_requests {
        sync.sink_mut().respond(ticket, Err(transport_error()));
    }
    sync.tick(start);
    assert_eq!(sync.status(), &LoadStatus::Loading);

    sync.sink_mut().answer_all(&api);
    sync.tick(start);
    assert_eq!(sync.status(), &LoadStatus::Ready);
}

#[test]
fn creating_a_character_appends_the_server_copy() {
    let api = FakeGameApi::new(map_with_points(&[]), Vec::new(), 7);
    let start = Instant::now();
    let mut sync = ready_sync(&api, SyncConfig::default(), start);

    sync.create_character(NewCharacter {
        name: "Amy".to_string(),
        role: "Farmer".to_string(),
        color: "#2ecc71".to_string(),
        map_id: None,
    });
    let (_, request) = sync
        .sink()
        .submitted
        .last()
        .cloned()
        .expect("create submitted");
    assert!(matches!(
        request,
        ApiRequest::CreateCharacter(NewCharacter { map_id: Some(1), .. })
    ));

    sync.sink_mut().answer_all(&api);
    sync.tick(start);
    assert_eq!(sync.characters().len(), 1);
    assert_eq!(sync.characters()[0].id, CharacterId(7));
    assert_eq!(sync.characters()[0].name, "Amy");
    assert_eq!(
        sync.view().provenance(CharacterId(7)).map(|p| p.is_confirmed()),
        Some(true)
    );
}

#[test]
fn failed_creation_leaves_characters_untouched() {
    let api = FakeGameApi::new(map_with_points(&[]), vec![character(1, 5.0, 5.0)], 2);
    let start = Instant::now();
    let mut sync = ready_sync(&api, SyncConfig::default(), start);

    sync.create_character(NewCharacter {
        name: "Bo".to_string(),
        role: "Miner".to_string(),
        color: "#f1c40f".to_string(),
        map_id: None,
    });
    let (ticket, _) = sync
        .sink_mut()
        .take(|r| matches!(r, ApiRequest::CreateCharacter(_)));
    sync.sink_mut().respond(
        ticket,
        Err(ApiError::Status {
            status: 500,
            body: "boom".to_string(),
        }),
    );
    sync.tick(start);

    assert_eq!(sync.characters().len(), 1);
    assert_eq!(sync.status(), &LoadStatus::Ready);
    assert!(sync.last_network_error().is_some_and(|e| e.contains("500")));
}

#[test]
fn clicking_a_path_point_moves_the_selected_character() {
    let api = FakeGameApi::new(map_with_points(&[(100.0, 100.0)]), vec![character(1, 50.0, 50.0)], 2);
    let start = Instant::now();
    let mut sync = ready_sync(&api, SyncConfig::default(), start);
    sync.select(CharacterId(1));

    let action = InputController::default().on_pointer_down(
        Vec2::new(100.0, 100.0),
        sync.characters(),
        sync.view().path_points(),
        sync.selected(),
    );
    assert_eq!(
        action,
        Some(GameAction::MoveCharacterTo {
            id: CharacterId(1),
            target: Vec2::new(100.0, 100.0),
        })
    );

    sync.apply(action.expect("action"));
    assert_eq!(sync.characters()[0].target(), Some(Vec2::new(100.0, 100.0)));
    assert_eq!(sync.characters()[0].position(), Some(Vec2::new(50.0, 50.0)));
    let (_, request) = sync
        .sink_mut()
        .take(|r| matches!(r, ApiRequest::MoveCharacter { .. }));
    assert_eq!(
        request,
        ApiRequest::MoveCharacter {
            id: CharacterId(1),
            target: MoveRequest {
                target_x: 100.0,
                target_y: 100.0,
            },
        }
    );
}

#[test]
fn failed_move_keeps_the_optimistic_target() {
    let api = FakeGameApi::new(map_with_points(&[]), vec![character(1, 50.0, 50.0)], 2);
    let start = Instant::now();
    let mut sync = ready_sync(&api, SyncConfig::default(), start);

    sync.move_character_to(CharacterId(1), Vec2::new(70.0, 50.0));
    let provenance = sync.view().provenance(CharacterId(1)).expect("tracked");
    assert_eq!(provenance.target, FieldSource::Optimistic);
    assert_eq!(provenance.position, FieldSource::Server);

    let (ticket, _) = sync
        .sink_mut()
        .take(|r| matches!(r, ApiRequest::MoveCharacter { .. }));
    sync.sink_mut().respond(ticket, Err(transport_error()));
    sync.tick(start);

    assert_eq!(sync.characters()[0].target(), Some(Vec2::new(70.0, 50.0)));
    assert_eq!(
        sync.view().provenance(CharacterId(1)).map(|p| p.target),
        Some(FieldSource::Optimistic)
    );
    assert!(sync.last_network_error().is_some());
}

#[test]
fn confirmed_move_replaces_character_with_server_copy() {
    let api = FakeGameApi::new(map_with_points(&[]), vec![character(1, 50.0, 50.0)], 2);
    let start = Instant::now();
    let mut sync = ready_sync(&api, SyncConfig::default(), start);

    sync.move_character_to(CharacterId(1), Vec2::new(70.0, 50.0));
    sync.sink_mut().answer_all(&api);
    sync.tick(start);

    assert_eq!(sync.characters()[0].target(), Some(Vec2::new(70.0, 50.0)));
    assert_eq!(
        sync.view().provenance(CharacterId(1)).map(|p| p.is_confirmed()),
        Some(true)
    );
}

#[test]
fn poll_confirms_optimistic_target_and_late_move_result_still_lands() {
    let api = FakeGameApi::new(map_with_points(&[]), vec![character(1, 50.0, 50.0)], 2);
    let start = Instant::now();
    let config = SyncConfig::default();
    let interval = config.poll_interval;
    let mut sync = ready_sync(&api, config, start);

    sync.move_character_to(CharacterId(1), Vec2::new(70.0, 50.0));
    assert_eq!(
        sync.view().provenance(CharacterId(1)).map(|p| p.target),
        Some(FieldSource::Optimistic)
    );

    sync.tick(start + interval);
    let (poll, _) = sync.sink_mut().take(is_poll);
    let mut polled = character(1, 55.0, 50.0);
    polled.set_target(Vec2::new(90.0, 50.0));
    sync.sink_mut()
        .respond(poll, Ok(ApiResponse::Characters(vec![polled])));
    sync.tick(start + interval);

    assert_eq!(
        sync.view().provenance(CharacterId(1)).map(|p| p.is_confirmed()),
        Some(true)
    );
    assert_eq!(sync.characters()[0].target(), Some(Vec2::new(90.0, 50.0)));
    assert_eq!(sync.characters()[0].position(), Some(Vec2::new(55.0, 50.0)));

    let (moved, _) = sync
        .sink_mut()
        .take(|r| matches!(r, ApiRequest::MoveCharacter { .. }));
    let mut echoed = character(1, 50.0, 50.0);
    echoed.set_target(Vec2::new(70.0, 50.0));
    sync.sink_mut()
        .respond(moved, Ok(ApiResponse::Character(echoed)));
    sync.tick(start + interval);

    assert_eq!(sync.characters()[0].target(), Some(Vec2::new(70.0, 50.0)));
    assert_eq!(sync.characters()[0].position(), Some(Vec2::new(50.0, 50.0)));
    assert_eq!(
        sync.view().provenance(CharacterId(1)).map(|p| p.is_confirmed()),
        Some(true)
    );
}

#[test]
fn poll_with_malformed_character_keeps_the_rest() {
    let api = FakeGameApi::new(map_with_points(&[]), vec![character(1, 5.0, 5.0)], 3);
    let start = Instant::now();
    let config = SyncConfig::default();
    let interval = config.poll_interval;
    let mut sync = ready_sync(&api, config, start);

    sync.tick(start + interval);
    let (ticket, _) = sync.sink_mut().take(is_poll);
    let mut broken = character(2, 0.0, 0.0);
    broken.x = None;
    sync.sink_mut().respond(
        ticket,
        Ok(ApiResponse::Characters(vec![character(1, 6.0, 5.0), broken])),
    );
    sync.tick(start + interval);

    assert_eq!(sync.characters().len(), 2);
    assert_eq!(sync.characters()[0].position(), Some(Vec2::new(6.0, 5.0)));
    assert_eq!(sync.characters()[1].position(), None);
}

#[test]
fn poll_without_selected_character_clears_selection() {
    let api = FakeGameApi::new(
        map_with_points(&[]),
        vec![character(1, 5.0, 5.0), character(2, 50.0, 50.0)],
        3,
    );
    let start = Instant::now();
    let config = SyncConfig::default();
    let interval = config.poll_interval;
    let mut sync = ready_sync(&api, config, start);
    sync.select(CharacterId(2));

    sync.tick(start + interval);
    let (ticket, _) = sync.sink_mut().take(is_poll);
    sync.sink_mut().respond(
        ticket,
        Ok(ApiResponse::Characters(vec![character(1, 6.0, 5.0)])),
    );
    sync.tick(start + interval);

    assert_eq!(sync.selected(), None);
    assert_eq!(sync.characters().len(), 1);
}

#[test]
fn poll_preserves_selection_by_id() {
    let api = FakeGameApi::new(map_with_points(&[]), vec![character(1, 5.0, 5.0)], 2);
    let start = Instant::now();
    let config = SyncConfig::default();
    let interval = config.poll_interval;
    let mut sync = ready_sync(&api, config, start);
    sync.select(CharacterId(1));

    sync.tick(start + interval);
    let (ticket, _) = sync.sink_mut().take(is_poll);
    sync.sink_mut().respond(
        ticket,
        Ok(ApiResponse::Characters(vec![character(1, 9.0, 5.0)])),
    );
    sync.tick(start + interval);

    assert_eq!(sync.selected(), Some(CharacterId(1)));
    assert_eq!(sync.view().selected_character().and_then(|c| c.x), Some(9.0));
}

#[test]
fn older_poll_arriving_after_newer_one_is_discarded() {
    let api = FakeGameApi::new(map_with_points(&[]), vec![character(1, 5.0, 5.0)], 2);
    let start = Instant::now();
    let config = SyncConfig::default();
    let interval = config.poll_interval;
    let mut sync = ready_sync(&api, config, start);

    sync.tick(start + interval);
    sync.tick(start + interval * 2);
    assert_eq!(sync.sink().count(is_poll), 2);
    let (first, _) = sync.sink_mut().take(is_poll);
    let (second, _) = sync.sink_mut().take(is_poll);

    sync.sink_mut().respond(
        second,
        Ok(ApiResponse::Characters(vec![character(1, 20.0, 5.0)])),
    );
    sync.sink_mut().respond(
        first,
        Ok(ApiResponse::Characters(vec![character(1, 10.0, 5.0)])),
    );
    sync.tick(start + interval * 2);

    assert_eq!(sync.characters()[0].x, 20.0);
}

#[test]
fn stale_poll_result_is_discarded() {
    let api = FakeGameApi::new(map_with_points(&[]), vec![character(1, 5.0, 5.0)], 2);
    let start = Instant::now();
    let config = SyncConfig {
        stale_after: Duration::from_millis(500),
        ..SyncConfig::default()
    };
    let interval = config.poll_interval;
    let mut sync = ready_sync(&api, config, start);

    sync.tick(start + interval);
    let (ticket, _) = sync.sink_mut().take(is_poll);
    sync.sink_mut().respond(
        ticket,
        Ok(ApiResponse::Characters(vec![character(1, 99.0, 5.0)])),
    );
    sync.tick(start + interval + Duration::from_secs(1));

    assert_eq!(sync.characters()[0].x, 5.0);
}

#[test]
fn no_poll_while_no_characters_are_known() {
    let api = FakeGameApi::new(map_with_points(&[]), Vec::new(), 1);
    let start = Instant::now();
    let config = SyncConfig::default();
    let interval = config.poll_interval;
    let mut sync = ready_sync(&api, config, start);

    sync.tick(start + interval);
    sync.tick(start + interval * 5);
    assert_eq!(sync.sink().count(is_poll), 0);
}

#[test]
fn polls_follow_the_configured_interval() {
    let api = FakeGameApi::new(map_with_points(&[]), vec![character(1, 5.0, 5.0)], 2);
    let start = Instant::now();
    let config = SyncConfig {
        poll_interval: Duration::from_millis(250),
        ..SyncConfig::default()
    };
    let mut sync = ready_sync(&api, config, start);

    sync.tick(start + Duration::from_millis(100));
    assert_eq!(sync.sink().count(is_poll), 0);
    sync.tick(start + Duration::from_millis(250));
    assert_eq!(sync.sink().count(is_poll), 1);
    sync.tick(start + Duration::from_millis(300));
    assert_eq!(sync.sink().count(is_poll), 1);
    sync.tick(start + Duration::from_millis(500));
    assert_eq!(sync.sink().count(is_poll), 2);
}

#[test]
fn shutdown_stops_polling_and_discards_late_results() {
    let api = FakeGameApi::new(map_with_points(&[]), vec![character(1, 5.0, 5.0)], 2);
    let start = Instant::now();
    let config = SyncConfig::default();
    let interval = config.poll_interval;
    let mut sync = ready_sync(&api, config, start);

    sync.tick(start + interval);
    let (ticket, _) = sync.sink_mut().take(is_poll);
    sync.shutdown();
    assert!(!sync.is_mounted());

    sync.sink_mut().respond(
        ticket,
        Ok(ApiResponse::Characters(vec![character(1, 99.0, 5.0)])),
    );
    sync.tick(start + interval * 2);
    sync.tick(start + interval * 10);

    assert_eq!(sync.characters()[0].x, 5.0);
    assert_eq!(sync.sink().count(is_poll), 0);
}

#[test]
fn regenerating_replaces_map_and_keeps_characters() {
    let api = FakeGameApi::new(map_with_points(&[(1.0, 1.0), (2.0, 2.0)]), vec![character(1, 5.0, 5.0)], 2);
    let start = Instant::now();
    let mut sync = ready_sync(&api, SyncConfig::default(), start);

    sync.regenerate_map();
    sync.sink_mut().answer_all(&api);
    sync.tick(start);

    assert_eq!(sync.map().and_then(|map| map.id), Some(2));
    assert_eq!(sync.view().path_points().len(), 1);
    assert_eq!(sync.characters().len(), 1);
}

#[test]
fn random_move_targets_a_path_point() {
    let points = [(100.0, 100.0), (200.0, 150.0), (300.0, 400.0)];
    let api = FakeGameApi::new(map_with_points(&points), vec![character(1, 5.0, 5.0)], 2);
    let start = Instant::now();
    let mut sync = ready_sync(&api, SyncConfig::default(), start);
    let mut rng = StdRng::seed_from_u64(42);

    let target = sync
        .move_character_randomly(CharacterId(1), &mut rng)
        .expect("map has path points");
    assert!(points
        .iter()
        .any(|(x, y)| Vec2::new(*x, *y) == target));
    assert_eq!(sync.characters()[0].target(), Some(target));
}

#[test]
fn random_move_without_path_points_does_nothing() {
    let api = FakeGameApi::new(map_with_points(&[]), vec![character(1, 5.0, 5.0)], 2);
    let start = Instant::now();
    let mut sync = ready_sync(&api, SyncConfig::default(), start);
    let mut rng = StdRng::seed_from_u64(7);

    assert_eq!(sync.move_character_randomly(CharacterId(1), &mut rng), None);
    assert_eq!(
        sync.sink()
            .count(|r| matches!(r, ApiRequest::MoveCharacter { .. })),
        0
    );
}

#[test]
fn selecting_through_actions_requires_a_known_character() {
    let api = FakeGameApi::new(map_with_points(&[]), vec![character(1, 5.0, 5.0)], 2);
    let start = Instant::now();
    let mut sync = ready_sync(&api, SyncConfig::default(), start);

    sync.apply(GameAction::SelectCharacter(CharacterId(9)));
    assert_eq!(sync.selected(), None);
    sync.apply(GameAction::SelectCharacter(CharacterId(1)));
    assert_eq!(sync.selected(), Some(CharacterId(1)));
    sync.clear_selection();
    assert_eq!(sync.selected(), None);
}
