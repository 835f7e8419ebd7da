pub mod code;
pub mod config;
pub mod error;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use santa_core::{
    Assignment, DrawMode, Leaderboard, Participant, ParticipantId, Prediction, Progress,
    Recorded, RoomStatus, Transition,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

pub use error::ApiError;

pub const TOKEN_HEADER: &str = "x-participant-token";

/// Rooms live in memory only; every mutation happens under the write lock so
/// a reader never sees a half-replaced draw.
#[derive(Clone, Default)]
pub struct AppState {
    rooms: Arc<RwLock<HashMap<String, RoomRecord>>>,
}

#[derive(Clone, Debug)]
pub struct RoomRecord {
    pub code: String,
    pub status: RoomStatus,
    pub created_at: u64,
    pub participants: Vec<Participant>,
    /// token -> participant
    tokens: HashMap<String, ParticipantId>,
    pub assignment: Assignment,
    pub predictions: Vec<Prediction>,
}

impl RoomRecord {
    fn new(code: String) -> Self {
        Self {
            code,
            status: RoomStatus::Predicting,
            created_at: now_millis(),
            participants: Vec::new(),
            tokens: HashMap::new(),
            assignment: Assignment::new(),
            predictions: Vec::new(),
        }
    }

    fn add_participant(&mut self, name: &str, is_admin: bool) -> Result<JoinResponse, ApiError> {
        if self.participants.iter().any(|p| p.name == name) {
            return Err(ApiError::NameTaken);
        }

        let participant = Participant {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            is_admin,
            joined_at: now_millis(),
        };
        let token = Uuid::new_v4().to_string();
        self.tokens.insert(token.clone(), participant.id.clone());
        let response = JoinResponse {
            code: self.code.clone(),
            participant_id: participant.id.clone(),
            token,
        };
        self.participants.push(participant);
        Ok(response)
    }

    /// Guests may only join before anything is drawn, so a draw always covers
    /// the whole room.
    fn accepts_guests(&self) -> bool {
        self.status == RoomStatus::Predicting && self.assignment.is_empty()
    }

    /// Resolve the caller from the token header.
    fn caller(&self, headers: &HeaderMap) -> Result<&Participant, ApiError> {
        let token = headers
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::MissingToken)?;
        let id = self.tokens.get(token).ok_or(ApiError::InvalidToken)?;
        self.participants
            .iter()
            .find(|p| &p.id == id)
            .ok_or(ApiError::InvalidToken)
    }

    fn admin(&self, headers: &HeaderMap) -> Result<&Participant, ApiError> {
        let caller = self.caller(headers)?;
        if !caller.is_admin {
            return Err(ApiError::NotAdmin);
        }
        Ok(caller)
    }

    fn apply(&mut self, transition: &Transition) {
        if let Transition::Moved { from, to } = transition {
            info!(room = %self.code, %from, %to, "room status changed");
        }
        self.status = transition.status();
    }

    fn pairs(&self) -> Vec<PairView> {
        self.assignment
            .iter()
            .map(|(giver, receiver)| PairView {
                giver_name: self.name_of(giver),
                receiver_name: self.name_of(receiver),
                giver: giver.clone(),
                receiver: receiver.clone(),
            })
            .collect()
    }

    fn name_of(&self, id: &str) -> String {
        self.participants
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn view(&self) -> RoomView {
        RoomView {
            code: self.code.clone(),
            status: self.status,
            participants: self.participants.iter().map(|p| p.name.clone()).collect(),
            assignments_exist: !self.assignment.is_empty(),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/room", post(create_room))
        .route("/room/:code", get(get_room))
        .route("/room/:code/join", post(join_room))
        .route("/room/:code/me", get(dashboard))
        .route(
            "/room/:code/predictions",
            get(get_predictions).put(put_predictions),
        )
        .route(
            "/room/:code/draw",
            get(get_draw).post(draw_random).put(draw_manual),
        )
        .route("/room/:code/lock", post(lock_room))
        .route("/room/:code/reveal", post(reveal_room))
        .route("/room/:code/results", get(results))
        .with_state(state)
}

#[derive(Deserialize, Default)]
struct CreateRoomRequest {
    admin_name: Option<String>,
}

#[derive(Deserialize)]
struct JoinRequest {
    name: String,
}

#[derive(Serialize)]
struct JoinResponse {
    code: String,
    participant_id: String,
    token: String,
}

#[derive(Serialize)]
struct RoomView {
    code: String,
    status: RoomStatus,
    participants: Vec<String>,
    assignments_exist: bool,
}

#[derive(Serialize)]
struct DashboardView {
    room: RoomView,
    participant: Participant,
    can_predict: bool,
    progress: Progress,
}

#[derive(Deserialize)]
struct Guess {
    receiver: ParticipantId,
    giver: ParticipantId,
}

#[derive(Deserialize)]
struct GuessesRequest {
    guesses: Vec<Guess>,
}

#[derive(Serialize)]
struct GuessesView {
    /// receiver -> giver
    guesses: BTreeMap<ParticipantId, ParticipantId>,
}

#[derive(Serialize)]
struct RejectedGuess {
    receiver: ParticipantId,
    giver: ParticipantId,
    error: String,
}

#[derive(Serialize)]
struct SaveGuessesResponse {
    progress: Progress,
    rejected: Vec<RejectedGuess>,
    /// Set when the room no longer takes guesses; nothing was saved.
    warning: Option<String>,
}

#[derive(Deserialize)]
struct DrawParams {
    seed: Option<u64>,
}

#[derive(Deserialize)]
struct ManualDrawRequest {
    /// receiver -> giver
    givers: HashMap<ParticipantId, ParticipantId>,
}

#[derive(Serialize)]
struct PairView {
    giver: ParticipantId,
    giver_name: String,
    receiver: ParticipantId,
    receiver_name: String,
}

#[derive(Serialize)]
struct DrawView {
    status: RoomStatus,
    pairs: Vec<PairView>,
}

#[derive(Serialize)]
struct StatusResponse {
    status: RoomStatus,
    warning: Option<String>,
}

impl From<Transition> for StatusResponse {
    fn from(transition: Transition) -> Self {
        Self {
            status: transition.status(),
            warning: match transition {
                Transition::Ignored(warning) => Some(warning.to_string()),
                Transition::Moved { .. } => None,
            },
        }
    }
}

#[derive(Serialize)]
struct ResultsView {
    #[serde(flatten)]
    leaderboard: Leaderboard,
    /// Only the organizer sees the real pairing.
    assignment: Option<Vec<PairView>>,
}

async fn create_room(
    State(state): State<AppState>,
    payload: Option<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<JoinResponse>), ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let name = payload
        .admin_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("Admin");

    let mut rooms = state.rooms.write().await;
    let code = code::room_code(&mut rand::thread_rng(), |c| rooms.contains_key(c));
    let mut room = RoomRecord::new(code.clone());
    let response = room.add_participant(name, true)?;
    rooms.insert(code.clone(), room);
    info!(room = %code, admin = name, "room created");

    Ok((StatusCode::CREATED, Json(response)))
}

async fn join_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(payload): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::NameRequired);
    }

    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&code::normalize(&code))
        .ok_or(ApiError::RoomNotFound)?;
    if !room.accepts_guests() {
        return Err(ApiError::JoinClosed(room.status));
    }
    let response = room.add_participant(name, false)?;
    info!(room = %room.code, name, participants = room.participants.len(), "participant joined");

    Ok(Json(response))
}

async fn get_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RoomView>, ApiError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&code::normalize(&code))
        .ok_or(ApiError::RoomNotFound)?;
    Ok(Json(room.view()))
}

async fn dashboard(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DashboardView>, ApiError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&code::normalize(&code))
        .ok_or(ApiError::RoomNotFound)?;
    let participant = room.caller(&headers)?;

    Ok(Json(DashboardView {
        room: room.view(),
        participant: participant.clone(),
        can_predict: santa_core::can_predict(room.status),
        progress: santa_core::progress(&room.predictions, &room.participants, &participant.id),
    }))
}

async fn get_predictions(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<GuessesView>, ApiError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&code::normalize(&code))
        .ok_or(ApiError::RoomNotFound)?;
    let participant = room.caller(&headers)?;

    Ok(Json(GuessesView {
        guesses: santa_core::for_user(&room.predictions, &participant.id),
    }))
}

async fn put_predictions(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<GuessesRequest>,
) -> Result<Json<SaveGuessesResponse>, ApiError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&code::normalize(&code))
        .ok_or(ApiError::RoomNotFound)?;
    let user = room.caller(&headers)?.id.clone();

    // Bad guesses are reported back; the rest are still saved.
    let mut rejected = Vec::new();
    let mut warning = None;
    for Guess { receiver, giver } in payload.guesses {
        let prediction = Prediction {
            user: user.clone(),
            predicted_giver: giver.clone(),
            predicted_receiver: receiver.clone(),
        };
        match santa_core::record(
            &mut room.predictions,
            room.status,
            &room.participants,
            prediction,
        ) {
            Ok(Recorded::Saved) => {}
            Ok(Recorded::Ignored(refusal)) => warning = Some(refusal.to_string()),
            Err(err) => rejected.push(RejectedGuess {
                receiver,
                giver,
                error: err.to_string(),
            }),
        }
    }
    // an empty batch still learns the room is closed
    if warning.is_none() {
        warning = santa_core::prediction_refusal(room.status).map(|w| w.to_string());
    }

    Ok(Json(SaveGuessesResponse {
        progress: santa_core::progress(&room.predictions, &room.participants, &user),
        rejected,
        warning,
    }))
}

async fn get_draw(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DrawView>, ApiError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&code::normalize(&code))
        .ok_or(ApiError::RoomNotFound)?;
    room.admin(&headers)?;

    Ok(Json(DrawView {
        status: room.status,
        pairs: room.pairs(),
    }))
}

async fn draw_random(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
    Query(params): Query<DrawParams>,
) -> Result<Json<DrawView>, ApiError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&code::normalize(&code))
        .ok_or(ApiError::RoomNotFound)?;
    room.admin(&headers)?;

    let mut rng = params
        .seed
        .map(ChaCha8Rng::seed_from_u64)
        .unwrap_or_else(ChaCha8Rng::from_entropy);
    santa_core::redraw(
        &mut room.assignment,
        &room.participants,
        &DrawMode::Random,
        &mut rng,
    )?;
    info!(room = %room.code, pairs = room.assignment.len(), "assignment drawn");

    Ok(Json(DrawView {
        status: room.status,
        pairs: room.pairs(),
    }))
}

async fn draw_manual(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<ManualDrawRequest>,
) -> Result<Json<DrawView>, ApiError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&code::normalize(&code))
        .ok_or(ApiError::RoomNotFound)?;
    room.admin(&headers)?;

    // Manual mode never consumes randomness.
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    santa_core::redraw(
        &mut room.assignment,
        &room.participants,
        &DrawMode::Manual(payload.givers),
        &mut rng,
    )?;
    info!(room = %room.code, pairs = room.assignment.len(), "manual assignment saved");

    // Saving a hand-made draw publishes it right away.
    if room.status != RoomStatus::Results {
        let transition = santa_core::reveal(room.status, true)?;
        room.apply(&transition);
    }

    Ok(Json(DrawView {
        status: room.status,
        pairs: room.pairs(),
    }))
}

async fn lock_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, ApiError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&code::normalize(&code))
        .ok_or(ApiError::RoomNotFound)?;
    room.admin(&headers)?;

    let transition = santa_core::lock(room.status);
    room.apply(&transition);
    Ok(Json(transition.into()))
}

async fn reveal_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, ApiError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&code::normalize(&code))
        .ok_or(ApiError::RoomNotFound)?;
    room.admin(&headers)?;

    let transition = santa_core::reveal(room.status, !room.assignment.is_empty())?;
    room.apply(&transition);
    Ok(Json(transition.into()))
}

async fn results(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ResultsView>, ApiError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&code::normalize(&code))
        .ok_or(ApiError::RoomNotFound)?;
    let participant = room.caller(&headers)?;
    if room.status != RoomStatus::Results {
        return Err(ApiError::ResultsHidden(room.status));
    }

    let leaderboard = santa_core::score(&room.participants, &room.assignment, &room.predictions);
    Ok(Json(ResultsView {
        leaderboard,
        assignment: participant.is_admin.then(|| room.pairs()),
    }))
}
