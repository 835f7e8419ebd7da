use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use santa_core::{GameError, RoomStatus};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("room not found")]
    RoomNotFound,
    #[error("participant token required")]
    MissingToken,
    #[error("invalid participant token")]
    InvalidToken,
    #[error("only the room organizer can do that")]
    NotAdmin,
    #[error("name required")]
    NameRequired,
    #[error("name taken")]
    NameTaken,
    #[error("room is closed to new participants ({0})")]
    JoinClosed(RoomStatus),
    #[error("results are hidden while the room is {0}")]
    ResultsHidden(RoomStatus),
    #[error(transparent)]
    Game(#[from] GameError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::RoomNotFound => StatusCode::NOT_FOUND,
            ApiError::MissingToken | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::NotAdmin => StatusCode::FORBIDDEN,
            ApiError::NameRequired => StatusCode::BAD_REQUEST,
            ApiError::NameTaken | ApiError::JoinClosed(_) | ApiError::ResultsHidden(_) => {
                StatusCode::CONFLICT
            }
            ApiError::Game(err) => match err {
                GameError::InvalidManualAssignment { .. } | GameError::UnknownParticipant(_) => {
                    StatusCode::BAD_REQUEST
                }
                GameError::InsufficientParticipants { .. }
                | GameError::UnsolvableAssignment { .. }
                | GameError::NoAssignmentYet => StatusCode::CONFLICT,
                GameError::DuplicateParticipant(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Game(GameError::InvalidManualAssignment {
                violation,
                participants,
            }) => json!({
                "error": self.to_string(),
                "violation": violation,
                "participants": participants,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(body)).into_response()
    }
}
