use axum::{extract::State, Json};
use tracing::info;
use uuid::Uuid;

use crate::{
    api::types::{ChatReply, ChatRequest, RootResponse},
    app::AppState,
    auth::AuthenticatedUser,
};

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        ok: true,
        msg: "Jarvis backend running successfully",
    })
}

pub async fn chat(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Json<ChatReply> {
    let request_id = Uuid::new_v4();
    info!(%request_id, user_id = %user.id, chars = req.message.len(), "incoming chat message");

    let reply = state.generator.generate_reply(&req.message).await;

    info!(%request_id, chars = reply.len(), "sending chat reply");
    Json(ChatReply { reply })
}
