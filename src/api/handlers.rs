use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, Sse},
};
use futures::Stream;
use std::convert::Infallible;

use crate::pipeline::run_query;
use crate::stream::{EventSink, sse_response};

use super::AppState;
use super::models::StreamParams;

pub async fn stream_handler(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let query = params.into_query(&state.config)?;

    let cancel = state.shutdown.child_token();
    let (sink, rx) = EventSink::channel(state.config.event_buffer, cancel.clone());
    let tool = state.tool.clone();
    tracing::info!(session = %query.session, prompt = %query.prompt, "stream opened");

    tokio::spawn(async move {
        run_query(&tool, &query, &sink).await;
    });

    Ok(sse_response(rx, cancel))
}

pub async fn modellist_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    let models = state.models.list_models().await.map_err(|e| {
        tracing::error!(error = %e, "failed to list models");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Error getting model list".to_string(),
        )
    })?;
    Ok(Json(models))
}

pub async fn health() -> &'static str {
    "ok"
}
