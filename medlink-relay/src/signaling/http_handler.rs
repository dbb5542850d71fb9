use crate::registry::StoreError;
use crate::signaling::{RelayApiError, RelayService};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use medlink_core::{
    AnswerRequest, HeartbeatRequest, IceCandidateRequest, LeaveRequest, MessagesResponse,
    OfferRequest, PeerId, PeersResponse, RegisterRequest, Signal, StatusResponse,
};
use tokio::net::TcpListener;
use tracing::{debug, info};

type ApiResult<T> = Result<Json<T>, RelayApiError>;

pub fn router(service: RelayService) -> Router {
    Router::new()
        .route("/webrtc/register", post(register))
        .route("/webrtc/offer", post(offer))
        .route("/webrtc/answer", post(answer))
        .route("/webrtc/ice-candidate", post(ice_candidate))
        .route("/webrtc/messages/{peer_id}", get(messages))
        .route("/webrtc/heartbeat", post(heartbeat))
        .route("/webrtc/leave", post(leave))
        .route("/webrtc/peers", get(peers))
        .with_state(service)
}

/// Serves the relay API on `listener` until the task is dropped.
pub async fn serve(listener: TcpListener, service: RelayService) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Relay listening on {}", addr);
    }
    axum::serve(listener, router(service)).await
}

async fn register(
    State(service): State<RelayService>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<StatusResponse> {
    let Json(req) = body?;
    service
        .store()
        .register(req.peer_id.clone(), req.peer_type, req.room)?;

    Ok(Json(StatusResponse {
        status: "registered".to_owned(),
        peer_id: Some(req.peer_id),
    }))
}

async fn offer(
    State(service): State<RelayService>,
    body: Result<Json<OfferRequest>, JsonRejection>,
) -> ApiResult<StatusResponse> {
    let Json(req) = body?;
    service
        .store()
        .deliver(&req.peer_id, &req.target_id, Signal::Offer(req.offer))?;
    Ok(Json(StatusResponse::new("offer_sent")))
}

async fn answer(
    State(service): State<RelayService>,
    body: Result<Json<AnswerRequest>, JsonRejection>,
) -> ApiResult<StatusResponse> {
    let Json(req) = body?;
    service
        .store()
        .deliver(&req.peer_id, &req.target_id, Signal::Answer(req.answer))?;
    Ok(Json(StatusResponse::new("answer_sent")))
}

async fn ice_candidate(
    State(service): State<RelayService>,
    body: Result<Json<IceCandidateRequest>, JsonRejection>,
) -> ApiResult<StatusResponse> {
    let Json(req) = body?;
    service.store().deliver(
        &req.peer_id,
        &req.target_id,
        Signal::IceCandidate(req.candidate),
    )?;
    Ok(Json(StatusResponse::new("ice_candidate_sent")))
}

async fn messages(
    State(service): State<RelayService>,
    Path(peer_id): Path<String>,
) -> ApiResult<MessagesResponse> {
    let peer_id = PeerId::from(peer_id);
    if peer_id.is_empty() {
        return Err(StoreError::MissingField.into());
    }

    let messages = service.store().drain(&peer_id);
    if !messages.is_empty() {
        debug!("Delivering {} message(s) to {}", messages.len(), peer_id);
    }
    Ok(Json(MessagesResponse { messages }))
}

async fn heartbeat(
    State(service): State<RelayService>,
    body: Result<Json<HeartbeatRequest>, JsonRejection>,
) -> ApiResult<StatusResponse> {
    let Json(req) = body?;
    service.store().heartbeat(&req.peer_id)?;
    Ok(Json(StatusResponse::new("heartbeat_received")))
}

async fn leave(
    State(service): State<RelayService>,
    body: Result<Json<LeaveRequest>, JsonRejection>,
) -> ApiResult<StatusResponse> {
    let Json(req) = body?;
    if req.peer_id.is_empty() {
        return Err(StoreError::MissingField.into());
    }
    service.store().leave(&req.peer_id);
    Ok(Json(StatusResponse::new("left")))
}

async fn peers(State(service): State<RelayService>) -> Json<PeersResponse> {
    let store = service.store();
    store.sweep(service.config().peer_ttl);
    Json(PeersResponse {
        peers: store.peers(),
    })
}
