//! Router assembly: wires every handler, the request-logging layer, and
//! the two rate limiters into one axum `Router`.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::logging::request_logging;
use crate::rate_limit::{join_rate_limit, message_rate_limit};
use crate::routes::{health, inbox, join, message, outbox, wake};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let message_route = Router::new()
        .route("/swarm/message", post(message::receive_message))
        .route_layer(middleware::from_fn_with_state(state.clone(), message_rate_limit));

    let join_route = Router::new()
        .route("/swarm/join", post(join::join_swarm))
        .route_layer(middleware::from_fn_with_state(state.clone(), join_rate_limit));

    let inbox_routes = Router::new()
        .route("/api/inbox", get(inbox::list))
        .route("/api/inbox/count", get(inbox::count))
        .route("/api/inbox/batch", post(inbox::batch))
        .route("/api/inbox/:id", get(inbox::get_one))
        .route("/api/inbox/:id/read", post(inbox::mark_read))
        .route("/api/inbox/:id/archive", post(inbox::archive))
        .route("/api/inbox/:id/delete", post(inbox::delete));

    let outbox_routes = Router::new()
        .route("/api/outbox", get(outbox::list))
        .route("/api/outbox/count", get(outbox::count));

    Router::new()
        .route("/swarm/health", get(health::health))
        .route("/swarm/info", get(health::info))
        .route("/api/wake", post(wake::wake))
        .merge(message_route)
        .merge(join_route)
        .merge(inbox_routes)
        .merge(outbox_routes)
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}
