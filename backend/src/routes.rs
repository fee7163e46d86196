use axum::{
    http::Method,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{handlers, middleware, state::AppState};

pub fn router(state: AppState) -> Router {
    // No auth
    let public_routes = Router::new()
        .route("/api/token", post(handlers::token))
        .route("/api/refresh", post(handlers::refresh))
        .route("/api/hits", get(handlers::hits))
        .route(
            "/invite/{id}",
            get(handlers::accept_invite).post(handlers::signup),
        )
        .route("/api/health/alive", get(handlers::alive))
        .route("/api/health/ready", get(handlers::ready));

    // Claims attached when a valid token is present
    let chat_routes = Router::new()
        .route("/api/chat/{id}/room", get(handlers::get_room))
        .route("/api/chat/{id}/messages", get(handlers::room_messages))
        .route("/api/chat/{id}/connect", get(handlers::connect))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::implicit_user,
        ));

    let user_routes = Router::new()
        .route("/api/revoke", post(handlers::revoke))
        .route("/api/invite/create", post(handlers::create_invite))
        .route("/api/invites", get(handlers::list_invites))
        .route("/api/invite/{id}", delete(handlers::delete_invite))
        .route("/api/chat/room", post(handlers::create_room))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::guard,
        ));

    let admin_routes = Router::new()
        .route("/api/logs", get(handlers::list_logs))
        .route_layer(axum_middleware::from_fn(middleware::admin_only))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::guard,
        ));

    Router::new()
        .merge(public_routes)
        .merge(chat_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_log,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([
                            Method::GET,
                            Method::POST,
                            Method::DELETE,
                            Method::OPTIONS,
                        ])
                        .allow_headers(Any)
                        .max_age(std::time::Duration::from_secs(24 * 60 * 60)),
                ),
        )
        .with_state(state)
}
