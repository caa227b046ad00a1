use std::num::NonZeroU32;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ rejection::JsonRejection, Request, State },
    middleware::{ self, Next },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use governor::{ DefaultDirectRateLimiter, Quota, RateLimiter };
use tower::ServiceBuilder;
use tower_http::cors::{ Any, CorsLayer };
use log::{ error, warn };

use crate::config::widget::WidgetConfig;
use crate::models::api::{ ChatReply, ChatRequest, ErrorBody, InitThreadResponse };
use crate::relay::{ MessageRelay, RelayError };
use crate::relay::provider::ThreadProvider;

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<ThreadProvider>,
    pub relay: Arc<MessageRelay>,
    pub widget: Arc<WidgetConfig>,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl AppState {
    pub fn new(
        provider: Arc<ThreadProvider>,
        relay: Arc<MessageRelay>,
        widget: Arc<WidgetConfig>,
        requests_per_second: u32
    ) -> Self {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            provider,
            relay,
            widget,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/init-thread", get(init_thread_handler).fallback(method_not_allowed))
        .route("/api/chat", post(chat_handler).fallback(method_not_allowed))
        .route("/api/widget-config", get(widget_config_handler))
        .route("/health", get(|| async { "ok" }))
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        )
        .with_state(state)
}

async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if state.limiter.check().is_err() {
        warn!("Global rate limit exceeded for {} {}", req.method(), req.uri().path());
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody { error: "Too many requests".into() }),
        ).into_response();
    }
    next.run(req).await
}

async fn method_not_allowed() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, Json(ErrorBody { error: "Method not allowed".into() }))
}

fn apology(state: &AppState, code: StatusCode) -> Response {
    (code, Json(ErrorBody { error: state.widget.error_message.clone() })).into_response()
}

async fn init_thread_handler(State(state): State<AppState>) -> Response {
    match state.provider.start_conversation().await {
        Ok(thread_id) => Json(InitThreadResponse { thread_id }).into_response(),
        // logged by the provider
        Err(_) => apology(&state, StatusCode::INTERNAL_SERVER_ERROR),
    }
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            warn!("Rejected chat request body: {}", rejection.body_text());
            return apology(&state, StatusCode::BAD_REQUEST);
        }
    };
    let thread_id = req.thread_id.as_deref().unwrap_or_default();

    match state.relay.relay(thread_id, &req.message).await {
        Ok(reply) => Json(ChatReply { reply }).into_response(),
        Err(e) => {
            error!("Assistant API error: {}", e);
            let code = match e {
                RelayError::MissingConversation | RelayError::EmptyMessage => {
                    StatusCode::BAD_REQUEST
                }
                RelayError::RunInFlight(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            apology(&state, code)
        }
    }
}

async fn widget_config_handler(State(state): State<AppState>) -> Json<WidgetConfig> {
    Json((*state.widget).clone())
}
