pub mod auth_api;
mod ballot_api;
pub mod db;
mod poll_api;
mod result_api;
pub mod user_api;

use std::convert::Infallible;
use std::sync::Arc;

use diesel::sqlite::SqliteConnection;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info};
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::{self, Reply, Response};
use warp::ws::{WebSocket, Ws};
use warp::{Filter, Rejection};

use crate::auth::{PasswordHasher, TokenCodec};
use crate::config::Config;
use crate::error::{self, ApiError, Message};
use crate::voting::User;
use db::DbPool;

const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Everything a request handler needs, built once in `main` and cloned into
/// each filter.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub tokens: Arc<TokenCodec>,
    pub passwords: PasswordHasher,
}

impl AppState {
    pub fn new(pool: DbPool, tokens: TokenCodec, passwords: PasswordHasher) -> Self {
        Self { pool, tokens: Arc::new(tokens), passwords }
    }

    /// Runs blocking diesel work on a pooled connection without stalling
    /// the async executor.
    pub async fn run<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let register = warp::path!("register")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(auth_api::register);

    let login = warp::path!("login")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(auth_api::login);

    let create_poll = warp::path!("create-poll")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(with_caller(state.clone()))
        .and(raw_body())
        .and_then(poll_api::create);

    let list_polls = warp::path!("polls")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_caller(state.clone()))
        .and_then(poll_api::list);

    let edit_poll = warp::path!("edit-poll" / i32)
        .and(warp::patch())
        .and(with_state(state.clone()))
        .and(with_caller(state.clone()))
        .and(raw_body())
        .and_then(poll_api::edit);

    let delete_poll = warp::path!("delete-poll" / i32)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(with_caller(state.clone()))
        .and_then(poll_api::delete);

    let vote = warp::path!("vote" / i32)
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(with_caller(state.clone()))
        .and(json_body())
        .and_then(ballot_api::cast);

    let results = warp::path!("poll-results" / i32)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_caller(state.clone()))
        .and_then(result_api::get_result);

    let users = warp::path!("admin" / "users")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_caller(state))
        .and_then(user_api::list);

    let socket = warp::path!("socket")
        .and(warp::ws())
        .map(|ws: Ws| ws.on_upgrade(socket_connected));

    register
        .or(login)
        .or(create_poll)
        .or(list_polls)
        .or(edit_poll)
        .or(delete_poll)
        .or(vote)
        .or(results)
        .or(users)
        .or(socket)
        .recover(handle_rejection)
}

pub async fn serve(state: AppState, config: &Config) -> Result<(), warp::Error> {
    let cors = warp::cors()
        .allow_origin(config.cors_origin.as_str())
        .allow_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
        .allow_headers(vec!["authorization", "content-type"])
        .allow_credentials(true);
    let api = routes(state).with(cors).with(warp::trace::request());

    let (addr, server) = warp::serve(api).try_bind_with_graceful_shutdown(([0, 0, 0, 0], config.port), async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for shutdown signal");
        }
        info!("shutting down");
    })?;
    info!(%addr, "listening");
    server.await;
    Ok(())
}

/// Turns a handler outcome into a JSON reply: `status` on success, the
/// error's own status otherwise.
pub fn respond<T: Serialize>(result: Result<T, ApiError>, status: StatusCode) -> Result<Response, Infallible> {
    Ok(match result {
        Ok(body) => reply::with_status(reply::json(&body), status).into_response(),
        Err(err) => err.into_response(),
    })
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Resolves the bearer token to the calling user, rejecting before any
/// handler runs.
fn with_caller(state: AppState) -> impl Filter<Extract = (User,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: AppState| async move {
            auth_api::authenticate(&state, header.as_deref())
                .await
                .map_err(warp::reject::custom)
        })
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// For handlers that must check the caller before looking at the body; pair
/// with `parse_body`.
fn raw_body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::bytes())
}

pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|err| error::invalid_body(&err.to_string()))
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(api_error) = err.find::<ApiError>() {
        return Ok(api_error.to_response());
    }
    if err.is_not_found() {
        return Ok(error::route_not_found().to_response());
    }
    if let Some(body_error) = err.find::<BodyDeserializeError>() {
        return Ok(error::invalid_body(&body_error.to_string()).to_response());
    }

    let (message, code) = if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ("Method not allowed", StatusCode::METHOD_NOT_ALLOWED)
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        ("Payload too large", StatusCode::PAYLOAD_TOO_LARGE)
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        ("Content-Length required", StatusCode::LENGTH_REQUIRED)
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        ("Expected a JSON body", StatusCode::UNSUPPORTED_MEDIA_TYPE)
    } else {
        error!(rejection = ?err, "unhandled rejection");
        ("Internal server error", StatusCode::INTERNAL_SERVER_ERROR)
    };
    Ok(reply::with_status(reply::json(&Message { msg: message }), code).into_response())
}

async fn socket_connected(mut socket: WebSocket) {
    info!("Client connected.");
    while let Some(frame) = socket.next().await {
        if let Err(err) = frame {
            debug!(error = %err, "socket closed with error");
            break;
        }
    }
    info!("Client disconnected.");
}
