//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo; every connection is served on its own task.
//! A single dispatcher routes by `(method, path)`.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::db::store::{FieldStore, HistoryStore, IdentityStore};
use crate::routes::{self, BoxBody};
use crate::services::{
    CredentialService, DashboardService, FieldService, PredictionClient, RelayService,
};
use crate::types::{GatewayError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub jwt: Arc<JwtValidator>,
    pub credentials: CredentialService,
    pub relay: RelayService,
    pub dashboard: DashboardService,
    pub fields: FieldService,
    /// "mongodb" or "memory"
    pub storage_backend: &'static str,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the services to one store and one prediction client
    pub fn new<S>(
        args: Args,
        store: Arc<S>,
        prediction: Arc<dyn PredictionClient>,
        storage_backend: &'static str,
    ) -> Result<Self>
    where
        S: IdentityStore + FieldStore + HistoryStore + 'static,
    {
        let secret = args
            .jwt_secret()
            .ok_or_else(|| GatewayError::Config("JWT_SECRET is required in production mode".into()))?;
        let jwt = Arc::new(JwtValidator::new(&secret, args.jwt_expiry_seconds)?);

        let identities: Arc<dyn IdentityStore> = store.clone();
        let fields: Arc<dyn FieldStore> = store.clone();
        let history: Arc<dyn HistoryStore> = store;

        Ok(Self {
            credentials: CredentialService::new(identities.clone(), jwt.clone()),
            relay: RelayService::new(prediction, history.clone()),
            dashboard: DashboardService::new(identities, fields.clone(), history),
            fields: FieldService::new(fields),
            jwt,
            args,
            storage_backend,
            started_at: Instant::now(),
        })
    }
}

/// Bind the configured address and serve forever
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("AgroSense listening on {}", state.args.listen);
    if state.args.dev_mode {
        warn!("Development mode enabled - do not use in production");
    }

    serve(listener, state).await
}

/// Accept loop over an already-bound listener
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Strip the `/api` prefix the browser client uses
fn route_path(path: &str) -> &str {
    match path.strip_prefix("/api") {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("request", id = %request_id);

    async move {
        let method = req.method().clone();
        let raw_path = req.uri().path().to_string();
        let path = route_path(&raw_path);

        info!("[{}] {} {}", addr, method, raw_path);

        let response = dispatch(state, req, method.clone(), path).await;

        debug!("{} {} -> {}", method, raw_path, response.status());
        Ok(response)
    }
    .instrument(span)
    .await
}

async fn dispatch(
    state: Arc<AppState>,
    req: Request<Incoming>,
    method: Method,
    path: &str,
) -> Response<BoxBody> {
    if path.starts_with("/auth") {
        return match routes::handle_auth_request(req, state, path).await {
            Some(response) => response,
            None => routes::not_found_response(path),
        };
    }

    if path == "/fields" || path.starts_with("/fields/") {
        if method == Method::OPTIONS {
            return routes::cors_preflight();
        }
        return match routes::handle_fields_request(req, state, path).await {
            Some(response) => response,
            None => routes::not_found_response(path),
        };
    }

    match (method, path) {
        (Method::GET, "/") => routes::banner(),
        (Method::GET, "/health") => routes::health_check(state),
        (Method::GET, "/version") => routes::version_info(),

        (Method::POST, "/crop/scan") => routes::handle_scan(req, state).await,
        (Method::POST, "/yield/predict") => routes::handle_predict_yield(req, state).await,
        (Method::GET, "/dashboard/overview") => routes::handle_overview(req, state).await,

        // CORS preflight
        (Method::OPTIONS, _) => routes::cors_preflight(),

        _ => routes::not_found_response(path),
    }
}
