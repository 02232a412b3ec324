use std::net::SocketAddr;

use anyhow::Context;
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::catalog::{CATALOG, MetricDef};
use crate::cli::ServeArgs;
use crate::error::MetricError;
use crate::service::MetricService;

#[derive(Clone)]
struct AppState {
    svc: MetricService,
}

pub async fn run(opts: ServeArgs) -> anyhow::Result<()> {
    let cfg = opts.db.to_config();
    let svc = tokio::task::spawn_blocking(move || MetricService::open(&cfg))
        .await?
        .with_context(|| format!("open database {}", opts.db.database))?;

    let app = router(svc);

    let addr: SocketAddr = format!("{}:{}", opts.host, opts.port)
        .parse()
        .context("parse host:port")?;

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// One GET route per catalog metric, plus `/api/v1/metrics`.
pub fn router(svc: MetricService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app: Router<AppState> = Router::new().route("/api/v1/metrics", get(api_metrics));
    for def in CATALOG {
        app = app.route(
            def.route,
            get(
                move |State(st): State<AppState>, AxumPath(args): AxumPath<Vec<String>>| {
                    api_metric(st, def, args)
                },
            ),
        );
    }

    app.layer(cors).with_state(AppState { svc })
}

async fn api_metrics() -> impl IntoResponse {
    Json(CATALOG)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

async fn api_metric(st: AppState, def: &'static MetricDef, args: Vec<String>) -> Response {
    let svc = st.svc.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        svc.run_def(def, &args)
    })
    .await;

    match joined {
        Ok(Ok(result)) => Json(result).into_response(),
        Ok(Err(e)) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::warn!("{} failed: {}", def.name, e);
            }
            (status, Json(ErrorBody { error: e.to_string() })).into_response()
        }
        Err(e) => {
            tracing::warn!("{} task failed: {}", def.name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody { error: e.to_string() }),
            )
                .into_response()
        }
    }
}

fn status_for(err: &MetricError) -> StatusCode {
    match err {
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        MetricError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
