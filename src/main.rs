use axum::{
    extract::Query,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

mod extract;
mod fetch;
mod models;
mod rules;

use models::{FieldValue, PreviewQuery};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let app = Router::new()
        .route("/health", get(health))
        .route("/preview", get(preview));

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8000);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await.unwrap();
    tracing::info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.unwrap();
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn preview(Query(params): Query<PreviewQuery>) -> Response {
    let url = match params.url {
        Some(url) => url,
        None => {
            return with_cors(
                (StatusCode::BAD_REQUEST, "missing url query parameter").into_response(),
            )
        }
    };

    let html = match fetch::fetch_html(&url).await {
        Ok(html) => html,
        Err(e) => {
            return with_cors((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response())
        }
    };

    match extract::parse(&url, &html) {
        Ok(mut metadata) => {
            if let Some(text) = params.text {
                metadata.insert("snippet", FieldValue::Text(text));
            }
            with_cors((StatusCode::OK, Json(metadata)).into_response())
        }
        Err(e) => with_cors((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()),
    }
}

fn with_cors(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}
