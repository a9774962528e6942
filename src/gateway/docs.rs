//! Embedded API documentation: `/openapi.json` and a Swagger UI page.
//!
//! Served outside the gated `/api` tree.

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Assets;

pub fn router() -> Router {
    Router::new()
        .route("/openapi.json", get(handle_openapi))
        .route("/swagger", get(handle_swagger_root))
        .route("/swagger/", get(handle_swagger_root))
        .route("/swagger/{*path}", get(handle_swagger_asset))
}

async fn handle_openapi() -> Response {
    serve_asset("openapi.json")
}

async fn handle_swagger_root() -> Redirect {
    Redirect::permanent("/swagger/index.html")
}

async fn handle_swagger_asset(Path(path): Path<String>) -> Response {
    serve_asset(&format!("swagger/{path}"))
}

fn serve_asset(path: &str) -> Response {
    match Assets::get(path) {
        Some(file) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                file.data.into_owned(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}
