use axum::{Json, Router, routing::post};
use log::info;
use serde::Deserialize;

use crate::data::{GenerateOptions, GenerationResult, TimetableInput};
use crate::engine;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(flatten)]
    input: TimetableInput,
    #[serde(default)]
    options: GenerateOptions,
}

async fn generate_handler(Json(request): Json<GenerateRequest>) -> Json<GenerationResult> {
    let result = engine::generate(&request.input, &request.options, &mut |done, total, message| {
        info!("attempt {done}/{total}: {message}");
    });
    Json(result)
}

pub async fn run_server() {
    let app = Router::new().route("/v1/timetable/generate", post(generate_handler));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080")
        .await
        .unwrap();

    println!("Server running at http://{}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
