//! Mood recommender service: binary entrypoint.
//! Loads config and every model resource eagerly, then serves the Axum router.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    mood_recommender::init_tracing();

    let router = mood_recommender::app().await?;

    Ok(router.into())
}
