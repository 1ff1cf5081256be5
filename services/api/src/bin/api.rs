//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{spawn_mirror, JsonStore, MirrorPolicy, NullSink, OpenAiGraderAdapter},
    config::Config,
    error::ApiError,
    web::{
        activity_ws_handler,
        auth::{session_handler, signin_handler, signout_handler, signup_handler},
        middleware::require_session,
        rest::{
            add_note_handler, batch_students_handler, classmates_handler, create_batch_handler,
            delete_note_handler, get_batch_handler, join_batch_handler, list_batches_handler,
            list_lessons_handler, list_notes_handler, my_submission_handler,
            reset_submission_handler, upload_submission_handler, upsert_lesson_handler, ApiDoc,
        },
        state::AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use drona_core::ports::ChangeSink;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            config.log_level.to_string(),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Set Up the Mirror Sink ---
    // Mirroring is best-effort by configuration: without a MIRROR_DATABASE_URL
    // every change sink call is a no-op and the local store stands alone.
    let sink: Arc<dyn ChangeSink> = match &config.mirror_database_url {
        Some(url) => {
            info!("Connecting to mirror database...");
            let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            let (handle, _worker) = spawn_mirror(
                pool,
                MirrorPolicy {
                    retry_attempts: config.mirror_retry_attempts,
                    queue_capacity: config.mirror_queue_capacity,
                },
            );
            Arc::new(handle)
        }
        None => {
            info!("MIRROR_DATABASE_URL not set; remote mirroring is disabled.");
            Arc::new(NullSink)
        }
    };

    // --- 3. Open the Local Store ---
    let store = Arc::new(JsonStore::new(config.data_dir.clone(), sink));
    store.init().await?;
    info!("Local store ready at {:?}.", config.data_dir);

    // --- 4. Initialize the Grading Adapter ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);
    let grader = Arc::new(OpenAiGraderAdapter::new(
        openai_client,
        config.grader_model.clone(),
    ));

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store,
        grader,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/signin", post(signin_handler))
        .route("/auth/signout", post(signout_handler))
        .route("/auth/session", get(session_handler));

    // Protected routes (session required)
    let protected_routes = Router::new()
        .route(
            "/batches",
            post(create_batch_handler).get(list_batches_handler),
        )
        .route("/batches/{code}", get(get_batch_handler))
        .route("/batches/{code}/students", get(batch_students_handler))
        .route(
            "/batches/{code}/lessons",
            put(upsert_lesson_handler).get(list_lessons_handler),
        )
        .route("/enrollments", post(join_batch_handler))
        .route(
            "/lessons/{lesson_id}/submission",
            post(upload_submission_handler)
                .get(my_submission_handler)
                .delete(reset_submission_handler),
        )
        .route("/lessons/{lesson_id}/classmates", get(classmates_handler))
        .route(
            "/lessons/{lesson_id}/notes",
            get(list_notes_handler).post(add_note_handler),
        )
        .route(
            "/lessons/{lesson_id}/notes/{note_id}",
            delete(delete_note_handler),
        )
        .route("/lessons/{lesson_id}/activity/ws", get(activity_ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_session,
        ));

    // Combine API routes. Homework photos travel as data URIs, so the body
    // limit is generous.
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
