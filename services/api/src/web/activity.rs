//! services/api/src/web/activity.rs
//!
//! The classmates activity socket: a WebSocket that re-reads the shared
//! lesson's approved submissions on a fixed interval and pushes each snapshot
//! to the viewer. The poll is read-only and is cancelled the moment the
//! viewer navigates away.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::web::{
    protocol::{ClassmateActivity, ServerMessage},
    state::AppState,
};
use drona_core::domain::Profile;
use drona_core::ports::PortResult;
use drona_core::workflow::{classmates_activity, CLASSMATES_FEED_LIMIT};

/// The handler for upgrading HTTP requests to the activity WebSocket.
pub async fn activity_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Path(lesson_id): Path<String>,
    Extension(profile): Extension<Profile>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, lesson_id, profile))
}

async fn handle_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    lesson_id: String,
    viewer: Profile,
) {
    info!(
        "Activity socket opened for lesson {} by {}",
        lesson_id, viewer.id
    );

    let (sender, mut receiver) = socket.split();
    let ws_sender = Arc::new(Mutex::new(sender));

    let cancellation_token = CancellationToken::new();
    let poll_task = tokio::spawn(activity_process(
        app_state,
        lesson_id.clone(),
        viewer.id.clone(),
        ws_sender,
        cancellation_token.clone(),
    ));

    // Drain the socket; a close frame or transport error tears the poll down.
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    cancellation_token.cancel();
    match poll_task.await {
        Ok(Err(e)) => error!("Activity poll ended with an error: {:?}", e),
        Err(e) => error!("Activity poll task panicked: {:?}", e),
        Ok(Ok(())) => {}
    }
    info!("Activity socket closed for lesson {}", lesson_id);
}

/// The polling loop behind one activity socket.
///
/// Re-reads the classmates feed every tick and pushes it as a frame. Designed
/// to be gracefully cancelled via a `CancellationToken`; a tick that completes
/// after the viewer has left is discarded, never an error.
pub async fn activity_process(
    app_state: Arc<AppState>,
    lesson_id: String,
    viewer_id: String,
    ws_sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    cancellation_token: CancellationToken,
) -> PortResult<()> {
    let period = Duration::from_secs(app_state.config.activity_poll_seconds);
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Activity poll cancelled.");
                return Ok(());
            }
            _ = interval.tick() => {}
        }

        let entries = classmates_activity(
            app_state.store.as_ref(),
            &lesson_id,
            &viewer_id,
            CLASSMATES_FEED_LIMIT,
        )
        .await?;

        let frame = ServerMessage::ActivityUpdate {
            entries: entries.iter().map(ClassmateActivity::from).collect(),
        };
        let frame_json = serde_json::to_string(&frame).unwrap();
        if ws_sender
            .lock()
            .await
            .send(Message::Text(frame_json.into()))
            .await
            .is_err()
        {
            // Viewer is gone; the socket handler cancels us shortly.
            return Ok(());
        }
    }
}
