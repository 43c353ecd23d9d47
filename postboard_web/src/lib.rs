//! HTTP front end for Postboard.
//!
//! Every page is a JSON document. Mutating endpoints answer with a redirect
//! to the page showing the result, and pages that need a logged-in user send
//! anonymous visitors to the login page with the original path in `next`.

use axum::{routing::get, Router};
use postboard_core::Postboard;
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;


use routes::*;
use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/group/:slug/", get(group_posts))
        .route("/follow/", get(follow_index))
        .route("/create/", get(post_create_form).post(post_create))
        .route("/profile/:username/", get(profile))
        .route("/profile/:username/follow/", get(profile_follow))
        .route("/profile/:username/unfollow/", get(profile_unfollow))
        .route("/posts/:post_id/", get(post_detail))
        .route("/posts/:post_id/edit/", get(post_edit_form).post(post_edit))
        .route(
            "/posts/:post_id/comment/",
            get(add_comment_form).post(add_comment),
        )
        .route("/auth/signup/", axum::routing::post(signup))
        .route("/auth/login/", get(login_form).post(login))
        .route("/auth/logout/", get(logout))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl+C or SIGTERM.
pub async fn serve(board: Postboard) -> std::io::Result<()> {
    let address = board.config.listen_address.clone();
    let app = router(AppState::new(board));

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal as unix_signal, SignalKind};

        match unix_signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
