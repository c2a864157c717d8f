//! Interaction endpoints.
//!
//! # Usage
//!
//! ```ignore
//! let app = Router::new().merge(interaction_router(InteractionHttpState { controller }));
//! ```
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /interaction/{uid}` | [`interaction_entry`] |
//! | `POST /interaction/{uid}/login` | [`interaction_login`] |
//! | `POST /interaction/{uid}/confirm` | [`interaction_confirm`] |
//! | `GET /interaction/{uid}/abort` | [`interaction_abort`] |
//!
//! Every response carries `Cache-Control: no-cache, no-store` and
//! `Pragma: no-cache`.

use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;

use super::templates::{render_consent, render_login};
use crate::error::InteractionResult;
use crate::interaction::{EntryView, Finalization, InteractionController, LoginSubmission};

/// Shared state of the interaction routes.
#[derive(Clone)]
pub struct InteractionHttpState {
    pub controller: Arc<InteractionController>,
}

/// Login form body.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Builds the interaction routes.
pub fn interaction_router(state: InteractionHttpState) -> Router {
    Router::new()
        .route("/interaction/{uid}", get(interaction_entry))
        .route("/interaction/{uid}/login", post(interaction_login))
        .route("/interaction/{uid}/confirm", post(interaction_confirm))
        .route("/interaction/{uid}/abort", get(interaction_abort))
        .layer(middleware::from_fn(no_cache))
        .with_state(state)
}

/// Disables caching of every interaction response, errors included.
async fn no_cache(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store"),
    );
    response
}

fn redirect(finalization: Finalization) -> Response {
    Redirect::to(&finalization.redirect_to).into_response()
}

/// GET /interaction/{uid}
///
/// Renders the login form or the consent page for the pending prompt.
pub async fn interaction_entry(
    State(state): State<InteractionHttpState>,
    Path(uid): Path<String>,
) -> InteractionResult<Response> {
    let page = match state.controller.entry(&uid).await? {
        EntryView::Login(view) => render_login(&view),
        EntryView::Consent(view) => render_consent(&view),
    };
    Ok((StatusCode::OK, Html(page)).into_response())
}

/// POST /interaction/{uid}/login
///
/// Redirects on success; re-renders the form with a flash on bad
/// credentials.
pub async fn interaction_login(
    State(state): State<InteractionHttpState>,
    Path(uid): Path<String>,
    Form(form): Form<LoginForm>,
) -> InteractionResult<Response> {
    match state
        .controller
        .submit_login(&uid, &form.email, &form.password)
        .await?
    {
        LoginSubmission::Finished(finalization) => Ok(redirect(finalization)),
        LoginSubmission::Rejected(view) => {
            Ok((StatusCode::OK, Html(render_login(&view))).into_response())
        }
    }
}

/// POST /interaction/{uid}/confirm
pub async fn interaction_confirm(
    State(state): State<InteractionHttpState>,
    Path(uid): Path<String>,
) -> InteractionResult<Response> {
    let finalization = state.controller.submit_consent(&uid).await?;
    Ok(redirect(finalization))
}

/// GET /interaction/{uid}/abort
pub async fn interaction_abort(
    State(state): State<InteractionHttpState>,
    Path(uid): Path<String>,
) -> InteractionResult<Response> {
    let finalization = state.controller.abort(&uid).await?;
    Ok(redirect(finalization))
}
