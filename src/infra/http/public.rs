use std::sync::Arc;

use axum::{
    Extension, Form, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use crate::{
    application::{
        accounts::{AccountService, Identity},
        authoring::{AuthoringError, AuthoringOutcome, AuthoringService, PostForm, PostSubmission},
        error::repo_error_to_http,
        feed::{FeedError, FeedService},
        pagination::parse_page_number,
        repos::HealthRepo,
    },
    config::AuthSettings,
    presentation::views::{
        GroupPageView, GroupTemplate, IndexPageView, IndexTemplate, LayoutChrome, LayoutContext,
        PostDetailTemplate, PostDetailView, PostFormTemplate, PostFormView, ProfilePageView,
        ProfileTemplate, render_not_found_response, render_template_response,
    },
};

use super::{
    auth::{CurrentUser, require_identity, resolve_identity},
    db_health_response, found,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub authoring: Arc<AuthoringService>,
    pub accounts: Arc<AccountService>,
    pub health: Arc<dyn HealthRepo>,
    pub auth: Arc<AuthSettings>,
}

pub fn build_router(state: HttpState) -> Router {
    let authoring_routes = Router::new()
        .route("/create/", get(create_form).post(create_submit))
        .route("/posts/{id}/edit/", get(edit_form).post(edit_submit))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ));

    Router::new()
        .route("/", get(index))
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{id}/", get(post_detail))
        .route("/_health/db", get(db_health))
        .merge(authoring_routes)
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_identity,
        ))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn number(&self) -> u32 {
        parse_page_number(self.page.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostFormInput {
    text: String,
    group: Option<String>,
}

impl From<PostFormInput> for PostSubmission {
    fn from(input: PostFormInput) -> Self {
        Self {
            text: input.text,
            group: input.group,
        }
    }
}

fn chrome(state: &HttpState, viewer: &CurrentUser) -> LayoutChrome {
    LayoutChrome::new(viewer.identity(), &state.auth.login_url)
}

async fn index(
    State(state): State<HttpState>,
    Extension(viewer): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.index(query.number()).await {
        Ok(page) => {
            let view = LayoutContext::new(chrome(&state, &viewer), IndexPageView::from(&page));
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_response(&state, &viewer, "infra::http::public::index", err),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.group_listing(&slug, query.number()).await {
        Ok(listing) => {
            let view = LayoutContext::new(chrome(&state, &viewer), GroupPageView::from(&listing));
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => {
            feed_error_response(&state, &viewer, "infra::http::public::group_posts", err)
        }
    }
}

async fn profile(
    State(state): State<HttpState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.profile_listing(&username, query.number()).await {
        Ok(listing) => {
            let view =
                LayoutContext::new(chrome(&state, &viewer), ProfilePageView::from(&listing));
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_response(&state, &viewer, "infra::http::public::profile", err),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Response {
    match state.feed.post_detail(&id).await {
        Ok(post) => {
            let content = PostDetailView::new(&post, viewer.identity());
            let view = LayoutContext::new(chrome(&state, &viewer), content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Err(err) => {
            feed_error_response(&state, &viewer, "infra::http::public::post_detail", err)
        }
    }
}

async fn create_form(
    State(state): State<HttpState>,
    Extension(viewer): Extension<CurrentUser>,
) -> Response {
    match state.authoring.new_post_form().await {
        Ok(form) => render_post_form(&state, &viewer, form),
        Err(err) => {
            authoring_error_response(&state, &viewer, "infra::http::public::create_form", err)
        }
    }
}

async fn create_submit(
    State(state): State<HttpState>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(identity): Extension<Identity>,
    Form(input): Form<PostFormInput>,
) -> Response {
    let outcome = state.authoring.create_post(&identity, input.into()).await;
    authoring_outcome_response(&state, &viewer, "infra::http::public::create_submit", outcome)
}

async fn edit_form(
    State(state): State<HttpState>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Response {
    let outcome = state.authoring.edit_post_form(&identity, &id).await;
    authoring_outcome_response(&state, &viewer, "infra::http::public::edit_form", outcome)
}

async fn edit_submit(
    State(state): State<HttpState>,
    Extension(viewer): Extension<CurrentUser>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Form(input): Form<PostFormInput>,
) -> Response {
    let outcome = state.authoring.edit_post(&identity, &id, input.into()).await;
    authoring_outcome_response(&state, &viewer, "infra::http::public::edit_submit", outcome)
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn fallback(
    State(state): State<HttpState>,
    Extension(viewer): Extension<CurrentUser>,
) -> Response {
    render_not_found_response(chrome(&state, &viewer))
}

fn render_post_form(state: &HttpState, viewer: &CurrentUser, form: PostForm) -> Response {
    let view = LayoutContext::new(chrome(state, viewer), PostFormView::from(form));
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

fn authoring_outcome_response(
    state: &HttpState,
    viewer: &CurrentUser,
    source: &'static str,
    outcome: Result<AuthoringOutcome, AuthoringError>,
) -> Response {
    match outcome {
        Ok(AuthoringOutcome::ShowForm(form)) => render_post_form(state, viewer, form),
        Ok(AuthoringOutcome::Redirect(target)) => found(target.path()),
        Err(err) => authoring_error_response(state, viewer, source, err),
    }
}

fn feed_error_response(
    state: &HttpState,
    viewer: &CurrentUser,
    source: &'static str,
    err: FeedError,
) -> Response {
    match err {
        FeedError::UnknownGroup(_) | FeedError::UnknownAuthor(_) | FeedError::UnknownPost(_) => {
            render_not_found_response(chrome(state, viewer))
        }
        FeedError::Repo(repo) => repo_error_to_http(source, &repo).into_response(),
    }
}

fn authoring_error_response(
    state: &HttpState,
    viewer: &CurrentUser,
    source: &'static str,
    err: AuthoringError,
) -> Response {
    match err {
        AuthoringError::UnknownPost(_) => render_not_found_response(chrome(state, viewer)),
        AuthoringError::Repo(repo) => repo_error_to_http(source, &repo).into_response(),
    }
}
