use crate::application::accounts::Identity;
use crate::application::authoring::PostForm;
use crate::application::error::{ErrorReport, HttpError};
use crate::application::feed::{GroupListing, ProfileListing};
use crate::application::pagination::Page;
use crate::domain::entities::PostView;
use crate::domain::usernames::profile_path;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day] [month repr:short] [year], [hour]:[minute]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let view = LayoutContext::new(chrome, ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct ViewerLink {
    pub username: String,
    pub href: String,
}

/// Site-wide bits every page shows: who is signed in and where to sign in.
#[derive(Clone)]
pub struct LayoutChrome {
    pub viewer: Option<ViewerLink>,
    pub login_url: String,
}

impl LayoutChrome {
    pub fn new(viewer: Option<&Identity>, login_url: &str) -> Self {
        Self {
            viewer: viewer.map(|identity| ViewerLink {
                username: identity.username.clone(),
                href: profile_path(&identity.username),
            }),
            login_url: login_url.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub chrome: LayoutChrome,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self { chrome, content }
    }
}

#[derive(Clone)]
pub struct GroupBadge {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub headline: String,
    pub text: String,
    pub author_username: String,
    pub author_href: String,
    pub detail_href: String,
    pub group: Option<GroupBadge>,
    pub published: String,
}

impl From<&PostView> for PostCard {
    fn from(post: &PostView) -> Self {
        Self {
            id: post.id,
            headline: post.headline(),
            text: post.text.clone(),
            author_username: post.author_username.clone(),
            author_href: profile_path(&post.author_username),
            detail_href: format!("/posts/{}/", post.id),
            group: post.group.as_ref().map(|group| GroupBadge {
                title: group.title.clone(),
                href: format!("/group/{}/", group.slug),
            }),
            published: format_timestamp(post.created_at),
        }
    }
}

#[derive(Clone)]
pub struct PaginatorView {
    pub number: u32,
    pub total_pages: u32,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub first_href: String,
    pub last_href: String,
}

impl PaginatorView {
    pub fn new<T>(page: &Page<T>, base_path: &str) -> Self {
        let href = |number: u32| format!("{base_path}?page={number}");
        Self {
            number: page.number(),
            total_pages: page.total_pages(),
            previous_href: page.has_previous().then(|| href(page.previous_number())),
            next_href: page.has_next().then(|| href(page.next_number())),
            first_href: href(1),
            last_href: href(page.total_pages()),
        }
    }

    pub fn is_paginated(&self) -> bool {
        self.total_pages > 1
    }
}

#[derive(Clone)]
pub struct PostListView {
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl PostListView {
    pub fn new(page: &Page<PostView>, base_path: &str) -> Self {
        Self {
            posts: page.items.iter().map(PostCard::from).collect(),
            paginator: PaginatorView::new(page, base_path),
        }
    }
}

pub struct IndexPageView {
    pub listing: PostListView,
}

impl From<&Page<PostView>> for IndexPageView {
    fn from(page: &Page<PostView>) -> Self {
        Self {
            listing: PostListView::new(page, "/"),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexPageView>,
}

pub struct GroupPageView {
    pub title: String,
    pub description: String,
    pub listing: PostListView,
}

impl From<&GroupListing> for GroupPageView {
    fn from(listing: &GroupListing) -> Self {
        let base_path = format!("/group/{}/", listing.group.slug);
        Self {
            title: listing.group.title.clone(),
            description: listing.group.description.clone(),
            listing: PostListView::new(&listing.page, &base_path),
        }
    }
}

#[derive(Template)]
#[template(path = "group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupPageView>,
}

pub struct ProfilePageView {
    pub username: String,
    pub total_posts: u64,
    pub listing: PostListView,
}

impl From<&ProfileListing> for ProfilePageView {
    fn from(listing: &ProfileListing) -> Self {
        let base_path = profile_path(&listing.author.username);
        Self {
            username: listing.author.username.clone(),
            total_posts: listing.page.total_items(),
            listing: PostListView::new(&listing.page, &base_path),
        }
    }
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfilePageView>,
}

pub struct PostDetailView {
    pub post: PostCard,
    pub edit_href: Option<String>,
}

impl PostDetailView {
    pub fn new(post: &PostView, viewer: Option<&Identity>) -> Self {
        let can_edit = viewer.is_some_and(|identity| post.is_authored_by(identity.user_id));
        Self {
            post: PostCard::from(post),
            edit_href: can_edit.then(|| format!("/posts/{}/edit/", post.id)),
        }
    }
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

pub struct GroupChoice {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormView {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupChoice>,
    pub text_errors: Vec<String>,
    pub group_errors: Vec<String>,
}

impl From<PostForm> for PostFormView {
    fn from(form: PostForm) -> Self {
        let action = match form.editing {
            Some(id) => format!("/posts/{id}/edit/"),
            None => "/create/".to_string(),
        };
        let groups = form
            .groups
            .iter()
            .map(|group| GroupChoice {
                id: group.id,
                title: group.title.clone(),
                selected: form.is_selected(group),
            })
            .collect();

        Self {
            is_edit: form.is_edit(),
            action,
            groups,
            text: form.text,
            text_errors: form.errors.text,
            group_errors: form.errors.group,
        }
    }
}

#[derive(Template)]
#[template(path = "create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

pub struct ErrorPageView {
    pub status_code: u16,
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            status_code: StatusCode::NOT_FOUND.as_u16(),
            title: "Page not found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .format(DATE_FORMAT)
        .unwrap_or_else(|_| value.unix_timestamp().to_string())
}
