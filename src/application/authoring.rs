//! Post authoring workflow shared by create and edit.
//!
//! Each request walks the same states: an edit is authorized first, the
//! submission is validated, and only a valid submission is committed. Every
//! call ends in either a form to (re)display or a redirect.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::info;

use crate::application::accounts::Identity;
use crate::application::feed::parse_post_id;
use crate::application::repos::{
    CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{GroupRecord, PostView};
use crate::domain::usernames::profile_path;

pub const REQUIRED_FIELD_MESSAGE: &str = "This field is required.";
pub const NULL_CHARACTER_MESSAGE: &str = "Null characters are not allowed.";
pub const INVALID_GROUP_MESSAGE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

#[derive(Debug, Error)]
pub enum AuthoringError {
    #[error("unknown post `{0}`")]
    UnknownPost(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Raw form input exactly as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostSubmission {
    pub text: String,
    pub group: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    pub text: Vec<String>,
    pub group: Vec<String>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.group.is_empty()
    }
}

/// Everything needed to render the post form.
#[derive(Debug, Clone)]
pub struct PostForm {
    pub text: String,
    pub group: Option<String>,
    pub groups: Vec<GroupRecord>,
    pub errors: FormErrors,
    /// Id of the post being edited; `None` for a new post.
    pub editing: Option<i64>,
}

impl PostForm {
    pub fn is_edit(&self) -> bool {
        self.editing.is_some()
    }

    pub fn is_selected(&self, group: &GroupRecord) -> bool {
        self.group.as_deref() == Some(group.id.to_string().as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectTarget {
    Profile(String),
    PostDetail(i64),
}

impl RedirectTarget {
    pub fn path(&self) -> String {
        match self {
            RedirectTarget::Profile(username) => profile_path(username),
            RedirectTarget::PostDetail(id) => format!("/posts/{id}/"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum AuthoringOutcome {
    ShowForm(PostForm),
    Redirect(RedirectTarget),
}

struct ValidPost {
    text: String,
    group_id: Option<i64>,
}

#[derive(Clone)]
pub struct AuthoringService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
}

impl AuthoringService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
    ) -> Self {
        Self {
            reader,
            writer,
            groups,
        }
    }

    pub async fn new_post_form(&self) -> Result<PostForm, AuthoringError> {
        Ok(PostForm {
            text: String::new(),
            group: None,
            groups: self.groups.list_groups().await?,
            errors: FormErrors::default(),
            editing: None,
        })
    }

    pub async fn create_post(
        &self,
        identity: &Identity,
        submission: PostSubmission,
    ) -> Result<AuthoringOutcome, AuthoringError> {
        let valid = match self.validate(&submission).await? {
            Ok(valid) => valid,
            Err(errors) => {
                return Ok(AuthoringOutcome::ShowForm(
                    self.form_with_errors(submission, errors, None).await?,
                ));
            }
        };

        let post = self
            .writer
            .create_post(CreatePostParams {
                author_id: identity.user_id,
                group_id: valid.group_id,
                text: valid.text,
            })
            .await?;

        counter!("yatube_posts_created_total").increment(1);
        info!(
            target = "yatube::authoring",
            post_id = post.id,
            author = %identity.username,
            group_id = ?post.group_id,
            "post created"
        );

        Ok(AuthoringOutcome::Redirect(RedirectTarget::Profile(
            identity.username.clone(),
        )))
    }

    /// The pre-filled form for the author, or a redirect to the post for anyone else.
    pub async fn edit_post_form(
        &self,
        identity: &Identity,
        raw_id: &str,
    ) -> Result<AuthoringOutcome, AuthoringError> {
        let post = self.load_post(raw_id).await?;
        if let Some(denied) = self.deny_unless_author(identity, &post) {
            return Ok(denied);
        }

        Ok(AuthoringOutcome::ShowForm(PostForm {
            text: post.text.clone(),
            group: post.group.as_ref().map(|group| group.id.to_string()),
            groups: self.groups.list_groups().await?,
            errors: FormErrors::default(),
            editing: Some(post.id),
        }))
    }

    pub async fn edit_post(
        &self,
        identity: &Identity,
        raw_id: &str,
        submission: PostSubmission,
    ) -> Result<AuthoringOutcome, AuthoringError> {
        let post = self.load_post(raw_id).await?;
        if let Some(denied) = self.deny_unless_author(identity, &post) {
            return Ok(denied);
        }

        let valid = match self.validate(&submission).await? {
            Ok(valid) => valid,
            Err(errors) => {
                return Ok(AuthoringOutcome::ShowForm(
                    self.form_with_errors(submission, errors, Some(post.id))
                        .await?,
                ));
            }
        };

        let updated = self
            .writer
            .update_post(UpdatePostParams {
                id: post.id,
                group_id: valid.group_id,
                text: valid.text,
            })
            .await?;

        counter!("yatube_posts_updated_total").increment(1);
        info!(
            target = "yatube::authoring",
            post_id = updated.id,
            author = %identity.username,
            group_id = ?updated.group_id,
            "post updated"
        );

        Ok(AuthoringOutcome::Redirect(RedirectTarget::PostDetail(
            updated.id,
        )))
    }

    async fn load_post(&self, raw_id: &str) -> Result<PostView, AuthoringError> {
        let id = parse_post_id(raw_id)
            .ok_or_else(|| AuthoringError::UnknownPost(raw_id.to_string()))?;
        self.reader
            .find_post(id)
            .await?
            .ok_or_else(|| AuthoringError::UnknownPost(raw_id.to_string()))
    }

    fn deny_unless_author(&self, identity: &Identity, post: &PostView) -> Option<AuthoringOutcome> {
        if post.is_authored_by(identity.user_id) {
            return None;
        }

        counter!("yatube_post_edits_denied_total").increment(1);
        info!(
            target = "yatube::authoring",
            post_id = post.id,
            requester = %identity.username,
            author = %post.author_username,
            "edit denied for non-author"
        );
        Some(AuthoringOutcome::Redirect(RedirectTarget::PostDetail(
            post.id,
        )))
    }

    /// Outer `Result` carries persistence failures, inner one the field errors.
    async fn validate(
        &self,
        submission: &PostSubmission,
    ) -> Result<Result<ValidPost, FormErrors>, AuthoringError> {
        let mut errors = FormErrors::default();

        let text = submission.text.trim();
        if text.is_empty() {
            errors.text.push(REQUIRED_FIELD_MESSAGE.to_string());
        } else if text.contains('\0') {
            // Postgres TEXT cannot store NUL.
            errors.text.push(NULL_CHARACTER_MESSAGE.to_string());
        }

        let group_id = match submission
            .group
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            None => None,
            Some(raw) => {
                let known = match raw.parse::<i64>() {
                    Ok(id) => self.groups.find_by_id(id).await?.map(|group| group.id),
                    Err(_) => None,
                };
                if known.is_none() {
                    errors.group.push(INVALID_GROUP_MESSAGE.to_string());
                }
                known
            }
        };

        if !errors.is_empty() {
            return Ok(Err(errors));
        }

        Ok(Ok(ValidPost {
            text: text.to_string(),
            group_id,
        }))
    }

    async fn form_with_errors(
        &self,
        submission: PostSubmission,
        errors: FormErrors,
        editing: Option<i64>,
    ) -> Result<PostForm, AuthoringError> {
        Ok(PostForm {
            text: submission.text,
            group: submission.group,
            groups: self.groups.list_groups().await?,
            errors,
            editing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_targets_map_to_paths() {
        assert_eq!(
            RedirectTarget::Profile("SnoopDog".to_string()).path(),
            "/profile/SnoopDog/"
        );
        assert_eq!(RedirectTarget::PostDetail(42).path(), "/posts/42/");
        assert_eq!(
            RedirectTarget::Profile("Лев".to_string()).path(),
            "/profile/%D0%9B%D0%B5%D0%B2/"
        );
    }

    #[test]
    fn form_selection_matches_group_id() {
        let group = GroupRecord {
            id: 3,
            title: "Cats".to_string(),
            slug: "cats".to_string(),
            description: String::new(),
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        };
        let form = PostForm {
            text: String::new(),
            group: Some("3".to_string()),
            groups: vec![group.clone()],
            errors: FormErrors::default(),
            editing: None,
        };
        assert!(form.is_selected(&group));
        assert!(!form.is_edit());
    }
}
