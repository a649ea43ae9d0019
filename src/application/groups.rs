//! Operator-side group management. Groups are created and removed out of band,
//! never through the public site.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupsRepo, GroupsWriteRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug_async, validate_slug};

pub const MAX_GROUP_TITLE_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum GroupAdminError {
    #[error("group title must not be empty")]
    EmptyTitle,
    #[error("group title is longer than {MAX_GROUP_TITLE_LEN} characters")]
    TitleTooLong,
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error("a group with slug `{0}` already exists")]
    SlugTaken(String),
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    /// Explicit slug; derived from the title when absent.
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct GroupAdminService {
    reader: Arc<dyn GroupsRepo>,
    writer: Arc<dyn GroupsWriteRepo>,
}

impl GroupAdminService {
    pub fn new(reader: Arc<dyn GroupsRepo>, writer: Arc<dyn GroupsWriteRepo>) -> Self {
        Self { reader, writer }
    }

    pub async fn create_group(
        &self,
        command: CreateGroupCommand,
    ) -> Result<GroupRecord, GroupAdminError> {
        let title = command.title.trim().to_string();
        if title.is_empty() {
            return Err(GroupAdminError::EmptyTitle);
        }
        if title.chars().count() > MAX_GROUP_TITLE_LEN {
            return Err(GroupAdminError::TitleTooLong);
        }

        let slug = match command.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => {
                validate_slug(slug)?;
                if self.reader.find_by_slug(slug).await?.is_some() {
                    return Err(GroupAdminError::SlugTaken(slug.to_string()));
                }
                slug.to_string()
            }
            _ => self.derive_unique_slug(&title).await?,
        };

        let group = match self
            .writer
            .create_group(CreateGroupParams {
                title,
                slug: slug.clone(),
                description: command.description.trim().to_string(),
            })
            .await
        {
            Ok(group) => group,
            Err(RepoError::Duplicate { .. }) => return Err(GroupAdminError::SlugTaken(slug)),
            Err(err) => return Err(err.into()),
        };

        info!(
            target = "yatube::groups",
            group_id = group.id,
            slug = %group.slug,
            "group created"
        );
        Ok(group)
    }

    /// Delete a group by slug. Its posts stay, detached from any group.
    pub async fn delete_group(&self, slug: &str) -> Result<GroupRecord, GroupAdminError> {
        let group = self
            .reader
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| GroupAdminError::UnknownGroup(slug.to_string()))?;

        self.writer.delete_group(group.id).await?;

        info!(
            target = "yatube::groups",
            group_id = group.id,
            slug = %group.slug,
            "group deleted"
        );
        Ok(group)
    }

    pub async fn list_groups(&self) -> Result<Vec<GroupRecord>, GroupAdminError> {
        Ok(self.reader.list_groups().await?)
    }

    async fn derive_unique_slug(&self, title: &str) -> Result<String, GroupAdminError> {
        let reader = self.reader.clone();
        let result = generate_unique_slug_async(title, move |candidate| {
            let reader = reader.clone();
            let candidate = candidate.to_string();
            async move {
                reader
                    .find_by_slug(&candidate)
                    .await
                    .map(|existing| existing.is_none())
            }
        })
        .await;

        match result {
            Ok(slug) => Ok(slug),
            Err(SlugAsyncError::Slug(err)) => Err(err.into()),
            Err(SlugAsyncError::Predicate(err)) => Err(err.into()),
        }
    }
}
