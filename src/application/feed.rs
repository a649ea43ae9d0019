//! Read side: paginated post listings (global, per group, per author) and post detail.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::pagination::{POSTS_PER_PAGE, Page, paginate};
use crate::application::repos::{GroupsRepo, PostListScope, PostsRepo, RepoError, UsersRepo};
use crate::domain::entities::{GroupRecord, PostView, UserRecord};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error("unknown post `{0}`")]
    UnknownPost(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct GroupListing {
    pub group: GroupRecord,
    pub page: Page<PostView>,
}

pub struct ProfileListing {
    pub author: UserRecord,
    pub page: Page<PostView>,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
        }
    }

    /// Every post, newest first.
    pub async fn index(&self, requested_page: u32) -> Result<Page<PostView>, FeedError> {
        self.page(PostListScope::All, requested_page).await
    }

    pub async fn group_listing(
        &self,
        slug: &str,
        requested_page: u32,
    ) -> Result<GroupListing, FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| FeedError::UnknownGroup(slug.to_string()))?;

        let page = self
            .page(PostListScope::Group(group.id), requested_page)
            .await?;

        Ok(GroupListing { group, page })
    }

    pub async fn profile_listing(
        &self,
        username: &str,
        requested_page: u32,
    ) -> Result<ProfileListing, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FeedError::UnknownAuthor(username.to_string()))?;

        let page = self
            .page(PostListScope::Author(author.id), requested_page)
            .await?;

        Ok(ProfileListing { author, page })
    }

    /// Resolve a post from its path segment; anything that is not a known id is not found.
    pub async fn post_detail(&self, raw_id: &str) -> Result<PostView, FeedError> {
        let id = parse_post_id(raw_id).ok_or_else(|| FeedError::UnknownPost(raw_id.to_string()))?;
        self.posts
            .find_post(id)
            .await?
            .ok_or_else(|| FeedError::UnknownPost(raw_id.to_string()))
    }

    async fn page(
        &self,
        scope: PostListScope,
        requested_page: u32,
    ) -> Result<Page<PostView>, FeedError> {
        let total = self.posts.count_posts(scope).await?;
        let window = paginate(total, requested_page, POSTS_PER_PAGE);

        let items = if total == 0 {
            Vec::new()
        } else {
            self.posts
                .list_posts(scope, window.offset, window.limit)
                .await?
        };

        debug!(
            target = "yatube::feed",
            scope = ?scope,
            page = window.number,
            total_pages = window.total_pages,
            items = items.len(),
            "resolved post page"
        );

        Ok(Page::new(items, window))
    }
}

/// Post ids are positive integers; anything else cannot name a post.
pub fn parse_post_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_ids_must_be_positive_integers() {
        assert_eq!(parse_post_id("7"), Some(7));
        assert_eq!(parse_post_id("0"), None);
        assert_eq!(parse_post_id("-1"), None);
        assert_eq!(parse_post_id("abc"), None);
        assert_eq!(parse_post_id("1.5"), None);
    }
}
