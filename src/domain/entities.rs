//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Number of characters of a post's text used as its short headline.
pub const POST_HEADLINE_CHARS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub created_at: OffsetDateTime,
}

/// A post as stored: the author and group are plain references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub text: String,
    pub author_id: Uuid,
    pub group_id: Option<i64>,
    pub created_at: OffsetDateTime,
}

/// Group fields needed wherever a post is displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRef {
    pub id: i64,
    pub slug: String,
    pub title: String,
}

/// A post joined with its author's username and its group, as listings need it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub id: i64,
    pub text: String,
    pub author_id: Uuid,
    pub author_username: String,
    pub group: Option<GroupRef>,
    pub created_at: OffsetDateTime,
}

impl PostView {
    /// Leading characters of the text, used as the post's title.
    pub fn headline(&self) -> String {
        headline(&self.text)
    }

    pub fn is_authored_by(&self, user_id: Uuid) -> bool {
        self.author_id == user_id
    }
}

pub fn headline(text: &str) -> String {
    text.chars().take(POST_HEADLINE_CHARS).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prefix: String,
    #[serde(skip)]
    pub hashed_secret: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub last_used_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headline_counts_characters_not_bytes() {
        assert_eq!(headline("Тестовый текст поста"), "Тестовый текст ");
        assert_eq!(headline("short"), "short");
    }
}
