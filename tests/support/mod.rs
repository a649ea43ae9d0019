#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use yatube::application::accounts::AccountService;
use yatube::application::authoring::AuthoringService;
use yatube::application::feed::FeedService;
use yatube::application::groups::GroupAdminService;
use yatube::application::repos::{
    CreateGroupParams, CreatePostParams, CreateSessionTokenParams, GroupsRepo, GroupsWriteRepo,
    HealthRepo, PostListScope, PostsRepo, PostsWriteRepo, RepoError, SessionTokensRepo,
    UpdatePostParams, UsersRepo, UsersWriteRepo,
};
use yatube::config::AuthSettings;
use yatube::domain::entities::{
    GroupRecord, GroupRef, PostRecord, PostView, SessionTokenRecord, UserRecord,
};
use yatube::infra::http::{HttpState, build_router};

#[derive(Default)]
struct Tables {
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<PostRecord>,
    tokens: Vec<SessionTokenRecord>,
    ticks: i64,
}

impl Tables {
    /// Strictly increasing timestamps keep "newest first" unambiguous.
    fn now(&mut self) -> OffsetDateTime {
        self.ticks += 1;
        OffsetDateTime::UNIX_EPOCH + Duration::days(19_000) + Duration::seconds(self.ticks)
    }

    fn view(&self, post: &PostRecord) -> PostView {
        let author_username = self
            .users
            .iter()
            .find(|user| user.id == post.author_id)
            .map(|user| user.username.clone())
            .unwrap_or_default();
        let group = post.group_id.and_then(|id| {
            self.groups
                .iter()
                .find(|group| group.id == id)
                .map(|group| GroupRef {
                    id: group.id,
                    slug: group.slug.clone(),
                    title: group.title.clone(),
                })
        });
        PostView {
            id: post.id,
            text: post.text.clone(),
            author_id: post.author_id,
            author_username,
            group,
            created_at: post.created_at,
        }
    }

    fn in_scope(post: &PostRecord, scope: PostListScope) -> bool {
        match scope {
            PostListScope::All => true,
            PostListScope::Group(id) => post.group_id == Some(id),
            PostListScope::Author(id) => post.author_id == id,
        }
    }
}

/// In-memory stand-in for Postgres implementing every repository trait.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    healthy: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            healthy: AtomicBool::new(true),
        }
    }
}

impl MemoryStore {
    /// An unhealthy store fails pings and session token lookups.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub async fn add_user(&self, username: &str) -> UserRecord {
        self.create_user(username).await.expect("create user")
    }

    pub async fn add_group(&self, title: &str, slug: &str) -> GroupRecord {
        self.create_group(CreateGroupParams {
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("About {title}"),
        })
        .await
        .expect("create group")
    }

    pub async fn add_post(
        &self,
        author: &UserRecord,
        group: Option<&GroupRecord>,
        text: &str,
    ) -> PostRecord {
        self.create_post(CreatePostParams {
            author_id: author.id,
            group_id: group.map(|group| group.id),
            text: text.to_string(),
        })
        .await
        .expect("create post")
    }

    pub async fn posts(&self) -> Vec<PostRecord> {
        self.tables.lock().await.posts.clone()
    }

    pub async fn post(&self, id: i64) -> Option<PostRecord> {
        self.tables
            .lock()
            .await
            .posts
            .iter()
            .find(|post| post.id == id)
            .cloned()
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(
        &self,
        scope: PostListScope,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<PostView>, RepoError> {
        let tables = self.tables.lock().await;
        let mut posts: Vec<&PostRecord> = tables
            .posts
            .iter()
            .filter(|post| Tables::in_scope(post, scope))
            .collect();
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(posts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|post| tables.view(post))
            .collect())
    }

    async fn count_posts(&self, scope: PostListScope) -> Result<u64, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .posts
            .iter()
            .filter(|post| Tables::in_scope(post, scope))
            .count() as u64)
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostView>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| tables.view(post)))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.iter().any(|user| user.id == params.author_id) {
            return Err(RepoError::InvalidInput {
                message: "unknown author".to_string(),
            });
        }
        let created_at = tables.now();
        let record = PostRecord {
            id: tables.posts.len() as i64 + 1,
            text: params.text,
            author_id: params.author_id,
            group_id: params.group_id,
            created_at,
        };
        tables.posts.push(record.clone());
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let post = tables
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        Ok(post.clone())
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.tables.lock().await.groups.clone();
        groups.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        Ok(groups)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.groups.iter().find(|group| group.slug == slug).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.groups.iter().find(|group| group.id == id).cloned())
    }
}

#[async_trait]
impl GroupsWriteRepo for MemoryStore {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let created_at = tables.now();
        let id = tables.groups.iter().map(|group| group.id).max().unwrap_or(0) + 1;
        let record = GroupRecord {
            id,
            title: params.title,
            slug: params.slug,
            description: params.description,
            created_at,
        };
        tables.groups.push(record.clone());
        Ok(record)
    }

    async fn delete_group(&self, id: i64) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.groups.len();
        tables.groups.retain(|group| group.id != id);
        if tables.groups.len() == before {
            return Err(RepoError::NotFound);
        }
        // Mirrors ON DELETE SET NULL.
        for post in tables.posts.iter_mut() {
            if post.group_id == Some(id) {
                post.group_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|user| user.id == id).cloned())
    }
}

#[async_trait]
impl UsersWriteRepo for MemoryStore {
    async fn create_user(&self, username: &str) -> Result<UserRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|user| user.username == username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let created_at = tables.now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            created_at,
        };
        tables.users.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl SessionTokensRepo for MemoryStore {
    async fn create_token(
        &self,
        params: CreateSessionTokenParams,
    ) -> Result<SessionTokenRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let created_at = tables.now();
        let record = SessionTokenRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            created_at,
            last_used_at: None,
            revoked_at: None,
        };
        tables.tokens.push(record.clone());
        Ok(record)
    }

    async fn find_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<SessionTokenRecord>, RepoError> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        let tables = self.tables.lock().await;
        Ok(tables
            .tokens
            .iter()
            .find(|token| token.prefix == prefix)
            .cloned())
    }

    async fn update_last_used(&self, id: Uuid, when: OffsetDateTime) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        if let Some(token) = tables.tokens.iter_mut().find(|token| token.id == id) {
            token.last_used_at = Some(when);
        }
        Ok(())
    }

    async fn revoke_for_user(
        &self,
        user_id: Uuid,
        when: OffsetDateTime,
    ) -> Result<u64, RepoError> {
        let mut tables = self.tables.lock().await;
        let mut revoked = 0;
        for token in tables
            .tokens
            .iter_mut()
            .filter(|token| token.user_id == user_id && token.revoked_at.is_none())
        {
            token.revoked_at = Some(when);
            revoked += 1;
        }
        Ok(revoked)
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepoError::Timeout)
        }
    }
}

pub struct Services {
    pub feed: FeedService,
    pub authoring: AuthoringService,
    pub accounts: AccountService,
    pub groups: GroupAdminService,
}

impl Services {
    pub fn new(store: &Arc<MemoryStore>) -> Self {
        Self {
            feed: FeedService::new(store.clone(), store.clone(), store.clone()),
            authoring: AuthoringService::new(store.clone(), store.clone(), store.clone()),
            accounts: AccountService::new(store.clone(), store.clone(), store.clone()),
            groups: GroupAdminService::new(store.clone(), store.clone()),
        }
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub services: Services,
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    /// Number of post cards rendered on a listing page.
    pub fn post_cards(&self) -> usize {
        self.body.matches("class=\"post-card\"").count()
    }

    /// Byte offset of `needle`, for asserting relative order on a page.
    pub fn position(&self, needle: &str) -> usize {
        self.body
            .find(needle)
            .unwrap_or_else(|| panic!("`{needle}` not found in body"))
    }
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let services = Services::new(&store);
        let state = HttpState {
            feed: Arc::new(services.feed.clone()),
            authoring: Arc::new(services.authoring.clone()),
            accounts: Arc::new(services.accounts.clone()),
            health: store.clone(),
            auth: Arc::new(AuthSettings::default()),
        };
        Self {
            store,
            services,
            router: build_router(state),
        }
    }

    /// Register a user and return them with a valid session token.
    pub async fn sign_up(&self, username: &str) -> (UserRecord, String) {
        let issued = self
            .services
            .accounts
            .register(username)
            .await
            .expect("register user");
        (issued.user, issued.token)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post_form(&self, uri: &str, token: Option<&str>, body: &str) -> TestResponse {
        self.send(Method::POST, uri, token, Some(body.to_string()))
            .await
    }

    pub async fn raw(&self, request: Request<Body>) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        form: Option<String>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("yatube_session={token}"));
        }
        let body = match form {
            Some(form) => {
                builder = builder.header(
                    header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                );
                Body::from(form)
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("request should build");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}
