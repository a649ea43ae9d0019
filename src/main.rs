use std::{future::IntoFuture, process, sync::Arc};

use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        accounts::AccountService,
        authoring::AuthoringService,
        error::AppError,
        feed::FeedService,
        groups::{CreateGroupCommand, GroupAdminService},
        repos::{
            GroupsRepo, GroupsWriteRepo, HealthRepo, PostsRepo, PostsWriteRepo,
            SessionTokensRepo, UsersRepo, UsersWriteRepo,
        },
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Users(args) => run_users(settings, args.command).await,
        config::Command::Groups(args) => run_groups(settings, args.command).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_http_state(repositories, &settings);
    serve_http(&settings, state).await
}

async fn run_users(
    settings: config::Settings,
    command: config::UsersCommand,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let accounts = build_account_service(&repositories);

    match command {
        config::UsersCommand::Create(arg) => {
            let issued = accounts.register(&arg.username).await?;
            println!("created user {}", issued.user.username);
            println!("session token: {}", issued.token);
        }
        config::UsersCommand::IssueToken(arg) => {
            let issued = accounts.issue_token(&arg.username).await?;
            println!("session token: {}", issued.token);
        }
        config::UsersCommand::RevokeTokens(arg) => {
            let revoked = accounts.revoke_tokens(&arg.username).await?;
            println!("revoked {revoked} token(s) of {}", arg.username);
        }
    }
    Ok(())
}

async fn run_groups(
    settings: config::Settings,
    command: config::GroupsCommand,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let reader: Arc<dyn GroupsRepo> = repositories.clone();
    let writer: Arc<dyn GroupsWriteRepo> = repositories;
    let groups = GroupAdminService::new(reader, writer);

    match command {
        config::GroupsCommand::Create(args) => {
            let group = groups
                .create_group(CreateGroupCommand {
                    title: args.title,
                    slug: args.slug,
                    description: args.description,
                })
                .await?;
            println!("created group {} (/group/{}/)", group.title, group.slug);
        }
        config::GroupsCommand::Delete(args) => {
            let group = groups.delete_group(&args.slug).await?;
            println!("deleted group {}", group.slug);
        }
        config::GroupsCommand::List => {
            for group in groups.list_groups().await? {
                println!("{}\t{}", group.slug, group.title);
            }
        }
    }
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or(InfraError::MissingDatabaseUrl)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database("connection", err))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database("migration", err))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_account_service(repositories: &Arc<PostgresRepositories>) -> AccountService {
    let users: Arc<dyn UsersRepo> = repositories.clone();
    let users_write: Arc<dyn UsersWriteRepo> = repositories.clone();
    let tokens: Arc<dyn SessionTokensRepo> = repositories.clone();
    AccountService::new(users, users_write, tokens)
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> HttpState {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let health: Arc<dyn HealthRepo> = repositories.clone();

    let feed = Arc::new(FeedService::new(
        posts_repo.clone(),
        groups_repo.clone(),
        users_repo,
    ));
    let authoring = Arc::new(AuthoringService::new(
        posts_repo,
        posts_write_repo,
        groups_repo,
    ));
    let accounts = Arc::new(build_account_service(&repositories));

    HttpState {
        feed,
        authoring,
        accounts,
        health,
        auth: Arc::new(settings.auth.clone()),
    }
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|source| InfraError::Bind {
            addr: settings.server.addr,
            source,
        })?;
    info!(
        target = "yatube::server",
        addr = %settings.server.addr,
        "listening"
    );

    let stopping = Arc::new(Notify::new());
    let signal = {
        let stopping = stopping.clone();
        async move {
            shutdown_signal().await;
            info!(target = "yatube::server", "shutdown requested");
            stopping.notify_one();
        }
    };

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(signal)
        .into_future();
    let grace = settings.server.graceful_shutdown;
    let deadline = async move {
        stopping.notified().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = deadline => {
            warn!(
                target = "yatube::server",
                timeout_secs = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "yatube::server", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(target = "yatube::server", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
