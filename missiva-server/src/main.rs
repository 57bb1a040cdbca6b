use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

// ri-utilizziamo le funzioni e strutture definite in lib.rs
use missiva_server::{
    build_sqlite_url, connect_pool,
    config::{Cli, Command},
    logging::init_logging,
    routes, run_migrations, AppState, UserDirectory,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format).context("init logging")?;

    // Costruisci l'URL del database SQLite
    let db_url = build_sqlite_url(&cli.database_url).context("build sqlite DATABASE_URL")?;
    info!(%db_url, "using database");
    let pool = connect_pool(&db_url).await.context("connect to sqlite")?;
    run_migrations(&pool).await.context("run migrations")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::AddUser { username, name, image } => {
            let name = name.unwrap_or_else(|| username.clone());
            let (user, token) = UserDirectory::new(pool)
                .create_user(&username, &name, image.as_deref())
                .await?;
            println!("{}\t{}", user.user_id, token);
            Ok(())
        }
        Command::Serve => {
            // Crea lo stato dell'applicazione condiviso
            let state = Arc::new(AppState::new(pool));
            let app = routes::router(state);

            let listener = tokio::net::TcpListener::bind(cli.bind)
                .await
                .context("bind tcp listener")?;
            info!("listening on http://{}", cli.bind);
            axum::serve(listener, app.into_make_service())
                .await
                .context("server shutdown")?;
            Ok(())
        }
    }
}
