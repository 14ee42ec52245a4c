use anyhow::Context;
use backend_api::{run_server, AppState, IdentityProvider, InMemoryIdentity, JsonFileRepository};
use models::Role;
use std::{env, path::PathBuf, sync::Arc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings_path = env::var("SETTINGS_PATH").ok().map(PathBuf::from);
    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);

    let settings = settings_loader::load_settings_with_fallback(settings_path.as_ref())?
        .unwrap_or_default();

    println!("Assistant Analytics API Server");
    println!("==============================");
    match &settings.database_path {
        Some(p) => println!("Database: {}", p.display()),
        None => println!("Database: in-memory (set database_path in settings.json to persist)"),
    }
    match settings.reference_period {
        Some(p) => println!("Reference period: {}", p),
        None => println!("Reference period: current month"),
    }
    println!("Listening on: {}:{}", host, port);
    println!();

    let storage = match &settings.database_path {
        Some(path) => JsonFileRepository::open(path)
            .await
            .with_context(|| format!("opening database {}", path.display()))?,
        None => JsonFileRepository::in_memory(),
    };

    let identity = InMemoryIdentity::new();
    match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
        (Ok(email), Ok(password)) => {
            let admin = identity
                .sign_up(&email, &password, Some("Administrator"))
                .await
                .context("seeding administrator")?;
            identity.assign_role(&admin, Role::Admin).await?;
        }
        _ => {
            eprintln!("[WARN] ADMIN_EMAIL / ADMIN_PASSWORD not set; no one can sign in as admin");
        }
    }

    let state = AppState {
        storage: Arc::new(storage),
        identity: Arc::new(identity),
        settings: Arc::new(settings),
    };

    run_server(state, &host, port).await?;

    Ok(())
}
