//! migration-runner — applies the SQLite schema and optionally seeds data.
//!
//! Run:
//! ```bash
//! # apply pending migrations
//! cargo run -p migration-runner
//!
//! # apply migrations, then load seeds/users.json and seeds/posts.json
//! cargo run -p migration-runner -- --seed
//! ```
//!
//! Environment: DB_PATH (default ./data/app.db), SEEDS_DIR (default ./seeds).

use std::path::PathBuf;

use domain::{Post, User};
use serde::Deserialize;
use sqlite_adapter::SqliteStore;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Deserialize)]
struct UserSeed {
    id: String,
    firstname: String,
    lastname: String,
    email: String,
    street: String,
    city: String,
    state: String,
    zipcode: String,
    #[serde(rename = "createdAt")]
    created_at: String,
}

#[derive(Deserialize)]
struct PostSeed {
    id: String,
    #[serde(rename = "userId")]
    user_id: String,
    title: String,
    body: String,
    #[serde(rename = "createdAt")]
    created_at: String,
}

fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stdout))
        .init();

    if let Err(e) = run() {
        eprintln!("migration-runner failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let db_path = std::env::var("DB_PATH").unwrap_or_else(|_| "./data/app.db".into());
    let seed = std::env::args().any(|a| a == "--seed");

    // Opening the store applies any pending migrations.
    let store = SqliteStore::new(&db_path)?;
    info!(path = %db_path, "migrations applied");

    if seed {
        let seeds_dir = PathBuf::from(std::env::var("SEEDS_DIR").unwrap_or_else(|_| "./seeds".into()));
        seed_store(&store, &seeds_dir)?;
    }

    Ok(())
}

fn seed_store(store: &SqliteStore, seeds_dir: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let users = load_users(&seeds_dir.join("users.json"))?;
    let inserted = store.seed_users(&users)?;
    info!(count = inserted, "users seeded");

    let posts = load_posts(&seeds_dir.join("posts.json"))?;
    let inserted = store.seed_posts(&posts)?;
    info!(count = inserted, "posts seeded");

    Ok(())
}

fn load_users(path: &std::path::Path) -> Result<Vec<User>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let seeds: Vec<UserSeed> = serde_json::from_str(&raw)?;
    seeds
        .into_iter()
        .map(|s| {
            Ok(User {
                id: s.id,
                firstname: s.firstname,
                lastname: s.lastname,
                email: s.email,
                street: s.street,
                city: s.city,
                state: s.state,
                zipcode: s.zipcode,
                created_at: http_common::parse_rfc3339(&s.created_at)?,
            })
        })
        .collect()
}

fn load_posts(path: &std::path::Path) -> Result<Vec<Post>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let seeds: Vec<PostSeed> = serde_json::from_str(&raw)?;
    seeds
        .into_iter()
        .map(|s| {
            Ok(Post {
                id: s.id,
                user_id: s.user_id,
                title: s.title,
                body: s.body,
                created_at: http_common::parse_rfc3339(&s.created_at)?,
            })
        })
        .collect()
}
