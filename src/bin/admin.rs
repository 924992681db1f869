//! Operator CLI for maintenance tasks that don't belong behind a Gemini
//! route: listing local communities, inspecting an actor, and toggling a
//! locked-followers flag without going through `/users/followers`.

use clap::{Parser, Subcommand};
use murmur::config::CommunityScope;
use murmur::models::Actor;
use murmur::AppConfig;

#[derive(Parser)]
#[command(name = "murmur-admin", about = "Operator maintenance commands for murmur")]
struct Cli {
    /// Path to the same config file `murmur` is run with.
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List local Group actors, the same set `/users/communities` shows.
    ListCommunities,
    /// Print an actor's stored record by canonical id.
    ShowActor { id: String },
    /// Set or clear `manually_approves_followers` on a local actor.
    SetLock { id: String, locked: bool },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = AppConfig::new_from_file_and_env(&cli.config).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });

    let db = cfg.connect_database().await.unwrap_or_else(|e| {
        eprintln!("error connecting to database: {e}");
        std::process::exit(1);
    });

    let result = match cli.command {
        Command::ListCommunities => list_communities(&db, &cfg).await,
        Command::ShowActor { id } => show_actor(&db, &id).await,
        Command::SetLock { id, locked } => set_lock(&db, &id, locked).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn list_communities(db: &sqlx::PgPool, cfg: &AppConfig) -> anyhow::Result<()> {
    let domain_scope = match cfg.community_scope {
        CommunityScope::Domain => Some(cfg.domain.as_str()),
        CommunityScope::SignedLocally => None,
    };
    let groups = Actor::list_local_groups(db, domain_scope).await?;
    if groups.is_empty() {
        println!("no local communities");
    }
    for group in groups {
        println!("{}\t{}", group.id, group.preferred_username);
    }
    Ok(())
}

async fn show_actor(db: &sqlx::PgPool, id: &str) -> anyhow::Result<()> {
    match Actor::find_by_id(db, id).await? {
        Some(actor) => {
            println!("id: {}", actor.id);
            println!("host: {}", actor.host);
            println!("type: {}", actor.r#type);
            println!("preferred_username: {}", actor.preferred_username);
            println!("local: {}", actor.is_local());
            println!("manually_approves_followers: {}", actor.manually_approves_followers);
            println!("moved_to: {}", actor.moved_to.as_deref().unwrap_or("-"));
            println!("also_known_as: {:?}", actor.also_known_as_urls());
        }
        None => anyhow::bail!("no actor with id {id}"),
    }
    Ok(())
}

async fn set_lock(db: &sqlx::PgPool, id: &str, locked: bool) -> anyhow::Result<()> {
    let actor = Actor::find_by_id(db, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no actor with id {id}"))?;
    if !actor.is_local() {
        anyhow::bail!("{id} is not a local actor");
    }
    let mut tx = db.begin().await?;
    Actor::set_manually_approves_followers(&mut tx, &actor.id, locked).await?;
    tx.commit().await?;
    println!("{id}: manually_approves_followers = {locked}");
    Ok(())
}
