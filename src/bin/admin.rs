//! CLI administration tool for request-guard.
//!
//! Works directly against the shared counter store, so revocations and
//! counter resets take effect on every running instance at once.
//!
//! # Usage
//!
//! ```bash
//! # Revoke a credential (raw token or credential id)
//! cargo run --bin admin -- token revoke eyJhbGciOi...
//!
//! # Check whether a credential is revoked
//! cargo run --bin admin -- token status 7f1c...
//!
//! # Mint a development token
//! cargo run --bin admin -- token mint --sub 42
//!
//! # Show / reset the current rate-limit window for a caller
//! cargo run --bin admin -- rate usage user:42
//! cargo run --bin admin -- rate reset ip:203.0.113.9
//!
//! # Check store connectivity
//! cargo run --bin admin -- store check
//! ```
//!
//! # Environment Variables
//!
//! - `JWT_SECRET` (required): signing secret shared with the server
//! - `REDIS_URL` (required for anything but `token mint`): shared store

use request_guard::application::services::RateLimiter;
use request_guard::application::services::auth_service::{credential_id, revocation_key};
use request_guard::config::{self, Config};
use request_guard::domain::identity::Claims;
use request_guard::infrastructure::store::{CounterStore, RedisStore};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::sync::Arc;

/// Revocations of bare credential ids (no expiry known) live this long.
const DEFAULT_REVOCATION_TTL: u64 = 7 * 24 * 60 * 60;

/// CLI tool for managing request-guard.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Manage bearer credentials
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Inspect and reset rate-limit counters
    Rate {
        #[command(subcommand)]
        action: RateAction,
    },

    /// Shared store operations
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

/// Credential subcommands.
#[derive(Subcommand)]
enum TokenAction {
    /// Revoke a credential
    Revoke {
        /// Raw token or credential id (jti / SHA-256 fingerprint)
        token_or_id: String,

        /// Revocation lifetime in seconds (defaults to the token's remaining lifetime)
        #[arg(long)]
        ttl: Option<u64>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Lift a revocation
    Restore {
        /// Raw token or credential id
        token_or_id: String,
    },

    /// Show whether a credential is revoked
    Status {
        /// Raw token or credential id
        token_or_id: String,
    },

    /// Sign a development access token
    Mint {
        /// Subject (user id)
        #[arg(short, long)]
        sub: String,

        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl: u64,

        /// Include a random `jti` claim
        #[arg(long)]
        jti: bool,
    },
}

/// Rate-limit subcommands.
#[derive(Subcommand)]
enum RateAction {
    /// Show the request count in the current window
    Usage {
        /// Limiter identity, e.g. `user:42` or `ip:203.0.113.9`
        identity: String,
    },

    /// Clear the current window's counter
    Reset {
        /// Limiter identity
        identity: String,
    },
}

/// Store subcommands.
#[derive(Subcommand)]
enum StoreAction {
    /// Check store connection
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = config::load_from_env().context("Failed to load configuration")?;

    if let Commands::Token {
        action: TokenAction::Mint { sub, ttl, jti },
    } = &cli.command
    {
        return mint_token(&config, sub, *ttl, *jti);
    }

    let store = connect(&config).await?;

    match cli.command {
        Commands::Token { action } => handle_token_action(action, &config, store).await?,
        Commands::Rate { action } => handle_rate_action(action, &config, store).await?,
        Commands::Store { action } => handle_store_action(action, store).await?,
    }

    Ok(())
}

async fn connect(config: &Config) -> Result<Arc<dyn CounterStore>> {
    let redis_url = config
        .redis_url
        .as_deref()
        .context("REDIS_URL must be set")?;
    let store = RedisStore::connect(redis_url)
        .await
        .context("Failed to connect to Redis")?;
    Ok(Arc::new(store))
}

/// A credential named on the command line.
struct Target {
    id: String,
    /// Seconds until the token expires, when a raw token was given.
    remaining: Option<u64>,
}

/// Accepts either a raw token (verified against `JWT_SECRET`, expiry
/// ignored) or an already-derived credential id.
fn resolve_target(config: &Config, token_or_id: &str) -> Result<Target> {
    if token_or_id.matches('.').count() != 2 {
        return Ok(Target {
            id: token_or_id.to_string(),
            remaining: None,
        });
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    let data = decode::<Claims>(
        token_or_id,
        &DecodingKey::from_secret(config.auth.jwt_secret.as_bytes()),
        &validation,
    )
    .context("Token signature does not match JWT_SECRET")?;

    let now = Utc::now().timestamp().max(0) as u64;
    Ok(Target {
        id: credential_id(token_or_id, &data.claims),
        remaining: Some(data.claims.exp.saturating_sub(now)),
    })
}

/// Dispatches credential commands.
async fn handle_token_action(
    action: TokenAction,
    config: &Config,
    store: Arc<dyn CounterStore>,
) -> Result<()> {
    match action {
        TokenAction::Revoke {
            token_or_id,
            ttl,
            yes,
        } => {
            let target = resolve_target(config, &token_or_id)?;
            revoke(store, target, ttl, yes).await?;
        }
        TokenAction::Restore { token_or_id } => {
            let target = resolve_target(config, &token_or_id)?;
            let existed = store
                .delete(&revocation_key(&target.id))
                .await
                .map_err(|e| anyhow::anyhow!("Failed to lift revocation: {}", e))?;
            if existed {
                println!("{}", "✅ Revocation lifted".green().bold());
            } else {
                println!("{}", "ℹ️  Credential was not revoked".yellow());
            }
        }
        TokenAction::Status { token_or_id } => {
            let target = resolve_target(config, &token_or_id)?;
            let revoked = store
                .exists(&revocation_key(&target.id))
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read revocation list: {}", e))?;
            println!("  Credential: {}", target.id.cyan());
            if revoked {
                println!("  Status:     {}", "REVOKED".red().bold());
            } else {
                println!("  Status:     {}", "ACTIVE".green().bold());
            }
        }
        TokenAction::Mint { sub, ttl, jti } => mint_token(config, &sub, ttl, jti)?,
    }

    Ok(())
}

/// Adds a credential to the revocation list.
///
/// # Flow
///
/// 1. Work out how long the entry must live (explicit `--ttl`, the token's
///    remaining lifetime, or a week for bare ids)
/// 2. Confirm (unless `--yes` flag)
/// 3. Write `revoked:<id>` with that expiry
///
/// An already expired token is reported and left alone.
async fn revoke(
    store: Arc<dyn CounterStore>,
    target: Target,
    ttl: Option<u64>,
    skip_confirm: bool,
) -> Result<()> {
    println!("{}", "🔒 Revoke Credential".bright_blue().bold());
    println!();

    let ttl = match (ttl, target.remaining) {
        (Some(ttl), _) => ttl,
        (None, Some(0)) => {
            println!("{}", "ℹ️  Token already expired; nothing to revoke".yellow());
            return Ok(());
        }
        (None, Some(remaining)) => remaining,
        (None, None) => DEFAULT_REVOCATION_TTL,
    };

    println!("  Credential: {}", target.id.cyan());
    println!("  Expires in: {}s", ttl.to_string().bright_yellow());
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Revoke this credential?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    store
        .set_with_expiry(&revocation_key(&target.id), "1", ttl)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to revoke credential: {}", e))?;

    println!("{}", "✅ Credential revoked".green().bold());
    Ok(())
}

/// Prints a signed access token for local testing.
fn mint_token(config: &Config, sub: &str, ttl: u64, with_jti: bool) -> Result<()> {
    let now = Utc::now().timestamp().max(0) as u64;
    let claims = Claims {
        sub: sub.to_string(),
        exp: now + ttl,
        iat: Some(now),
        jti: with_jti.then(|| uuid::Uuid::new_v4().to_string()),
        token_type: Some("access".to_string()),
        active: None,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.auth.jwt_secret.as_bytes()),
    )
    .context("Failed to sign token")?;

    println!("{}", "✨ Generated new token".green());
    println!("  Subject: {}", sub.cyan());
    println!("  Token:   {}", token.bright_yellow().bold());
    println!();
    println!("{}", "Example:".bright_white());
    println!(
        "  curl -H \"Authorization: Bearer {}\" http://localhost:3000/api/me",
        token.bright_yellow()
    );
    Ok(())
}

/// Dispatches rate-limit commands.
async fn handle_rate_action(
    action: RateAction,
    config: &Config,
    store: Arc<dyn CounterStore>,
) -> Result<()> {
    let limiter = RateLimiter::new(store, config.rate_limit.clone());
    let limit = config.rate_limit.requests;

    match action {
        RateAction::Usage { identity } => {
            let count = limiter
                .usage(&identity)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read counter: {}", e))?;

            println!("{}", "📊 Rate Limit Usage".bright_blue().bold());
            println!();
            println!("  Identity: {}", identity.cyan());
            println!(
                "  Window:   {}s",
                config.rate_limit.window_seconds.to_string().bright_white()
            );
            let used = format!("{count}/{limit}");
            if count > limit {
                println!("  Used:     {}", used.red().bold());
            } else {
                println!("  Used:     {}", used.green().bold());
            }
        }
        RateAction::Reset { identity } => {
            let existed = limiter
                .reset(&identity)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to reset counter: {}", e))?;
            if existed {
                println!("{}", "✅ Counter reset".green().bold());
            } else {
                println!("{}", "ℹ️  No requests counted in the current window".yellow());
            }
        }
    }

    Ok(())
}

/// Dispatches store commands.
async fn handle_store_action(action: StoreAction, store: Arc<dyn CounterStore>) -> Result<()> {
    match action {
        StoreAction::Check => {
            print!("Checking store connection... ");
            if store.health_check().await {
                println!("{}", "✅ OK".green().bold());
            } else {
                println!("{}", "❌ FAILED".red().bold());
                anyhow::bail!("Store health check failed");
            }
        }
    }

    Ok(())
}
