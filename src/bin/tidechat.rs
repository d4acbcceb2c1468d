// ABOUTME: Server binary wiring configuration, auth tokens, and the serve loop
// ABOUTME: Development tokens are registered from the command line as TOKEN=PLAN
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use tidechat::auth::StaticTokenAuthenticator;
use tidechat::config::ServerConfig;
use tidechat::errors::{AppError, AppResult};
use tidechat::logging;
use tidechat::plans::Plan;
use tidechat::server::{serve, ServerResources};

#[derive(Parser)]
#[command(name = "tidechat")]
#[command(about = "Multi-tenant streaming LLM chat server")]
struct Cli {
    /// Override the HTTP listen port from the environment
    #[arg(long)]
    port: Option<u16>,

    /// Register a session token as TOKEN=PLAN (repeatable); PLAN is one of
    /// NONE, BASIC, PRO
    #[arg(long = "token", value_name = "TOKEN=PLAN")]
    tokens: Vec<String>,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    logging::init();
    let cli = Cli::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = cli.port {
        config.http_port = port;
    }

    let mut authenticator = StaticTokenAuthenticator::new();
    for entry in &cli.tokens {
        let (token, plan) = entry
            .split_once('=')
            .ok_or_else(|| AppError::config(format!("Malformed --token '{entry}', expected TOKEN=PLAN")))?;
        let plan = Plan::from_str_or_none(plan);
        let user_id = authenticator.add_token(token, plan);
        info!("Registered session token for user {user_id} on plan {plan}");
    }

    let resources = Arc::new(ServerResources::new(config, Arc::new(authenticator))?);
    serve(resources).await
}
