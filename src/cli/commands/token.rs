use clap::Args;
use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::OutputFormat;
use crate::config::config;

#[derive(Args)]
pub struct TokenArgs {
    #[arg(help = "External user id (the `sub` claim)")]
    pub sub: String,

    #[arg(long, help = "External organization id")]
    pub org: Option<String>,

    #[arg(long, help = "Organization display name")]
    pub org_name: Option<String>,

    #[arg(long, help = "Organization role, e.g. org:admin")]
    pub org_role: Option<String>,

    #[arg(long, help = "Lifetime in hours (defaults to JWT_EXPIRY_HOURS)")]
    pub hours: Option<u64>,
}

pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config().security;
    let hours = args.hours.unwrap_or(security.jwt_expiry_hours);
    let claims = Claims::new(args.sub, args.org, hours)
        .with_org_name(args.org_name)
        .with_org_role(args.org_role);
    let token = generate_jwt(&claims, &security.jwt_secret)?;

    match output_format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "token": token, "claims": claims }))?
        ),
        OutputFormat::Text => println!("{}", token),
    }
    Ok(())
}
