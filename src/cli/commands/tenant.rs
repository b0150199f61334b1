use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::{output_success, output_tenant, output_tenants};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::services::TenantDirectory;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "List all tenants")]
    List,

    #[command(about = "Show one tenant")]
    Show {
        #[arg(help = "Tenant id")]
        id: Uuid,
    },

    #[command(about = "Find or create the tenant for an organization id")]
    Resolve {
        #[arg(help = "External organization id")]
        org: String,
        #[arg(long, help = "Display name used when the tenant is created")]
        name: Option<String>,
    },

    #[command(about = "Bind a tenant to an external organization id")]
    Bind {
        #[arg(help = "Tenant id")]
        id: Uuid,
        #[arg(help = "External organization id")]
        org: String,
    },

    #[command(about = "Clear a tenant's organization binding")]
    Unbind {
        #[arg(help = "Tenant id")]
        id: Uuid,
    },

    #[command(about = "Rename a tenant")]
    Rename {
        #[arg(help = "Tenant id")]
        id: Uuid,
        #[arg(help = "New display name")]
        name: String,
    },
}

pub async fn handle(cmd: TenantCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let store = super::open_store(false).await?;
    let tenants = TenantDirectory::new(store.as_ref(), &config().tenancy.placeholder_name);

    match cmd {
        TenantCommands::List => output_tenants(output_format, &tenants.list().await?),
        TenantCommands::Show { id } => {
            let tenant = tenants.get(id).await?;
            output_tenant(output_format, "Tenant", &tenant)
        }
        TenantCommands::Resolve { org, name } => {
            let tenant = tenants.resolve(&org, name.as_deref()).await?;
            output_tenant(output_format, &format!("Resolved organization '{}'", org), &tenant)
        }
        TenantCommands::Bind { id, org } => {
            let tenant = tenants.bind(id, Some(&org)).await?;
            output_tenant(output_format, &format!("Bound to organization '{}'", org), &tenant)
        }
        TenantCommands::Unbind { id } => {
            let tenant = tenants.bind(id, None).await?;
            output_success(
                output_format,
                &format!("Tenant {} unbound", tenant.id),
                Some(json!({ "id": tenant.id })),
            )
        }
        TenantCommands::Rename { id, name } => {
            let tenant = tenants.rename(id, &name).await?;
            output_tenant(output_format, "Tenant renamed", &tenant)
        }
    }
}
