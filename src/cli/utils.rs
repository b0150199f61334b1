use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::database::models::Tenant;

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });
            if let Some(data) = data {
                response["data"] = data;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

pub fn output_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One tenant as a single aligned text line
pub fn tenant_line(tenant: &Tenant) -> String {
    format!(
        "{}  {:<24}  {}",
        tenant.id,
        tenant.external_org_id.as_deref().unwrap_or("(unbound)"),
        tenant.name
    )
}

pub fn output_tenants(output_format: OutputFormat, tenants: &[Tenant]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => output_json(&json!({ "tenants": tenants })),
        OutputFormat::Text => {
            if tenants.is_empty() {
                println!("No tenants");
            }
            for tenant in tenants {
                println!("{}", tenant_line(tenant));
            }
            Ok(())
        }
    }
}

pub fn output_tenant(output_format: OutputFormat, message: &str, tenant: &Tenant) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => output_success(output_format, message, Some(serde_json::to_value(tenant)?)),
        OutputFormat::Text => {
            println!("✓ {}", message);
            println!("{}", tenant_line(tenant));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn unbound_tenants_are_marked() {
        let tenant = Tenant {
            id: Uuid::nil(),
            external_org_id: None,
            name: "New School".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let line = tenant_line(&tenant);
        assert!(line.contains("(unbound)"));
        assert!(line.ends_with("New School"));
    }
}
