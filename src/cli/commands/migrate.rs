use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

/// Schema statements are idempotent, so running this twice is harmless
pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    super::open_store(true).await?;
    output_success(output_format, "Schema applied", None)
}
