use std::sync::Arc;

use anyhow::Context;
use estimo_config::EstimoConfig;
use estimo_core::repository::EpicRepo;
use estimo_engine::ScoringEngine;

use crate::bootstrap;
use crate::cli::{ReportArgs, ReportFormat};

/// Handle `est report <number>`.
pub async fn handle(args: &ReportArgs, config: &EstimoConfig) -> anyhow::Result<()> {
    let service = Arc::new(bootstrap::open_service(config).await?);
    let epic = EpicRepo::find_epic_by_number(service.as_ref(), &args.number)
        .await?
        .with_context(|| format!("epic {} not found", args.number))?;

    let engine = ScoringEngine::new(service);
    let report = engine.epic_report(epic.id).await?;
    match args.format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ReportFormat::Text => println!("{report}"),
    }
    Ok(())
}
