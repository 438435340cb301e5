use estimo_config::EstimoConfig;
use estimo_core::repository::RoleRepo;
use serde::Serialize;
use tracing::info;

use crate::bootstrap;
use crate::cli::InitArgs;

#[derive(Debug, Serialize)]
struct InitResponse {
    database: String,
    roles_created: Vec<String>,
    roles_existing: Vec<String>,
}

/// Handle `est init`.
pub async fn handle(args: &InitArgs, config: &EstimoConfig) -> anyhow::Result<()> {
    let service = bootstrap::open_service(config).await?;

    let mut roles_created = Vec::new();
    let mut roles_existing = Vec::new();
    for name in &args.roles {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if RoleRepo::find_role_by_name(&service, name).await?.is_some() {
            roles_existing.push(name.to_string());
        } else {
            let role = RoleRepo::create_role(&service, name, None).await?;
            info!(role_id = %role.id, name = %role.name, "role created");
            roles_created.push(role.name);
        }
    }

    let response = InitResponse {
        database: config.database.path.clone(),
        roles_created,
        roles_existing,
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
