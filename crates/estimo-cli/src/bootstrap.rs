use std::path::Path;

use anyhow::Context;
use estimo_config::EstimoConfig;
use estimo_db::EstimoService;

use crate::cli::GlobalFlags;

/// Load layered configuration (with `.env`), then apply command-line overrides.
pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<EstimoConfig> {
    let mut config = EstimoConfig::load_with_dotenv()?;
    if let Some(db) = &flags.db {
        config.database.path.clone_from(db);
        config.validate()?;
    }
    Ok(config)
}

/// Open the configured store, creating its parent directory if needed.
pub async fn open_service(config: &EstimoConfig) -> anyhow::Result<EstimoService> {
    let path = &config.database.path;
    if !config.database.is_in_memory() {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    EstimoService::new_local(path)
        .await
        .with_context(|| format!("failed to open database at {path}"))
}
