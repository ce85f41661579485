use std::path::Path;

use anyhow::Context;

use super::types::Config;

const CONFIG_FILE: &str = ".fleetrc";

/// Load config from a `.fleetrc` file in the given directory.
///
/// A missing file is not an error: defaults apply.
pub fn load(dir: &Path) -> anyhow::Result<Config> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(config)
}
