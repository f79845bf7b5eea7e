// ABOUTME: Config scaffolding for new agents.
// ABOUTME: Writes a commented stagehand.yml template.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::AgentId;

use super::{CONFIG_FILENAME, Config};

pub fn init_config(
    dir: &Path,
    agent_id: Option<&str>,
    control_plane: Option<&str>,
    force: bool,
) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::template();

    if let Some(id) = agent_id {
        if id.trim().is_empty() {
            return Err(Error::InvalidConfig("agent id cannot be empty".to_string()));
        }
        config.agent_id = AgentId::new(id);
    }

    let yaml = generate_template_yaml(&config, control_plane);
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &Config, control_plane: Option<&str>) -> String {
    let control_plane = match control_plane {
        Some(address) => format!(
            r#"control_plane:
  address: {address}
  api_key:
    env: STAGEHAND_API_KEY
  poll_interval: 5s
  request_timeout: 10s
"#
        ),
        None => r#"# control_plane:
#   address: control-plane.example.com:8080
#   api_key:
#     env: STAGEHAND_API_KEY
#   poll_interval: 5s
#   request_timeout: 10s
"#
        .to_string(),
    };

    format!(
        r#"agent_id: {}
{control_plane}tools:
  dir: {}
engine:
  retry_delay: 1s
"#,
        config.agent_id,
        config.tools.dir.display(),
    )
}
