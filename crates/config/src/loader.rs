use std::path::Path;

use tracing::debug;

use crate::{
    Error, Result,
    env_subst::substitute_env,
    schema::FlowConfig,
};

/// Flow file formats, picked by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowFormat {
    Toml,
    Yaml,
    Json,
}

impl FlowFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        match ext {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(Error::UnsupportedFormat {
                extension: other.to_string(),
            }),
        }
    }
}

/// Read a flow file, expand `${ENV}` placeholders and parse it.
pub fn load_flow(path: &Path) -> Result<FlowConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let flow = parse_flow(&substitute_env(&raw), FlowFormat::from_path(path)?)?;
    debug!(path = %path.display(), steps = flow.steps.len(), "loaded flow");
    Ok(flow)
}

/// Parse an already-substituted flow document.
pub fn parse_flow(raw: &str, format: FlowFormat) -> Result<FlowConfig> {
    Ok(match format {
        FlowFormat::Toml => toml::from_str(raw)?,
        FlowFormat::Yaml => serde_yaml::from_str(raw)?,
        FlowFormat::Json => serde_json::from_str(raw)?,
    })
}
