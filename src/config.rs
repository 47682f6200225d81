use anyhow::{anyhow, Result};
use config::Config;
use std::collections::HashMap;
use std::path::Path;

use crate::lens::reachability::{ResolverConfig, DEFAULT_MAX_EXPLORED_ASNS};

pub struct PeriscopeConfig {
    /// Path to the directory holding periscope's data
    pub data_dir: String,

    /// Path of the topology store
    pub db_path: String,

    /// Root of a registry checkout, for ROA objects and AS names
    pub registry_root: Option<String>,

    /// Budget of distinct ASNs the guessed-path search may explore
    pub max_explored_asns: usize,

    /// Override for the tier-1 allow-list
    pub tier1_asns: Option<Vec<u32>>,
}

const EMPTY_CONFIG: &str = r#"### periscope configuration file

### directory for data used by periscope
# data_dir = "~/.periscope"

### path of the topology store (default: <data_dir>/periscope.sqlite3)
# db_path = "/var/lib/periscope/routes.sqlite3"

### root of a registry checkout, for ROA objects and AS names
# registry_root = "/srv/registry"

### budget of distinct ASNs the guessed-path search may explore
# max_explored_asns = 50

### override the tier-1 allow-list (comma-separated ASNs)
# tier1_asns = "174,1299,3356"
"#;

impl PeriscopeConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<PeriscopeConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.periscope/periscope.toml as the configuration file path
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let periscope_dir = format!("{}/.periscope", home_dir.as_str());

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(periscope_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create periscope directory: {}", e))?;
                let p = format!("{}/periscope.toml", periscope_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of PERISCOPE)
        // E.g., `PERISCOPE_DB_PATH=routes.sqlite3 periscope ...` would set the store path
        builder = builder.add_source(config::Environment::with_prefix("PERISCOPE"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        let data_dir = match config.get("data_dir") {
            Some(p) => p.trim_end_matches('/').to_string(),
            None => periscope_dir,
        };

        let db_path = match config.get("db_path") {
            Some(p) => p.to_string(),
            None => format!("{}/periscope.sqlite3", data_dir),
        };

        let registry_root = config.get("registry_root").map(|p| p.to_string());

        let max_explored_asns = match config.get("max_explored_asns") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|e| anyhow!("Invalid max_explored_asns '{}': {}", v, e))?,
            None => DEFAULT_MAX_EXPLORED_ASNS,
        };

        let tier1_asns = match config.get("tier1_asns") {
            Some(v) => Some(
                v.split(',')
                    .map(|token| {
                        token
                            .trim()
                            .parse::<u32>()
                            .map_err(|e| anyhow!("Invalid tier1_asns entry '{}': {}", token, e))
                    })
                    .collect::<Result<Vec<u32>>>()?,
            ),
            None => None,
        };

        Ok(PeriscopeConfig {
            data_dir,
            db_path,
            registry_root,
            max_explored_asns,
            tier1_asns,
        })
    }

    /// Resolver tuning derived from this configuration
    pub fn resolver_config(&self) -> ResolverConfig {
        let mut config = ResolverConfig {
            max_explored_asns: self.max_explored_asns,
            ..ResolverConfig::default()
        };
        if let Some(tier1) = &self.tier1_asns {
            config.tier1_asns = tier1.iter().copied().collect();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolver_config_defaults() {
        let config = PeriscopeConfig {
            data_dir: "/tmp".to_string(),
            db_path: "/tmp/periscope.sqlite3".to_string(),
            registry_root: None,
            max_explored_asns: 25,
            tier1_asns: None,
        };

        let resolver = config.resolver_config();
        assert_eq!(resolver.max_explored_asns, 25);
        assert!(resolver.tier1_asns.contains(&174));
    }

    #[test]
    fn test_resolver_config_tier1_override() {
        let config = PeriscopeConfig {
            data_dir: "/tmp".to_string(),
            db_path: "/tmp/periscope.sqlite3".to_string(),
            registry_root: None,
            max_explored_asns: DEFAULT_MAX_EXPLORED_ASNS,
            tier1_asns: Some(vec![65100, 65101]),
        };

        let resolver = config.resolver_config();
        assert_eq!(resolver.tier1_asns.len(), 2);
        assert!(resolver.tier1_asns.contains(&65100));
        assert!(!resolver.tier1_asns.contains(&174));
    }
}
