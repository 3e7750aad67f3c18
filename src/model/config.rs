use serde::{Deserialize, Serialize};

use crate::view::filter::{SortDirection, SortKey};

/// Configuration from lattice.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub user: UserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the JSON state file, relative to the config file
    #[serde(default = "default_store_file")]
    pub file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            file: default_store_file(),
        }
    }
}

fn default_store_file() -> String {
    "lattice.json".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Default sort key: "manual", "created", or "priority"
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
    /// Expand every parent by default in list output
    #[serde(default = "default_true")]
    pub expand_all: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            sort: SortKey::default(),
            direction: SortDirection::default(),
            expand_all: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Write operations are rejected while no user is signed in
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub id: Option<String>,
}
