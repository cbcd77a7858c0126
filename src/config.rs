use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_CATALOG_URL;
use crate::database::DEFAULT_DATABASE_URL;
use crate::domain::CollectionId;
use crate::error::CatalogError;
use crate::store::DEFAULT_CACHE_DIR;

pub const CONFIG_FILE: &str = "handheld-catalog.json";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logs: bool,
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default)]
    pub catalog_url: Option<String>,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RepositoryEntry {
    pub name: String,
    pub path: String,
    #[serde(default, rename = "extlist")]
    pub ext_list: Vec<String>,
    #[serde(default)]
    pub collections: Vec<CollectionEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CollectionEntry {
    Shorthand(String),
    Detailed(CollectionEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CollectionEntryObject {
    pub name: String,
    #[serde(default)]
    pub unzip: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRequest {
    pub id: CollectionId,
    pub unzip: bool,
}

#[derive(Debug, Clone)]
pub struct Repository {
    pub key: String,
    pub name: String,
    pub path: PathBuf,
    pub ext_list: Vec<String>,
    pub collections: Vec<CollectionRequest>,
}

impl Repository {
    /// An empty extension list accepts every file.
    pub fn accepts(&self, file_name: &str) -> bool {
        self.ext_list.is_empty() || self.ext_list.iter().any(|ext| file_name.ends_with(ext))
    }

    pub fn collection_ids(&self) -> Vec<CollectionId> {
        self.collections.iter().map(|c| c.id.clone()).collect()
    }

    pub fn unzip_for(&self, collection: &CollectionId) -> bool {
        self.collections
            .iter()
            .find(|c| &c.id == collection)
            .map(|c| c.unzip)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub logs: bool,
    pub cache_dir: Utf8PathBuf,
    pub catalog_url: String,
    pub database_url: String,
    pub repositories: Vec<Repository>,
}

impl ResolvedConfig {
    pub fn repository(&self, key: &str) -> Result<&Repository, CatalogError> {
        self.repositories
            .iter()
            .find(|repo| repo.key == key)
            .ok_or_else(|| CatalogError::UnknownRepository(key.to_string()))
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            logs: false,
            cache_dir: Utf8PathBuf::from(DEFAULT_CACHE_DIR),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            repositories: Vec::new(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CatalogError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => Self::default_locations()
                .into_iter()
                .find(|candidate| candidate.exists())
                .ok_or(CatalogError::MissingConfig)?,
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CatalogError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CatalogError::ConfigParse(format!("{}: {err}", config_path.display())))?;

        Self::resolve_config(config)
    }

    pub fn default_locations() -> Vec<PathBuf> {
        let mut locations = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dirs) = BaseDirs::new() {
            locations.push(dirs.config_dir().join("handheld-catalog").join("config.json"));
        }
        locations
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CatalogError> {
        let repositories = config
            .repositories
            .into_iter()
            .map(|(key, entry)| {
                let collections = entry
                    .collections
                    .into_iter()
                    .map(|collection| match collection {
                        CollectionEntry::Shorthand(name) => Ok(CollectionRequest {
                            id: name.parse()?,
                            unzip: false,
                        }),
                        CollectionEntry::Detailed(obj) => Ok(CollectionRequest {
                            id: obj.name.parse()?,
                            unzip: obj.unzip,
                        }),
                    })
                    .collect::<Result<Vec<_>, CatalogError>>()?;
                Ok(Repository {
                    key,
                    name: entry.name,
                    path: PathBuf::from(entry.path),
                    ext_list: entry.ext_list,
                    collections,
                })
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;

        Ok(ResolvedConfig {
            logs: config.logs,
            cache_dir: config
                .cache_dir
                .map(Utf8PathBuf::from)
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_CACHE_DIR)),
            catalog_url: config
                .catalog_url
                .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
            database_url: config
                .database_url
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            repositories,
        })
    }
}
