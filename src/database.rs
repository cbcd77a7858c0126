use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::catalog::is_dot_segment;
use crate::error::CatalogError;

pub const DEFAULT_DATABASE_URL: &str = "https://handheld-database.github.io/handheld-database";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rank {
    Platinum,
    Gold,
    Silver,
    Bronze,
    Faulty,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Rank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Platinum => "PLATINUM",
            Rank::Gold => "GOLD",
            Rank::Silver => "SILVER",
            Rank::Bronze => "BRONZE",
            Rank::Faulty => "FAULTY",
            Rank::Unknown => "UNKNOWN",
        }
    }

    pub fn color(&self) -> Option<(u8, u8, u8)> {
        match self {
            Rank::Platinum => Some((180, 199, 220)),
            Rank::Gold => Some((207, 181, 59)),
            Rank::Silver => Some((166, 166, 166)),
            Rank::Bronze => Some((205, 127, 50)),
            Rank::Faulty => Some((255, 0, 0)),
            Rank::Unknown => None,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PLATINUM" => Ok(Rank::Platinum),
            "GOLD" => Ok(Rank::Gold),
            "SILVER" => Ok(Rank::Silver),
            "BRONZE" => Ok(Rank::Bronze),
            "FAULTY" => Ok(Rank::Faulty),
            _ => Err(CatalogError::InvalidRank(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankFilter {
    #[default]
    All,
    Only(Rank),
}

impl FromStr for RankFilter {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(RankFilter::All);
        }
        value.parse().map(RankFilter::Only)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSummary {
    pub key: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default)]
    pub systems: Vec<SystemSummary>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub rank: Rank,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

pub type GameDetails = BTreeMap<String, Value>;
pub type Collaborators = BTreeMap<String, Value>;

#[derive(Deserialize)]
struct PlatformIndex {
    platforms: Vec<String>,
}

#[derive(Deserialize)]
struct GameIndex {
    games: Vec<GameSummary>,
}

/// Game compatibility reports: platforms (device families), their systems
/// and the tested games of each system.
pub trait HandheldDatabase: Send + Sync {
    fn platforms(&self) -> Result<Vec<String>, CatalogError>;
    fn platform(&self, platform: &str) -> Result<Platform, CatalogError>;
    fn games(&self, platform: &str, system: &str) -> Result<Vec<GameSummary>, CatalogError>;
    fn game_details(
        &self,
        platform: &str,
        system: &str,
        game: &str,
    ) -> Result<GameDetails, CatalogError>;
    fn game_overview(&self, game: &str) -> Result<String, CatalogError>;
    fn game_review(&self, platform: &str, system: &str, game: &str)
    -> Result<String, CatalogError>;
    fn collaborators(&self) -> Result<Collaborators, CatalogError>;
}

#[derive(Clone)]
pub struct HttpHandheldDatabase {
    client: Client,
    base_url: Url,
}

impl HttpHandheldDatabase {
    pub fn new() -> Result<Self, CatalogError> {
        Self::with_base_url(DEFAULT_DATABASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, CatalogError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| CatalogError::Http(format!("invalid database url {base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CatalogError::Http(format!(
                "database url cannot be a base: {base_url}"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("handheld-catalog/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CatalogError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| CatalogError::Http(err.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn url(&self, segments: &[&str]) -> Result<String, CatalogError> {
        if let Some(bad) = segments
            .iter()
            .find(|segment| segment.trim().is_empty() || is_dot_segment(segment))
        {
            return Err(CatalogError::InvalidKey((*bad).to_string()));
        }
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        Ok(url.to_string())
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, CatalogError> {
        debug!(url, "handheld database request");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| CatalogError::Http(format!("GET {url}: {err}")))?;
        if !response.status().is_success() {
            return Err(CatalogError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, CatalogError> {
        let url = self.url(segments)?;
        let body = self
            .get(&url)?
            .bytes()
            .map_err(|err| CatalogError::Http(format!("read {url}: {err}")))?;
        serde_json::from_slice(&body).map_err(|err| CatalogError::Decode(format!("{url}: {err}")))
    }

    fn get_text(&self, segments: &[&str]) -> Result<String, CatalogError> {
        let url = self.url(segments)?;
        self.get(&url)?
            .text()
            .map_err(|err| CatalogError::Http(format!("read {url}: {err}")))
    }
}

impl HandheldDatabase for HttpHandheldDatabase {
    fn platforms(&self) -> Result<Vec<String>, CatalogError> {
        let index: PlatformIndex = self.get_json(&["platforms", "index.json"])?;
        Ok(index.platforms)
    }

    fn platform(&self, platform: &str) -> Result<Platform, CatalogError> {
        self.get_json(&["platforms", platform, "index.json"])
    }

    fn games(&self, platform: &str, system: &str) -> Result<Vec<GameSummary>, CatalogError> {
        let index: GameIndex =
            self.get_json(&["platforms", platform, "systems", system, "index.json"])?;
        Ok(index.games)
    }

    fn game_details(
        &self,
        platform: &str,
        system: &str,
        game: &str,
    ) -> Result<GameDetails, CatalogError> {
        let file = format!("{game}.json");
        self.get_json(&["platforms", platform, "systems", system, game, &file])
    }

    fn game_overview(&self, game: &str) -> Result<String, CatalogError> {
        let file = format!("{game}.overview.md");
        self.get_text(&["commons", "overviews", &file])
    }

    fn game_review(
        &self,
        platform: &str,
        system: &str,
        game: &str,
    ) -> Result<String, CatalogError> {
        let file = format!("{game}.md");
        self.get_text(&["platforms", platform, "systems", system, game, &file])
    }

    fn collaborators(&self) -> Result<Collaborators, CatalogError> {
        self.get_json(&["commons", "collaborators", "collaborators.json"])
    }
}

/// Games whose name contains `search` (ignoring case) and whose rank passes
/// `rank`. An empty search matches every name.
pub fn filter_games<'a>(
    games: &'a [GameSummary],
    search: &str,
    rank: RankFilter,
) -> Vec<&'a GameSummary> {
    let needle = search.trim().to_lowercase();
    games
        .iter()
        .filter(|game| needle.is_empty() || game.name.to_lowercase().contains(&needle))
        .filter(|game| match rank {
            RankFilter::All => true,
            RankFilter::Only(wanted) => game.rank == wanted,
        })
        .collect()
}
