use std::io::{self, Write};

use serde::Serialize;

use crate::config::ResolvedConfig;
use crate::domain::{CollectionListing, Item};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Serialize)]
pub struct RepositorySummary<'a> {
    pub key: &'a str,
    pub name: &'a str,
    pub path: String,
    pub collections: Vec<&'a str>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_repositories(config: &ResolvedConfig) -> io::Result<()> {
        let summaries: Vec<_> = config
            .repositories
            .iter()
            .map(|repo| RepositorySummary {
                key: &repo.key,
                name: &repo.name,
                path: repo.path.display().to_string(),
                collections: repo.collections.iter().map(|c| c.id.as_str()).collect(),
            })
            .collect();
        Self::print_json(&summaries)
    }

    pub fn print_items(items: &[Item]) -> io::Result<()> {
        Self::print_json(&items)
    }

    pub fn print_listings(listings: &[CollectionListing]) -> io::Result<()> {
        Self::print_json(&listings)
    }

    pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
