use crate::catalog::CatalogClient;
use crate::config::Repository;
use crate::domain::Item;
use crate::error::CatalogError;
use crate::fetcher::MetadataFetcher;

pub fn repository_items<C: CatalogClient>(
    fetcher: &MetadataFetcher<C>,
    repository: &Repository,
) -> Result<Vec<Item>, CatalogError> {
    let listings = fetcher.fetch_all(&repository.collection_ids())?;

    let mut items = Vec::new();
    for collection_listing in listings {
        let unzip = repository.unzip_for(&collection_listing.collection);
        items.extend(
            collection_listing
                .listing
                .entries()
                .filter(|entry| repository.accepts(&entry.name))
                .map(|entry| Item {
                    name: entry.name,
                    url: entry.url,
                    unzip,
                }),
        );
    }
    // url breaks ties between collections listing the same name
    items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.url.cmp(&b.url)));
    Ok(items)
}

pub fn find_item<'a>(items: &'a [Item], name: &str) -> Option<&'a Item> {
    items
        .iter()
        .find(|item| item.name == name)
        .or_else(|| items.iter().find(|item| item.file_name() == name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Repositories,
    Files,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavContext {
    pub screen: Screen,
    pub repository: Option<String>,
    pub selected: usize,
    repository_selected: usize,
}

impl NavContext {
    pub fn open_repository(&mut self, key: &str) {
        self.repository_selected = self.selected;
        self.repository = Some(key.to_string());
        self.screen = Screen::Files;
        self.selected = 0;
    }

    pub fn back(&mut self) -> bool {
        match self.screen {
            Screen::Repositories => false,
            Screen::Files => {
                self.screen = Screen::Repositories;
                self.repository = None;
                self.selected = self.repository_selected;
                true
            }
        }
    }

    pub fn move_selection(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.selected = 0;
            return;
        }
        let next = self.selected as isize + delta;
        self.selected = next.clamp(0, len as isize - 1) as usize;
    }
}
