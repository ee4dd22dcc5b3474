//! Paginated discovery of repositories and tags
//!
//! Every call starts again from page 1. Traversal stops on an empty page, on
//! `has_additional == false`, on the first failed page (keeping what was
//! gathered, flagged incomplete), or at the page cap.

use crate::config::TargetEnvironment;
use crate::error::Result;
use crate::logging::Logger;
use crate::registry::client::{ListingPage, RegistryApi};
use std::future::Future;
use std::sync::Arc;

/// Last-resort loop guard against an API that always reports more pages
pub const MAX_PAGES: u32 = 10_000;

/// Accumulated names from one traversal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub items: Vec<String>,
    pub pages_fetched: u32,
    /// False when a page failed or the page cap was hit
    pub complete: bool,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Clone)]
pub struct DirectoryClient {
    api: Arc<dyn RegistryApi>,
    output: Logger,
    max_pages: u32,
}

impl DirectoryClient {
    pub fn new(api: Arc<dyn RegistryApi>, output: Logger) -> Self {
        Self {
            api,
            output,
            max_pages: MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// All repository names in the target's organization
    pub async fn list_repositories(&self, target: &TargetEnvironment) -> Listing {
        let api = &self.api;
        let listing = self
            .paginate("Repository Discovery", "API", &target.url, |page| async move {
                api.repository_page(target, page).await
            })
            .await;

        self.output.info(
            "Repository Discovery",
            "REPO_DISCOVERY_COMPLETE",
            &format!("Total repositories found: {}", listing.len()),
        );
        listing
    }

    /// All tag names in `repository`
    pub async fn list_tags(&self, target: &TargetEnvironment, repository: &str) -> Listing {
        let api = &self.api;
        let listing = self
            .paginate("Tag Discovery", "TAG", repository, |page| async move {
                api.tag_page(target, repository, page).await
            })
            .await;

        self.output.info(
            "Tag Discovery",
            "TAG_DISCOVERY_COMPLETE",
            &format!("Found {} tags for {}", listing.len(), repository),
        );
        listing
    }

    async fn paginate<F, Fut>(&self, step: &str, prefix: &str, subject: &str, mut fetch: F) -> Listing
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<ListingPage>>,
    {
        let mut listing = Listing::default();

        for page in 1..=self.max_pages {
            self.output.debug(
                step,
                &format!("{}_FETCHING", prefix),
                &format!("Fetching page {} for {}", page, subject),
            );

            let result = fetch(page).await;
            listing.pages_fetched = page;

            let ListingPage {
                items,
                has_additional,
            } = match result {
                Ok(page) => page,
                Err(err) => {
                    self.output.error(
                        step,
                        &format!("{}_{}", prefix, err.code()),
                        &format!(
                            "Page {} for {} failed, keeping {} items: {}",
                            page,
                            subject,
                            listing.items.len(),
                            err
                        ),
                    );
                    return listing;
                }
            };

            if items.is_empty() {
                listing.complete = true;
                return listing;
            }

            self.output.debug(
                step,
                &format!("{}_PAGE_SUCCESS", prefix),
                &format!("Found {} items on page {} for {}", items.len(), page, subject),
            );
            listing.items.extend(items);

            if !has_additional {
                listing.complete = true;
                return listing;
            }
        }

        self.output.warning(
            step,
            "DISCOVERY_PAGE_LIMIT",
            &format!(
                "Stopped after {} pages for {}; listing may be incomplete",
                self.max_pages, subject
            ),
        );
        listing
    }
}
