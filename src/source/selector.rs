//! Config-driven source for list-then-detail job boards
//!
//! Listing pages are a sequence of cards, each linking to a detail page. The
//! identifier is captured from the card's canonical link by `id-pattern`.

use crate::config::{BudgetConfig, FieldConfig, FieldMode, SourceConfig};
use crate::crawler::parser::{
    capture_number, collapse_whitespace, element_text, max_page_number, parse_selector,
};
use crate::crawler::{FetchError, PageSession};
use crate::output::DetailRecord;
use crate::source::{BudgetSignal, Source};
use crate::state::{CandidateLink, Identifier};
use crate::url::canonicalize_link;
use crate::ConfigError;
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// `Source` described entirely by a `[[source]]` configuration block
#[derive(Debug, Clone)]
pub struct SelectorSource {
    config: SourceConfig,
    id_pattern: Regex,
    budget_pattern: Option<Regex>,
}

impl SelectorSource {
    /// Compiles the patterns of a source configuration
    ///
    /// Selectors are compiled per page; validation has already checked them.
    pub fn new(config: SourceConfig) -> Result<Self, ConfigError> {
        let id_pattern = compile(&config.id_pattern)?;
        let budget_pattern = match &config.budget {
            BudgetConfig::PaginationText { pattern, .. } | BudgetConfig::TotalCount { pattern, .. } => {
                Some(compile(pattern)?)
            }
            BudgetConfig::PaginationLinks { .. } | BudgetConfig::Fixed { .. } => None,
        };

        Ok(Self {
            config,
            id_pattern,
            budget_pattern,
        })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// URL of listing page `page`
    pub fn listing_url(&self, page: u32) -> String {
        self.config.listing_url.replace("{page}", &page.to_string())
    }

    /// Canonicalizes a card link and captures its identifier
    ///
    /// Returns `None` when the link cannot be resolved or the pattern does not
    /// match; such cards are skipped.
    pub fn derive_identifier(&self, href: &str, base: &Url) -> Option<(Identifier, Url)> {
        let url = canonicalize_link(href, base).ok()?;
        let caps = self.id_pattern.captures(url.as_str())?;
        let id = caps.get(1).or_else(|| caps.get(0))?.as_str().trim();
        if id.is_empty() {
            return None;
        }
        Some((Identifier::from(id), url))
    }

    /// Extracts candidates from a listing page body
    ///
    /// # Arguments
    ///
    /// * `html` - Listing page body
    /// * `page_url` - URL the body was loaded from, for resolving links
    /// * `page` - Page number recorded on each candidate
    pub fn parse_listing(
        &self,
        html: &str,
        page_url: &str,
        page: u32,
    ) -> Result<Vec<CandidateLink>, String> {
        let base = Url::parse(page_url).map_err(|e| format!("bad page URL {}: {}", page_url, e))?;
        let card_selector = parse_selector(&self.config.card_selector)?;
        let link_selector = self
            .config
            .link_selector
            .as_deref()
            .map(parse_selector)
            .transpose()?;

        let document = Html::parse_document(html);
        let mut candidates = Vec::new();

        for (index, card) in document.select(&card_selector).enumerate() {
            let link_element = match &link_selector {
                Some(selector) => card.select(selector).next(),
                None => Some(card),
            };

            let Some(href) = link_element.and_then(|el| el.value().attr(&self.config.link_attr))
            else {
                debug!(page, card = index, "Card has no link, skipping");
                continue;
            };

            match self.derive_identifier(href, &base) {
                Some((identifier, url)) => {
                    candidates.push(CandidateLink::new(identifier, url.to_string(), page));
                }
                None => {
                    debug!(page, card = index, href = %href, "No identifier in card link, skipping");
                }
            }
        }

        Ok(candidates)
    }

    /// Reads the page-count evidence from the entry page body
    pub fn parse_budget(&self, html: &str) -> Result<BudgetSignal, String> {
        let document = Html::parse_document(html);

        let signal = match &self.config.budget {
            BudgetConfig::Fixed { pages } => BudgetSignal::Fixed(*pages),
            BudgetConfig::PaginationLinks { selector } => {
                let selector = parse_selector(selector)?;
                let texts: Vec<String> = document.select(&selector).map(element_text).collect();
                match max_page_number(texts.iter().map(String::as_str)) {
                    Some(n) => BudgetSignal::HighestPage(n),
                    None => BudgetSignal::Unknown,
                }
            }
            BudgetConfig::PaginationText { selector, .. } => {
                match self.captured_number(&document, selector)? {
                    Some(n) => BudgetSignal::HighestPage(u32::try_from(n).unwrap_or(u32::MAX)),
                    None => BudgetSignal::Unknown,
                }
            }
            BudgetConfig::TotalCount { selector, .. } => {
                match self.captured_number(&document, selector)? {
                    Some(n) => BudgetSignal::TotalItems(n),
                    None => BudgetSignal::Unknown,
                }
            }
        };

        Ok(signal)
    }

    fn captured_number(&self, document: &Html, selector: &str) -> Result<Option<u64>, String> {
        let selector = parse_selector(selector)?;
        let Some(pattern) = &self.budget_pattern else {
            return Ok(None);
        };
        Ok(document
            .select(&selector)
            .map(element_text)
            .find_map(|text| capture_number(&text, pattern)))
    }

    /// Extracts the configured fields from a detail page body
    pub fn parse_detail(&self, html: &str, candidate: &CandidateLink) -> Result<DetailRecord, String> {
        let selectors = self
            .config
            .fields
            .iter()
            .map(|field| parse_selector(&field.selector))
            .collect::<Result<Vec<_>, _>>()?;

        let document = Html::parse_document(html);
        let mut record = DetailRecord::new(
            candidate.identifier.clone(),
            candidate.url.clone(),
            self.config.name.clone(),
        );

        for (field, selector) in self.config.fields.iter().zip(&selectors) {
            let value = extract_field(&document, selector, field);
            if value.is_empty() {
                debug!(identifier = %candidate.identifier, field = %field.name, "Field not found");
            }
            record.set_field(field.name.clone(), value);
        }

        Ok(record)
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
}

fn extract_field(document: &Html, selector: &Selector, field: &FieldConfig) -> String {
    let mut values = document
        .select(selector)
        .map(|el| match &field.attr {
            Some(attr) => el.value().attr(attr).map(collapse_whitespace).unwrap_or_default(),
            None => element_text(el),
        })
        .map(|value| strip_label(value, field.strip_prefix.as_deref()))
        .filter(|value| !value.is_empty());

    match field.mode {
        FieldMode::First => values.next().unwrap_or_default(),
        FieldMode::All => values.collect::<Vec<_>>().join(&field.join),
    }
}

/// Removes a leading label such as "Deadline: "
fn strip_label(value: String, prefix: Option<&str>) -> String {
    let Some(prefix) = prefix else {
        return value;
    };
    value
        .strip_prefix(prefix)
        .or_else(|| value.strip_prefix(prefix.trim()))
        .map(|rest| rest.trim().to_string())
        .unwrap_or(value)
}

#[async_trait]
impl Source for SelectorSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn category(&self) -> Option<&str> {
        self.config.category.as_deref()
    }

    fn dedup_scope(&self) -> &str {
        self.config.scope()
    }

    fn columns(&self) -> Vec<String> {
        self.config.fields.iter().map(|f| f.name.clone()).collect()
    }

    async fn discover_budget(
        &self,
        session: &mut dyn PageSession,
    ) -> Result<BudgetSignal, FetchError> {
        if let BudgetConfig::Fixed { pages } = self.config.budget {
            return Ok(BudgetSignal::Fixed(pages));
        }

        let url = self.config.entry_url();
        let page = session.load(&url, None).await?;
        self.parse_budget(&page.body)
            .map_err(|message| FetchError::Structure { url, message })
    }

    async fn list_page(
        &self,
        session: &mut dyn PageSession,
        page: u32,
    ) -> Result<Vec<CandidateLink>, FetchError> {
        let url = self.listing_url(page);
        let loaded = session
            .load(&url, self.config.listing_ready_selector.as_deref())
            .await?;
        self.parse_listing(&loaded.body, &loaded.final_url, page)
            .map_err(|message| FetchError::Structure { url, message })
    }

    async fn fetch_detail(
        &self,
        session: &mut dyn PageSession,
        candidate: &CandidateLink,
    ) -> Result<DetailRecord, FetchError> {
        let loaded = session
            .load(&candidate.url, self.config.detail_ready_selector.as_deref())
            .await?;
        self.parse_detail(&loaded.body, candidate)
            .map_err(|message| FetchError::Structure {
                url: candidate.url.clone(),
                message,
            })
    }
}
