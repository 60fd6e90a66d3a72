use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::time::Duration;

use crate::config::{Config, ScraperConfig, SelectorConfig};
use crate::error::ScrapeError;
use crate::models::{PartialPosition, Position};

// --- Fetching ---

pub trait PageFetcher: Send + Sync {
    fn get(&self, url: &str) -> Result<String, ScrapeError>;
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    fn get(&self, url: &str) -> Result<String, ScrapeError> {
        let network = |source| ScrapeError::Network {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().map_err(network)
    }
}

// --- Extraction ---

pub trait Extractor: Send + Sync {
    fn extract(&self, markup: &str) -> PartialPosition;
}

/// Reads schema.org `JobPosting` data from `application/ld+json` blocks.
pub struct JsonLdExtractor {
    script: Selector,
}

impl JsonLdExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            script: parse_selector("script[type='application/ld+json']")?,
        })
    }
}

impl Extractor for JsonLdExtractor {
    fn extract(&self, markup: &str) -> PartialPosition {
        let document = Html::parse_document(markup);

        for element in document.select(&self.script) {
            let raw = element.text().collect::<String>();
            let value: Value = match serde_json::from_str(raw.trim()) {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!("Skipping unparseable JSON-LD block: {}", e);
                    continue;
                }
            };
            if let Some(posting) = find_job_posting(&value) {
                return job_posting_fields(posting);
            }
        }

        PartialPosition::default()
    }
}

fn find_job_posting(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_job_posting),
        Value::Object(map) => {
            let is_posting = match map.get("@type") {
                Some(Value::String(t)) => t == "JobPosting",
                Some(Value::Array(types)) => types.iter().any(|t| t == "JobPosting"),
                _ => false,
            };
            if is_posting {
                Some(value)
            } else {
                map.get("@graph").and_then(find_job_posting)
            }
        }
        _ => None,
    }
}

fn job_posting_fields(posting: &Value) -> PartialPosition {
    let organization = &posting["hiringOrganization"];
    let company = match organization {
        Value::String(name) => non_empty(name),
        _ => json_text(&organization["name"]),
    };

    let location = first_item(&posting["jobLocation"]).and_then(|place| {
        let address = &place["address"];
        json_text(&address["addressLocality"])
            .or_else(|| json_text(&address["addressRegion"]))
            .or_else(|| json_text(&place["name"]))
    });

    let contact = [
        &posting["applicationContact"],
        &organization["contactPoint"],
    ]
    .into_iter()
    .find_map(first_item);

    PartialPosition {
        company,
        job_title: json_text(&posting["title"]),
        location,
        person: contact.and_then(|c| json_text(&c["name"])),
        phone: contact.and_then(|c| json_text(&c["telephone"])),
        email: contact.and_then(|c| json_text(&c["email"])),
    }
}

fn first_item(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        Value::Object(_) => Some(value),
        _ => None,
    }
}

fn json_text(value: &Value) -> Option<String> {
    value.as_str().and_then(non_empty)
}

/// CSS selector lists per field, plus link and text fallbacks for contacts.
pub struct SelectorExtractor {
    company: Vec<Selector>,
    job_title: Vec<Selector>,
    location: Vec<Selector>,
    person: Vec<Selector>,
    phone: Vec<Selector>,
    email: Vec<Selector>,
    mailto: Selector,
    tel: Selector,
    email_re: Regex,
    phone_re: Regex,
}

impl SelectorExtractor {
    pub fn new(config: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            company: parse_selectors(&config.company)?,
            job_title: parse_selectors(&config.job_title)?,
            location: parse_selectors(&config.location)?,
            person: parse_selectors(&config.person)?,
            phone: parse_selectors(&config.phone)?,
            email: parse_selectors(&config.email)?,
            mailto: parse_selector("a[href^='mailto:']")?,
            tel: parse_selector("a[href^='tel:']")?,
            email_re: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}")?,
            // Only trust bare numbers that follow a phone label; dates and ids
            // look the same otherwise.
            phone_re: Regex::new(
                r"(?i)\b(?:tel(?:efon|ephone)?|phone|mobil(?:e)?)\s*[.:]?\s*(\+?\d[\d /()-]{6,}\d)",
            )?,
        })
    }

    fn email_fallback(&self, document: &Html) -> Option<String> {
        document
            .select(&self.mailto)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| {
                let address = href.trim_start_matches("mailto:");
                let address = address.split('?').next().unwrap_or(address);
                non_empty(address)
            })
            .or_else(|| {
                let text = page_text(document);
                self.email_re.find(&text).map(|m| m.as_str().to_string())
            })
    }

    fn phone_fallback(&self, document: &Html) -> Option<String> {
        document
            .select(&self.tel)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| non_empty(href.trim_start_matches("tel:")))
            .or_else(|| {
                let text = page_text(document);
                self.phone_re
                    .captures(&text)
                    .and_then(|cap| cap.get(1))
                    .map(|m| m.as_str().trim().to_string())
            })
    }
}

impl Extractor for SelectorExtractor {
    fn extract(&self, markup: &str) -> PartialPosition {
        let document = Html::parse_document(markup);

        PartialPosition {
            company: first_match(&document, &self.company),
            job_title: first_match(&document, &self.job_title),
            location: first_match(&document, &self.location),
            person: first_match(&document, &self.person),
            phone: first_match(&document, &self.phone).or_else(|| self.phone_fallback(&document)),
            email: first_match(&document, &self.email).or_else(|| self.email_fallback(&document)),
        }
    }
}

/// Runs extractors in order, keeping the first value found for each field.
pub struct ChainExtractor {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ChainExtractor {
    pub fn new(extractors: Vec<Box<dyn Extractor>>) -> Self {
        Self { extractors }
    }
}

impl Extractor for ChainExtractor {
    fn extract(&self, markup: &str) -> PartialPosition {
        let mut found = PartialPosition::default();
        for extractor in &self.extractors {
            if found.is_complete() {
                break;
            }
            found = found.merge(extractor.extract(markup));
        }
        found
    }
}

pub fn default_extractor(selectors: &SelectorConfig) -> Result<ChainExtractor> {
    Ok(ChainExtractor::new(vec![
        Box::new(JsonLdExtractor::new()?),
        Box::new(SelectorExtractor::new(selectors)?),
    ]))
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid CSS selector '{}': {}", css, e))
}

fn parse_selectors(list: &[String]) -> Result<Vec<Selector>> {
    list.iter().map(|css| parse_selector(css)).collect()
}

fn first_match(document: &Html, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .flat_map(|selector| document.select(selector))
        .find_map(|element| element_text(&element))
}

fn element_text(element: &ElementRef) -> Option<String> {
    // <meta property=... content=...> carries its value in an attribute
    if element.value().name() == "meta" {
        return element.value().attr("content").and_then(non_empty);
    }
    let text = element.text().collect::<Vec<_>>().join(" ");
    non_empty(&text)
}

fn page_text(document: &Html) -> String {
    document.root_element().text().collect::<Vec<_>>().join(" ")
}

/// Collapse runs of whitespace; `None` when nothing is left.
fn non_empty(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

// --- Position assembly ---

/// `<yyyy-MM-dd>_<company>_<jobTitle>.pdf`, calendar year.
pub fn pdf_file_name(date: NaiveDate, company: &str, job_title: &str) -> String {
    format!(
        "{}_{}_{}.pdf",
        date.format("%Y-%m-%d"),
        strip_separators(company),
        strip_separators(job_title)
    )
}

pub fn pdf_path(description_dir: &str, date: NaiveDate, company: &str, job_title: &str) -> String {
    let name = pdf_file_name(date, company, job_title);
    let dir = description_dir.trim_end_matches('/');
    if dir.is_empty() {
        name
    } else {
        format!("{}/{}", dir, name)
    }
}

fn strip_separators(part: &str) -> String {
    part.replace(['/', '\\'], "-")
}

pub struct PositionScraper {
    fetcher: Box<dyn PageFetcher>,
    extractor: Box<dyn Extractor>,
    description_dir: String,
}

impl PositionScraper {
    pub fn new(
        fetcher: Box<dyn PageFetcher>,
        extractor: Box<dyn Extractor>,
        description_dir: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            description_dir: description_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            Box::new(HttpFetcher::new(&config.scraper)?),
            Box::new(default_extractor(&config.scraper.selectors)?),
            config.job_description_dir.clone(),
        ))
    }

    /// Fetch `url` and build a position with every field that could be found.
    pub fn fetch(&self, id: i64, url: &str) -> Result<Position, ScrapeError> {
        self.fetch_on(id, url, chrono::Local::now().date_naive())
    }

    pub fn fetch_on(&self, id: i64, url: &str, date: NaiveDate) -> Result<Position, ScrapeError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ScrapeError::EmptyUrl);
        }

        tracing::info!("Scraping position #{} from {}", id, url);
        let markup = self.fetcher.get(url)?;
        let found = self.extractor.extract(&markup);
        tracing::debug!("Extracted from {}: {:?}", url, found);

        let company = found.company.unwrap_or_default();
        let job_title = found.job_title.unwrap_or_default();
        let job_title_pdf = pdf_path(&self.description_dir, date, &company, &job_title);

        Ok(Position {
            id,
            company,
            job_title,
            job_title_pdf,
            location: found.location.unwrap_or_default(),
            web: url.to_string(),
            person: found.person.unwrap_or_default(),
            phone: found.phone.unwrap_or_default(),
            email: found.email.unwrap_or_default(),
            ..Default::default()
        })
    }
}
