// src/services/news.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{error, info};
use regex::Regex;
use scraper::Html;
use std::collections::HashSet;

use super::http::Http;
use super::SourceClient;
use crate::config::Endpoints;
use crate::error::{Result, SourceError};
use crate::models::{DataDomain, NewsArticle, Patch};

const MAX_ARTICLES: usize = 80;
const PER_CURRENCY: usize = 8;
const DESCRIPTION_CHARS: usize = 280;
const DEDUPE_CHARS: usize = 60;

/// Source that is forex-only, so untagged items are kept as USD news.
const FX_ONLY_SOURCE: &str = "ForexLive";

pub const CCY_KEYWORDS: [(&str, &[&str]); 9] = [
    ("AUD", &["australia", "rba", "reserve bank of australia", "australian dollar", "aud/"]),
    (
        "USD",
        &[
            "federal reserve",
            "fed ",
            "fomc",
            "us dollar",
            "united states economy",
            "usd/",
            "us cpi",
            "us gdp",
            "nonfarm",
            "payrolls",
        ],
    ),
    (
        "EUR",
        &["ecb", "european central bank", "eurozone", "euro area", "eur/", "german", "france economy"],
    ),
    (
        "GBP",
        &["bank of england", "boe", "uk economy", "britain", "sterling", "gbp/", "uk cpi", "uk gdp"],
    ),
    (
        "JPY",
        &["bank of japan", "boj", "japan economy", "japanese yen", "jpy/", "tokyo cpi", "tankan"],
    ),
    ("CHF", &["swiss national bank", "snb", "swiss franc", "switzerland economy", "chf/"]),
    (
        "CAD",
        &["bank of canada", "boc ", "canadian dollar", "canada economy", "cad/", "canadian cpi"],
    ),
    ("NZD", &["reserve bank of new zealand", "rbnz", "new zealand economy", "kiwi dollar", "nzd/"]),
    ("XAU", &["gold price", "gold rally", "gold drops", "xau/", "bullion", "precious metal"]),
];

#[derive(Debug, Clone)]
pub struct Feed {
    pub url: String,
    pub source: &'static str,
}

pub fn default_feeds(ep: &Endpoints) -> Vec<Feed> {
    vec![
        Feed {
            url: ep.fxstreet_rss.clone(),
            source: "FXStreet",
        },
        Feed {
            url: ep.forexlive_rss.clone(),
            source: FX_ONLY_SOURCE,
        },
        Feed {
            url: ep.dailyfx_rss.clone(),
            source: "DailyFX",
        },
    ]
}

pub fn tag_currencies(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    CCY_KEYWORDS
        .iter()
        .filter(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(ccy, _)| ccy.to_string())
        .collect()
}

/// Entity-decoded text with markup removed and whitespace collapsed.
fn plain_text(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    let text: String = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Pulls items out of an RSS document, tagging each with the currencies it mentions.
pub fn parse_rss(xml: &str, source: &str) -> Result<Vec<NewsArticle>> {
    let item_re = Regex::new(r"(?s)<item[\s>](.*?)</item>")?;
    let title_re = Regex::new(r"(?s)<title>(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?</title>")?;
    let link_re = Regex::new(r#"<link>(.*?)</link>|<link\s+href="(.*?)""#)?;
    let desc_re = Regex::new(r"(?s)<description>(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?</description>")?;
    let date_re = Regex::new(r"<pubDate>(.*?)</pubDate>|<dc:date>(.*?)</dc:date>")?;

    let mut items = Vec::new();
    for item in item_re.captures_iter(xml) {
        let raw = &item[1];
        let title = plain_text(&capture(&title_re, raw));
        let link = link_re
            .captures(raw)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        if title.is_empty() || link.is_empty() {
            continue;
        }
        let description: String = plain_text(&capture(&desc_re, raw))
            .chars()
            .take(DESCRIPTION_CHARS)
            .collect();
        let pub_date = date_re
            .captures(raw)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let mut currencies = tag_currencies(&format!("{} {}", title, description));
        if currencies.is_empty() {
            if source != FX_ONLY_SOURCE {
                continue;
            }
            currencies.push("USD".to_string());
        }

        items.push(NewsArticle {
            published_at: parse_date(&pub_date),
            title,
            description,
            link,
            pub_date,
            source: source.to_string(),
            currencies,
        });
    }
    Ok(items)
}

/// Dedupes on the title prefix, sorts newest first and caps the list.
pub fn curate(articles: Vec<NewsArticle>) -> Vec<NewsArticle> {
    let mut seen = HashSet::new();
    let mut kept: Vec<NewsArticle> = articles
        .into_iter()
        .filter(|a| {
            let key: String = a.title.to_lowercase().chars().take(DEDUPE_CHARS).collect();
            seen.insert(key)
        })
        .collect();
    // undated items sink to the bottom
    kept.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    kept.truncate(MAX_ARTICLES);
    kept
}

/// Forex headlines from public RSS feeds, grouped by currency.
pub struct RssNewsClient {
    http: Http,
    feeds: Vec<Feed>,
}

impl RssNewsClient {
    pub fn new(http: Http, feeds: Vec<Feed>) -> Self {
        RssNewsClient { http, feeds }
    }

    async fn fetch_feed(&self, feed: &Feed) -> Result<Vec<NewsArticle>> {
        let xml = self
            .http
            .get_text(
                feed.source,
                &feed.url,
                "application/rss+xml, application/xml, text/xml, */*",
            )
            .await?;
        parse_rss(&xml, feed.source)
    }
}

#[async_trait]
impl SourceClient for RssNewsClient {
    fn name(&self) -> &'static str {
        "RSS news"
    }

    fn domain(&self) -> DataDomain {
        DataDomain::News
    }

    async fn fetch(&self) -> Result<Patch> {
        let results = join_all(self.feeds.iter().map(|f| self.fetch_feed(f))).await;

        let mut patch = Patch::default();
        let mut all = Vec::new();
        for (feed, result) in self.feeds.iter().zip(results) {
            match result {
                Ok(mut items) => all.append(&mut items),
                Err(e) => {
                    error!("[News] {} failed: {}", feed.source, e);
                    patch.errors.insert(feed.source.to_string(), e.to_string());
                }
            }
        }
        if all.is_empty() {
            return Err(SourceError::Empty("all RSS feeds failed".into()));
        }

        for article in curate(all) {
            for ccy in &article.currencies {
                let bucket = patch.news.entry(ccy.clone()).or_default();
                if bucket.len() < PER_CURRENCY {
                    bucket.push(article.clone());
                }
            }
        }
        patch.news_fetched_at = Some(Utc::now());
        info!("[News] {} currencies tagged", patch.news.len());
        Ok(patch)
    }
}
