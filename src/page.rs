use chrono::{NaiveDate, NaiveDateTime};
use scraper::{Html, Selector};
use url::Url;

use crate::error::{describe_http, Error, Result};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Station and broadcast window of a time-shifted stream, taken from a share url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub station_id: String,
    pub window_start: String,
    pub window_end: String,
    pub stream_url: String,
}

impl StreamDescriptor {
    /// Parses a share url carrying `station_id`, `ft` and `to` query parameters.
    pub fn from_share_url(share_url: &Url) -> Result<Self> {
        let mut station_id = None;
        let mut ft = None;
        let mut to = None;
        for (key, value) in share_url.query_pairs() {
            match key.as_ref() {
                "station_id" => station_id = Some(value.into_owned()),
                "ft" => ft = Some(value.into_owned()),
                "to" => to = Some(value.into_owned()),
                _ => {}
            }
        }

        let station_id = station_id
            .filter(|id| is_station_id(id))
            .ok_or_else(|| Error::Scrape(format!("no station_id in {share_url}")))?;
        let window_start = ft
            .filter(|ts| parse_timestamp(ts).is_some())
            .ok_or_else(|| Error::Scrape(format!("no valid ft in {share_url}")))?;
        let window_end = to
            .filter(|ts| parse_timestamp(ts).is_some())
            .ok_or_else(|| Error::Scrape(format!("no valid to in {share_url}")))?;

        Ok(Self {
            station_id,
            window_start,
            window_end,
            stream_url: share_url.to_string(),
        })
    }
}

/// Calendar date of a window start, which picks the schedule document.
pub(crate) fn window_date(window_start: &str) -> Result<NaiveDate> {
    parse_timestamp(window_start)
        .map(|ts| ts.date())
        .ok_or_else(|| Error::Scrape(format!("malformed window start: {window_start}")))
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if value.len() != 14 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

fn is_station_id(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'-')
}

/// Pulls the `input#share-url` value out of a program page.
pub fn extract_share_url(html: &str, page_url: &Url) -> Result<Url> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("input#share-url")
        .map_err(|e| Error::Scrape(format!("bad selector: {e}")))?;
    let value = document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::Scrape(format!("no share-url input on {page_url}")))?;

    page_url
        .join(value)
        .map_err(|e| Error::Scrape(format!("invalid share url {value:?}: {e}")))
}

/// Resolves the stream descriptor for `url`.
///
/// A url that already carries the window parameters is used as-is; anything
/// else is fetched and scraped for its share url.
#[tracing::instrument(skip(client))]
pub async fn resolve_stream(client: &reqwest::Client, url: &str) -> Result<StreamDescriptor> {
    let page_url =
        Url::parse(url.trim()).map_err(|e| Error::Scrape(format!("invalid url {url:?}: {e}")))?;

    if let Ok(descriptor) = StreamDescriptor::from_share_url(&page_url) {
        tracing::debug!("url already carries the broadcast window");
        return Ok(descriptor);
    }

    let response = client
        .get(page_url.clone())
        .send()
        .await
        .map_err(|e| Error::Scrape(describe_http(&e)))?;
    if !response.status().is_success() {
        return Err(Error::Scrape(format!(
            "{page_url} returned {}",
            response.status()
        )));
    }
    let html = response
        .text()
        .await
        .map_err(|e| Error::Scrape(describe_http(&e)))?;

    let share_url = extract_share_url(&html, &page_url)?;
    let descriptor = StreamDescriptor::from_share_url(&share_url)?;
    tracing::info!(
        station = %descriptor.station_id,
        ft = %descriptor.window_start,
        to = %descriptor.window_end,
        "resolved stream"
    );
    Ok(descriptor)
}
