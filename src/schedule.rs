//! Program title lookup against the date-indexed schedule documents.
//!
//! A program that starts shortly after midnight is listed under the previous
//! broadcast day, so a miss on the window's own date is retried once against
//! the day before.

use chrono::NaiveDate;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt;

use crate::config::Endpoints;
use crate::error::{describe_http, Error, Result};
use crate::page::window_date;

/// Program title made safe for use as a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramTitle(String);

impl ProgramTitle {
    /// Replaces ASCII and full-width spaces, and path separators, with `_`.
    pub fn normalize(raw: &str) -> Self {
        let title = raw
            .chars()
            .map(|c| match c {
                ' ' | '\u{3000}' | '/' | '\\' => '_',
                other => other,
            })
            .collect();
        Self(title)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgramTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Finds the title of the program on `station_id` whose `ft` attribute equals `window_start`.
///
/// Returns `Ok(None)` when the station or the program is absent, or the title is empty.
pub fn find_program_title(
    xml: &str,
    station_id: &str,
    window_start: &str,
) -> std::result::Result<Option<String>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut depth = 0usize;
    let mut station: Option<usize> = None;
    let mut prog: Option<usize> = None;
    let mut title: Option<String> = None;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) => {
                depth += 1;
                match e.name().as_ref() {
                    b"station" if station.is_none() && has_attr(&e, "id", station_id)? => {
                        station = Some(depth)
                    }
                    b"prog"
                        if station.is_some()
                            && prog.is_none()
                            && has_attr(&e, "ft", window_start)? =>
                    {
                        prog = Some(depth)
                    }
                    b"title" if prog.is_some() && title.is_none() => title = Some(String::new()),
                    _ => {}
                }
            }
            Event::Text(text) => {
                if let Some(buf) = title.as_mut() {
                    buf.push_str(&text.unescape().map_err(xml_err)?);
                }
            }
            Event::CData(data) => {
                if let Some(buf) = title.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(e) => {
                if e.name().as_ref() == b"title" {
                    if let Some(found) = title.take() {
                        return Ok(Some(found).filter(|t| !t.is_empty()));
                    }
                }
                if prog == Some(depth) {
                    prog = None;
                }
                if station == Some(depth) {
                    station = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn has_attr(
    element: &BytesStart<'_>,
    name: &str,
    expected: &str,
) -> std::result::Result<bool, String> {
    match element.try_get_attribute(name).map_err(xml_err)? {
        Some(attr) => Ok(attr.unescape_value().map_err(xml_err)? == expected),
        None => Ok(false),
    }
}

fn xml_err(e: impl fmt::Display) -> String {
    format!("malformed schedule document: {e}")
}

pub struct TitleResolver {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl TitleResolver {
    pub fn new(client: reqwest::Client, endpoints: &Endpoints) -> Self {
        Self {
            client,
            endpoints: endpoints.clone(),
        }
    }

    /// Looks the program up on the window's date, then once more on the previous date.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_title(
        &self,
        station_id: &str,
        window_start: &str,
        area_id: &str,
    ) -> Result<ProgramTitle> {
        let date = window_date(window_start)?;
        let candidates = [Some(date), date.pred_opt()];

        for date in candidates.into_iter().flatten() {
            if let Some(raw) = self.lookup(date, station_id, window_start, area_id).await {
                let title = ProgramTitle::normalize(&raw);
                tracing::info!(%date, %title, "resolved program title");
                return Ok(title);
            }
            tracing::warn!(%date, "no matching program in schedule");
        }

        Err(Error::NotFound(format!(
            "{station_id} at {window_start} in area {area_id}"
        )))
    }

    async fn lookup(
        &self,
        date: NaiveDate,
        station_id: &str,
        window_start: &str,
        area_id: &str,
    ) -> Option<String> {
        let url = self
            .endpoints
            .schedule_url_for(&date.format("%Y%m%d").to_string(), area_id);

        let xml = match self.fetch(&url).await {
            Ok(xml) => xml,
            Err(e) => {
                tracing::warn!(%url, error = %e, "schedule fetch failed");
                return None;
            }
        };

        match find_program_title(&xml, station_id, window_start) {
            Ok(title) => title,
            Err(e) => {
                tracing::warn!(%url, error = %e, "schedule unreadable");
                None
            }
        }
    }

    async fn fetch(&self, url: &str) -> std::result::Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| describe_http(&e))?;
        if !response.status().is_success() {
            return Err(format!("status {}", response.status()));
        }
        response.text().await.map_err(|e| describe_http(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEDULE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<radiko>
  <ttl>1800</ttl>
  <stations>
    <station id="QRR">
      <name>文化放送</name>
      <progs>
        <date>20240101</date>
        <prog id="1" ft="20240101120000" to="20240101130000">
          <title>Other Station Show</title>
        </prog>
      </progs>
    </station>
    <station id="TBS">
      <name>TBSラジオ</name>
      <progs>
        <date>20240101</date>
        <prog id="2" ft="20240101110000" to="20240101120000">
          <title>Earlier Show</title>
        </prog>
        <prog id="3" ft="20240101120000" to="20240101130000">
          <title>Lunch  Time　Radio &amp; Talk</title>
          <pfm>Host</pfm>
        </prog>
      </progs>
    </station>
  </stations>
</radiko>"#;

    fn schedule_with_title(title: &str) -> String {
        format!(
            r#"<radiko><stations><station id="TBS"><progs>
            <prog ft="20240101120000"><title>{title}</title></prog>
            </progs></station></stations></radiko>"#
        )
    }

    #[test]
    fn finds_program_on_the_requested_station() {
        assert_eq!(
            find_program_title(SCHEDULE, "TBS", "20240101120000").unwrap(),
            Some("Lunch  Time　Radio & Talk".to_string())
        );
        assert_eq!(
            find_program_title(SCHEDULE, "QRR", "20240101120000").unwrap(),
            Some("Other Station Show".to_string())
        );
    }

    #[test]
    fn absent_station_or_program_is_none() {
        assert_eq!(find_program_title(SCHEDULE, "LFR", "20240101120000").unwrap(), None);
        assert_eq!(find_program_title(SCHEDULE, "TBS", "20240101150000").unwrap(), None);
        assert_eq!(find_program_title("<radiko/>", "TBS", "20240101120000").unwrap(), None);
    }

    #[test]
    fn cdata_titles_are_read() {
        let xml = r#"<radiko><stations><station id="TBS"><progs>
            <prog ft="20240101120000"><title><![CDATA[Night <Special>]]></title></prog>
            </progs></station></stations></radiko>"#;
        assert_eq!(
            find_program_title(xml, "TBS", "20240101120000").unwrap(),
            Some("Night <Special>".to_string())
        );
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(find_program_title("<radiko><station id=\"TBS\"></radiko>", "TBS", "x").is_err());
    }

    #[test]
    fn surrounding_spaces_in_title_become_underscores() {
        let xml = schedule_with_title(" Lunch Time　");
        let raw = find_program_title(&xml, "TBS", "20240101120000")
            .unwrap()
            .unwrap();
        assert_eq!(raw, " Lunch Time　");
        assert_eq!(ProgramTitle::normalize(&raw).as_str(), "_Lunch_Time_");
    }

    #[test]
    fn empty_title_is_a_miss() {
        let xml = schedule_with_title("");
        assert_eq!(find_program_title(&xml, "TBS", "20240101120000").unwrap(), None);

        let xml = r#"<radiko><station id="TBS"><prog ft="20240101120000"><title/></prog></station></radiko>"#;
        assert_eq!(find_program_title(xml, "TBS", "20240101120000").unwrap(), None);
    }

    #[test]
    fn normalize_replaces_every_space_kind() {
        let title = ProgramTitle::normalize("Lunch  Time　Radio & Talk");
        assert_eq!(title.as_str(), "Lunch__Time_Radio_&_Talk");
        assert_eq!(ProgramTitle::normalize("AC/DC\\Hour").as_str(), "AC_DC_Hour");
    }
}
