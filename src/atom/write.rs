use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{Entry, ATOM_NS};
use crate::config::{Config, RepoContext};

/// Feed-level metadata for the combined document.
#[derive(Debug, Clone)]
pub struct FeedMeta {
    pub title: String,
    pub id: String,
    pub author: String,
    pub self_link: String,
}

impl FeedMeta {
    /// Derive feed metadata from configuration and the repository context.
    /// The self link points at the GitHub Pages location of the output file.
    pub fn from_config(config: &Config, context: &RepoContext) -> Self {
        let id = config
            .feed
            .id
            .clone()
            .unwrap_or_else(|| format!("urn:zotero:group:{}:items", config.zotero.group_id));
        let self_link = format!(
            "https://{}.github.io/{}/{}",
            context.owner, context.repo_name, config.feed.output
        );
        Self {
            title: config.feed.title.clone(),
            id,
            author: config.feed.author.clone(),
            self_link,
        }
    }
}

/// Serialize the combined feed.
///
/// The feed-level `updated` element carries the newest entry timestamp, so an
/// unchanged library renders to a byte-identical document. `now` is only used
/// when no entry has a parseable timestamp.
pub fn render(meta: &FeedMeta, entries: &[Entry], now: DateTime<Utc>) -> Result<Vec<u8>> {
    let updated = entries
        .iter()
        .filter_map(|e| e.updated)
        .max()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);

    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.get_mut().write_all(b"\n")?;

    let mut feed = BytesStart::new("feed");
    feed.push_attribute(("xmlns", ATOM_NS));
    writer.write_event(Event::Start(feed))?;

    text_element(&mut writer, "title", &meta.title)?;
    text_element(&mut writer, "id", &meta.id)?;
    text_element(
        &mut writer,
        "updated",
        &updated.to_rfc3339_opts(SecondsFormat::Secs, true),
    )?;

    writer.write_event(Event::Start(BytesStart::new("author")))?;
    text_element(&mut writer, "name", &meta.author)?;
    writer.write_event(Event::End(BytesEnd::new("author")))?;

    let mut link = BytesStart::new("link");
    link.push_attribute(("rel", "self"));
    link.push_attribute(("href", meta.self_link.as_str()));
    writer.write_event(Event::Empty(link))?;

    for entry in entries {
        for ev in &entry.events {
            writer.write_event(ev.clone())?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("feed")))?;
    Ok(writer.into_inner())
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::parse_entries;
    use chrono::TimeZone;

    fn meta() -> FeedMeta {
        FeedMeta {
            title: "Publikationen des IAU".to_string(),
            id: "urn:zotero:group:5560460:items".to_string(),
            author: "IAU".to_string(),
            self_link: "https://octocat.github.io/institut-zotero-feed/zotero_feed.xml"
                .to_string(),
        }
    }

    fn sample_entries() -> Vec<Entry> {
        parse_entries(
            r#"<feed xmlns="http://www.w3.org/2005/Atom">
                 <entry><title>A</title><updated>2024-06-01T12:30:00Z</updated></entry>
                 <entry><title>B</title><updated>2024-06-02T09:00:00Z</updated></entry>
               </feed>"#,
        )
        .unwrap()
    }

    #[test]
    fn feed_carries_declaration_and_metadata() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let xml = String::from_utf8(render(&meta(), &sample_entries(), now).unwrap()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n"));
        assert!(xml.contains(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#));
        assert!(xml.contains("<title>Publikationen des IAU</title>"));
        assert!(xml.contains("<id>urn:zotero:group:5560460:items</id>"));
        assert!(xml.contains("<author><name>IAU</name></author>"));
        assert!(xml.contains(
            r#"<link rel="self" href="https://octocat.github.io/institut-zotero-feed/zotero_feed.xml"/>"#
        ));
    }

    #[test]
    fn updated_is_newest_entry_timestamp() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let xml = String::from_utf8(render(&meta(), &sample_entries(), now).unwrap()).unwrap();
        assert!(xml.contains("<updated>2024-06-02T09:00:00Z</updated>"));
        assert!(!xml.contains("2025-01-01"));
    }

    #[test]
    fn updated_falls_back_to_now_for_empty_feed() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let xml = String::from_utf8(render(&meta(), &[], now).unwrap()).unwrap();
        assert!(xml.contains("<updated>2025-01-01T00:00:00Z</updated>"));
    }

    #[test]
    fn render_is_deterministic() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let entries = sample_entries();
        let a = render(&meta(), &entries, now).unwrap();
        let b = render(&meta(), &entries, now).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn entries_appear_in_fetch_order() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let xml = String::from_utf8(render(&meta(), &sample_entries(), now).unwrap()).unwrap();
        let a = xml.find("<title>A</title>").unwrap();
        let b = xml.find("<title>B</title>").unwrap();
        assert!(a < b);
    }
}
