use anyhow::Result;
use chrono::DateTime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use super::{Entry, ATOM_NS, ZOTERO_NS};

/// Extract every Atom `<entry>` from one API page.
///
/// Entries are captured verbatim except for direct children bound to the
/// Zotero API namespace, which are dropped for interoperability (other feed
/// consumers do not understand them).
pub fn parse_entries(xml: &str) -> Result<Vec<Entry>> {
    let mut reader = NsReader::from_str(xml);
    let mut entries = Vec::new();

    loop {
        match reader.read_resolved_event() {
            Ok((ns, Event::Start(e)))
                if e.local_name().as_ref() == b"entry" && is_atom_ns(&ns) =>
            {
                entries.push(capture_entry(&mut reader, e)?);
            }
            Ok((_, Event::Eof)) => break,
            Ok(_) => {}
            Err(e) => anyhow::bail!(
                "failed to parse atom page: {} (page starts: {:.200})",
                e,
                xml
            ),
        }
    }

    Ok(entries)
}

fn is_atom_ns(ns: &ResolveResult<'_>) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(url)) if *url == ATOM_NS.as_bytes())
}

fn is_zotero_ns(ns: &ResolveResult<'_>) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(url)) if *url == ZOTERO_NS.as_bytes())
}

/// Consume events up to the matching `</entry>`, collecting the subtree.
///
/// While collecting, the direct children `updated` and `title` are also read
/// as text: `updated` drives the feed-level timestamp, `title` decides the
/// html-title rule below.
fn capture_entry(reader: &mut NsReader<&[u8]>, start: BytesStart<'_>) -> Result<Entry> {
    let mut events: Vec<Event<'static>> = vec![Event::Start(start.into_owned())];
    let mut depth: usize = 0;
    // Local name of the currently open direct child, plus its accumulated text.
    let mut child: Option<Vec<u8>> = None;
    let mut child_text = String::new();
    let mut title: Option<String> = None;
    let mut title_start: Option<usize> = None;
    let mut updated = None;

    loop {
        let (ns, ev) = match reader.read_resolved_event() {
            Ok(pair) => pair,
            Err(e) => anyhow::bail!("failed to parse atom entry: {}", e),
        };
        match ev {
            Event::Start(e) => {
                if depth == 0 && is_zotero_ns(&ns) {
                    reader.read_to_end(e.name())?;
                    continue;
                }
                if depth == 0 {
                    child = Some(e.local_name().as_ref().to_vec());
                    child_text.clear();
                    if e.local_name().as_ref() == b"title" {
                        title_start = Some(events.len());
                    }
                }
                depth += 1;
                events.push(Event::Start(e.into_owned()));
            }
            Event::Empty(e) => {
                if depth == 0 && is_zotero_ns(&ns) {
                    continue;
                }
                events.push(Event::Empty(e.into_owned()));
            }
            Event::End(e) => {
                if depth == 0 {
                    // </entry>
                    events.push(Event::End(e.into_owned()));
                    break;
                }
                depth -= 1;
                if depth == 0 {
                    match child.as_deref() {
                        Some(b"updated") => {
                            updated = DateTime::parse_from_rfc3339(child_text.trim()).ok();
                        }
                        Some(b"title") => {
                            title = Some(child_text.clone());
                        }
                        _ => {}
                    }
                    child = None;
                }
                events.push(Event::End(e.into_owned()));
            }
            Event::Text(e) => {
                if depth == 1 && child.is_some() {
                    if let Ok(text) = e.unescape() {
                        child_text.push_str(&text);
                    }
                }
                events.push(Event::Text(e.into_owned()));
            }
            Event::CData(e) => {
                if depth == 1 && child.is_some() {
                    child_text.push_str(&String::from_utf8_lossy(&e));
                }
                events.push(Event::CData(e.into_owned()));
            }
            Event::Eof => anyhow::bail!("unexpected end of document inside <entry>"),
            other => events.push(other.into_owned()),
        }
    }

    // Titles carrying sub/superscript markup must be declared HTML so feed
    // readers render them instead of showing raw tags.
    if let (Some(idx), Some(t)) = (title_start, title.as_deref()) {
        if t.contains("<sub") {
            set_title_html(&mut events, idx);
        }
    }

    Ok(Entry {
        events,
        updated,
        title,
    })
}

/// Rebuild the title start tag with `type="html"`, replacing any prior type.
fn set_title_html(events: &mut [Event<'static>], idx: usize) {
    let rebuilt = match &events[idx] {
        Event::Start(old) => {
            let name = String::from_utf8_lossy(old.name().as_ref()).into_owned();
            let mut tag = BytesStart::new(name);
            for attr in old.attributes().flatten() {
                if attr.key.as_ref() != b"type" {
                    tag.push_attribute(attr);
                }
            }
            tag.push_attribute(("type", "html"));
            Some(Event::Start(tag.into_owned()))
        }
        _ => None,
    };
    if let Some(ev) = rebuilt {
        events[idx] = ev;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:zapi="http://zotero.org/ns/api">
  <title>Zotero / Group / Top-Level Items</title>
  <id>http://zotero.org/groups/5560460/items/top</id>
  <zapi:totalResults>2</zapi:totalResults>
  <updated>2024-06-02T09:00:00Z</updated>
  <entry>
    <title>Water chemistry of H&lt;sub&gt;2&lt;/sub&gt;O clusters</title>
    <author><name>Example Author</name></author>
    <id>http://zotero.org/groups/5560460/items/ABCD1234</id>
    <published>2024-05-30T11:00:00Z</published>
    <updated>2024-06-01T12:30:00Z</updated>
    <zapi:key>ABCD1234</zapi:key>
    <zapi:itemType>journalArticle</zapi:itemType>
    <content type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml">detail</div></content>
  </entry>
  <entry>
    <title>Plain title &amp; nothing else</title>
    <id>http://zotero.org/groups/5560460/items/EFGH5678</id>
    <updated>2024-06-02T09:00:00Z</updated>
    <zapi:key>EFGH5678</zapi:key>
  </entry>
</feed>"#;

    fn render_events(entry: &Entry) -> String {
        let mut writer = quick_xml::Writer::new(Vec::new());
        for ev in &entry.events {
            writer.write_event(ev.clone()).unwrap();
        }
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn captures_every_entry() {
        let entries = parse_entries(PAGE).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn strips_zotero_namespace_children() {
        let entries = parse_entries(PAGE).unwrap();
        for entry in &entries {
            let xml = render_events(entry);
            assert!(!xml.contains("zapi:"), "zotero elements survived: {}", xml);
        }
        // Atom children are untouched
        let first = render_events(&entries[0]);
        assert!(first.contains("<published>2024-05-30T11:00:00Z</published>"));
        assert!(first.contains(r#"<div xmlns="http://www.w3.org/1999/xhtml">detail</div>"#));
    }

    #[test]
    fn extracts_updated_timestamp() {
        let entries = parse_entries(PAGE).unwrap();
        let updated = entries[0].updated.expect("first entry has updated");
        assert_eq!(updated.to_rfc3339(), "2024-06-01T12:30:00+00:00");
    }

    #[test]
    fn unescapes_title_text() {
        let entries = parse_entries(PAGE).unwrap();
        assert_eq!(
            entries[0].title.as_deref(),
            Some("Water chemistry of H<sub>2</sub>O clusters")
        );
        assert_eq!(entries[1].title.as_deref(), Some("Plain title & nothing else"));
    }

    #[test]
    fn sub_markup_title_becomes_html_typed() {
        let entries = parse_entries(PAGE).unwrap();
        let first = render_events(&entries[0]);
        assert!(first.contains(r#"<title type="html">"#), "got: {}", first);
        // The title text itself stays entity-escaped
        assert!(first.contains("H&lt;sub&gt;2&lt;/sub&gt;O"));
        let second = render_events(&entries[1]);
        assert!(second.contains("<title>"), "plain title untouched: {}", second);
    }

    #[test]
    fn empty_feed_yields_no_entries() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><updated>2024-01-01T00:00:00Z</updated></feed>"#;
        assert!(parse_entries(xml).unwrap().is_empty());
    }

    #[test]
    fn malformed_page_is_an_error() {
        assert!(parse_entries("<feed xmlns=\"http://www.w3.org/2005/Atom\"><entry>").is_err());
    }
}
