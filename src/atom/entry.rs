use chrono::{DateTime, FixedOffset};
use quick_xml::events::Event;

/// One `<entry>` subtree captured verbatim from a Zotero API page.
///
/// The subtree is kept as an owned event stream (`Start(entry)` through
/// `End(entry)`) so it can be re-emitted into the combined feed without
/// reshaping content we do not understand.
#[derive(Debug, Clone)]
pub struct Entry {
    pub events: Vec<Event<'static>>,
    /// The entry's `updated` timestamp, when present and parseable.
    pub updated: Option<DateTime<FixedOffset>>,
    /// Unescaped text of the entry's `title`.
    pub title: Option<String>,
}
