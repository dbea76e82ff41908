//! Playlist channel model and its `#EXTINF` directive block.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const EXTINF_PREFIX: &str = "#EXTINF";
pub const KODIPROP_PREFIX: &str = "#KODIPROP";
pub const EXTVLCOPT_PREFIX: &str = "#EXTVLCOPT";
pub const PLAYLIST_TYPE_PREFIX: &str = "#EXT-X-PLAYLIST-TYPE";

/// One playlist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Unique across a merged set; `{source_id}.{hash}` with an optional `.{n}` suffix
    pub slug: String,
    pub source_id: i32,
    /// Display name, the text after the directive's comma
    pub name: String,
    pub tvg_name: Option<String>,
    /// `tvg-id`, the guide channel this entry maps to
    pub epg_id: Option<String>,
    pub logo: Option<String>,
    pub chno: Option<i32>,
    pub groups: Vec<String>,
    pub radio: bool,
    pub is_live: bool,
    pub visible: bool,
    pub url: String,
    /// Attributes without a dedicated field, kept verbatim
    pub attributes: BTreeMap<String, String>,
    /// `#KODIPROP` lines
    pub properties: BTreeMap<String, String>,
    /// `#EXTVLCOPT` lines
    pub vlc_options: BTreeMap<String, String>,
    /// Authored inline for a custom source; survives merge passes
    pub custom: bool,
    /// Insertion order within the owning source, starting at 1
    pub position: i32,
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            slug: String::new(),
            source_id: 0,
            name: String::new(),
            tvg_name: None,
            epg_id: None,
            logo: None,
            chno: None,
            groups: Vec::new(),
            radio: false,
            is_live: true,
            visible: true,
            url: String::new(),
            attributes: BTreeMap::new(),
            properties: BTreeMap::new(),
            vlc_options: BTreeMap::new(),
            custom: false,
            position: 0,
        }
    }
}

impl Channel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel for a bare media URL with no directive; named after the last path segment
    pub fn from_url(url: &str) -> Self {
        let name = url
            .split('?')
            .next()
            .unwrap_or(url)
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or("Unnamed Channel")
            .to_string();

        Self {
            name,
            url: url.to_string(),
            ..Self::default()
        }
    }

    /// Load an `#EXTINF:<duration> key="value" ...,<name>` line.
    ///
    /// Attributes are merged into the current state, so defaults applied
    /// earlier survive a directive that does not mention them. A malformed
    /// attribute list keeps whatever parsed cleanly before the fault.
    pub fn load_directive(&mut self, line: &str) {
        let line = line.trim();
        let body = line.strip_prefix(EXTINF_PREFIX).unwrap_or(line);
        let body = body.strip_prefix(':').unwrap_or(body);

        let (head, name) = match split_display_name(body) {
            Some((head, name)) => (head, Some(name)),
            None => (body, None),
        };

        // The duration is the first token, unless the writer omitted it
        let head = head.trim_start();
        let attrs_text = match head.find(char::is_whitespace) {
            Some(index) if !head[..index].contains('=') => &head[index..],
            Some(_) => head,
            None if head.contains('=') => head,
            None => "",
        };

        for (key, value) in parse_attributes(attrs_text) {
            self.set_attribute(key, value);
        }

        if let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) {
            self.name = name.to_string();
        }
    }

    /// Route one attribute into its field, or keep it verbatim
    pub fn set_attribute(&mut self, key: String, value: String) {
        match key.as_str() {
            "tvg-name" => self.tvg_name = non_empty(value),
            "tvg-id" => self.epg_id = non_empty(value),
            "tvg-logo" => self.logo = non_empty(value),
            "tvg-chno" => {
                if let Ok(chno) = value.trim().parse() {
                    self.chno = Some(chno);
                }
            }
            "group-title" => self
                .groups
                .extend(value.split(';').map(|group| group.trim().to_string())),
            "radio" => self.radio = value.trim().eq_ignore_ascii_case("true"),
            _ => {
                self.attributes.insert(key, value);
            }
        }
    }

    /// Record a `#KODIPROP` or `#EXTVLCOPT` line
    pub fn load_property(&mut self, line: &str) {
        let Some((prefix, value)) = line.split_once(':') else {
            return;
        };
        let Some((key, value)) = value.trim().split_once('=') else {
            return;
        };

        let target = if prefix.trim() == EXTVLCOPT_PREFIX {
            &mut self.vlc_options
        } else {
            &mut self.properties
        };
        target.insert(key.to_string(), value.to_string());
    }

    /// Key used for slug hashing: explicit channel id, else guide id, else the URL
    pub fn identity_key(&self) -> String {
        ["channel-id", "channelid"]
            .iter()
            .filter_map(|key| self.attributes.get(*key))
            .find(|id| !id.is_empty())
            .cloned()
            .or_else(|| self.epg_id.clone())
            .unwrap_or_else(|| self.url.trim().to_lowercase())
    }

    /// Render the directive, property lines and URL.
    ///
    /// Field order is fixed so an unchanged channel renders byte-identically.
    pub fn render(&self) -> String {
        let mut directive = String::from("#EXTINF:-1");
        push_attribute(&mut directive, "tvg-name", self.tvg_name.as_deref());
        push_attribute(&mut directive, "tvg-id", self.epg_id.as_deref());
        push_attribute(&mut directive, "tvg-logo", self.logo.as_deref());
        let chno = self.chno.map(|chno| chno.to_string());
        push_attribute(&mut directive, "tvg-chno", chno.as_deref());
        if !self.groups.is_empty() {
            let groups = self.groups.join(";");
            push_attribute(&mut directive, "group-title", Some(&groups));
        }
        if self.radio {
            push_attribute(&mut directive, "radio", Some("true"));
        }
        for (key, value) in &self.attributes {
            push_attribute(&mut directive, key, Some(value));
        }
        directive.push(',');
        directive.push_str(&self.name);

        let mut lines = vec![directive];
        for (key, value) in &self.properties {
            lines.push(format!("{KODIPROP_PREFIX}:{key}={value}"));
        }
        for (key, value) in &self.vlc_options {
            lines.push(format!("{EXTVLCOPT_PREFIX}:{key}={value}"));
        }
        if !self.is_live {
            lines.push(format!("{PLAYLIST_TYPE_PREFIX}:VOD"));
        }
        lines.push(self.url.clone());

        lines.join("\n")
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn push_attribute(line: &mut String, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        line.push(' ');
        line.push_str(key);
        line.push_str("=\"");
        line.push_str(value);
        line.push('"');
    }
}

/// Split at the first comma outside double quotes
fn split_display_name(body: &str) -> Option<(&str, &str)> {
    let mut in_quotes = false;
    for (index, ch) in body.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some((&body[..index], &body[index + 1..])),
            _ => {}
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrState {
    Between,
    Key,
    BeforeValue,
    Quoted,
    Bare,
}

/// Parse `key="value"` and `key=value` pairs in order of appearance.
///
/// A key with no `=` is ignored. An unterminated quoted value is dropped
/// along with anything after it.
pub fn parse_attributes(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut state = AttrState::Between;
    let mut key = String::new();
    let mut value = String::new();

    for ch in text.chars() {
        match state {
            AttrState::Between => {
                if !ch.is_whitespace() {
                    key.push(ch);
                    state = AttrState::Key;
                }
            }
            AttrState::Key => {
                if ch == '=' {
                    state = AttrState::BeforeValue;
                } else if ch.is_whitespace() {
                    key.clear();
                    state = AttrState::Between;
                } else {
                    key.push(ch);
                }
            }
            AttrState::BeforeValue => {
                if ch == '"' {
                    state = AttrState::Quoted;
                } else if ch.is_whitespace() {
                    pairs.push((std::mem::take(&mut key), String::new()));
                    state = AttrState::Between;
                } else {
                    value.push(ch);
                    state = AttrState::Bare;
                }
            }
            AttrState::Quoted => {
                if ch == '"' {
                    pairs.push((std::mem::take(&mut key), std::mem::take(&mut value)));
                    state = AttrState::Between;
                } else {
                    value.push(ch);
                }
            }
            AttrState::Bare => {
                if ch.is_whitespace() {
                    pairs.push((std::mem::take(&mut key), std::mem::take(&mut value)));
                    state = AttrState::Between;
                } else {
                    value.push(ch);
                }
            }
        }
    }

    match state {
        AttrState::Bare => pairs.push((key, value)),
        AttrState::BeforeValue => pairs.push((key, String::new())),
        _ => {}
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn parsed(line: &str) -> Channel {
        let mut channel = Channel::new();
        channel.load_directive(line);
        channel
    }

    #[test]
    fn test_load_full_directive() {
        let channel = parsed(
            r#"#EXTINF:-1 tvg-id="bbc1.uk" tvg-name="BBC One" tvg-logo="http://logo/bbc1.png" tvg-chno="101" group-title="UK;News" tvg-shift="+1" catchup="default",BBC One HD"#,
        );

        assert_eq!(channel.name, "BBC One HD");
        assert_eq!(channel.tvg_name.as_deref(), Some("BBC One"));
        assert_eq!(channel.epg_id.as_deref(), Some("bbc1.uk"));
        assert_eq!(channel.logo.as_deref(), Some("http://logo/bbc1.png"));
        assert_eq!(channel.chno, Some(101));
        assert_eq!(channel.groups, vec!["UK", "News"]);
        assert_eq!(channel.attributes.get("tvg-shift").map(String::as_str), Some("+1"));
        assert_eq!(channel.attributes.get("catchup").map(String::as_str), Some("default"));
        assert!(!channel.radio);
    }

    #[test]
    fn test_comma_inside_quotes_is_not_the_name_separator() {
        let channel = parsed(r#"#EXTINF:-1 group-title="Movies, Drama" tvg-id="m1",Film Four"#);
        assert_eq!(channel.name, "Film Four");
        assert_eq!(channel.groups, vec!["Movies, Drama"]);
        assert_eq!(channel.epg_id.as_deref(), Some("m1"));
    }

    #[rstest]
    #[case::bare_values("#EXTINF:-1 tvg-chno=7 radio=TRUE,Jazz FM", Some(7), true)]
    #[case::no_duration(r#"#EXTINF:tvg-chno="12",Twelve"#, Some(12), false)]
    #[case::bad_chno(r#"#EXTINF:-1 tvg-chno="twelve",Twelve"#, None, false)]
    fn test_numbering_and_radio(
        #[case] line: &str,
        #[case] chno: Option<i32>,
        #[case] radio: bool,
    ) {
        let channel = parsed(line);
        assert_eq!(channel.chno, chno);
        assert_eq!(channel.radio, radio);
    }

    #[test]
    fn test_malformed_attributes_keep_what_parsed() {
        let channel = parsed(r#"#EXTINF:-1 tvg-id="ok" garbage tvg-logo="unterminated,Name"#);
        assert_eq!(channel.epg_id.as_deref(), Some("ok"));
        assert_eq!(channel.logo, None);
        assert!(!channel.attributes.contains_key("garbage"));
    }

    #[test]
    fn test_directive_keeps_prior_defaults() {
        let mut channel = Channel::new();
        channel.set_attribute("tvg-shift".to_string(), "2".to_string());
        channel.load_directive(r#"#EXTINF:-1 tvg-id="a",A"#);
        assert_eq!(channel.attributes.get("tvg-shift").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_render_field_order() {
        let mut channel = parsed(
            r#"#EXTINF:-1 zeta="z" radio="true" group-title="Music" tvg-chno="5" tvg-logo="l.png" tvg-id="id1" tvg-name="N" alpha="a",Radio One"#,
        );
        channel.load_property("#KODIPROP:inputstream=inputstream.adaptive");
        channel.load_property("#EXTVLCOPT:http-user-agent=otg/1.5.1");
        channel.is_live = false;
        channel.url = "http://host/stream".to_string();

        assert_eq!(
            channel.render(),
            "#EXTINF:-1 tvg-name=\"N\" tvg-id=\"id1\" tvg-logo=\"l.png\" tvg-chno=\"5\" group-title=\"Music\" radio=\"true\" alpha=\"a\" zeta=\"z\",Radio One\n\
             #KODIPROP:inputstream=inputstream.adaptive\n\
             #EXTVLCOPT:http-user-agent=otg/1.5.1\n\
             #EXT-X-PLAYLIST-TYPE:VOD\n\
             http://host/stream"
        );
    }

    #[test]
    fn test_identity_key_precedence() {
        let mut channel = Channel::from_url(" HTTP://Host/Live/1.ts ");
        assert_eq!(channel.identity_key(), "http://host/live/1.ts");

        channel.epg_id = Some("guide.id".to_string());
        assert_eq!(channel.identity_key(), "guide.id");

        channel.attributes.insert("channelid".to_string(), "cid".to_string());
        assert_eq!(channel.identity_key(), "cid");

        channel.attributes.insert("channel-id".to_string(), "explicit".to_string());
        assert_eq!(channel.identity_key(), "explicit");

        channel.attributes.insert("channel-id".to_string(), String::new());
        assert_eq!(channel.identity_key(), "cid");
    }

    #[test]
    fn test_from_url_names_after_last_segment() {
        assert_eq!(Channel::from_url("http://host/live/news.m3u8?token=1").name, "news.m3u8");
        assert_eq!(Channel::from_url("http://host/").name, "host");
    }

    fn attribute_value() -> impl Strategy<Value = String> {
        "[A-Za-z0-9 ._:/+-]{1,12}".prop_filter("not blank", |v| !v.trim().is_empty())
    }

    proptest! {
        #[test]
        fn prop_render_then_parse_is_stable(
            name in "[A-Za-z0-9 ]{1,16}".prop_filter("not blank", |v| !v.trim().is_empty()),
            epg_id in proptest::option::of(attribute_value()),
            chno in proptest::option::of(1i32..5000),
            groups in proptest::collection::vec("[A-Za-z0-9]{1,8}", 0..3),
            extras in proptest::collection::btree_map("x-[a-z]{1,6}", attribute_value(), 0..4),
            radio in any::<bool>(),
        ) {
            let original = Channel {
                name: name.trim().to_string(),
                epg_id,
                chno,
                groups,
                radio,
                attributes: extras,
                url: "http://host/stream".to_string(),
                ..Channel::default()
            };

            let rendered = original.render();
            let directive = rendered.lines().next().unwrap();
            let mut reparsed = Channel::new();
            reparsed.load_directive(directive);
            reparsed.url = original.url.clone();

            prop_assert_eq!(&reparsed, &original);
            prop_assert_eq!(reparsed.render(), rendered);
        }
    }
}
