//! Line-oriented playlist parsing with per-source policies.
//!
//! Lines arrive one at a time. A channel accumulates directives, group tags
//! and properties until its URL line, at which point the source's policies
//! are applied and it is assigned a slug.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

use crate::models::channel::{
    EXTINF_PREFIX, EXTVLCOPT_PREFIX, KODIPROP_PREFIX, PLAYLIST_TYPE_PREFIX,
};
use crate::models::{Channel, PlaylistOptions, parse_attributes};

const HEADER_PREFIX: &str = "#EXTM3U";
const GROUP_PREFIX: &str = "#EXTGRP";

/// Header attributes that become defaults for every channel lacking them
const INHERITED_HEADER_ATTRIBUTES: [&str; 2] = ["tvg-shift", "catchup-correction"];
const GUIDE_HEADER_ATTRIBUTES: [&str; 2] = ["x-tvg-url", "url-tvg"];

/// Content hash of an identity key, six hex characters
pub fn identity_hash(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(6);
    hash
}

/// Hands out slugs of the form `{source_id}.{hash}` with `.{n}` on collision
#[derive(Debug)]
pub struct SlugAllocator {
    source_id: i32,
    taken: HashSet<String>,
}

impl SlugAllocator {
    pub fn new(source_id: i32) -> Self {
        Self {
            source_id,
            taken: HashSet::new(),
        }
    }

    pub fn allocate(&mut self, identity_key: &str) -> String {
        let base = format!("{}.{}", self.source_id, identity_hash(identity_key));
        let mut slug = base.clone();
        let mut n = 1;
        while self.taken.contains(&slug) {
            slug = format!("{base}.{n}");
            n += 1;
        }
        self.taken.insert(slug.clone());
        slug
    }

    pub fn len(&self) -> usize {
        self.taken.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taken.is_empty()
    }
}

/// Everything one playlist contributed to the pass
#[derive(Debug, Default)]
pub struct ParsedPlaylist {
    pub channels: Vec<Channel>,
    /// Guide locations advertised in the header
    pub guide_urls: Vec<String>,
    /// Group tags that were not attached to any channel
    pub group_hints: Vec<String>,
}

#[derive(Debug, Default)]
struct PendingChannel {
    channel: Channel,
    groups: Vec<String>,
}

pub struct PlaylistParser<'a> {
    source_id: i32,
    options: &'a PlaylistOptions,
    hide_groups: &'a [String],
    extra_groups: Vec<String>,
    defaults: BTreeMap<String, String>,
    pending: Option<PendingChannel>,
    next_tv_chno: i32,
    next_radio_chno: i32,
    slugs: SlugAllocator,
    parsed: ParsedPlaylist,
}

impl<'a> PlaylistParser<'a> {
    pub fn new(source_id: i32, options: &'a PlaylistOptions, hide_groups: &'a [String]) -> Self {
        Self {
            source_id,
            options,
            hide_groups,
            extra_groups: options.extra_groups(),
            defaults: BTreeMap::new(),
            pending: None,
            next_tv_chno: options.start_chno,
            next_radio_chno: options.start_chno,
            slugs: SlugAllocator::new(source_id),
            parsed: ParsedPlaylist::default(),
        }
    }

    pub fn push_line(&mut self, raw: &str) {
        let line = raw.trim_start_matches('\u{feff}').trim();

        if line.starts_with(HEADER_PREFIX) {
            self.read_header(&line[HEADER_PREFIX.len()..]);
            return;
        }

        let pending = self.pending.get_or_insert_with(PendingChannel::default);

        if line.starts_with(EXTINF_PREFIX) {
            pending.channel.load_directive(line);
            for (key, value) in &self.defaults {
                if !pending.channel.attributes.contains_key(key) {
                    pending.channel.attributes.insert(key.clone(), value.clone());
                }
            }
        } else if line.starts_with(GROUP_PREFIX) {
            let value = line.split_once(':').map(|(_, value)| value).unwrap_or("");
            pending
                .groups
                .extend(value.split(';').map(strip_quotes).map(str::to_string));
        } else if line.starts_with(KODIPROP_PREFIX) || line.starts_with(EXTVLCOPT_PREFIX) {
            pending.channel.load_property(line);
        } else if line.starts_with(PLAYLIST_TYPE_PREFIX) {
            let value = line.split_once(':').map(|(_, value)| value).unwrap_or("");
            if value.trim().eq_ignore_ascii_case("VOD") {
                pending.channel.is_live = false;
            }
        } else if line.is_empty() {
            // Group tags with no channel after them describe the playlist
            if let Some(pending) = self.pending.take() {
                self.parsed.group_hints.extend(pending.groups);
            }
        } else if !line.starts_with('#') {
            if let Some(pending) = self.pending.take() {
                self.finalize(pending, line);
            }
        }
    }

    pub fn finish(mut self) -> ParsedPlaylist {
        if let Some(pending) = self.pending.take() {
            self.parsed.group_hints.extend(pending.groups);
        }
        self.parsed
            .group_hints
            .retain(|group| !group.trim().is_empty());
        self.parsed
    }

    fn read_header(&mut self, attrs: &str) {
        for (key, value) in parse_attributes(attrs) {
            if GUIDE_HEADER_ATTRIBUTES.contains(&key.as_str()) {
                if self.options.ignore_guides {
                    continue;
                }
                self.parsed.guide_urls.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|url| !url.is_empty())
                        .map(str::to_string),
                );
            } else if INHERITED_HEADER_ATTRIBUTES.contains(&key.as_str()) {
                self.defaults.insert(key, value);
            }
        }
    }

    fn finalize(&mut self, pending: PendingChannel, url: &str) {
        let PendingChannel { mut channel, groups } = pending;
        let options = self.options;

        channel.source_id = self.source_id;
        channel.url = url.to_string();
        if channel.name.is_empty() {
            channel.name = Channel::from_url(url).name;
        }

        channel.groups.extend(groups);
        if options.skip_playlist_groups {
            channel.groups.clear();
        }
        channel.groups.extend(self.extra_groups.iter().cloned());

        if options.skip_playlist_chno {
            channel.chno = None;
        }
        if options.use_start_chno {
            let next = if channel.radio {
                &mut self.next_radio_chno
            } else {
                &mut self.next_tv_chno
            };
            let chno = *channel.chno.get_or_insert(*next);
            *next = chno.saturating_add(1);
        }

        channel.groups.retain(|group| !group.trim().is_empty());
        channel.visible = options.default_visible
            && !channel
                .groups
                .iter()
                .any(|group| self.hide_groups.contains(group));

        channel.slug = self.slugs.allocate(&channel.identity_key());
        channel.position = self.parsed.channels.len() as i32 + 1;
        self.parsed.channels.push(channel);
    }
}

fn strip_quotes(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
        .trim()
}

/// Parse a complete playlist held in memory
pub fn parse_playlist(
    source_id: i32,
    text: &str,
    options: &PlaylistOptions,
    hide_groups: &[String],
) -> ParsedPlaylist {
    let mut parser = PlaylistParser::new(source_id, options, hide_groups);
    for line in text.lines() {
        parser.push_line(line);
    }
    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(text: &str, options: &PlaylistOptions) -> ParsedPlaylist {
        parse_playlist(7, text, options, &[])
    }

    #[test]
    fn test_header_guides_and_defaults() {
        let text = concat!(
            "#EXTM3U x-tvg-url=\"http://a/epg.xml, http://b/epg.xml.gz\" url-tvg=\"http://c/guide.xml\" tvg-shift=\"2\"\n",
            "#EXTINF:-1 tvg-id=\"one\",One\n",
            "http://stream/1\n",
            "#EXTINF:-1 tvg-id=\"two\" tvg-shift=\"0\",Two\n",
            "http://stream/2\n",
        );
        let parsed = parse(text, &PlaylistOptions::default());

        assert_eq!(
            parsed.guide_urls,
            vec!["http://a/epg.xml", "http://b/epg.xml.gz", "http://c/guide.xml"]
        );
        assert_eq!(parsed.channels.len(), 2);
        assert_eq!(parsed.channels[0].attributes["tvg-shift"], "2");
        assert_eq!(parsed.channels[1].attributes["tvg-shift"], "0");
    }

    #[test]
    fn test_header_after_byte_order_mark() {
        let text = "\u{feff}#EXTM3U x-tvg-url=\"http://a/epg.xml\" tvg-shift=\"1\"\n#EXTINF:-1,One\nhttp://one\n";
        let parsed = parse(text, &PlaylistOptions::default());

        assert_eq!(parsed.guide_urls, vec!["http://a/epg.xml"]);
        assert_eq!(parsed.channels.len(), 1);
        assert_eq!(parsed.channels[0].name, "One");
        assert_eq!(parsed.channels[0].url, "http://one");
        assert_eq!(parsed.channels[0].attributes["tvg-shift"], "1");
    }

    #[rstest]
    #[case("#EXT-X-PLAYLIST-TYPE:VOD", false)]
    #[case("#EXT-X-PLAYLIST-TYPE: vod ", false)]
    #[case("#EXT-X-PLAYLIST-TYPE:EVENT", true)]
    fn test_playlist_type_marks_on_demand(#[case] line: &str, #[case] live: bool) {
        let text = format!("#EXTINF:-1,Film\n{line}\nhttp://stream/film\n");
        let parsed = parse(&text, &PlaylistOptions::default());
        assert_eq!(parsed.channels[0].is_live, live);
    }

    #[test]
    fn test_start_chno_counter_stops_at_max() {
        let options = PlaylistOptions {
            use_start_chno: true,
            ..PlaylistOptions::default()
        };
        let text = "#EXTINF:-1 tvg-chno=\"2147483647\",Max\nhttp://max\n#EXTINF:-1,Next\nhttp://next\n";
        let parsed = parse(text, &options);

        assert_eq!(parsed.channels[0].chno, Some(i32::MAX));
        assert_eq!(parsed.channels[1].chno, Some(i32::MAX));
    }

    #[test]
    fn test_ignore_guides_drops_header_urls() {
        let options = PlaylistOptions {
            ignore_guides: true,
            ..PlaylistOptions::default()
        };
        let parsed = parse("#EXTM3U x-tvg-url=\"http://a/epg.xml\"\n", &options);
        assert!(parsed.guide_urls.is_empty());
    }

    #[test]
    fn test_group_tags_attach_to_next_channel() {
        let text = concat!(
            "#EXTM3U\n",
            "#EXTGRP:\"Kids\";Family\n",
            "#EXTINF:-1 group-title=\"Movies\",Film\n",
            "#KODIPROP:inputstream.adaptive.manifest_type=mpd\n",
            "#EXTVLCOPT:http-user-agent=Mozilla\n",
            "#EXT-X-PLAYLIST-TYPE:VOD\n",
            "http://stream/film\n",
        );
        let parsed = parse(text, &PlaylistOptions::default());
        let channel = &parsed.channels[0];

        assert_eq!(channel.groups, vec!["Movies", "Kids", "Family"]);
        assert_eq!(
            channel.properties["inputstream.adaptive.manifest_type"],
            "mpd"
        );
        assert_eq!(channel.vlc_options["http-user-agent"], "Mozilla");
        assert!(!channel.is_live);
        assert!(parsed.group_hints.is_empty());
    }

    #[test]
    fn test_blank_line_flushes_group_hints() {
        let text = "#EXTM3U\n#EXTGRP:Sport\n#EXTGRP:\"News\"\n\n#EXTINF:-1,A\nhttp://a\n";
        let parsed = parse(text, &PlaylistOptions::default());
        assert_eq!(parsed.group_hints, vec!["Sport", "News"]);
        assert!(parsed.channels[0].groups.is_empty());
    }

    #[test]
    fn test_blank_line_discards_pending_directive() {
        let parsed = parse("#EXTINF:-1,Lost\n\nhttp://stream/bare.ts\n", &PlaylistOptions::default());
        assert_eq!(parsed.channels.len(), 1);
        assert_eq!(parsed.channels[0].name, "bare.ts");
    }

    #[test]
    fn test_group_policies() {
        let options = PlaylistOptions {
            skip_playlist_groups: true,
            group_name: Some("UK; Extra".to_string()),
            ..PlaylistOptions::default()
        };
        let parsed = parse(
            "#EXTGRP:Kids\n#EXTINF:-1 group-title=\"News\",A\nhttp://a\n",
            &options,
        );
        assert_eq!(parsed.channels[0].groups, vec!["UK", "Extra"]);
    }

    #[test]
    fn test_hidden_groups_and_default_visibility() {
        let hide = vec!["Adult".to_string()];
        let text = "#EXTINF:-1 group-title=\"Adult\",A\nhttp://a\n#EXTINF:-1 group-title=\"News\",B\nhttp://b\n";

        let parsed = parse_playlist(1, text, &PlaylistOptions::default(), &hide);
        assert!(!parsed.channels[0].visible);
        assert!(parsed.channels[1].visible);

        let hidden = PlaylistOptions {
            default_visible: false,
            ..PlaylistOptions::default()
        };
        let parsed = parse_playlist(1, text, &hidden, &hide);
        assert!(parsed.channels.iter().all(|channel| !channel.visible));
    }

    #[rstest]
    #[case(false, false, vec![Some(50), None, Some(9)])]
    #[case(true, false, vec![None, None, None])]
    #[case(false, true, vec![Some(50), Some(51), Some(9)])]
    #[case(true, true, vec![Some(100), Some(101), Some(100)])]
    fn test_channel_number_policies(
        #[case] skip_chno: bool,
        #[case] use_start: bool,
        #[case] expected: Vec<Option<i32>>,
    ) {
        let options = PlaylistOptions {
            skip_playlist_chno: skip_chno,
            use_start_chno: use_start,
            start_chno: 100,
            ..PlaylistOptions::default()
        };
        let text = concat!(
            "#EXTINF:-1 tvg-chno=\"50\",A\nhttp://a\n",
            "#EXTINF:-1,B\nhttp://b\n",
            "#EXTINF:-1 tvg-chno=\"9\" radio=\"true\",R\nhttp://r\n",
        );
        let parsed = parse(text, &options);
        let chnos: Vec<Option<i32>> = parsed.channels.iter().map(|c| c.chno).collect();
        assert_eq!(chnos, expected);
    }

    #[test]
    fn test_slugs_are_stable_and_deduplicated() {
        let text = concat!(
            "#EXTINF:-1 tvg-id=\"news\",News\nhttp://x\n",
            "#EXTINF:-1 tvg-id=\"news\",News\nhttp://y\n",
            "#EXTINF:-1,No Id\nhttp://Z \n",
        );
        let parsed = parse(text, &PlaylistOptions::default());
        let base = format!("7.{}", identity_hash("news"));

        assert_eq!(parsed.channels[0].slug, base);
        assert_eq!(parsed.channels[1].slug, format!("{base}.1"));
        assert_eq!(parsed.channels[2].slug, format!("7.{}", identity_hash("http://z")));
        assert_eq!(
            parsed.channels.iter().map(|c| c.position).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let again = parse(text, &PlaylistOptions::default());
        assert_eq!(again.channels[0].slug, parsed.channels[0].slug);
    }

    #[test]
    fn test_identity_hash_shape() {
        let hash = identity_hash("bbc1.uk");
        assert_eq!(hash.len(), 6);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
