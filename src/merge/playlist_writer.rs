//! Merged playlist assembly

use std::collections::{HashMap, HashSet};

use crate::models::Channel;

const EMPTY_PLAYLIST_ENTRY: &str = "#EXTINF:-1,EMPTY PLAYLIST\nhttp";

/// Global output settings for the merged playlist
#[derive(Debug, Clone)]
pub struct PlaylistLayout<'a> {
    pub guide_link: &'a str,
    pub start_channel_number: i32,
    pub disable_groups: bool,
    pub group_order: &'a [String],
}

/// Assembled playlist text and the number of entries it holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPlaylist {
    pub text: String,
    pub channel_count: usize,
}

/// Order channels by number (unnumbered last), then source rank, then position
pub fn sort_channels(channels: &mut [Channel], source_ranks: &HashMap<i32, i32>) {
    channels.sort_by_key(|channel| {
        (
            channel.chno.is_none(),
            channel.chno.unwrap_or_default(),
            source_ranks.get(&channel.source_id).copied().unwrap_or(i32::MAX),
            channel.source_id,
            channel.position,
        )
    });
}

/// Number channels in order; an explicit number resets the running counter
fn assign_numbers(channels: &mut [Channel], start: i32) {
    let mut next = start;
    for channel in channels {
        let chno = channel.chno.unwrap_or(next);
        channel.chno = Some(chno);
        next = chno.saturating_add(1);
    }
}

fn radio_group_name(group: &str, tv_groups: &HashSet<String>) -> String {
    if !tv_groups.contains(group) {
        return group.to_string();
    }
    let mut count = 1;
    loop {
        let candidate = if count == 1 {
            format!("{group} (Radio)")
        } else {
            format!("{group} (Radio) #{count}")
        };
        if !tv_groups.contains(&candidate) {
            return candidate;
        }
        count += 1;
    }
}

/// Render the merged playlist.
///
/// `channels` holds every channel of every enabled source. Video channels
/// come first, then audio channels, each list numbered separately. Hidden
/// channels take part in numbering but are not written.
pub fn assemble_playlist(
    channels: Vec<Channel>,
    source_ranks: &HashMap<i32, i32>,
    group_hints: &[String],
    layout: &PlaylistLayout<'_>,
) -> AssembledPlaylist {
    let (mut tv, mut radio): (Vec<Channel>, Vec<Channel>) =
        channels.into_iter().partition(|channel| !channel.radio);

    sort_channels(&mut tv, source_ranks);
    sort_channels(&mut radio, source_ranks);
    assign_numbers(&mut tv, layout.start_channel_number);
    assign_numbers(&mut radio, layout.start_channel_number);

    tv.retain(|channel| channel.visible);
    radio.retain(|channel| channel.visible);

    if layout.disable_groups {
        tv.iter_mut()
            .chain(radio.iter_mut())
            .for_each(|channel| channel.groups.clear());
    } else {
        let tv_groups: HashSet<String> = tv
            .iter()
            .flat_map(|channel| channel.groups.iter().cloned())
            .collect();
        for channel in &mut radio {
            channel.groups = channel
                .groups
                .iter()
                .map(|group| radio_group_name(group, &tv_groups))
                .collect();
        }
    }

    let mut text = format!("#EXTM3U x-tvg-url=\"{}\"", layout.guide_link);

    let mut seen = HashSet::new();
    for group in layout.group_order.iter().chain(group_hints) {
        let group = group.trim();
        if !group.is_empty() && seen.insert(group.to_string()) {
            text.push_str(&format!("\n#EXTGRP:\"{group}\""));
        }
    }
    text.push_str("\n#EXTGRP:");

    let channel_count = tv.len() + radio.len();
    for channel in tv.iter().chain(&radio) {
        text.push_str("\n\n");
        text.push_str(&channel.render());
    }
    if channel_count == 0 {
        text.push_str("\n\n");
        text.push_str(EMPTY_PLAYLIST_ENTRY);
    }
    text.push('\n');

    AssembledPlaylist {
        text,
        channel_count,
    }
}
