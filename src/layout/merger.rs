//! Merging of remote sub-host layouts into the local one.
//!
//! A participant that hosts its own conference periodically sends us its
//! layout. Those rows are rescaled into the local cell that renders that
//! participant, stored per remote host, and appended when assembling the
//! outbound document - except towards the host that owns them, which never
//! sees its own rows echoed back.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::info::{ConfInfo, ParticipantInfo};
use crate::types::strip_device_suffix;

/// Result of merging a remote layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The remote host sent an empty layout and was dropped.
    Removed,
    /// The stored layout changed; the mixer layout must be refreshed.
    Updated,
    /// The layout matched what was stored; nothing to do.
    Unchanged,
    /// No usable frame dimensions; the merge was aborted.
    Aborted,
}

/// Local layout plus the rescaled layouts of every remote sub-host.
///
/// Lives behind the conference's layout mutex; all methods are cheap and
/// never call out.
#[derive(Debug, Default)]
pub struct ConfLayout {
    /// Locally computed layout, before remote-host merge.
    pub local: ConfInfo,
    /// Rescaled layouts keyed by the remote host's peer URI.
    pub remote_hosts: HashMap<String, ConfInfo>,
}

impl ConfLayout {
    /// Replace the locally computed layout.
    pub fn set_local(&mut self, info: ConfInfo) {
        self.local = info;
    }

    /// Merge a layout received from `peer_uri`.
    ///
    /// `fallback_dims` are the remote call's decoded-frame dimensions, used
    /// when the received canvas is zero.
    pub fn merge_remote(
        &mut self,
        peer_uri: &str,
        mut new_info: ConfInfo,
        fallback_dims: (i32, i32),
    ) -> MergeOutcome {
        if new_info.is_empty() {
            debug!("Remote layout empty, removing remote host {peer_uri}");
            self.remote_hosts.remove(peer_uri);
            return MergeOutcome::Removed;
        }

        if !self.rescale_remote(peer_uri, &mut new_info, fallback_dims) {
            return MergeOutcome::Aborted;
        }

        match self.remote_hosts.get_mut(peer_uri) {
            Some(stored) => {
                if *stored != new_info {
                    *stored = new_info;
                    MergeOutcome::Updated
                } else {
                    warn!("No change in remote layout of {peer_uri}, not updating");
                    MergeOutcome::Unchanged
                }
            }
            None => {
                self.remote_hosts.insert(peer_uri.to_string(), new_info);
                MergeOutcome::Updated
            }
        }
    }

    /// Rescale `info`'s cells into the local cell that renders `peer_uri`.
    ///
    /// Returns `false` when no usable remote frame size exists.
    fn rescale_remote(&self, peer_uri: &str, info: &mut ConfInfo, fallback_dims: (i32, i32)) -> bool {
        let (mut remote_w, mut remote_h) = (info.w, info.h);
        if remote_w == 0 || remote_h == 0 {
            (remote_w, remote_h) = fallback_dims;
        }
        if remote_w == 0 || remote_h == 0 {
            warn!("Remote frame size of {peer_uri} not found, aborting merge");
            return false;
        }

        let local_cell = self
            .local
            .iter()
            .find(|p| p.uri == peer_uri)
            .cloned()
            .unwrap_or_default();

        let zoom_x = remote_w as f32 / local_cell.w as f32;
        let zoom_y = remote_h as f32 / local_cell.h as f32;
        for cell in &mut info.participants {
            cell.x = (cell.x as f32 / zoom_x) as i32 + local_cell.x;
            cell.y = (cell.y as f32 / zoom_y) as i32 + local_cell.y;
            cell.w = (cell.w as f32 / zoom_x) as i32;
            cell.h = (cell.h as f32 / zoom_y) as i32;
        }
        true
    }

    /// Assemble the outbound layout for one destination.
    ///
    /// Rows whose URI is empty are attributed to `local_host_uri` unless the
    /// document is built for the local client (`dest_uri` empty). Rows that
    /// stand for a remote host are replaced by that host's own rows - except
    /// for the destination that owns them.
    pub fn assemble_for(&self, local_host_uri: &str, dest_uri: &str) -> ConfInfo {
        let mut out = ConfInfo {
            participants: Vec::with_capacity(self.local.participants.len()),
            w: self.local.w,
            h: self.local.h,
        };

        for row in self.local.iter() {
            let is_remote_host = self.remote_hosts.contains_key(&row.uri);
            if is_remote_host {
                continue;
            }
            let mut row = row.clone();
            if row.uri.is_empty() && !dest_uri.is_empty() {
                row.uri = local_host_uri.to_string();
            }
            out.participants.push(row);
        }

        for (host_uri, info) in &self.remote_hosts {
            if dest_uri != host_uri {
                out.participants.extend(info.iter().cloned());
            }
        }

        out
    }

    /// Find the remote host whose layout contains `peer_id`, if any.
    pub fn find_host_for_remote(&self, peer_id: &str) -> Option<String> {
        for (host_uri, info) in &self.remote_hosts {
            if info.iter().any(|p| strip_device_suffix(&p.uri) == peer_id) {
                return Some(host_uri.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(uri: &str, x: i32, y: i32, w: i32, h: i32) -> ParticipantInfo {
        ParticipantInfo {
            uri: uri.to_string(),
            x,
            y,
            w,
            h,
            ..Default::default()
        }
    }

    fn layout_with_remote_cell() -> ConfLayout {
        let mut layout = ConfLayout::default();
        layout.set_local(ConfInfo::new(
            vec![cell("", 0, 0, 640, 360), cell("bob@dev", 640, 360, 640, 360)],
            1280,
            720,
        ));
        layout
    }

    #[test]
    fn rescaled_cells_stay_inside_local_cell() {
        let mut layout = layout_with_remote_cell();
        let remote = ConfInfo::new(
            vec![cell("carol@dev", 0, 0, 640, 360), cell("dave@dev", 640, 360, 640, 360)],
            1280,
            720,
        );
        let outcome = layout.merge_remote("bob@dev", remote, (0, 0));
        assert_eq!(outcome, MergeOutcome::Updated);

        let stored = &layout.remote_hosts["bob@dev"];
        for p in stored.iter() {
            assert!(p.x >= 640 && p.y >= 360, "cell {p:?} escapes left/top");
            assert!(p.x + p.w <= 1280 && p.y + p.h <= 720, "cell {p:?} escapes right/bottom");
        }
    }

    #[test]
    fn zero_canvas_falls_back_to_frame_dims() {
        let mut layout = layout_with_remote_cell();
        let remote = ConfInfo::new(vec![cell("carol@dev", 0, 0, 320, 180)], 0, 0);
        assert_eq!(
            layout.merge_remote("bob@dev", remote.clone(), (640, 360)),
            MergeOutcome::Updated
        );
        // Still zero: merge aborts and stores nothing.
        let mut layout = layout_with_remote_cell();
        assert_eq!(layout.merge_remote("bob@dev", remote, (0, 0)), MergeOutcome::Aborted);
        assert!(layout.remote_hosts.is_empty());
    }

    #[test]
    fn empty_layout_removes_remote_host() {
        let mut layout = layout_with_remote_cell();
        let remote = ConfInfo::new(vec![cell("carol@dev", 0, 0, 640, 360)], 1280, 720);
        layout.merge_remote("bob@dev", remote, (0, 0));
        assert!(layout.remote_hosts.contains_key("bob@dev"));

        assert_eq!(
            layout.merge_remote("bob@dev", ConfInfo::default(), (0, 0)),
            MergeOutcome::Removed
        );
        assert!(!layout.remote_hosts.contains_key("bob@dev"));
    }

    #[test]
    fn identical_merge_is_unchanged() {
        let mut layout = layout_with_remote_cell();
        let remote = ConfInfo::new(vec![cell("carol@dev", 0, 0, 640, 360)], 1280, 720);
        assert_eq!(
            layout.merge_remote("bob@dev", remote.clone(), (0, 0)),
            MergeOutcome::Updated
        );
        assert_eq!(layout.merge_remote("bob@dev", remote, (0, 0)), MergeOutcome::Unchanged);
    }

    #[test]
    fn assemble_suppresses_echo_and_fills_host_uri() {
        let mut layout = layout_with_remote_cell();
        let remote = ConfInfo::new(vec![cell("carol@dev", 0, 0, 640, 360)], 1280, 720);
        layout.merge_remote("bob@dev", remote, (0, 0));

        // Towards the remote host: no echo of its own rows, host uri filled.
        let for_bob = layout.assemble_for("alice@home", "bob@dev");
        assert!(for_bob.iter().all(|p| strip_device_suffix(&p.uri) != "carol"));
        assert!(for_bob.iter().any(|p| p.uri == "alice@home"));

        // Towards another peer: remote rows appended.
        let for_other = layout.assemble_for("alice@home", "eve@dev");
        assert!(for_other.iter().any(|p| strip_device_suffix(&p.uri) == "carol"));

        // For the local client: host row stays empty.
        let for_client = layout.assemble_for("", "");
        assert!(for_client.iter().any(|p| p.uri.is_empty()));
    }

    #[test]
    fn finds_host_for_remote_participant() {
        let mut layout = layout_with_remote_cell();
        let remote = ConfInfo::new(vec![cell("carol@dev", 0, 0, 640, 360)], 1280, 720);
        layout.merge_remote("bob@dev", remote, (0, 0));

        assert_eq!(layout.find_host_for_remote("carol"), Some("bob@dev".to_string()));
        assert_eq!(layout.find_host_for_remote("mallory"), None);
    }
}
