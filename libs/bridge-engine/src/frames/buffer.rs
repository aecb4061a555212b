use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::RwLock;
use std::time::Duration;

use bridge_api::{FrameLink, FrameTreeError, FrameTreeSource, TfMessage, Time, Transform, TransformStamped};

use crate::sync::{read, write};

/// How much history is kept behind the newest transform of a frame.
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct Link {
    parent: String,
    transform: Transform,
    stamp: Time,
    is_static: bool,
}

/// Stamped links of one child frame, oldest first.
#[derive(Debug, Default)]
struct History {
    links: VecDeque<Link>,
}

impl History {
    fn latest(&self) -> Option<&Link> {
        self.links.back()
    }

    /// Newest link stamped at or before `at`. Static links match any time.
    fn at(&self, at: Time) -> Option<&Link> {
        match self.latest() {
            Some(link) if link.is_static => Some(link),
            _ => self.links.iter().rev().find(|l| l.stamp <= at),
        }
    }

    fn insert(&mut self, link: Link, cache_time: Duration) {
        if link.is_static {
            self.links.clear();
            self.links.push_back(link);
            return;
        }
        if self.latest().is_some_and(|l| l.is_static) {
            self.links.clear();
        }
        let pos = self.links.partition_point(|l| l.stamp <= link.stamp);
        if pos > 0 && self.links[pos - 1].stamp == link.stamp {
            self.links[pos - 1] = link;
        } else {
            self.links.insert(pos, link);
        }

        // Keep the newest link whatever its age; prune relative to it.
        let Some(newest) = self.latest().map(|l| l.stamp.as_nanos()) else {
            return;
        };
        let horizon = newest.saturating_sub(i64::try_from(cache_time.as_nanos()).unwrap_or(i64::MAX));
        while self.links.len() > 1 && self.links.front().is_some_and(|l| l.stamp.as_nanos() < horizon) {
            self.links.pop_front();
        }
    }
}

/// Walk from a frame towards the root.
struct Ancestry {
    /// `(ancestor, ancestor←frame)`, starting with the frame itself.
    chain: Vec<(String, Transform)>,
    /// Why the walk stopped before reaching a root, if it did.
    broken: Option<String>,
}

/// Stamped transforms of every frame relative to its parent.
///
/// Lookups without a time use the newest link of each frame, however old its
/// stamp is. Older links are kept for `cache_time` behind the newest one and
/// serve [`FrameBuffer::lookup_transform_at`]. Fed by
/// [`TransformListener`](super::TransformListener); read by the snapshotter
/// through [`FrameTreeSource`].
pub struct FrameBuffer {
    cache_time: Duration,
    frames: RwLock<BTreeMap<String, History>>,
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("cache_time", &self.cache_time)
            .field("frames", &self.len())
            .finish()
    }
}

impl FrameBuffer {
    pub fn new(cache_time: Duration) -> Self {
        Self {
            cache_time,
            frames: RwLock::new(BTreeMap::new()),
        }
    }

    /// Record `t` in the history of its child frame.
    ///
    /// Returns `false` for records with an empty frame name or a frame that
    /// names itself as parent.
    pub fn set_transform(&self, t: &TransformStamped, is_static: bool) -> bool {
        let (parent, child) = (t.parent(), t.child());
        if parent.is_empty() || child.is_empty() || parent == child {
            tracing::warn!(parent = %parent, child = %child, "ignoring malformed transform");
            return false;
        }
        let link = Link {
            parent: parent.to_string(),
            transform: Transform::new(t.transform.translation, t.transform.rotation.normalized()),
            stamp: t.header.stamp,
            is_static,
        };
        write(&self.frames, "frame buffer")
            .entry(child.to_string())
            .or_default()
            .insert(link, self.cache_time);
        true
    }

    /// Store every record of `msg`; returns how many were accepted.
    pub fn insert_message(&self, msg: &TfMessage, is_static: bool) -> usize {
        msg.transforms
            .iter()
            .filter(|t| self.set_transform(t, is_static))
            .count()
    }

    /// Number of child frames.
    pub fn len(&self) -> usize {
        read(&self.frames, "frame buffer").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Links kept for `child`, newest included.
    pub fn history_len(&self, child: &str) -> usize {
        read(&self.frames, "frame buffer")
            .get(child)
            .map_or(0, |h| h.links.len())
    }

    pub fn clear(&self) {
        write(&self.frames, "frame buffer").clear();
    }

    /// Transform mapping `child` into `parent` using the links valid at `at`.
    pub fn lookup_transform_at(&self, parent: &str, child: &str, at: Time) -> Result<Transform, FrameTreeError> {
        self.resolve(parent, child, Some(at))
    }

    fn ancestry(frames: &BTreeMap<String, History>, frame: &str, at: Option<Time>) -> Ancestry {
        let mut chain = vec![(frame.to_string(), Transform::IDENTITY)];
        let mut visited: HashSet<&str> = HashSet::from([frame]);
        let mut current = frame;
        let mut to_current = Transform::IDENTITY;

        // Every hop visits a new frame, so this ends within frames.len() steps.
        while let Some(history) = frames.get(current) {
            let link = match at {
                None => history.latest(),
                Some(at) => history.at(at),
            };
            let Some(link) = link else {
                let broken = match at {
                    Some(at) => format!("no transform for frame '{current}' at or before {}ns", at.as_nanos()),
                    None => format!("frame '{current}' has no transform"),
                };
                return Ancestry { chain, broken: Some(broken) };
            };
            if !visited.insert(link.parent.as_str()) {
                let broken = format!("frame '{}' closes a cycle", link.parent);
                return Ancestry { chain, broken: Some(broken) };
            }
            to_current = link.transform.compose(&to_current);
            chain.push((link.parent.clone(), to_current));
            current = link.parent.as_str();
        }
        Ancestry { chain, broken: None }
    }

    fn is_known(frames: &BTreeMap<String, History>, frame: &str) -> bool {
        frames.contains_key(frame)
            || frames
                .values()
                .any(|h| h.links.iter().any(|l| l.parent == frame))
    }

    fn resolve(&self, parent: &str, child: &str, at: Option<Time>) -> Result<Transform, FrameTreeError> {
        let frames = read(&self.frames, "frame buffer");
        for frame in [parent, child] {
            if !Self::is_known(&frames, frame) {
                return Err(FrameTreeError::transform_unavailable(
                    parent,
                    child,
                    format!("frame '{frame}' does not exist"),
                ));
            }
        }
        if parent == child {
            return Ok(Transform::IDENTITY);
        }

        let from_child = Self::ancestry(&frames, child, at);
        let from_parent = Self::ancestry(&frames, parent, at);

        let parent_side: HashMap<&str, &Transform> = from_parent
            .chain
            .iter()
            .map(|(name, t)| (name.as_str(), t))
            .collect();
        for (ancestor, ancestor_child) in &from_child.chain {
            if let Some(ancestor_parent) = parent_side.get(ancestor.as_str()) {
                return Ok(ancestor_parent.inverse().compose(ancestor_child));
            }
        }

        let reason = from_child
            .broken
            .or(from_parent.broken)
            .unwrap_or_else(|| "frames are not connected".to_string());
        Err(FrameTreeError::transform_unavailable(parent, child, reason))
    }
}

impl FrameTreeSource for FrameBuffer {
    fn describe_all_frames(&self) -> Result<Vec<FrameLink>, FrameTreeError> {
        let frames = read(&self.frames, "frame buffer");
        Ok(frames
            .iter()
            .filter_map(|(child, h)| h.latest().map(|l| FrameLink::new(child.clone(), l.parent.clone())))
            .collect())
    }

    /// Latest available transform, whatever the age of its stamps.
    fn lookup_transform(&self, parent: &str, child: &str) -> Result<Transform, FrameTreeError> {
        self.resolve(parent, child, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_api::{Quaternion, Vector3};
    use std::f64::consts::FRAC_PI_2;

    fn stamped(parent: &str, child: &str, x: f64, yaw: f64, sec: i32) -> TransformStamped {
        TransformStamped::new(
            parent,
            child,
            Time::new(sec, 0),
            Transform::new(Vector3::new(x, 0.0, 0.0), Quaternion::from_yaw(yaw)),
        )
    }

    fn buffer() -> FrameBuffer {
        FrameBuffer::new(DEFAULT_CACHE_TIME)
    }

    fn close(a: &Vector3, b: &Vector3) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9 && (a.z - b.z).abs() < 1e-9
    }

    #[test]
    fn describes_frames_sorted_by_child() {
        let buf = buffer();
        buf.set_transform(&stamped("odom", "base", 1.0, 0.0, 100), false);
        buf.set_transform(&stamped("map", "odom", 2.0, 0.0, 100), false);
        assert_eq!(
            buf.describe_all_frames().unwrap(),
            vec![FrameLink::new("base", "odom"), FrameLink::new("odom", "map")]
        );
    }

    #[test]
    fn direct_link_resolves_to_stored_transform() {
        let buf = buffer();
        let t = stamped("odom", "base", 1.5, 0.3, 100);
        buf.set_transform(&t, false);
        let got = buf.lookup_transform("odom", "base").unwrap();
        assert!(close(&got.translation, &t.transform.translation));
    }

    #[test]
    fn chain_is_composed_through_common_ancestor() {
        let buf = buffer();
        buf.set_transform(&stamped("map", "odom", 1.0, FRAC_PI_2, 100), false);
        buf.set_transform(&stamped("odom", "base", 2.0, 0.0, 100), false);
        buf.set_transform(&stamped("map", "dock", 0.0, 0.0, 100), false);

        let map_base = buf.lookup_transform("map", "base").unwrap();
        assert!(close(&map_base.translation, &Vector3::new(1.0, 2.0, 0.0)));

        // dock sits at the map origin, so dock←base equals map←base.
        let dock_base = buf.lookup_transform("dock", "base").unwrap();
        assert!(close(&dock_base.translation, &map_base.translation));

        let base_map = buf.lookup_transform("base", "map").unwrap();
        assert!(close(&base_map.apply(&Vector3::new(1.0, 2.0, 0.0)), &Vector3::default()));
    }

    #[test]
    fn unknown_frame_is_unavailable() {
        let buf = buffer();
        buf.set_transform(&stamped("odom", "base", 1.0, 0.0, 100), false);
        let err = buf.lookup_transform("map", "base").unwrap_err();
        assert!(matches!(err, FrameTreeError::TransformUnavailable { .. }));
        assert!(err.to_string().contains("'map' does not exist"));
    }

    #[test]
    fn disconnected_trees_are_unavailable() {
        let buf = buffer();
        buf.set_transform(&stamped("odom", "base", 1.0, 0.0, 100), false);
        buf.set_transform(&stamped("world", "camera", 1.0, 0.0, 100), false);
        assert!(buf.lookup_transform("world", "base").is_err());
    }

    #[test]
    fn old_stamps_still_resolve_to_latest_link() {
        let buf = buffer();
        buf.set_transform(&stamped("map", "odom", 1.0, 0.0, 5), false);
        buf.set_transform(&stamped("odom", "base", 2.0, 0.0, 1_000), false);

        let odom = buf.lookup_transform("map", "odom").unwrap();
        assert!(close(&odom.translation, &Vector3::new(1.0, 0.0, 0.0)));
        let base = buf.lookup_transform("map", "base").unwrap();
        assert!(close(&base.translation, &Vector3::new(3.0, 0.0, 0.0)));
    }

    #[test]
    fn newest_link_wins_even_when_received_out_of_order() {
        let buf = buffer();
        buf.set_transform(&stamped("odom", "base", 2.0, 0.0, 104), false);
        buf.set_transform(&stamped("odom", "base", 1.0, 0.0, 103), false);

        let got = buf.lookup_transform("odom", "base").unwrap();
        assert!(close(&got.translation, &Vector3::new(2.0, 0.0, 0.0)));
        assert_eq!(buf.history_len("base"), 2);
    }

    #[test]
    fn history_is_pruned_behind_the_newest_stamp() {
        let buf = buffer();
        for sec in [100, 105, 109, 112, 120] {
            buf.set_transform(&stamped("odom", "base", f64::from(sec), 0.0, sec), false);
        }
        // 120 - 10s keeps 112 and 120; older stamps are gone.
        assert_eq!(buf.history_len("base"), 2);

        // Records older than the kept window are dropped on arrival.
        buf.set_transform(&stamped("odom", "base", 0.0, 0.0, 50), false);
        assert_eq!(buf.history_len("base"), 2);
    }

    #[test]
    fn lookup_at_time_uses_links_valid_then() {
        let buf = buffer();
        buf.set_transform(&stamped("odom", "base", 1.0, 0.0, 100), false);
        buf.set_transform(&stamped("odom", "base", 2.0, 0.0, 105), false);
        buf.set_transform(&stamped("base", "laser", 0.5, 0.0, 0), true);

        let at_103 = buf.lookup_transform_at("odom", "base", Time::new(103, 0)).unwrap();
        assert!(close(&at_103.translation, &Vector3::new(1.0, 0.0, 0.0)));
        let at_106 = buf.lookup_transform_at("odom", "laser", Time::new(106, 0)).unwrap();
        assert!(close(&at_106.translation, &Vector3::new(2.5, 0.0, 0.0)));

        let err = buf
            .lookup_transform_at("odom", "base", Time::new(99, 0))
            .unwrap_err();
        assert!(err.to_string().contains("at or before"));
    }

    #[test]
    fn static_record_replaces_history() {
        let buf = buffer();
        buf.set_transform(&stamped("base", "laser", 0.1, 0.0, 100), false);
        buf.set_transform(&stamped("base", "laser", 0.2, 0.0, 101), false);
        buf.set_transform(&stamped("base", "laser", 0.3, 0.0, 0), true);
        assert_eq!(buf.history_len("laser"), 1);
        let got = buf.lookup_transform("base", "laser").unwrap();
        assert!(close(&got.translation, &Vector3::new(0.3, 0.0, 0.0)));
    }

    #[test]
    fn cycles_terminate_with_an_error() {
        let buf = buffer();
        buf.set_transform(&stamped("b", "a", 1.0, 0.0, 100), false);
        buf.set_transform(&stamped("a", "b", 1.0, 0.0, 100), false);
        buf.set_transform(&stamped("x", "y", 1.0, 0.0, 100), false);
        assert!(buf.lookup_transform("x", "a").is_err());
    }

    #[test]
    fn newer_record_replaces_parent() {
        let buf = buffer();
        buf.set_transform(&stamped("odom", "base", 1.0, 0.0, 100), false);
        buf.set_transform(&stamped("map", "base", 1.0, 0.0, 101), false);
        assert_eq!(buf.describe_all_frames().unwrap(), vec![FrameLink::new("base", "map")]);
    }

    #[test]
    fn malformed_records_are_rejected() {
        let buf = buffer();
        let msg = TfMessage {
            transforms: vec![
                stamped("base", "base", 0.0, 0.0, 100),
                stamped("", "base", 0.0, 0.0, 100),
                stamped("odom", "base", 0.0, 0.0, 100),
            ],
        };
        assert_eq!(buf.insert_message(&msg, false), 1);
        assert_eq!(buf.len(), 1);
    }
}
