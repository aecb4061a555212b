use crate::error::FrameTreeError;
use crate::transform::Transform;

/// One declared parent link of the frame tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameLink {
    pub child: String,
    pub parent: String,
}

impl FrameLink {
    pub fn new(child: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            child: child.into(),
            parent: parent.into(),
        }
    }
}

/// Read-only view of a frame tree that other publishers mutate.
///
/// Implementations must tolerate concurrent callers.
pub trait FrameTreeSource: Send + Sync {
    /// Every known non-root frame with its declared parent.
    fn describe_all_frames(&self) -> Result<Vec<FrameLink>, FrameTreeError>;

    /// Transform mapping `child` coordinates into `parent`.
    fn lookup_transform(&self, parent: &str, child: &str) -> Result<Transform, FrameTreeError>;
}
