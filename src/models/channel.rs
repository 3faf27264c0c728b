//! Channel and channel group snapshots from the channel directory.

use serde::{Deserialize, Serialize};

use super::MediaKind;

/// A broadcast channel. Immutable once created; referenced by id everywhere
/// else in the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: i32,
    pub name: String,
    pub media_kind: MediaKind,
    /// Names of every group this channel belongs to.
    pub group_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelGroup {
    pub id: i32,
    pub name: String,
    pub media_kind: MediaKind,
    pub sort_order: i32,
}
