//! Tuner cards and the physical tuning parameters that tie channels to them.

use serde::{Deserialize, Serialize};

use super::MediaKind;

/// A tuner device. Capacity is consumed transiently during allocation,
/// never persisted back onto the card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: i32,
    pub name: String,
    pub has_cam: bool,
    /// Maximum number of encrypted services decoded at the same time.
    pub decrypt_limit: u32,
    /// Whether the card can demux several services from one transponder.
    pub supports_subchannels: bool,
    /// Selection ordering among otherwise equal cards; lower is preferred.
    pub priority: i32,
    pub enabled: bool,
}

/// Physical tuning parameters for one channel on one card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningDetail {
    pub id: i32,
    pub channel_id: i32,
    pub name: String,
    pub frequency: u32,
    pub modulation: u32,
    pub symbol_rate: u32,
    pub network_id: u32,
    pub encrypted: bool,
    pub media_kind: MediaKind,
}

impl TuningDetail {
    /// The carrier this channel is broadcast on. Channels with equal keys can
    /// be received by a single tuner lock.
    pub fn transponder(&self) -> TransponderKey {
        TransponderKey {
            frequency: self.frequency,
            modulation: self.modulation,
            symbol_rate: self.symbol_rate,
        }
    }
}

/// Identity of an RF carrier: `(frequency, modulation, symbol rate)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransponderKey {
    pub frequency: u32,
    pub modulation: u32,
    pub symbol_rate: u32,
}
