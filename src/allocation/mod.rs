//! Tuner card allocation.
//!
//! A [`CardAllocator`] holds the working set of one resolution pass: which
//! card is locked to which transponder and which channels it is currently
//! demuxing. The set is rebuilt for every pass and never shared between
//! concurrent rechecks. Allocation failure is an ordinary outcome here; the
//! conflict resolver turns it into winners and losers.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::{Booking, Card, TransponderKey, TuningDetail};

/// Tuning details indexed by `(card, channel)`, pre-fetched for one pass.
#[derive(Debug, Clone, Default)]
pub struct TuningTable {
    details: HashMap<(i32, i32), TuningDetail>,
}

impl TuningTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, card_id: i32, detail: TuningDetail) {
        self.details.insert((card_id, detail.channel_id), detail);
    }

    pub fn get(&self, card_id: i32, channel_id: i32) -> Option<&TuningDetail> {
        self.details.get(&(card_id, channel_id))
    }

    /// Whether any card at all can receive the channel.
    pub fn is_receivable(&self, channel_id: i32) -> bool {
        self.details.keys().any(|(_, c)| *c == channel_id)
    }
}

/// One recording a card is currently servicing.
#[derive(Debug, Clone)]
struct ActiveEntry {
    schedule_id: i32,
    channel_id: i32,
    end: DateTime<Utc>,
    transponder: TransponderKey,
    encrypted: bool,
}

/// Snapshot of the allocator's working set, for rollback after a failed
/// eviction attempt.
#[derive(Debug, Clone)]
pub struct AllocationState {
    active: HashMap<i32, Vec<ActiveEntry>>,
}

/// Assigns bookings to cards for one instant at a time.
#[derive(Debug)]
pub struct CardAllocator<'a> {
    /// Enabled cards in preference order (ascending priority, then id).
    cards: Vec<&'a Card>,
    tunings: &'a TuningTable,
    active: HashMap<i32, Vec<ActiveEntry>>,
}

impl<'a> CardAllocator<'a> {
    pub fn new(cards: &'a [Card], tunings: &'a TuningTable) -> Self {
        let mut ordered: Vec<&Card> = cards.iter().filter(|c| c.enabled).collect();
        ordered.sort_by_key(|c| (c.priority, c.id));
        Self { cards: ordered, tunings, active: HashMap::new() }
    }

    /// Drops every recording that has ended by `instant`.
    pub fn expire(&mut self, instant: DateTime<Utc>) {
        for entries in self.active.values_mut() {
            entries.retain(|e| e.end > instant);
        }
        self.active.retain(|_, entries| !entries.is_empty());
    }

    pub fn snapshot(&self) -> AllocationState {
        AllocationState { active: self.active.clone() }
    }

    pub fn restore(&mut self, state: AllocationState) {
        self.active = state.active;
    }

    /// Removes the recording belonging to `schedule_id`, freeing its slot.
    pub fn release(&mut self, schedule_id: i32) {
        for entries in self.active.values_mut() {
            entries.retain(|e| e.schedule_id != schedule_id);
        }
        self.active.retain(|_, entries| !entries.is_empty());
    }

    /// Cards that could receive the channel at all, in preference order.
    pub fn usable_cards(&self, channel_id: i32) -> Vec<i32> {
        self.cards
            .iter()
            .filter(|c| self.tunings.get(c.id, channel_id).is_some())
            .map(|c| c.id)
            .collect()
    }

    /// Tries to place `booking` on a card. Prefers a card already locked to
    /// the booking's transponder over an idle one; among idle cards the
    /// lowest `priority` value wins. `None` means no card can legally take
    /// the booking right now.
    pub fn try_allocate(&mut self, booking: &Booking) -> Option<i32> {
        let sharing = self.sharing_card(booking);
        let card_id = sharing.or_else(|| self.idle_card(booking))?;
        let detail = self.tunings.get(card_id, booking.channel_id)?;
        let entry = ActiveEntry {
            schedule_id: booking.schedule_id,
            channel_id: booking.channel_id,
            end: booking.end,
            transponder: detail.transponder(),
            encrypted: detail.encrypted,
        };
        self.active.entry(card_id).or_default().push(entry);
        Some(card_id)
    }

    /// A busy card that can take the booking onto its current transponder.
    fn sharing_card(&self, booking: &Booking) -> Option<i32> {
        for card in &self.cards {
            let Some(detail) = self.tunings.get(card.id, booking.channel_id) else {
                continue;
            };
            let Some(entries) = self.active.get(&card.id) else {
                continue;
            };
            if entries.is_empty() {
                continue;
            }
            // Joining the channel already being recorded needs no second
            // demux; a distinct channel does, so it needs subchannel support.
            let same_channel = entries.iter().any(|e| e.channel_id == booking.channel_id);
            if !same_channel && !card.supports_subchannels {
                continue;
            }
            let transponder = detail.transponder();
            if entries.iter().any(|e| e.transponder != transponder) {
                continue;
            }
            if !Self::decrypt_capacity_holds(card, entries, detail) {
                continue;
            }
            return Some(card.id);
        }
        None
    }

    /// An idle card able to receive (and, if needed, decrypt) the channel.
    fn idle_card(&self, booking: &Booking) -> Option<i32> {
        for card in &self.cards {
            let Some(detail) = self.tunings.get(card.id, booking.channel_id) else {
                continue;
            };
            if self.active.get(&card.id).is_some_and(|e| !e.is_empty()) {
                continue;
            }
            if detail.encrypted && card.decrypt_limit == 0 {
                continue;
            }
            return Some(card.id);
        }
        None
    }

    /// Distinct encrypted services after adding `detail` stay within the
    /// card's decrypt limit. The same channel never claims a second slot.
    fn decrypt_capacity_holds(card: &Card, entries: &[ActiveEntry], detail: &TuningDetail) -> bool {
        let mut encrypted: HashSet<i32> = entries
            .iter()
            .filter(|e| e.encrypted)
            .map(|e| e.channel_id)
            .collect();
        if detail.encrypted {
            encrypted.insert(detail.channel_id);
        }
        encrypted.len() as u32 <= card.decrypt_limit
    }
}
