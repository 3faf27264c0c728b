//! Priority-based conflict resolution.
//!
//! Bookings are replayed in start order against a [`CardAllocator`]. When a
//! booking finds no card, recordings with strictly lower priority may be
//! evicted to make room; an eviction that still leaves the booking homeless
//! is rolled back. Every booking ends up either assigned to a card or
//! recorded as a [`Conflict`] naming the winner it lost against.

use std::collections::HashMap;

use tracing::debug;

use crate::allocation::{CardAllocator, TuningTable};
use crate::models::{Booking, Card, Conflict};

/// Outcome of one resolution pass.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Accepted bookings per card id.
    pub assignments: HashMap<i32, Vec<Booking>>,
    pub conflicts: Vec<Conflict>,
}

/// Replays `bookings` against the card pool and splits them into accepted
/// assignments and conflicts. Bookings are processed in `(start, schedule)`
/// order so earlier schedules win priority ties.
pub fn resolve(mut bookings: Vec<Booking>, cards: &[Card], tunings: &TuningTable) -> Resolution {
    bookings.sort_by_key(|b| (b.start, b.schedule_id));

    let mut allocator = CardAllocator::new(cards, tunings);
    let mut resolution = Resolution::default();
    // Accepted bookings still holding a card, mirrored from the allocator.
    let mut active: Vec<(i32, Booking)> = Vec::new();
    let mut next_conflict_id = 1;

    for booking in bookings {
        allocator.expire(booking.start);
        active.retain(|(_, b)| b.end > booking.start);

        if let Some(card_id) = allocator.try_allocate(&booking) {
            resolution.assignments.entry(card_id).or_default().push(booking.clone());
            active.push((card_id, booking));
            continue;
        }

        match try_evict(&mut allocator, &active, &booking) {
            Some((card_id, evicted)) => {
                debug!(
                    schedule_id = booking.schedule_id,
                    card_id,
                    evicted = evicted.len(),
                    "placed booking after evicting lower-priority recordings"
                );
                for (victim_card, victim) in &evicted {
                    remove_assignment(&mut resolution.assignments, *victim_card, victim);
                    active.retain(|(_, b)| {
                        !(b.schedule_id == victim.schedule_id && b.start == victim.start)
                    });
                    resolution.conflicts.push(Conflict {
                        id: next_conflict_id,
                        schedule_id: victim.schedule_id,
                        conflicting_schedule_id: booking.schedule_id,
                        card_id: *victim_card,
                        channel_id: victim.channel_id,
                        program_start: victim.program_start,
                    });
                    next_conflict_id += 1;
                }
                resolution.assignments.entry(card_id).or_default().push(booking.clone());
                active.push((card_id, booking));
            }
            None => {
                // No overlapping recording to blame, e.g. the channel is
                // not receivable at all; record the winnerless sentinel.
                let (card_id, winner) = blocking_winner(&allocator, &active, &booking)
                    .map(|(card, b)| (card, b.schedule_id))
                    .unwrap_or((0, 0));
                resolution.conflicts.push(Conflict {
                    id: next_conflict_id,
                    schedule_id: booking.schedule_id,
                    conflicting_schedule_id: winner,
                    card_id,
                    channel_id: booking.channel_id,
                    program_start: booking.program_start,
                });
                next_conflict_id += 1;
            }
        }
    }

    resolution
}

/// Evicts strictly lower-priority active recordings until `booking` fits.
/// Victims leave in ascending priority order, later schedules first, and
/// released victims that turn out to fit alongside the new booking are
/// re-seated. Returns `None` (allocator rolled back) when even a full
/// eviction would not free a usable card.
fn try_evict(
    allocator: &mut CardAllocator<'_>,
    active: &[(i32, Booking)],
    booking: &Booking,
) -> Option<(i32, Vec<(i32, Booking)>)> {
    let usable = allocator.usable_cards(booking.channel_id);
    let mut victims: Vec<(i32, Booking)> = active
        .iter()
        .filter(|(card, b)| usable.contains(card) && b.priority < booking.priority)
        .cloned()
        .collect();
    if victims.is_empty() {
        return None;
    }
    victims.sort_by(|a, b| {
        a.1.priority
            .cmp(&b.1.priority)
            .then(b.1.schedule_id.cmp(&a.1.schedule_id))
    });

    let snapshot = allocator.snapshot();
    let mut released: Vec<(i32, Booking)> = Vec::new();
    let mut placed = None;
    for victim in victims {
        allocator.release(victim.1.schedule_id);
        released.push(victim);
        if let Some(card_id) = allocator.try_allocate(booking) {
            placed = Some(card_id);
            break;
        }
    }

    let Some(card_id) = placed else {
        allocator.restore(snapshot);
        return None;
    };

    // Victims released along the way may still fit next to the new booking.
    let mut evicted = Vec::new();
    for (victim_card, victim) in released {
        match allocator.try_allocate(&victim) {
            Some(seat) if seat == victim_card => {}
            Some(_) | None => {
                // Re-seating on a different card would desync the mirror;
                // treat it as an eviction and let the next pass rebuild.
                allocator.release(victim.schedule_id);
                evicted.push((victim_card, victim));
            }
        }
    }

    Some((card_id, evicted))
}

/// The active recording `booking` lost against: the first overlapping
/// booking, in card preference order, on a card that could have served it.
fn blocking_winner<'a>(
    allocator: &CardAllocator<'_>,
    active: &'a [(i32, Booking)],
    booking: &Booking,
) -> Option<(i32, &'a Booking)> {
    for card_id in allocator.usable_cards(booking.channel_id) {
        let mut on_card: Vec<&Booking> = active
            .iter()
            .filter(|(card, b)| *card == card_id && b.overlaps(booking))
            .map(|(_, b)| b)
            .collect();
        on_card.sort_by_key(|b| (b.start, b.schedule_id));
        if let Some(winner) = on_card.first() {
            return Some((card_id, winner));
        }
    }
    None
}

fn remove_assignment(assignments: &mut HashMap<i32, Vec<Booking>>, card_id: i32, victim: &Booking) {
    if let Some(entries) = assignments.get_mut(&card_id) {
        if let Some(pos) = entries
            .iter()
            .position(|b| b.schedule_id == victim.schedule_id && b.start == victim.start)
        {
            entries.remove(pos);
        }
        if entries.is_empty() {
            assignments.remove(&card_id);
        }
    }
}
