//! Per-track buffer of scheduled note events.
//!
//! Two fixed-capacity runs: the current loop and the next one. Events are
//! kept sorted by tick and consumed through a cursor, so the tick path never
//! allocates. At wraparound the runs swap and the old one is cleared.

use core::ops::Range;
use heapless::Vec;

/// Events each run can hold.
pub const HORIZON_CAPACITY: usize = 512;

/// What a scheduled event does to its note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cue {
    /// First note-on
    Start,
    /// Note-off ahead of a retrigger
    RetriggerOff,
    /// Note-on of a retrigger
    RetriggerOn,
    /// Final note-off
    End,
}

impl Cue {
    pub const fn is_on(self) -> bool {
        matches!(self, Cue::Start | Cue::RetriggerOn)
    }
}

/// A note event waiting in the horizon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HorizonEvent {
    /// Loop-relative tick within the run holding the event
    pub tick: i32,
    /// For note-ons, ticks until the note's final note-off
    pub remaining: i32,
    /// Identifies all events of one scheduled note
    pub serial: u32,
    pub cue: Cue,
    pub pitch: u8,
    pub velocity: u8,
    /// Step that scheduled the note
    pub step: u8,
}

type Run = Vec<HorizonEvent, HORIZON_CAPACITY>;

#[derive(Clone, Debug, Default)]
pub struct Horizon {
    runs: [Run; 2],
    active: usize,
    /// Next unconsumed index in the active run.
    cursor: usize,
}

impl Horizon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events that fit into either run.
    pub fn room(&self) -> usize {
        self.runs
            .iter()
            .map(|run| run.capacity() - run.len())
            .min()
            .unwrap_or(0)
    }

    /// Insert into the current loop. Equal ticks keep insertion order.
    pub fn push_current(&mut self, event: HorizonEvent) -> Result<(), HorizonEvent> {
        let floor = self.cursor;
        insert_sorted(&mut self.runs[self.active], event, floor)
    }

    /// Insert into the next loop. Equal ticks keep insertion order.
    pub fn push_next(&mut self, event: HorizonEvent) -> Result<(), HorizonEvent> {
        insert_sorted(&mut self.runs[1 - self.active], event, 0)
    }

    /// Index range of current-loop events at or before `tick`.
    ///
    /// Advances the cursor past them; use `get` to read them.
    pub fn drain_until(&mut self, tick: i32) -> Range<usize> {
        let run = &self.runs[self.active];
        let start = self.cursor;
        while self.cursor < run.len() && run[self.cursor].tick <= tick {
            self.cursor += 1;
        }
        start..self.cursor
    }

    /// Get a current-loop event by index (for use with `drain_until` ranges).
    pub fn get(&self, index: usize) -> Option<&HorizonEvent> {
        self.runs[self.active].get(index)
    }

    /// Events not yet consumed, current loop first.
    pub fn pending(&self) -> impl Iterator<Item = &HorizonEvent> + '_ {
        self.runs[self.active][self.cursor..]
            .iter()
            .chain(self.runs[1 - self.active].iter())
    }

    /// Keep only the pending events matching the predicate.
    pub fn retain_pending<F: FnMut(&HorizonEvent) -> bool>(&mut self, mut f: F) {
        let run = &mut self.runs[self.active];
        let mut i = self.cursor;
        while i < run.len() {
            if f(&run[i]) {
                i += 1;
            } else {
                run.remove(i);
            }
        }
        self.runs[1 - self.active].retain(|e| f(e));
    }

    /// Move to the next loop: the next run becomes current, the old one is emptied.
    pub fn swap_runs(&mut self) {
        self.runs[self.active].clear();
        self.active = 1 - self.active;
        self.cursor = 0;
    }

    /// Pull current-loop events at or past `limit` back to `limit - 1`.
    ///
    /// Used after the loop shrinks. Order is preserved.
    pub fn clamp_current(&mut self, limit: i32) {
        for event in self.runs[self.active].iter_mut() {
            if event.tick >= limit {
                event.tick = limit - 1;
            }
        }
    }

    /// Drop every event and reset the cursor.
    pub fn clear(&mut self) {
        for run in &mut self.runs {
            run.clear();
        }
        self.cursor = 0;
    }

    /// Number of events not yet consumed.
    pub fn len(&self) -> usize {
        self.runs[self.active].len() - self.cursor + self.runs[1 - self.active].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn insert_sorted(run: &mut Run, event: HorizonEvent, floor: usize) -> Result<(), HorizonEvent> {
    // after every event with tick <= event.tick, never behind the cursor
    let pos = run.partition_point(|e| e.tick <= event.tick).max(floor);
    run.insert(pos, event)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(tick: i32, cue: Cue, serial: u32) -> HorizonEvent {
        HorizonEvent {
            tick,
            remaining: 0,
            serial,
            cue,
            pitch: 60,
            velocity: 100,
            step: 0,
        }
    }

    #[test]
    fn events_sorted_by_tick() {
        let mut h = Horizon::new();
        h.push_current(ev(10, Cue::End, 0)).unwrap();
        h.push_current(ev(0, Cue::Start, 0)).unwrap();
        h.push_current(ev(5, Cue::Start, 1)).unwrap();

        let range = h.drain_until(100);
        let ticks: std::vec::Vec<i32> = range.map(|i| h.get(i).unwrap().tick).collect();
        assert_eq!(ticks, [0, 5, 10]);
    }

    #[test]
    fn equal_ticks_keep_insertion_order() {
        let mut h = Horizon::new();
        h.push_current(ev(24, Cue::End, 0)).unwrap();
        h.push_current(ev(24, Cue::Start, 1)).unwrap();
        h.push_current(ev(24, Cue::RetriggerOff, 2)).unwrap();

        let range = h.drain_until(24);
        let serials: std::vec::Vec<u32> = range.map(|i| h.get(i).unwrap().serial).collect();
        assert_eq!(serials, [0, 1, 2]);
    }

    #[test]
    fn drain_until_advances_cursor() {
        let mut h = Horizon::new();
        h.push_current(ev(3, Cue::Start, 0)).unwrap();
        h.push_current(ev(7, Cue::End, 0)).unwrap();

        assert_eq!(h.drain_until(2), 0..0);
        assert_eq!(h.drain_until(3), 0..1);
        assert_eq!(h.drain_until(6), 1..1);
        assert_eq!(h.len(), 1);
        assert_eq!(h.drain_until(7), 1..2);
        assert!(h.is_empty());
    }

    #[test]
    fn insert_never_lands_behind_cursor() {
        let mut h = Horizon::new();
        h.push_current(ev(5, Cue::Start, 0)).unwrap();
        h.drain_until(5);
        // same tick as an already consumed event
        h.push_current(ev(5, Cue::End, 0)).unwrap();
        assert_eq!(h.drain_until(5), 1..2);
    }

    #[test]
    fn next_run_becomes_current_on_swap() {
        let mut h = Horizon::new();
        h.push_current(ev(0, Cue::Start, 0)).unwrap();
        h.push_next(ev(-7, Cue::End, 0)).unwrap();
        assert_eq!(h.drain_until(-7), 0..0);

        h.drain_until(100);
        h.swap_runs();
        let range = h.drain_until(-7);
        assert_eq!(range, 0..1);
        assert_eq!(h.get(0).unwrap().cue, Cue::End);
        assert!(h.is_empty());
    }

    #[test]
    fn retain_pending_skips_consumed_events() {
        let mut h = Horizon::new();
        h.push_current(ev(0, Cue::Start, 1)).unwrap();
        h.push_current(ev(4, Cue::End, 1)).unwrap();
        h.push_current(ev(8, Cue::Start, 2)).unwrap();
        h.push_next(ev(-2, Cue::End, 2)).unwrap();
        h.drain_until(0);

        h.retain_pending(|e| e.serial != 2);
        assert_eq!(h.len(), 1);
        assert!(h.pending().all(|e| e.serial == 1));
        // consumed event still readable
        assert_eq!(h.get(0).unwrap().serial, 1);
    }

    #[test]
    fn clamp_pulls_late_events_in() {
        let mut h = Horizon::new();
        h.push_current(ev(10, Cue::RetriggerOff, 0)).unwrap();
        h.push_current(ev(10, Cue::RetriggerOn, 0)).unwrap();
        h.push_current(ev(50, Cue::End, 0)).unwrap();
        h.clamp_current(20);

        let range = h.drain_until(19);
        let cues: std::vec::Vec<(i32, Cue)> = range
            .map(|i| h.get(i).map(|e| (e.tick, e.cue)).unwrap())
            .collect();
        assert_eq!(
            cues,
            [(10, Cue::RetriggerOff), (10, Cue::RetriggerOn), (19, Cue::End)]
        );
    }

    #[test]
    fn capacity_is_checked_up_front() {
        let mut h = Horizon::new();
        for i in 0..HORIZON_CAPACITY - 1 {
            h.push_current(ev(i as i32, Cue::Start, i as u32)).unwrap();
        }
        assert_eq!(h.room(), 1);
        h.push_current(ev(0, Cue::End, 0)).unwrap();
        assert_eq!(h.room(), 0);
        assert!(h.push_current(ev(0, Cue::End, 0)).is_err());

        // the fuller run decides
        h.swap_runs();
        h.push_next(ev(0, Cue::Start, 1)).unwrap();
        assert_eq!(h.room(), HORIZON_CAPACITY - 1);
    }

    #[test]
    fn clear_resets() {
        let mut h = Horizon::new();
        h.push_current(ev(1, Cue::Start, 0)).unwrap();
        h.push_next(ev(1, Cue::End, 0)).unwrap();
        h.drain_until(1);
        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.drain_until(100), 0..0);
    }
}
