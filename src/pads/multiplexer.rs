//! Player mode tracking and slot dispatch
//!
//! Every poll the decoder says how many pads the bus currently carries. The
//! multiplexer compares that with the player mode of the previous poll and
//! zeroes the slots that dropped out, so a consumer never keeps a button
//! "held" on a pad that disappeared together with a FourScore.

use super::decoder::Decoded;
use super::types::{Axis, Button, PadKind, PadReading, PadState};
use crate::sink::InputSink;
use tracing::{debug, info};

/// Number of slots currently considered live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerMode(usize);

impl PlayerMode {
    pub fn new(players: usize) -> Self {
        Self(players)
    }

    pub fn current(&self) -> usize {
        self.0
    }

    /// Move to `target` players and return the slots that must be cleared,
    /// highest index first
    ///
    /// Growing never clears anything: the new slots were not live before and
    /// hold nothing stale.
    pub fn reconcile(&mut self, target: usize) -> Vec<usize> {
        let previous = self.0;
        self.0 = target;
        (target..previous).rev().collect()
    }
}

/// One logical pad as seen by the input sink
#[derive(Debug, Clone)]
pub struct DeviceSlot {
    index: usize,
    active: bool,
    kind: Option<PadKind>,
    last: PadState,
}

impl DeviceSlot {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            active: false,
            kind: None,
            last: PadState::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Pad type seen during the last dispatch, None once cleared
    pub fn kind(&self) -> Option<PadKind> {
        self.kind
    }

    /// State the sink was last given
    pub fn last_state(&self) -> PadState {
        self.last
    }

    /// Report a fresh reading and sync
    pub fn dispatch<S: InputSink + ?Sized>(&mut self, sink: &mut S, reading: &PadReading) {
        if self.kind != Some(reading.kind) {
            debug!("Slot {} now decodes as {:?}", self.index, reading.kind);
        }

        for (button, pressed) in &reading.buttons {
            sink.report_button(self.index, *button, *pressed);
            self.last.buttons.set(*button, *pressed);
        }
        for axis in [Axis::Horizontal, Axis::Vertical] {
            let value = reading.axis(axis);
            sink.report_axis(self.index, axis, value);
            self.last.set_axis(axis, value);
        }
        sink.sync(self.index);

        self.active = true;
        self.kind = Some(reading.kind);
    }

    /// Report every button released and both axes centered, then sync
    ///
    /// Always emits the full zero state, so clearing twice is identical to
    /// clearing once.
    pub fn clear<S: InputSink + ?Sized>(&mut self, sink: &mut S) {
        for button in Button::ALL {
            sink.report_button(self.index, button, false);
        }
        sink.report_axis(self.index, Axis::Horizontal, 0);
        sink.report_axis(self.index, Axis::Vertical, 0);
        sink.sync(self.index);

        self.last = PadState::default();
        self.active = false;
        self.kind = None;
    }
}

/// Slots plus the player mode they are reconciled against
#[derive(Debug, Clone)]
pub struct Multiplexer {
    slots: Vec<DeviceSlot>,
    mode: PlayerMode,
}

impl Multiplexer {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: (0..slot_count).map(DeviceSlot::new).collect(),
            mode: PlayerMode::default(),
        }
    }

    pub fn slots(&self) -> &[DeviceSlot] {
        &self.slots
    }

    pub fn player_mode(&self) -> usize {
        self.mode.current()
    }

    #[cfg(test)]
    fn set_player_mode(&mut self, players: usize) {
        self.mode = PlayerMode::new(players.min(self.slots.len()));
    }

    /// Dispatch every decoded reading, then reconcile the player mode and
    /// clear the slots that dropped out. Returns the cleared slots.
    pub fn apply<S: InputSink + ?Sized>(&mut self, decoded: &Decoded, sink: &mut S) -> Vec<usize> {
        for reading in &decoded.readings {
            if let Some(slot) = self.slots.get_mut(reading.slot) {
                slot.dispatch(sink, reading);
            }
        }

        let previous = self.mode.current();
        let target = decoded.target_players().min(self.slots.len());
        let cleared = self.mode.reconcile(target);

        if previous != target {
            info!(
                "Player mode {} -> {} ({:?}), clearing {:?}",
                previous, target, decoded.mode, cleared
            );
        }

        for index in &cleared {
            if let Some(slot) = self.slots.get_mut(*index) {
                slot.clear(sink);
            }
        }

        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pads::decoder::BusMode;
    use crate::sink::{RecordedEvent, RecordingSink};

    fn reading(slot: usize, kind: PadKind) -> PadReading {
        PadReading {
            slot,
            kind,
            buttons: vec![(Button::A, true), (Button::B, false)],
            horizontal: 1,
            vertical: -1,
        }
    }

    fn decoded(mode: BusMode, slots: usize) -> Decoded {
        let kind = match mode {
            BusMode::FourScore => PadKind::FourScore,
            BusMode::Multiplexed => PadKind::Nes,
        };
        Decoded {
            mode,
            readings: (0..slots).map(|s| reading(s, kind)).collect(),
        }
    }

    fn zero_events(slot: usize) -> Vec<RecordedEvent> {
        let mut events: Vec<RecordedEvent> = Button::ALL
            .iter()
            .map(|b| RecordedEvent::Button(slot, *b, false))
            .collect();
        events.push(RecordedEvent::Axis(slot, Axis::Horizontal, 0));
        events.push(RecordedEvent::Axis(slot, Axis::Vertical, 0));
        events.push(RecordedEvent::Sync(slot));
        events
    }

    #[test]
    fn reconcile_grows_without_clearing() {
        let mut mode = PlayerMode::new(2);
        assert!(mode.reconcile(4).is_empty());
        assert_eq!(mode.current(), 4);
    }

    #[test]
    fn reconcile_shrinks_trailing_slots_first() {
        let mut mode = PlayerMode::new(5);
        assert_eq!(mode.reconcile(3), vec![4, 3]);
        assert_eq!(mode.current(), 3);
        assert!(mode.reconcile(3).is_empty());
    }

    #[test]
    fn fourscore_above_four_clears_one_slot() {
        let mut mode = PlayerMode::new(5);
        assert_eq!(mode.reconcile(4), vec![4]);
    }

    #[test]
    fn shrink_dispatches_zero_state_to_dropped_slots() {
        let mut mux = Multiplexer::new(5);
        let mut sink = RecordingSink::new();
        mux.set_player_mode(5);

        let cleared = mux.apply(&decoded(BusMode::Multiplexed, 3), &mut sink);
        assert_eq!(cleared, vec![4, 3]);
        assert_eq!(mux.player_mode(), 3);

        assert_eq!(sink.events_for(4), zero_events(4));
        assert_eq!(sink.events_for(3), zero_events(3));
        assert!(!mux.slots()[3].is_active());
        assert!(mux.slots()[2].is_active());
        assert!(mux.slots()[4].last_state().is_neutral());
    }

    #[test]
    fn clear_is_idempotent() {
        let mut slot = DeviceSlot::new(1);
        let mut sink = RecordingSink::new();
        slot.dispatch(&mut sink, &reading(1, PadKind::Snes));

        sink.take_events();
        slot.clear(&mut sink);
        let first = sink.take_events();
        slot.clear(&mut sink);
        let second = sink.take_events();

        assert_eq!(first, zero_events(1));
        assert_eq!(first, second);
        assert_eq!(slot.kind(), None);
    }

    #[test]
    fn dispatch_tracks_last_state() {
        let mut slot = DeviceSlot::new(0);
        let mut sink = RecordingSink::new();
        slot.dispatch(&mut sink, &reading(0, PadKind::Nes));

        let state = slot.last_state();
        assert!(state.buttons.contains(Button::A));
        assert!(!state.buttons.contains(Button::B));
        assert_eq!((state.horizontal, state.vertical), (1, -1));
        assert_eq!(slot.kind(), Some(PadKind::Nes));
        assert_eq!(sink.events_for(0).last(), Some(&RecordedEvent::Sync(0)));
    }

    #[test]
    fn fourscore_unplugged_clears_extra_players() {
        let mut mux = Multiplexer::new(4);
        let mut sink = RecordingSink::new();

        assert!(mux.apply(&decoded(BusMode::FourScore, 4), &mut sink).is_empty());
        assert_eq!(mux.player_mode(), 4);

        let cleared = mux.apply(&decoded(BusMode::Multiplexed, 2), &mut sink);
        assert_eq!(cleared, vec![3, 2]);
        assert_eq!(mux.player_mode(), 2);
    }
}
