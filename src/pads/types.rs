use crate::gpio::PinMask;
use serde::{Deserialize, Serialize};

/// Number of clock cycles captured per poll
pub const FRAME_LEN: usize = 24;

/// Most logical pads the bus can carry (five data lines)
pub const MAX_SLOTS: usize = 5;

/// Pads served by a FourScore adapter
pub const FOURSCORE_PLAYERS: usize = 4;

/// One capture of the bus, sample `i` taken during clock cycle `i`
pub type Frame = [PinMask; FRAME_LEN];

// Button labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    A,
    B,
    X,
    Y,
    Select,
    Start,
    L,
    R,
}

impl Button {
    /// Every label a pad slot exposes, in the order a clear reports them
    pub const ALL: [Button; 8] = [
        Button::B,
        Button::Y,
        Button::Select,
        Button::Start,
        Button::A,
        Button::X,
        Button::L,
        Button::R,
    ];

    fn bit(self) -> u8 {
        match self {
            Button::A => 1 << 0,
            Button::B => 1 << 1,
            Button::X => 1 << 2,
            Button::Y => 1 << 3,
            Button::Select => 1 << 4,
            Button::Start => 1 << 5,
            Button::L => 1 << 6,
            Button::R => 1 << 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// What kind of pad a slot was decoded as during the last poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PadKind {
    Nes,
    Snes,
    /// NES pad routed through a FourScore adapter
    FourScore,
}

/// Set of pressed buttons
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ButtonSet(u8);

impl ButtonSet {
    pub fn contains(&self, button: Button) -> bool {
        self.0 & button.bit() != 0
    }

    pub fn set(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.0 |= button.bit();
        } else {
            self.0 &= !button.bit();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn pressed(&self) -> impl Iterator<Item = Button> + '_ {
        Button::ALL.into_iter().filter(|b| self.contains(*b))
    }
}

/// Button and axis state as last seen by the input sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadState {
    pub buttons: ButtonSet,
    pub horizontal: i8,
    pub vertical: i8,
}

impl PadState {
    pub fn is_neutral(&self) -> bool {
        self.buttons.is_empty() && self.horizontal == 0 && self.vertical == 0
    }

    pub fn axis(&self, axis: Axis) -> i8 {
        match axis {
            Axis::Horizontal => self.horizontal,
            Axis::Vertical => self.vertical,
        }
    }

    pub fn set_axis(&mut self, axis: Axis, value: i8) {
        match axis {
            Axis::Horizontal => self.horizontal = value,
            Axis::Vertical => self.vertical = value,
        }
    }
}

/// Decoded reading for one slot, in dispatch order
///
/// `buttons` lists exactly the labels to report this poll. Labels missing
/// from the list are left untouched at the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadReading {
    pub slot: usize,
    pub kind: PadKind,
    pub buttons: Vec<(Button, bool)>,
    pub horizontal: i8,
    pub vertical: i8,
}

impl PadReading {
    pub fn axis(&self, axis: Axis) -> i8 {
        match axis {
            Axis::Horizontal => self.horizontal,
            Axis::Vertical => self.vertical,
        }
    }
}
