//! Frame decoding
//!
//! Turns one captured [`Frame`] into per-slot readings. All bit positions
//! live in the tables below; the decoding functions only walk them.
//!
//! ```text
//! sample:  0  1  2      3     4  5    6    7     8  9  10 11  ...  16
//! SNES:    B  Y  Select Start Up Down Left Right A  X  L  R        marker
//! NES:     A  B  Select Start Up Down Left Right
//! ```
//!
//! Behind a FourScore the first two data lines each carry two pads, the
//! second one shifted by 8 samples, followed by the adapter signature in
//! samples 16-23.

use super::types::{Button, Frame, PadKind, PadReading, FOURSCORE_PLAYERS};
use crate::gpio::PinMask;

/// Sample that is driven by SNES pads only
pub const SNES_MARKER: usize = 16;

/// SNES buttons, in shift order
pub const SNES_BUTTONS: [(usize, Button); 8] = [
    (0, Button::B),
    (1, Button::Y),
    (2, Button::Select),
    (3, Button::Start),
    (8, Button::A),
    (9, Button::X),
    (10, Button::L),
    (11, Button::R),
];

/// NES buttons, in shift order
pub const NES_BUTTONS: [(usize, Button); 4] = [
    (0, Button::A),
    (1, Button::B),
    (2, Button::Select),
    (3, Button::Start),
];

/// Labels a NES pad lacks; reported released so nothing sticks after a
/// SNES pad is swapped for a NES pad
pub const NES_RELEASED: [Button; 4] = [Button::X, Button::Y, Button::L, Button::R];

/// Direction pad samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DpadIndices {
    pub up: usize,
    pub down: usize,
    pub left: usize,
    pub right: usize,
}

pub const DPAD: DpadIndices = DpadIndices {
    up: 4,
    down: 5,
    left: 6,
    right: 7,
};

/// Data line and sample offset a FourScore player is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourScoreRoute {
    pub data_line: usize,
    pub offset: usize,
}

/// Players 1/3 share data line 1, players 2/4 share data line 2
pub const FOURSCORE_ROUTES: [FourScoreRoute; FOURSCORE_PLAYERS] = [
    FourScoreRoute {
        data_line: 0,
        offset: 0,
    },
    FourScoreRoute {
        data_line: 1,
        offset: 0,
    },
    FourScoreRoute {
        data_line: 0,
        offset: 8,
    },
    FourScoreRoute {
        data_line: 1,
        offset: 8,
    },
];

/// First sample of the adapter signature
pub const SIGNATURE_START: usize = 16;

/// Expected signature per data line, bit `k` is sample `SIGNATURE_START + k`
pub const FOURSCORE_SIGNATURE: [(usize, u8); 2] = [(0, 0b0000_1000), (1, 0b0000_0100)];

/// How the last frame was interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusMode {
    Multiplexed,
    FourScore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub mode: BusMode,
    pub readings: Vec<PadReading>,
}

impl Decoded {
    /// Player mode this frame asks for
    pub fn target_players(&self) -> usize {
        match self.mode {
            BusMode::FourScore => FOURSCORE_PLAYERS,
            BusMode::Multiplexed => self.readings.len(),
        }
    }
}

/// Decoder for one bus layout
#[derive(Debug, Clone)]
pub struct Decoder {
    data_lines: Vec<PinMask>,
    slots: usize,
}

impl Decoder {
    /// `data_lines` holds the pin mask of each data line in configuration
    /// order, `slots` the number of registered pad slots
    pub fn new(data_lines: Vec<PinMask>, slots: usize) -> Self {
        Self { data_lines, slots }
    }

    /// Decode one frame. Same frame and flag always give the same result.
    pub fn decode(&self, frame: &Frame, fourscore_enabled: bool) -> Decoded {
        if fourscore_enabled && self.slots >= FOURSCORE_PLAYERS && self.fourscore_present(frame) {
            Decoded {
                mode: BusMode::FourScore,
                readings: self.decode_fourscore(frame),
            }
        } else {
            Decoded {
                mode: BusMode::Multiplexed,
                readings: self.decode_multiplexed(frame),
            }
        }
    }

    /// Check samples 16-23 of the first two data lines for the adapter
    /// signature
    pub fn fourscore_present(&self, frame: &Frame) -> bool {
        FOURSCORE_SIGNATURE.iter().all(|(line, expected)| {
            let mask = self.line_mask(*line);
            signature_window(frame, mask) == *expected
        })
    }

    fn line_mask(&self, line: usize) -> PinMask {
        self.data_lines.get(line).copied().unwrap_or(0)
    }

    fn decode_multiplexed(&self, frame: &Frame) -> Vec<PadReading> {
        self.data_lines
            .iter()
            .enumerate()
            .map(|(slot, mask)| decode_pad(frame, slot, *mask))
            .collect()
    }

    fn decode_fourscore(&self, frame: &Frame) -> Vec<PadReading> {
        FOURSCORE_ROUTES
            .iter()
            .enumerate()
            .map(|(slot, route)| {
                let mask = self.line_mask(route.data_line);
                let buttons: Vec<(Button, bool)> = NES_BUTTONS
                    .iter()
                    .map(|(index, button)| (*button, level(frame, index + route.offset, mask)))
                    .collect();
                let (horizontal, vertical) = dpad_axes(frame, mask, route.offset);
                PadReading {
                    slot,
                    kind: PadKind::FourScore,
                    buttons,
                    horizontal,
                    vertical,
                }
            })
            .collect()
    }
}

/// Decode a pad sitting directly on data line `mask`
fn decode_pad(frame: &Frame, slot: usize, mask: PinMask) -> PadReading {
    let (kind, buttons) = if level(frame, SNES_MARKER, mask) {
        let buttons: Vec<(Button, bool)> = SNES_BUTTONS
            .iter()
            .map(|(index, button)| (*button, level(frame, *index, mask)))
            .collect();
        (PadKind::Snes, buttons)
    } else {
        let buttons: Vec<(Button, bool)> = NES_BUTTONS
            .iter()
            .map(|(index, button)| (*button, level(frame, *index, mask)))
            .chain(NES_RELEASED.iter().map(|button| (*button, false)))
            .collect();
        (PadKind::Nes, buttons)
    };

    let (horizontal, vertical) = dpad_axes(frame, mask, 0);
    PadReading {
        slot,
        kind,
        buttons,
        horizontal,
        vertical,
    }
}

fn level(frame: &Frame, index: usize, mask: PinMask) -> bool {
    frame[index] & mask != 0
}

/// Horizontal is right minus left, vertical is down minus up
fn dpad_axes(frame: &Frame, mask: PinMask, offset: usize) -> (i8, i8) {
    let axis = |negative: usize, positive: usize| {
        level(frame, positive + offset, mask) as i8 - level(frame, negative + offset, mask) as i8
    };
    (axis(DPAD.left, DPAD.right), axis(DPAD.up, DPAD.down))
}

fn signature_window(frame: &Frame, mask: PinMask) -> u8 {
    (0..8).fold(0, |window, k| {
        window | ((level(frame, SIGNATURE_START + k, mask) as u8) << k)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pads::types::{Axis, FRAME_LEN};

    const LINE_1: PinMask = 1 << 4;
    const LINE_2: PinMask = 1 << 7;
    const LINE_3: PinMask = 1 << 9;

    fn decoder(lines: &[PinMask], slots: usize) -> Decoder {
        Decoder::new(lines.to_vec(), slots)
    }

    fn fourscore_frame() -> Frame {
        let mut frame = [0; FRAME_LEN];
        frame[19] |= LINE_1;
        frame[18] |= LINE_2;
        frame
    }

    fn pressed(reading: &PadReading) -> Vec<Button> {
        reading
            .buttons
            .iter()
            .filter(|(_, down)| *down)
            .map(|(b, _)| *b)
            .collect()
    }

    #[test]
    fn signature_selects_fourscore() {
        let d = decoder(&[LINE_1, LINE_2], 4);
        let decoded = d.decode(&fourscore_frame(), true);
        assert_eq!(decoded.mode, BusMode::FourScore);
        assert_eq!(decoded.readings.len(), 4);
        assert!(decoded
            .readings
            .iter()
            .all(|r| r.kind == PadKind::FourScore && r.buttons.len() == 4));
    }

    #[test]
    fn any_signature_bit_flip_selects_plain_decoding() {
        let d = decoder(&[LINE_1, LINE_2], 4);
        for index in SIGNATURE_START..FRAME_LEN {
            for line in [LINE_1, LINE_2] {
                let mut frame = fourscore_frame();
                frame[index] ^= line;
                let decoded = d.decode(&frame, true);
                assert_eq!(
                    decoded.mode,
                    BusMode::Multiplexed,
                    "flip at sample {} line {:#x}",
                    index,
                    line
                );
            }
        }
    }

    #[test]
    fn signature_is_ignored_while_disabled() {
        let d = decoder(&[LINE_1, LINE_2], 4);
        assert_eq!(d.decode(&fourscore_frame(), false).mode, BusMode::Multiplexed);
    }

    #[test]
    fn signature_needs_four_slots() {
        let d = decoder(&[LINE_1, LINE_2], 2);
        assert_eq!(d.decode(&fourscore_frame(), true).mode, BusMode::Multiplexed);
    }

    #[test]
    fn single_data_line_never_matches_signature() {
        let d = decoder(&[LINE_1], 4);
        assert!(!d.fourscore_present(&fourscore_frame()));
    }

    #[test]
    fn snes_marker_decodes_all_eight_buttons() {
        let mut frame = [0; FRAME_LEN];
        frame[SNES_MARKER] |= LINE_1;
        frame[0] |= LINE_1; // B
        frame[8] |= LINE_1; // A
        frame[11] |= LINE_1; // R

        let decoded = decoder(&[LINE_1], 1).decode(&frame, false);
        let reading = &decoded.readings[0];
        assert_eq!(reading.kind, PadKind::Snes);
        assert_eq!(reading.buttons.len(), 8);
        let order: Vec<Button> = reading.buttons.iter().map(|(b, _)| *b).collect();
        assert_eq!(
            order,
            vec![
                Button::B,
                Button::Y,
                Button::Select,
                Button::Start,
                Button::A,
                Button::X,
                Button::L,
                Button::R
            ]
        );
        assert_eq!(pressed(reading), vec![Button::B, Button::A, Button::R]);
    }

    #[test]
    fn nes_pad_zeroes_snes_only_buttons() {
        let mut frame = [0; FRAME_LEN];
        frame[0] |= LINE_1; // A
        frame[3] |= LINE_1; // Start
        frame[8] |= LINE_1; // not a NES button
        frame[10] |= LINE_1;

        let decoded = decoder(&[LINE_1], 1).decode(&frame, false);
        let reading = &decoded.readings[0];
        assert_eq!(reading.kind, PadKind::Nes);
        assert_eq!(pressed(reading), vec![Button::A, Button::Start]);
        for button in NES_RELEASED {
            assert!(reading.buttons.contains(&(button, false)));
        }
        assert_eq!(reading.buttons.len(), 8);
    }

    #[test]
    fn axis_law() {
        let cases = [
            (false, false, 0),
            (false, true, 1),
            (true, false, -1),
            (true, true, 0),
        ];
        for (negative, positive, expected) in cases {
            let mut frame = [0; FRAME_LEN];
            if negative {
                frame[6] |= LINE_1;
                frame[4] |= LINE_1;
            }
            if positive {
                frame[7] |= LINE_1;
                frame[5] |= LINE_1;
            }
            let decoded = decoder(&[LINE_1], 1).decode(&frame, false);
            assert_eq!(decoded.readings[0].axis(Axis::Horizontal), expected);
            assert_eq!(decoded.readings[0].axis(Axis::Vertical), expected);
        }
    }

    #[test]
    fn lines_decode_independently() {
        let mut frame = [0; FRAME_LEN];
        frame[SNES_MARKER] |= LINE_2;
        frame[1] |= LINE_2; // Y on the SNES pad
        frame[1] |= LINE_3; // B on the NES pad
        frame[7] |= LINE_3;

        let decoded = decoder(&[LINE_1, LINE_2, LINE_3], 3).decode(&frame, false);
        let kinds: Vec<PadKind> = decoded.readings.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![PadKind::Nes, PadKind::Snes, PadKind::Nes]);
        assert!(pressed(&decoded.readings[0]).is_empty());
        assert_eq!(pressed(&decoded.readings[1]), vec![Button::Y]);
        assert_eq!(pressed(&decoded.readings[2]), vec![Button::B]);
        assert_eq!(decoded.readings[2].horizontal, 1);
        assert_eq!(decoded.target_players(), 3);
    }

    #[test]
    fn fourscore_routes_players() {
        let mut frame = fourscore_frame();
        frame[0] |= LINE_1; // player 1 A
        frame[1] |= LINE_2; // player 2 B
        frame[8 + 2] |= LINE_1; // player 3 Select
        frame[8 + 3] |= LINE_2; // player 4 Start
        frame[8 + 6] |= LINE_2; // player 4 left
        frame[8 + 5] |= LINE_1; // player 3 down

        let decoded = decoder(&[LINE_1, LINE_2, LINE_3], 4).decode(&frame, true);
        assert_eq!(decoded.target_players(), FOURSCORE_PLAYERS);
        let r = &decoded.readings;
        assert_eq!(pressed(&r[0]), vec![Button::A]);
        assert_eq!(pressed(&r[1]), vec![Button::B]);
        assert_eq!(pressed(&r[2]), vec![Button::Select]);
        assert_eq!(pressed(&r[3]), vec![Button::Start]);
        assert_eq!((r[3].horizontal, r[3].vertical), (-1, 0));
        assert_eq!((r[2].horizontal, r[2].vertical), (0, 1));
        assert_eq!((r[0].horizontal, r[0].vertical), (0, 0));
    }

    #[test]
    fn decode_is_deterministic() {
        let mut frame = fourscore_frame();
        for (i, sample) in frame.iter_mut().enumerate() {
            *sample ^= (i as PinMask * 0x9E37) & (LINE_1 | LINE_2 | LINE_3);
        }
        let d = decoder(&[LINE_1, LINE_2, LINE_3], 4);
        for enabled in [false, true] {
            assert_eq!(d.decode(&frame, enabled), d.decode(&frame, enabled));
        }
    }
}
