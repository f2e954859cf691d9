// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Settings-code codec: packs the four print-setting axes into one integer.
//
// Layout (decimal digits): `P D C L` where
//   L (units)     : 1 if landscape
//   C (tens)      : 1 if colour
//   D (hundreds)  : 1 if duplex (long edge)
//   P (thousands) : paper index into `PaperSize::ALL`

use crate::types::{ColorMode, DuplexMode, Orientation, PaperSize, PrintSettings};

const LANDSCAPE: u32 = 1;
const COLOR: u32 = 10;
const DUPLEX: u32 = 100;
const PAPER: u32 = 1000;

/// Decode a settings code.
///
/// Decoding is total: an out-of-range paper index yields A4 and any
/// non-canonical digits are folded by the successive div/mod steps.
pub fn decode(code: u32) -> PrintSettings {
    let paper_size = PaperSize::from_code_index(code / PAPER);
    let mut rest = code % PAPER;

    let duplex = if rest >= DUPLEX {
        DuplexMode::LongEdge
    } else {
        DuplexMode::Simplex
    };
    rest %= DUPLEX;

    let color_mode = if rest >= COLOR {
        ColorMode::Color
    } else {
        ColorMode::Monochrome
    };
    rest %= COLOR;

    let orientation = if rest % 2 == LANDSCAPE {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    };

    PrintSettings {
        orientation,
        color_mode,
        duplex,
        paper_size,
    }
}

/// Encode settings into a code. Short-edge duplex encodes as duplex.
pub fn encode(settings: &PrintSettings) -> u32 {
    let mut code = settings.paper_size.code_index() * PAPER;
    if settings.duplex.is_duplex() {
        code += DUPLEX;
    }
    if settings.is_color() {
        code += COLOR;
    }
    if settings.orientation == Orientation::Landscape {
        code += LANDSCAPE;
    }
    code
}
