//! CCITT fax decoding.
//!
//! ITU-T Recommendation T.4 - Group 3 facsimile (1-D and mixed 2-D coding)
//! ITU-T Recommendation T.6 - Group 4 facsimile (pure 2-D coding)
//!
//! The in-tree parser is the primary implementation. When it rejects a
//! stream the decoder retries with the other coding scheme (corrupt K
//! values are the dominant real-world failure) and finally hands the data
//! to the external `fax` library when the configuration allows, before
//! giving up and letting the facade fall back to raw samples.

use crate::codec::{BitReader, filters};
use crate::config::DecodeConfig;
use crate::error::{RasterError, Result};
use crate::image::convert;
use crate::image::params::ImageParams;
use crate::image::pixmap::{Pixmap, Transparency};
use crate::model::objects::Dict;
use once_cell::sync::Lazy;
use tracing::debug;

/// CCITT coding modes (T.4 §4.2.1.3).
#[derive(Clone, Copy, Debug, PartialEq)]
enum Mode {
    Vertical(i32),
    Horizontal,
    Pass,
    Uncompressed,
    Extension,
    Eofb,
}

/// Value stored in Huffman leaf nodes.
#[derive(Clone, Copy, Debug)]
enum HuffValue {
    /// Run length (terminating or make-up).
    Run(i32),
    Mode(Mode),
    /// Uncompressed-mode pixel pattern; a leading `T` marks a terminator
    /// carrying the next colour.
    Pattern(&'static str),
}

/// Huffman tree node: branch, leaf, or unassigned code space.
#[derive(Clone, Debug)]
enum HuffNode {
    Branch(Box<HuffNode>, Box<HuffNode>),
    Leaf(HuffValue),
    Empty,
}

impl HuffNode {
    fn add(&mut self, value: HuffValue, bits: &str) {
        let mut current = self;
        for (i, c) in bits.chars().enumerate() {
            let bit = c == '1';
            if let HuffNode::Empty = current {
                *current = HuffNode::Branch(Box::new(HuffNode::Empty), Box::new(HuffNode::Empty));
            }
            let HuffNode::Branch(left, right) = current else {
                panic!("conflicting CCITT Huffman codes");
            };
            let next: &mut HuffNode = if bit { right } else { left };
            if i == bits.len() - 1 {
                *next = HuffNode::Leaf(value);
                return;
            }
            current = next;
        }
    }

    fn build(codes: &[(&'static str, HuffValue)]) -> HuffNode {
        let mut root = HuffNode::Empty;
        for &(bits, value) in codes {
            root.add(value, bits);
        }
        root
    }
}

use HuffValue::{Mode as M, Pattern as P, Run as R};

#[rustfmt::skip]
const MODE_CODES: &[(&str, HuffValue)] = &[
    ("1",       M(Mode::Vertical(0))),
    ("011",     M(Mode::Vertical(1))),
    ("010",     M(Mode::Vertical(-1))),
    ("001",     M(Mode::Horizontal)),
    ("0001",    M(Mode::Pass)),
    ("000011",  M(Mode::Vertical(2))),
    ("000010",  M(Mode::Vertical(-2))),
    ("0000011", M(Mode::Vertical(3))),
    ("0000010", M(Mode::Vertical(-3))),
    ("0000001111", M(Mode::Uncompressed)),
    ("0000001000", M(Mode::Extension)),
    ("0000001001", M(Mode::Extension)),
    ("0000001010", M(Mode::Extension)),
    ("0000001011", M(Mode::Extension)),
    ("0000001100", M(Mode::Extension)),
    ("0000001101", M(Mode::Extension)),
    ("0000001110", M(Mode::Extension)),
    ("000000000001000000000001", M(Mode::Eofb)),
];

#[rustfmt::skip]
const WHITE_CODES: &[(&str, HuffValue)] = &[
    ("00110101", R(0)),   ("000111", R(1)),    ("0111", R(2)),      ("1000", R(3)),
    ("1011", R(4)),       ("1100", R(5)),      ("1110", R(6)),      ("1111", R(7)),
    ("10011", R(8)),      ("10100", R(9)),     ("00111", R(10)),    ("01000", R(11)),
    ("001000", R(12)),    ("000011", R(13)),   ("110100", R(14)),   ("110101", R(15)),
    ("101010", R(16)),    ("101011", R(17)),   ("0100111", R(18)),  ("0001100", R(19)),
    ("0001000", R(20)),   ("0010111", R(21)),  ("0000011", R(22)),  ("0000100", R(23)),
    ("0101000", R(24)),   ("0101011", R(25)),  ("0010011", R(26)),  ("0100100", R(27)),
    ("0011000", R(28)),   ("00000010", R(29)), ("00000011", R(30)), ("00011010", R(31)),
    ("00011011", R(32)),  ("00010010", R(33)), ("00010011", R(34)), ("00010100", R(35)),
    ("00010101", R(36)),  ("00010110", R(37)), ("00010111", R(38)), ("00101000", R(39)),
    ("00101001", R(40)),  ("00101010", R(41)), ("00101011", R(42)), ("00101100", R(43)),
    ("00101101", R(44)),  ("00000100", R(45)), ("00000101", R(46)), ("00001010", R(47)),
    ("00001011", R(48)),  ("01010010", R(49)), ("01010011", R(50)), ("01010100", R(51)),
    ("01010101", R(52)),  ("00100100", R(53)), ("00100101", R(54)), ("01011000", R(55)),
    ("01011001", R(56)),  ("01011010", R(57)), ("01011011", R(58)), ("01001010", R(59)),
    ("01001011", R(60)),  ("00110010", R(61)), ("00110011", R(62)), ("00110100", R(63)),
    // Make-up codes
    ("11011", R(64)),     ("10010", R(128)),   ("010111", R(192)),  ("0110111", R(256)),
    ("00110110", R(320)), ("00110111", R(384)), ("01100100", R(448)), ("01100101", R(512)),
    ("01101000", R(576)), ("01100111", R(640)), ("011001100", R(704)), ("011001101", R(768)),
    ("011010010", R(832)), ("011010011", R(896)), ("011010100", R(960)), ("011010101", R(1024)),
    ("011010110", R(1088)), ("011010111", R(1152)), ("011011000", R(1216)), ("011011001", R(1280)),
    ("011011010", R(1344)), ("011011011", R(1408)), ("010011000", R(1472)), ("010011001", R(1536)),
    ("010011010", R(1600)), ("011000", R(1664)), ("010011011", R(1728)),
];

#[rustfmt::skip]
const BLACK_CODES: &[(&str, HuffValue)] = &[
    ("0000110111", R(0)),  ("010", R(1)),        ("11", R(2)),         ("10", R(3)),
    ("011", R(4)),         ("0011", R(5)),       ("0010", R(6)),       ("00011", R(7)),
    ("000101", R(8)),      ("000100", R(9)),     ("0000100", R(10)),   ("0000101", R(11)),
    ("0000111", R(12)),    ("00000100", R(13)),  ("00000111", R(14)),  ("000011000", R(15)),
    ("0000010111", R(16)), ("0000011000", R(17)), ("0000001000", R(18)), ("00001100111", R(19)),
    ("00001101000", R(20)), ("00001101100", R(21)), ("00000110111", R(22)), ("00000101000", R(23)),
    ("00000010111", R(24)), ("00000011000", R(25)), ("000011001010", R(26)), ("000011001011", R(27)),
    ("000011001100", R(28)), ("000011001101", R(29)), ("000001101000", R(30)), ("000001101001", R(31)),
    ("000001101010", R(32)), ("000001101011", R(33)), ("000011010010", R(34)), ("000011010011", R(35)),
    ("000011010100", R(36)), ("000011010101", R(37)), ("000011010110", R(38)), ("000011010111", R(39)),
    ("000001101100", R(40)), ("000001101101", R(41)), ("000011011010", R(42)), ("000011011011", R(43)),
    ("000001010100", R(44)), ("000001010101", R(45)), ("000001010110", R(46)), ("000001010111", R(47)),
    ("000001100100", R(48)), ("000001100101", R(49)), ("000001010010", R(50)), ("000001010011", R(51)),
    ("000000100100", R(52)), ("000000110111", R(53)), ("000000111000", R(54)), ("000000100111", R(55)),
    ("000000101000", R(56)), ("000001011000", R(57)), ("000001011001", R(58)), ("000000101011", R(59)),
    ("000000101100", R(60)), ("000001011010", R(61)), ("000001100110", R(62)), ("000001100111", R(63)),
    // Make-up codes
    ("0000001111", R(64)),   ("000011001000", R(128)), ("000011001001", R(192)),
    ("000001011011", R(256)), ("000000110011", R(320)), ("000000110100", R(384)),
    ("000000110101", R(448)), ("0000001101100", R(512)), ("0000001101101", R(576)),
    ("0000001001010", R(640)), ("0000001001011", R(704)), ("0000001001100", R(768)),
    ("0000001001101", R(832)), ("0000001110010", R(896)), ("0000001110011", R(960)),
    ("0000001110100", R(1024)), ("0000001110101", R(1088)), ("0000001110110", R(1152)),
    ("0000001110111", R(1216)), ("0000001010010", R(1280)), ("0000001010011", R(1344)),
    ("0000001010100", R(1408)), ("0000001010101", R(1472)), ("0000001011010", R(1536)),
    ("0000001011011", R(1600)), ("0000001100100", R(1664)), ("0000001100101", R(1728)),
];

/// Extended make-up codes shared by both colours (T.4 Table 3).
#[rustfmt::skip]
const SHARED_MAKEUP_CODES: &[(&str, HuffValue)] = &[
    ("00000001000", R(1792)),  ("00000001100", R(1856)),  ("00000001101", R(1920)),
    ("000000010010", R(1984)), ("000000010011", R(2048)), ("000000010100", R(2112)),
    ("000000010101", R(2176)), ("000000010110", R(2240)), ("000000010111", R(2304)),
    ("000000011100", R(2368)), ("000000011101", R(2432)), ("000000011110", R(2496)),
    ("000000011111", R(2560)),
];

#[rustfmt::skip]
const UNCOMPRESSED_CODES: &[(&str, HuffValue)] = &[
    ("1", P("1")),           ("01", P("01")),         ("001", P("001")),
    ("0001", P("0001")),     ("00001", P("00001")),   ("000001", P("00000")),
    ("00000011", P("T00")),  ("00000010", P("T10")),  ("000000011", P("T000")),
    ("000000010", P("T100")), ("0000000011", P("T0000")), ("0000000010", P("T1000")),
    ("00000000011", P("T00000")), ("00000000010", P("T10000")),
];

// Static Huffman trees, built once and shared by all decoder instances.
static MODE_TREE: Lazy<HuffNode> = Lazy::new(|| HuffNode::build(MODE_CODES));
static WHITE_TREE: Lazy<HuffNode> = Lazy::new(|| {
    let mut root = HuffNode::build(WHITE_CODES);
    for &(bits, value) in SHARED_MAKEUP_CODES {
        root.add(value, bits);
    }
    root
});
static BLACK_TREE: Lazy<HuffNode> = Lazy::new(|| {
    let mut root = HuffNode::build(BLACK_CODES);
    for &(bits, value) in SHARED_MAKEUP_CODES {
        root.add(value, bits);
    }
    root
});
static UNCOMPRESSED_TREE: Lazy<HuffNode> = Lazy::new(|| HuffNode::build(UNCOMPRESSED_CODES));

/// Walk a Huffman tree off the bit reader until a leaf is hit.
fn read_code<'t>(reader: &mut BitReader, tree: &'t HuffNode) -> Option<&'t HuffValue> {
    let mut node = tree;
    loop {
        let bit = reader.read_bit()?;
        match node {
            HuffNode::Branch(left, right) => {
                node = if bit { &**right } else { &**left };
                match node {
                    HuffNode::Leaf(value) => return Some(value),
                    HuffNode::Empty => return None,
                    HuffNode::Branch(..) => {}
                }
            }
            _ => return None,
        }
    }
}

/// Read one complete run length: zero or more make-up codes followed by a
/// terminating code (< 64).
fn read_run(reader: &mut BitReader, white: bool) -> Option<usize> {
    let tree: &HuffNode = if white { &WHITE_TREE } else { &BLACK_TREE };
    let mut total = 0usize;
    loop {
        match read_code(reader, tree)? {
            HuffValue::Run(n) => {
                total += *n as usize;
                if *n < 64 {
                    return Some(total);
                }
            }
            _ => return None,
        }
    }
}

/// Per-line coding state shared by the 1-D and 2-D decoders.
///
/// Pixels are kept as `i8` with 1 = white, 0 = black, matching the coding
/// model where a line starts with an imaginary white pixel.
pub struct LineCoder {
    width: usize,
    curline: Vec<i8>,
    refline: Vec<i8>,
    curpos: isize,
    color: i8,
}

impl LineCoder {
    pub fn new(width: usize) -> Self {
        LineCoder {
            width,
            curline: vec![1; width],
            refline: vec![1; width],
            curpos: -1,
            color: 1,
        }
    }

    pub fn set_curline(&mut self, line: Vec<i8>) {
        self.curline = line;
    }

    /// Move the just-coded line into the reference position and start a
    /// fresh line.
    pub fn reset_line(&mut self) {
        self.refline = self.curline.clone();
        self.curline = vec![1; self.width];
        self.curpos = -1;
        self.color = 1;
    }

    pub fn curpos(&self) -> isize {
        self.curpos
    }

    pub fn color(&self) -> i8 {
        self.color
    }

    /// Coded prefix of the current line, for inspection.
    pub fn get_bits(&self) -> String {
        self.curline[..self.curpos.max(0) as usize]
            .iter()
            .map(|b| char::from(b'0' + *b as u8))
            .collect()
    }

    fn line_done(&self) -> bool {
        self.curpos >= self.width as isize
    }

    /// Find b1: the first changing element on the reference line to the
    /// right of a0 with the opposite colour of a0.
    fn find_b1(&self) -> usize {
        let mut x1 = (self.curpos + 1) as usize;
        loop {
            if x1 == 0 {
                if self.color == 1 && self.refline[x1] != self.color {
                    break;
                }
            } else if x1 >= self.refline.len()
                || (self.refline[x1 - 1] == self.color && self.refline[x1] != self.color)
            {
                break;
            }
            x1 += 1;
        }
        x1
    }

    /// Vertical mode: a1 is coded relative to b1.
    pub fn do_vertical(&mut self, dx: i32) {
        let x1 = (self.find_b1() as i32 + dx).max(0) as usize;

        let x0 = 0.max(self.curpos) as usize;
        let x1 = x1.min(self.width);

        if x1 < x0 {
            for x in x1..x0 {
                self.curline[x] = self.color;
            }
        } else {
            for x in x0..x1 {
                self.curline[x] = self.color;
            }
        }

        self.curpos = x1 as isize;
        self.color = 1 - self.color;
    }

    /// Pass mode: skip to b2, keeping the current colour.
    pub fn do_pass(&mut self) {
        let mut x1 = self.find_b1();
        // Find b2, the next changing element after b1.
        loop {
            if x1 == 0 {
                if self.color == 0 && self.refline[x1] == self.color {
                    break;
                }
            } else if x1 >= self.refline.len()
                || (self.refline[x1 - 1] != self.color && self.refline[x1] == self.color)
            {
                break;
            }
            x1 += 1;
        }

        let start = self.curpos.max(0) as usize;
        for x in start..x1.min(self.curline.len()) {
            self.curline[x] = self.color;
        }
        self.curpos = x1 as isize;
    }

    /// Horizontal mode: two explicit runs, current colour then opposite.
    pub fn do_horizontal(&mut self, n1: usize, n2: usize) {
        if self.curpos < 0 {
            self.curpos = 0;
        }
        let mut x = self.curpos as usize;
        for _ in 0..n1 {
            if x >= self.curline.len() {
                break;
            }
            self.curline[x] = self.color;
            x += 1;
        }
        for _ in 0..n2 {
            if x >= self.curline.len() {
                break;
            }
            self.curline[x] = 1 - self.color;
            x += 1;
        }
        self.curpos = x as isize;
    }

    /// Write literal pixels from uncompressed mode.
    fn put_pattern(&mut self, bits: &str) {
        if self.curpos < 0 {
            self.curpos = 0;
        }
        for c in bits.chars() {
            let pos = self.curpos as usize;
            if pos < self.curline.len() {
                self.curline[pos] = (c == '1') as i8;
            }
            self.curpos += 1;
        }
    }
}

/// Outcome of decoding one coded line.
#[derive(Debug, PartialEq)]
enum LineStatus {
    Done,
    EndOfData,
    Eofb,
    Invalid,
}

/// CCITT decoding parameters from the filter's DecodeParms.
#[derive(Debug, Clone)]
pub struct CcittParams {
    /// Coding scheme selector: < 0 pure 2-D (G4), 0 pure 1-D (G3),
    /// > 0 mixed 1-D/2-D (G3).
    pub k: i32,
    pub columns: usize,
    pub rows: Option<usize>,
    pub encoded_byte_align: bool,
    pub black_is_1: bool,
}

impl CcittParams {
    /// Extract parameters, defaulting per the filter specification.
    pub fn from_dict(dict: Option<&Dict>, img: &ImageParams) -> Self {
        let int = |key: &str| dict.and_then(|d| d.get(key)).and_then(|v| v.as_int().ok());
        let flag = |key: &str| {
            dict.and_then(|d| d.get(key))
                .and_then(|v| v.as_bool().ok())
                .unwrap_or(false)
        };
        let rows = match int("Rows") {
            Some(r) if r > 0 => Some(r as usize),
            _ => (img.height > 0).then_some(img.height as usize),
        };
        Self {
            k: int("K").unwrap_or(0) as i32,
            columns: int("Columns").map_or(1728, |c| c.clamp(1, 1 << 20) as usize),
            rows,
            encoded_byte_align: flag("EncodedByteAlign"),
            black_is_1: flag("BlackIs1"),
        }
    }
}

/// Streaming fax decoder producing packed 1-bit rows.
pub struct FaxDecoder {
    params: CcittParams,
}

impl FaxDecoder {
    pub fn new(params: CcittParams) -> Self {
        Self { params }
    }

    /// Decode the payload into packed rows (MSB-first, one row per
    /// `ceil(columns / 8)` bytes). With BlackIs1 unset, white pixels pack
    /// as 1 bits. Partial output is returned for damaged tails; an error
    /// means not a single row decoded.
    pub fn decode_rows(&self, data: &[u8]) -> Result<Vec<u8>> {
        let width = self.params.columns;
        let row_limit = self.params.rows.unwrap_or(usize::MAX);
        let mut reader = BitReader::new(data);
        let mut coder = LineCoder::new(width);
        let mut out = Vec::new();
        let mut nrows = 0usize;

        while nrows < row_limit && reader.bits_left() > 0 {
            let status = if self.params.k < 0 {
                self.decode_2d_row(&mut reader, &mut coder)
            } else if self.params.k == 0 {
                self.decode_1d_row(&mut reader, &mut coder)
            } else {
                self.decode_mixed_row(&mut reader, &mut coder)
            };

            match status {
                LineStatus::Done => {
                    self.pack_line(&coder.curline, &mut out);
                    coder.reset_line();
                    nrows += 1;
                    if self.params.encoded_byte_align {
                        reader.align_byte();
                    }
                }
                LineStatus::Eofb | LineStatus::EndOfData => break,
                LineStatus::Invalid => {
                    if nrows == 0 {
                        return Err(RasterError::Codec(
                            "CCITT stream rejected before the first row".into(),
                        ));
                    }
                    // Damaged tail: keep what decoded.
                    break;
                }
            }
        }

        if nrows == 0 {
            return Err(RasterError::Codec("CCITT stream produced no rows".into()));
        }
        Ok(out)
    }

    /// One 2-D coded line (G4, or a 2-D line inside mixed G3).
    fn decode_2d_row(&self, reader: &mut BitReader, coder: &mut LineCoder) -> LineStatus {
        loop {
            let Some(value) = read_code(reader, &MODE_TREE) else {
                return if reader.bits_left() == 0 {
                    LineStatus::EndOfData
                } else {
                    LineStatus::Invalid
                };
            };
            let mode = match value {
                HuffValue::Mode(m) => *m,
                _ => return LineStatus::Invalid,
            };
            match mode {
                Mode::Vertical(dx) => coder.do_vertical(dx),
                Mode::Pass => coder.do_pass(),
                Mode::Horizontal => {
                    let white = coder.color == 1;
                    let Some(n1) = read_run(reader, white) else {
                        return LineStatus::Invalid;
                    };
                    let Some(n2) = read_run(reader, !white) else {
                        return LineStatus::Invalid;
                    };
                    coder.do_horizontal(n1, n2);
                }
                Mode::Uncompressed => {
                    if !self.decode_uncompressed(reader, coder) {
                        return LineStatus::Invalid;
                    }
                }
                Mode::Eofb => return LineStatus::Eofb,
                Mode::Extension => return LineStatus::Invalid,
            }
            if coder.line_done() {
                return LineStatus::Done;
            }
        }
    }

    /// One 1-D coded line: an optional EOL, then alternating white/black
    /// runs.
    fn decode_1d_row(&self, reader: &mut BitReader, coder: &mut LineCoder) -> LineStatus {
        consume_eol(reader);
        if reader.bits_left() == 0 {
            return LineStatus::EndOfData;
        }
        self.decode_1d_row_untagged(reader, coder)
    }

    /// One line of mixed (K > 0) coding: EOL, then a tag bit choosing
    /// 1-D or 2-D coding for the line.
    fn decode_mixed_row(&self, reader: &mut BitReader, coder: &mut LineCoder) -> LineStatus {
        if !consume_eol(reader) && reader.bits_left() == 0 {
            return LineStatus::EndOfData;
        }
        match reader.read_bit() {
            Some(true) => self.decode_1d_row_untagged(reader, coder),
            Some(false) => self.decode_2d_row(reader, coder),
            None => LineStatus::EndOfData,
        }
    }

    /// 1-D line body without EOL handling (already consumed by the caller).
    fn decode_1d_row_untagged(&self, reader: &mut BitReader, coder: &mut LineCoder) -> LineStatus {
        if coder.curpos < 0 {
            coder.curpos = 0;
        }
        let mut white = true;
        while !coder.line_done() {
            let Some(run) = read_run(reader, white) else {
                return if reader.bits_left() == 0 {
                    LineStatus::EndOfData
                } else {
                    LineStatus::Invalid
                };
            };
            let color = white as i8;
            let start = coder.curpos.max(0) as usize;
            for x in start..(start + run).min(coder.width) {
                coder.curline[x] = color;
            }
            coder.curpos += run as isize;
            white = !white;
        }
        LineStatus::Done
    }

    /// Uncompressed mode: literal pixel patterns until a terminator sets
    /// the colour for the resumed run coding.
    fn decode_uncompressed(&self, reader: &mut BitReader, coder: &mut LineCoder) -> bool {
        loop {
            let Some(&HuffValue::Pattern(bits)) = read_code(reader, &UNCOMPRESSED_TREE) else {
                return false;
            };
            if let Some(rest) = bits.strip_prefix('T') {
                let mut chars = rest.chars();
                let Some(color) = chars.next().and_then(|c| c.to_digit(10)) else {
                    return false;
                };
                coder.color = color as i8;
                coder.put_pattern(chars.as_str());
                return true;
            }
            coder.put_pattern(bits);
        }
    }

    /// Pack a coded line into the output, honouring BlackIs1.
    fn pack_line(&self, line: &[i8], out: &mut Vec<u8>) {
        let row_bytes = line.len().div_ceil(8);
        let start = out.len();
        out.resize(start + row_bytes, 0);
        for (i, &px) in line.iter().enumerate() {
            let white = px != 0;
            let set = if self.params.black_is_1 {
                !white
            } else {
                white
            };
            if set {
                out[start + i / 8] |= 0x80 >> (i % 8);
            }
        }
    }
}

/// Consume an EOL code (eleven or more zeros followed by a one, covering
/// fill bits). Returns whether an EOL was present.
fn consume_eol(reader: &mut BitReader) -> bool {
    let mut probe = reader.clone();
    let mut zeros = 0usize;
    loop {
        match probe.read_bit() {
            Some(false) => {
                zeros += 1;
                if zeros > 4096 {
                    return false;
                }
            }
            Some(true) => break,
            None => return false,
        }
    }
    if zeros >= 11 {
        *reader = probe;
        true
    } else {
        false
    }
}

/// Decode via the external `fax` library (Group 4 only). The callback
/// receives changing-element positions per row; runs alternate starting
/// white.
fn library_decode(data: &[u8], p: &CcittParams) -> Option<Vec<u8>> {
    let width = u16::try_from(p.columns).ok()?;
    let height = p.rows.and_then(|r| u16::try_from(r).ok());
    let row_bytes = p.columns.div_ceil(8);
    let mut out: Vec<u8> = Vec::new();

    fax::decoder::decode_g4(data.iter().copied(), width, height, |transitions| {
        let start = out.len();
        out.resize(start + row_bytes, 0);
        let mut white = true;
        let mut pos = 0usize;
        let mut mark = |from: usize, to: usize, white: bool| {
            let set = white != p.black_is_1;
            if !set {
                return;
            }
            for x in from..to.min(p.columns) {
                out[start + x / 8] |= 0x80 >> (x % 8);
            }
        };
        for &t in transitions {
            mark(pos, t as usize, white);
            pos = t as usize;
            white = !white;
        }
        mark(pos, p.columns, white);
    })?;

    (!out.is_empty()).then_some(out)
}

/// Decode a CCITT payload into a pixmap.
///
/// Tries the declared coding scheme, then the opposite scheme (corrupt or
/// missing K values are common in the wild), then the external library if
/// permitted. Each failure is logged and the next strategy runs; only
/// when every strategy fails does the error propagate to the facade.
pub fn decode(
    data: &[u8],
    params: &ImageParams,
    cfg: &DecodeConfig,
    stencil_fill: Option<u32>,
) -> Result<Option<Pixmap>> {
    let dict = params
        .filters
        .iter()
        .find(|(name, _)| filters::is_ccitt(name))
        .and_then(|(_, d)| d.as_ref());
    let primary = CcittParams::from_dict(dict, params);

    let mut attempts = vec![primary.clone()];
    attempts.push(CcittParams {
        k: if primary.k < 0 { 0 } else { -1 },
        ..primary.clone()
    });

    let mut packed = None;
    for attempt in &attempts {
        match FaxDecoder::new(attempt.clone()).decode_rows(data) {
            Ok(rows) => {
                packed = Some(rows);
                break;
            }
            Err(err) => debug!(k = attempt.k, "CCITT strategy failed: {err}"),
        }
    }
    if packed.is_none() && cfg.ccitt_library_fallback {
        packed = library_decode(data, &primary);
        if packed.is_none() {
            debug!("CCITT library fallback produced no rows");
        }
    }
    let Some(packed) = packed else {
        return Err(RasterError::Codec(
            "all CCITT decode strategies failed".into(),
        ));
    };

    Ok(Some(bits_to_pixmap(
        &packed,
        primary.columns,
        !primary.black_is_1,
        params,
        stencil_fill,
    )))
}

/// Expand packed 1-bit rows into the final pixmap, honouring the image's
/// decode polarity and the stencil path for image masks. `pad_set` is the
/// sample value filling rows past the decoded data (white, in whichever
/// polarity the packing used).
pub(crate) fn bits_to_pixmap(
    packed: &[u8],
    columns: usize,
    pad_set: bool,
    params: &ImageParams,
    stencil_fill: Option<u32>,
) -> Pixmap {
    let row_bytes = columns.div_ceil(8);
    let (w, h) = (params.width, params.height);
    let inverted = params.decode_inverted(0);

    let stencil = params.is_image_mask || stencil_fill.is_some();
    let lut: [u32; 2] = if stencil {
        convert::build_stencil_lut(inverted, stencil_fill.unwrap_or(convert::OPAQUE_BLACK))
    } else {
        let lut = convert::build_gray_lut(1, params.decode[0], params.decode[1]);
        [lut[0], lut[1]]
    };
    let pad = pad_set as u8;

    let mut out = Vec::with_capacity(w as usize * h as usize);
    for y in 0..h as usize {
        let row = packed.get(y * row_bytes..(y + 1) * row_bytes);
        for x in 0..w as usize {
            let sample = match row {
                Some(row) if x / 8 < row.len() => (row[x / 8] >> (7 - x % 8)) & 1,
                _ => pad,
            };
            out.push(lut[sample as usize]);
        }
    }
    let mut px = Pixmap::from_argb(w, h, out);
    if stencil {
        px.set_transparency(Transparency::Bitmask);
    }
    px
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pack a bit string ("1100...") into MSB-first bytes.
    fn pack_bits(bits: &str) -> Vec<u8> {
        let mut out = vec![0u8; bits.len().div_ceil(8)];
        for (i, c) in bits.chars().enumerate() {
            if c == '1' {
                out[i / 8] |= 0x80 >> (i % 8);
            }
        }
        out
    }

    #[test]
    fn g4_all_white_lines() {
        // Two all-white 8px lines: V(0) twice, then EOFB.
        let data = pack_bits("11000000000001000000000001");
        let params = CcittParams {
            k: -1,
            columns: 8,
            rows: None,
            encoded_byte_align: false,
            black_is_1: false,
        };
        let rows = FaxDecoder::new(params).decode_rows(&data).unwrap();
        assert_eq!(rows, vec![0xFF, 0xFF]);
    }

    #[test]
    fn g4_black_is_1_inverts_packing() {
        let data = pack_bits("11000000000001000000000001");
        let params = CcittParams {
            k: -1,
            columns: 8,
            rows: None,
            encoded_byte_align: false,
            black_is_1: true,
        };
        let rows = FaxDecoder::new(params).decode_rows(&data).unwrap();
        assert_eq!(rows, vec![0x00, 0x00]);
    }

    #[test]
    fn g3_1d_runs() {
        // One line, 8 columns: white 4 ("1011"), black 4 ("011").
        let data = pack_bits("1011011");
        let params = CcittParams {
            k: 0,
            columns: 8,
            rows: Some(1),
            encoded_byte_align: false,
            black_is_1: false,
        };
        let rows = FaxDecoder::new(params).decode_rows(&data).unwrap();
        assert_eq!(rows, vec![0xF0]);
    }

    #[test]
    fn garbage_yields_error_not_panic() {
        let params = CcittParams {
            k: -1,
            columns: 16,
            rows: Some(4),
            encoded_byte_align: false,
            black_is_1: false,
        };
        // Zero-heavy data walks into unassigned code space before the
        // first row completes.
        let bad = [0x00u8, 0x10, 0x00, 0x02];
        assert!(FaxDecoder::new(params).decode_rows(&bad).is_err());
    }
}
