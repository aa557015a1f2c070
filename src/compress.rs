//! Packbits run encoding for ESC/P2 raster graphics.
//!
//! The byte layout produced here is part of the wire format: a control byte
//! `0..=126` introduces `n + 1` literal bytes, a control byte `130..=255`
//! repeats the following byte `257 - n` times. Control bytes 127..=129 are
//! never produced.

/// Longest run a single packet may describe.
const MAX_RUN: usize = 127;

/// Compression mode carried in the graphics header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None = 0,
    PackBits = 1,
}

impl Compression {
    /// Map the raster header `cupsCompression` value to a mode.
    pub fn from_header(value: u32) -> Self {
        if value == 0 {
            Self::None
        } else {
            Self::PackBits
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Result of compressing one band or line.
#[derive(Debug, PartialEq, Eq)]
pub enum Encoding<'a> {
    /// Compression would not have saved anything; the input is sent as is.
    Raw(&'a [u8]),
    PackBits(Vec<u8>),
}

impl<'a> Encoding<'a> {
    pub fn compression(&self) -> Compression {
        match self {
            Self::Raw(_) => Compression::None,
            Self::PackBits(_) => Compression::PackBits,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Raw(raw) => raw,
            Self::PackBits(packed) => packed,
        }
    }
}

/// Packbits-encode `raw`, falling back to [`Encoding::Raw`] as soon as the
/// packed output reaches the input length.
pub fn compress(raw: &[u8]) -> Encoding<'_> {
    let end = raw.len();
    let mut packed: Vec<u8> = Vec::with_capacity(end + 2);
    let mut i = 0;

    while i < end && packed.len() < end {
        if i + 1 >= end {
            // Single byte on the end
            packed.push(0x00);
            packed.push(raw[i]);
            i += 1;
        } else if raw[i] == raw[i + 1] {
            i += 1;
            let mut count = 2;

            while i < end - 1 && raw[i] == raw[i + 1] && count < MAX_RUN {
                i += 1;
                count += 1;
            }

            packed.push((257 - count) as u8);
            packed.push(raw[i]);
            i += 1;
        } else {
            let start = i;
            i += 1;
            let mut count = 1;

            while i < end - 1 && raw[i] != raw[i + 1] && count < MAX_RUN {
                i += 1;
                count += 1;
            }

            packed.push((count - 1) as u8);
            packed.extend_from_slice(&raw[start..start + count]);
        }
    }

    if packed.len() < end {
        Encoding::PackBits(packed)
    } else {
        Encoding::Raw(raw)
    }
}

/// Expand packbits data produced by [`compress`].
///
/// Returns `None` for truncated packets or the unused control bytes
/// 128 and 129.
pub fn decompress(packed: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(packed.len() * 2);
    let mut i = 0;

    while i < packed.len() {
        let control = packed[i];
        i += 1;

        match control {
            0..=127 => {
                let count = control as usize + 1;
                let literal = packed.get(i..i + count)?;
                out.extend_from_slice(literal);
                i += count;
            }
            128 | 129 => return None,
            _ => {
                let count = 257 - control as usize;
                let value = *packed.get(i)?;
                out.extend(std::iter::repeat(value).take(count));
                i += 1;
            }
        }
    }

    Some(out)
}
