//! Bit-plane packing helpers.
//!
//! Dot data is MSB first: with one bit per pixel, pixel 0 is bit 7 of byte 0;
//! with two bits per pixel, pixel 0 occupies bits 7..6.

/// Returns `true` when no dot is set in `bytes`.
pub fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}

/// Number of bytes needed to hold `pixels` values of `bits` bits each.
pub fn packed_len(pixels: usize, bits: u8) -> usize {
    (pixels * bits as usize + 7) / 8
}

/// Pack dithered values, one per input byte, into `out`.
///
/// Takes `count` pixels starting at `start` and advancing by `step`. One-bit
/// output sets a dot for any nonzero value; two-bit output keeps the low two
/// bits of each value.
pub fn pack_pixels(pixels: &[u8], bits: u8, start: usize, step: usize, count: usize, out: &mut [u8]) {
    out.fill(0);

    for (k, &value) in pixels.iter().skip(start).step_by(step).take(count).enumerate() {
        let value = if bits == 1 { (value != 0) as u8 } else { value & 0x03 };
        set_pixel(out, bits, k, value);
    }
}

/// Extract every `step`-th pixel of an already packed line into `out`.
///
/// This is how a full-width scanline is split into the column passes of a
/// softweave head.
pub fn pack_columns(line: &[u8], bits: u8, start: usize, step: usize, count: usize, out: &mut [u8]) {
    if start == 0 && step == 1 {
        let len = out.len().min(line.len());
        out[..len].copy_from_slice(&line[..len]);
        out[len..].fill(0);
        return;
    }

    out.fill(0);

    for k in 0..count {
        let value = get_pixel(line, bits, start + k * step);
        if value != 0 {
            set_pixel(out, bits, k, value);
        }
    }
}

fn get_pixel(line: &[u8], bits: u8, index: usize) -> u8 {
    let per_byte = 8 / bits as usize;
    let byte = match line.get(index / per_byte) {
        Some(&b) => b,
        None => return 0,
    };
    let shift = 8 - bits as usize * (index % per_byte + 1);
    let mask = (1u8 << bits) - 1;

    (byte >> shift) & mask
}

fn set_pixel(out: &mut [u8], bits: u8, index: usize, value: u8) {
    let per_byte = 8 / bits as usize;
    let shift = 8 - bits as usize * (index % per_byte + 1);

    if let Some(byte) = out.get_mut(index / per_byte) {
        *byte |= value << shift;
    }
}
