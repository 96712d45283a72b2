//! Bit-granular access over word buffers.
//!
//! Every blob lives inside one flat `u64` arena, so reads, writes, and shifts
//! are all expressed as bit ranges over `[u64]`. Bit `n` of a buffer is bit
//! `n % 64` of word `n / 64`.
//!
//! # Invariants
//!
//! - Writes never touch bits outside the target range.
//! - `move_bits` behaves like `memmove`: overlapping ranges are copied in the
//!   direction that never reads an already overwritten bit.
//! - `compare_bits` orders ranges the way `memcmp` orders byte strings, so a
//!   byte-aligned range compares like its little-endian bytes.

// Word indices are derived from u64 bit offsets; the arena is addressable on 64-bit targets.
#![allow(clippy::cast_possible_truncation)]

use std::cmp::Ordering;

/// Number of bits in a storage word.
pub const WORD_BITS: u64 = 64;

/// Mask with the low `length` bits set.
#[must_use]
pub const fn low_mask(length: u64) -> u64 {
    if length >= WORD_BITS {
        u64::MAX
    } else {
        (1u64 << length) - 1
    }
}

/// Number of words needed to hold `bits` bits.
#[must_use]
pub const fn words_for_bits(bits: u64) -> u64 {
    bits.div_ceil(WORD_BITS)
}

/// Read `length` (at most 64) bits starting at bit `offset`.
#[must_use]
pub fn read_bits(words: &[u64], offset: u64, length: u64) -> u64 {
    debug_assert!(length <= WORD_BITS);
    if length == 0 {
        return 0;
    }
    let index = (offset / WORD_BITS) as usize;
    let shift = offset % WORD_BITS;
    let mut value = words[index] >> shift;
    if shift + length > WORD_BITS {
        value |= words[index + 1] << (WORD_BITS - shift);
    }
    value & low_mask(length)
}

/// Write the low `length` (at most 64) bits of `value` at bit `offset`.
pub fn write_bits(words: &mut [u64], offset: u64, length: u64, value: u64) {
    debug_assert!(length <= WORD_BITS);
    if length == 0 {
        return;
    }
    let index = (offset / WORD_BITS) as usize;
    let shift = offset % WORD_BITS;
    let value = value & low_mask(length);
    let keep = !(low_mask(length) << shift);
    words[index] = (words[index] & keep) | (value << shift);
    if shift + length > WORD_BITS {
        let spill = shift + length - WORD_BITS;
        let keep = !low_mask(spill);
        words[index + 1] = (words[index + 1] & keep) | (value >> (WORD_BITS - shift));
    }
}

/// Copy `length` bits between two distinct buffers.
pub fn copy_bits(dst: &mut [u64], dst_offset: u64, src: &[u64], src_offset: u64, length: u64) {
    if length == 0 {
        return;
    }
    let mut done = 0;
    if dst_offset % WORD_BITS == 0 && src_offset % WORD_BITS == 0 {
        let whole = (length / WORD_BITS) as usize;
        let d = (dst_offset / WORD_BITS) as usize;
        let s = (src_offset / WORD_BITS) as usize;
        dst[d..d + whole].copy_from_slice(&src[s..s + whole]);
        done = length - length % WORD_BITS;
    }
    while done < length {
        let n = (length - done).min(WORD_BITS);
        let value = read_bits(src, src_offset + done, n);
        write_bits(dst, dst_offset + done, n, value);
        done += n;
    }
}

/// Move `length` bits within one buffer; the ranges may overlap.
pub fn move_bits(words: &mut [u64], dst_offset: u64, src_offset: u64, length: u64) {
    if length == 0 || dst_offset == src_offset {
        return;
    }
    if dst_offset % WORD_BITS == 0 && src_offset % WORD_BITS == 0 {
        let whole = length / WORD_BITS;
        let tail = length % WORD_BITS;
        let d = (dst_offset / WORD_BITS) as usize;
        let s = (src_offset / WORD_BITS) as usize;
        let w = whole as usize;
        let tail_src = src_offset + whole * WORD_BITS;
        let tail_dst = dst_offset + whole * WORD_BITS;
        // The partial tail word sits above the whole words, so it goes first
        // when moving up and last when moving down.
        if dst_offset > src_offset {
            let value = read_bits(words, tail_src, tail);
            write_bits(words, tail_dst, tail, value);
            words.copy_within(s..s + w, d);
        } else {
            words.copy_within(s..s + w, d);
            let value = read_bits(words, tail_src, tail);
            write_bits(words, tail_dst, tail, value);
        }
        return;
    }
    if dst_offset < src_offset {
        let mut done = 0;
        while done < length {
            let n = (length - done).min(WORD_BITS);
            let value = read_bits(words, src_offset + done, n);
            write_bits(words, dst_offset + done, n, value);
            done += n;
        }
    } else {
        let mut remaining = length;
        while remaining > 0 {
            let n = remaining.min(WORD_BITS);
            remaining -= n;
            let value = read_bits(words, src_offset + remaining, n);
            write_bits(words, dst_offset + remaining, n, value);
        }
    }
}

/// Set or clear every bit in a range.
pub fn fill_bits(words: &mut [u64], offset: u64, length: u64, set: bool) {
    let pattern = if set { u64::MAX } else { 0 };
    let mut done = 0;
    while done < length {
        let at = offset + done;
        if at % WORD_BITS == 0 && length - done >= WORD_BITS {
            let first = (at / WORD_BITS) as usize;
            let count = ((length - done) / WORD_BITS) as usize;
            words[first..first + count].fill(pattern);
            done += count as u64 * WORD_BITS;
            continue;
        }
        let n = (length - done).min(WORD_BITS - at % WORD_BITS);
        write_bits(words, at, n, pattern);
        done += n;
    }
}

/// Compare two equal-length ranges lexicographically.
#[must_use]
pub fn compare_bits(a: &[u64], a_offset: u64, b: &[u64], b_offset: u64, length: u64) -> Ordering {
    let mut done = 0;
    while done < length {
        let n = (length - done).min(WORD_BITS);
        let x = read_bits(a, a_offset + done, n);
        let y = read_bits(b, b_offset + done, n);
        if x != y {
            // Lower addressed bytes are more significant.
            return x.swap_bytes().cmp(&y.swap_bytes());
        }
        done += n;
    }
    Ordering::Equal
}

/// A read-only, bounds-checked view of a bit range.
#[derive(Debug, Clone, Copy)]
pub struct BitSpan<'a> {
    words: &'a [u64],
    offset: u64,
    length: u64,
}

impl<'a> BitSpan<'a> {
    /// Create a view of `length` bits starting at bit `offset` of `words`.
    ///
    /// Returns `None` if the range does not fit in the buffer.
    #[must_use]
    pub fn new(words: &'a [u64], offset: u64, length: u64) -> Option<Self> {
        let end = offset.checked_add(length)?;
        if end > words.len() as u64 * WORD_BITS {
            return None;
        }
        Some(Self {
            words,
            offset,
            length,
        })
    }

    /// Length of the view in bits.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.length
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Read up to 64 bits at `offset` relative to the start of the view.
    #[must_use]
    pub fn read(&self, offset: u64, length: u64) -> Option<u64> {
        if length > WORD_BITS || offset.checked_add(length)? > self.length {
            return None;
        }
        Some(read_bits(self.words, self.offset + offset, length))
    }

    /// Size-then-content ordering of two views.
    #[must_use]
    pub fn compare(&self, other: &BitSpan<'_>) -> Ordering {
        self.length.cmp(&other.length).then_with(|| {
            compare_bits(
                self.words,
                self.offset,
                other.words,
                other.offset,
                self.length,
            )
        })
    }

    /// Copy the view out as bytes; a trailing partial byte is zero padded.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut packed = vec![0u64; words_for_bits(self.length) as usize];
        copy_bits(&mut packed, 0, self.words, self.offset, self.length);
        packed
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .take(self.length.div_ceil(8) as usize)
            .collect()
    }
}

/// A mutable, bounds-checked view of a bit range.
#[derive(Debug)]
pub struct BitSpanMut<'a> {
    words: &'a mut [u64],
    offset: u64,
    length: u64,
}

impl<'a> BitSpanMut<'a> {
    /// Create a mutable view of `length` bits starting at bit `offset`.
    #[must_use]
    pub fn new(words: &'a mut [u64], offset: u64, length: u64) -> Option<Self> {
        let end = offset.checked_add(length)?;
        if end > words.len() as u64 * WORD_BITS {
            return None;
        }
        Some(Self {
            words,
            offset,
            length,
        })
    }

    #[must_use]
    pub const fn len(&self) -> u64 {
        self.length
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Read up to 64 bits at `offset` relative to the start of the view.
    #[must_use]
    pub fn read(&self, offset: u64, length: u64) -> Option<u64> {
        if length > WORD_BITS || offset.checked_add(length)? > self.length {
            return None;
        }
        Some(read_bits(self.words, self.offset + offset, length))
    }

    /// Write up to 64 bits at `offset`. Returns `None` when out of range.
    pub fn write(&mut self, offset: u64, length: u64, value: u64) -> Option<()> {
        if length > WORD_BITS || offset.checked_add(length)? > self.length {
            return None;
        }
        write_bits(self.words, self.offset + offset, length, value);
        Some(())
    }

    /// Write bytes starting at bit `offset`.
    pub fn write_bytes(&mut self, offset: u64, bytes: &[u8]) -> Option<()> {
        let bits = (bytes.len() as u64).checked_mul(8)?;
        if offset.checked_add(bits)? > self.length {
            return None;
        }
        for (i, byte) in bytes.iter().enumerate() {
            write_bits(
                self.words,
                self.offset + offset + i as u64 * 8,
                8,
                u64::from(*byte),
            );
        }
        Some(())
    }

    /// Reborrow as a read-only view.
    #[must_use]
    pub fn as_span(&self) -> BitSpan<'_> {
        BitSpan {
            words: &*self.words,
            offset: self.offset,
            length: self.length,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn to_bools(words: &[u64]) -> Vec<bool> {
        (0..words.len() as u64 * WORD_BITS)
            .map(|i| read_bits(words, i, 1) == 1)
            .collect()
    }

    #[test]
    fn test_low_mask() {
        assert_eq!(low_mask(0), 0);
        assert_eq!(low_mask(1), 1);
        assert_eq!(low_mask(63), u64::MAX >> 1);
        assert_eq!(low_mask(64), u64::MAX);
    }

    #[test]
    fn test_read_write_across_word_boundary() {
        let mut words = [0u64; 2];
        write_bits(&mut words, 60, 8, 0xAB);
        assert_eq!(read_bits(&words, 60, 8), 0xAB);
        assert_eq!(words[0] >> 60, 0xB);
        assert_eq!(words[1] & 0xF, 0xA);
    }

    #[test]
    fn test_write_preserves_neighbours() {
        let mut words = [u64::MAX; 2];
        write_bits(&mut words, 62, 4, 0);
        assert_eq!(words[0], u64::MAX >> 2);
        assert_eq!(words[1], u64::MAX << 2);
    }

    #[test]
    fn test_zero_length_is_noop() {
        let mut words = [0x1234u64];
        write_bits(&mut words, 3, 0, u64::MAX);
        move_bits(&mut words, 0, 5, 0);
        assert_eq!(words[0], 0x1234);
        assert_eq!(read_bits(&words, 10, 0), 0);
    }

    #[test]
    fn test_move_bits_matches_memmove_model() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let mut words: Vec<u64> = (0..6).map(|_| rng.random()).collect();
            let total = words.len() as u64 * WORD_BITS;
            let length = rng.random_range(0..total / 2);
            let src = rng.random_range(0..=total - length);
            let dst = rng.random_range(0..=total - length);

            let mut model = to_bools(&words);
            let moved: Vec<bool> = model[src as usize..(src + length) as usize].to_vec();
            model[dst as usize..(dst + length) as usize].copy_from_slice(&moved);

            move_bits(&mut words, dst, src, length);
            assert_eq!(to_bools(&words), model, "src {src} dst {dst} len {length}");
        }
    }

    #[test]
    fn test_aligned_move_with_tail() {
        let mut words = [1u64, 2, 3, 0b101, 0];
        move_bits(&mut words, 64, 0, 64 * 3 + 3);
        assert_eq!(words, [1, 1, 2, 3, 0b101]);
    }

    #[test]
    fn test_copy_bits_between_buffers() {
        let src = [0xDEAD_BEEF_u64, 0xFEED];
        let mut dst = [0u64; 3];
        copy_bits(&mut dst, 13, &src, 4, 100);
        for i in 0..100 {
            assert_eq!(read_bits(&dst, 13 + i, 1), read_bits(&src, 4 + i, 1));
        }
        assert_eq!(read_bits(&dst, 0, 13), 0);
    }

    #[test]
    fn test_fill_bits() {
        let mut words = [0u64; 3];
        fill_bits(&mut words, 5, 150, true);
        assert_eq!(read_bits(&words, 0, 5), 0);
        assert_eq!(read_bits(&words, 155, 10), 0);
        for i in 5..155 {
            assert_eq!(read_bits(&words, i, 1), 1);
        }
        fill_bits(&mut words, 64, 64, false);
        assert_eq!(words[1], 0);
    }

    #[test]
    fn test_compare_bits_orders_like_bytes() {
        let a = [u64::from_le_bytes(*b"apple\0\0\0")];
        let b = [u64::from_le_bytes(*b"apricot\0")];
        assert_eq!(compare_bits(&a, 0, &b, 0, 40), Ordering::Less);
        assert_eq!(compare_bits(&b, 0, &a, 0, 40), Ordering::Greater);
        assert_eq!(compare_bits(&a, 0, &a, 0, 64), Ordering::Equal);
    }

    #[test]
    fn test_span_bounds() {
        let words = [u64::MAX; 2];
        assert!(BitSpan::new(&words, 100, 29).is_none());
        let span = BitSpan::new(&words, 100, 28).expect("fits");
        assert_eq!(span.read(20, 8), Some(0xFF));
        assert_eq!(span.read(21, 8), None);
        assert_eq!(span.to_bytes().len(), 4);
    }

    #[test]
    fn test_span_compare_size_first() {
        let words = [u64::from_le_bytes(*b"zzzzaaaa")];
        let long = BitSpan::new(&words, 32, 32).expect("fits");
        let short = BitSpan::new(&words, 0, 24).expect("fits");
        assert_eq!(short.compare(&long), Ordering::Less);
        assert_eq!(long.compare(&long), Ordering::Equal);
    }

    #[test]
    fn test_span_mut_write_bytes() {
        let mut words = [0u64; 2];
        let mut span = BitSpanMut::new(&mut words, 4, 80).expect("fits");
        span.write_bytes(0, b"hi").expect("in range");
        assert!(span.write_bytes(72, b"xy").is_none());
        assert_eq!(span.as_span().to_bytes()[..2], *b"hi");
    }
}
