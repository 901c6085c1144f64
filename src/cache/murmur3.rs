//! Murmur3 (x86, 128-bit) digest for cache key generation
//!
//! This is a fast, non-cryptographic hash used on the hot query path. It is
//! deterministic across process runs and platforms for identical byte input,
//! which is what makes content-derived cache keys shareable between instances.
//!
//! Reference: https://en.wikipedia.org/wiki/MurmurHash

use std::fmt::Write;

const C1: u32 = 0x239b_961b;
const C2: u32 = 0xab0e_9789;
const C3: u32 = 0x38b3_4ae5;
const C4: u32 = 0xa1e3_8b93;

/// Compute the 128-bit Murmur3 digest of `data`.
///
/// Empty input is valid and produces a stable all-zero digest.
pub fn hash128(data: &[u8]) -> [u8; 16] {
    let mut h1: u32 = 0;
    let mut h2: u32 = 0;
    let mut h3: u32 = 0;
    let mut h4: u32 = 0;

    let mut chunks = data.chunks_exact(16);

    // Body: mix each 16-byte block into the four accumulator lanes.
    for block in chunks.by_ref() {
        let k1 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        let k2 = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
        let k3 = u32::from_le_bytes([block[8], block[9], block[10], block[11]]);
        let k4 = u32::from_le_bytes([block[12], block[13], block[14], block[15]]);

        h1 ^= k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h1 = h1
            .rotate_left(19)
            .wrapping_add(h2)
            .wrapping_mul(5)
            .wrapping_add(0x561c_cd1b);

        h2 ^= k2.wrapping_mul(C2).rotate_left(16).wrapping_mul(C3);
        h2 = h2
            .rotate_left(17)
            .wrapping_add(h3)
            .wrapping_mul(5)
            .wrapping_add(0x0bca_a747);

        h3 ^= k3.wrapping_mul(C3).rotate_left(17).wrapping_mul(C4);
        h3 = h3
            .rotate_left(15)
            .wrapping_add(h4)
            .wrapping_mul(5)
            .wrapping_add(0x96cd_1c35);

        h4 ^= k4.wrapping_mul(C4).rotate_left(18).wrapping_mul(C1);
        h4 = h4
            .rotate_left(13)
            .wrapping_add(h1)
            .wrapping_mul(5)
            .wrapping_add(0x32ac_3b17);
    }

    // Tail: accumulate the remaining 0..=15 bytes, keyed by remainder length.
    let tail = chunks.remainder();
    let mut k = [0u32; 4];
    for (i, &byte) in tail.iter().enumerate() {
        k[i / 4] ^= (byte as u32) << (8 * (i % 4));
    }
    if tail.len() > 12 {
        h4 ^= k[3].wrapping_mul(C4).rotate_left(18).wrapping_mul(C1);
    }
    if tail.len() > 8 {
        h3 ^= k[2].wrapping_mul(C3).rotate_left(17).wrapping_mul(C4);
    }
    if tail.len() > 4 {
        h2 ^= k[1].wrapping_mul(C2).rotate_left(16).wrapping_mul(C3);
    }
    if !tail.is_empty() {
        h1 ^= k[0].wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
    }

    // Finalization: fold in the length, cross-add the lanes, avalanche each
    // lane separately, then cross-add again.
    let len = data.len() as u32;
    h1 ^= len;
    h2 ^= len;
    h3 ^= len;
    h4 ^= len;

    h1 = h1.wrapping_add(h2).wrapping_add(h3).wrapping_add(h4);
    h2 = h2.wrapping_add(h1);
    h3 = h3.wrapping_add(h1);
    h4 = h4.wrapping_add(h1);

    h1 = fmix32(h1);
    h2 = fmix32(h2);
    h3 = fmix32(h3);
    h4 = fmix32(h4);

    h1 = h1.wrapping_add(h2).wrapping_add(h3).wrapping_add(h4);
    h2 = h2.wrapping_add(h1);
    h3 = h3.wrapping_add(h1);
    h4 = h4.wrapping_add(h1);

    let mut out = [0u8; 16];
    out[0..4].copy_from_slice(&h1.to_le_bytes());
    out[4..8].copy_from_slice(&h2.to_le_bytes());
    out[8..12].copy_from_slice(&h3.to_le_bytes());
    out[12..16].copy_from_slice(&h4.to_le_bytes());
    out
}

/// Compute the digest of `data` and encode it as lowercase hexadecimal.
pub fn hash128_hex(data: &[u8]) -> String {
    let digest = hash128(data);
    let mut hex = String::with_capacity(32);
    for byte in digest {
        // Writing to a String cannot fail.
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

/// Shift-xor/multiply avalanche rounds applied to each lane.
#[inline]
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}
