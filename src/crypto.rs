use crate::consts::SHA1_DIGEST_LEN;
use macros::base64_impl;

base64_impl!(
    Base64Pad,
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/",
    true
);

const SHA1_BLOCK_LEN: usize = 64;

#[inline(always)]
fn f(t: usize, b: u32, c: u32, d: u32) -> u32 {
    match t {
        0..=19 => (b & c) | (!b & d),
        20..=39 | 60..=79 => b ^ c ^ d,
        40..=59 => (b & c) | (b & d) | (c & d),
        _ => 0,
    }
}

#[inline(always)]
fn k(t: usize) -> u32 {
    match t {
        0..=19 => 0x5A827999,
        20..=39 => 0x6ED9EBA1,
        40..=59 => 0x8F1BBCDC,
        60..=79 => 0xCA62C1D6,
        _ => 0,
    }
}

/// Incremental sha1 hasher, works on a fixed 64 byte block buffer (no allocation)
pub struct Sha1 {
    state: [u32; 5],
    block: [u8; SHA1_BLOCK_LEN],
    block_len: usize,
    total_len: u64,
}

impl Sha1 {
    pub const fn new() -> Self {
        Self {
            state: [0x67452301, 0xEFCDAB89, 0x98BADCFE, 0x10325476, 0xC3D2E1F0],
            block: [0; SHA1_BLOCK_LEN],
            block_len: 0,
            total_len: 0,
        }
    }

    pub fn update(&mut self, mut input: &[u8]) {
        self.total_len = self.total_len.wrapping_add(input.len() as u64);

        if self.block_len > 0 {
            let take = (SHA1_BLOCK_LEN - self.block_len).min(input.len());
            self.block[self.block_len..self.block_len + take].copy_from_slice(&input[..take]);
            self.block_len += take;
            input = &input[take..];

            if self.block_len < SHA1_BLOCK_LEN {
                return;
            }

            compress(&mut self.state, &self.block);
            self.block_len = 0;
        }

        let mut chunks = input.chunks_exact(SHA1_BLOCK_LEN);
        for chunk in &mut chunks {
            compress(&mut self.state, chunk);
        }

        let rest = chunks.remainder();
        self.block[..rest.len()].copy_from_slice(rest);
        self.block_len = rest.len();
    }

    pub fn finalize(mut self) -> [u8; SHA1_DIGEST_LEN] {
        let bit_len = self.total_len.wrapping_mul(8);

        // block_len is always < 64 here
        self.block[self.block_len] = 0x80;
        self.block_len += 1;

        if self.block_len > SHA1_BLOCK_LEN - 8 {
            self.block[self.block_len..].fill(0);
            compress(&mut self.state, &self.block);
            self.block_len = 0;
        }

        self.block[self.block_len..SHA1_BLOCK_LEN - 8].fill(0);
        self.block[SHA1_BLOCK_LEN - 8..].copy_from_slice(&bit_len.to_be_bytes());
        compress(&mut self.state, &self.block);

        let mut digest = [0u8; SHA1_DIGEST_LEN];
        for (out, h) in digest.chunks_exact_mut(4).zip(self.state) {
            out.copy_from_slice(&h.to_be_bytes());
        }

        digest
    }
}

impl Default for Sha1 {
    fn default() -> Self {
        Self::new()
    }
}

fn compress(h: &mut [u32; 5], block: &[u8]) {
    let mut w = [0u32; 80];
    for (t, word) in block.chunks_exact(4).enumerate() {
        w[t] = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
    }

    for t in 16..80 {
        w[t] = (w[t - 3] ^ w[t - 8] ^ w[t - 14] ^ w[t - 16]).rotate_left(1);
    }

    let [mut a, mut b, mut c, mut d, mut e] = *h;
    for (t, wt) in w.iter().enumerate() {
        let temp = a
            .rotate_left(5)
            .wrapping_add(f(t, b, c, d))
            .wrapping_add(e)
            .wrapping_add(*wt)
            .wrapping_add(k(t));

        e = d;
        d = c;
        c = b.rotate_left(30);
        b = a;
        a = temp;
    }

    h[0] = h[0].wrapping_add(a);
    h[1] = h[1].wrapping_add(b);
    h[2] = h[2].wrapping_add(c);
    h[3] = h[3].wrapping_add(d);
    h[4] = h[4].wrapping_add(e);
}

/// One-shot sha1 over concatenated parts
pub fn sha1(parts: &[&[u8]]) -> [u8; SHA1_DIGEST_LEN] {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }

    hasher.finalize()
}
