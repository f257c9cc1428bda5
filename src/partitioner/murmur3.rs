//! Murmur3 partitioner: 128-bit Murmur3 (x64 variant, seed 0), high 64 bits
//! as a signed token (§4.A). This is a direct transcription of the public
//! domain MurmurHash3_x64_128 algorithm (see `original_source/src/murmur3.cpp`),
//! truncated to the 64 bits Cassandra uses as the token.

use byteorder::{ByteOrder, LittleEndian};

use super::{Partitioner, Token};
use crate::errors::TokenParseError;

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

/// The minimum possible Murmur3 token is reserved by Cassandra and must
/// never be used as a ring key (§4.A).
pub const MIN_TOKEN: i64 = i64::MIN;

pub struct Murmur3Partitioner;

impl Murmur3Partitioner {
    fn hash128(data: &[u8]) -> (u64, u64) {
        let len = data.len();
        let nblocks = len / 16;

        let mut h1: u64 = 0;
        let mut h2: u64 = 0;

        for i in 0..nblocks {
            let block = &data[i * 16..i * 16 + 16];
            let mut k1 = LittleEndian::read_u64(&block[0..8]);
            let mut k2 = LittleEndian::read_u64(&block[8..16]);

            k1 = k1.wrapping_mul(C1);
            k1 = k1.rotate_left(31);
            k1 = k1.wrapping_mul(C2);
            h1 ^= k1;

            h1 = h1.rotate_left(27);
            h1 = h1.wrapping_add(h2);
            h1 = h1.wrapping_mul(5).wrapping_add(0x52dc_e729);

            k2 = k2.wrapping_mul(C2);
            k2 = k2.rotate_left(33);
            k2 = k2.wrapping_mul(C1);
            h2 ^= k2;

            h2 = h2.rotate_left(31);
            h2 = h2.wrapping_add(h1);
            h2 = h2.wrapping_mul(5).wrapping_add(0x3849_5ab5);
        }

        let tail = &data[nblocks * 16..];
        let mut k1: u64 = 0;
        let mut k2: u64 = 0;

        let tail_len = tail.len();
        if tail_len > 8 {
            for i in (9..=tail_len).rev() {
                k2 ^= (tail[i - 1] as u64) << (8 * (i - 9));
            }
            k2 = k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
            h2 ^= k2;
        }
        if tail_len >= 1 {
            let head_len = tail_len.min(8);
            for i in (1..=head_len).rev() {
                k1 ^= (tail[i - 1] as u64) << (8 * (i - 1));
            }
            k1 = k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
            h1 ^= k1;
        }

        h1 ^= len as u64;
        h2 ^= len as u64;

        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);

        h1 = fmix64(h1);
        h2 = fmix64(h2);

        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);

        (h1, h2)
    }
}

fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

impl Partitioner for Murmur3Partitioner {
    fn name() -> &'static str {
        "Murmur3Partitioner"
    }

    fn hash(data: &[u8]) -> Token {
        let (h1, _h2) = Self::hash128(data);
        let token = h1 as i64;
        // The minimum token is reserved; Cassandra itself never produces it
        // from a real hash in practice, but guard against a pathological
        // empty-key hash landing exactly on it.
        if token == MIN_TOKEN {
            Token::Murmur3(MIN_TOKEN.wrapping_add(1))
        } else {
            Token::Murmur3(token)
        }
    }

    fn parse(s: &str) -> Result<Token, TokenParseError> {
        let trimmed = s.trim_start();
        if trimmed.is_empty() {
            return Err(TokenParseError::Empty);
        }
        trimmed
            .parse::<i64>()
            .map(Token::Murmur3)
            .map_err(|_| TokenParseError::NotAnInteger(s.to_string()))
    }

    fn format(token: &Token) -> String {
        match token {
            Token::Murmur3(v) => v.to_string(),
            _ => panic!("format called with a token from a different partitioner"),
        }
    }
}
