//! Range key codec
//!
//! IP range endpoints are stored alongside a fixed-width, big-endian binary
//! key. Byte-wise comparison of two keys of the same width gives the same
//! order as numeric comparison of the endpoints, so a plain index on the key
//! columns answers range predicates. SQLite integers are signed 64-bit and
//! cannot hold a 128-bit address, which is why the keys exist at all.
//!
//! 128-bit values are split into a high and a low 64-bit half (division and
//! remainder by 2^64) and each half is encoded as 8 bytes, high half first.

use serde::{Deserialize, Serialize};

/// 2^64, the split point for 128-bit keys
const TWO_EXP_64: u128 = 1 << 64;

/// Address width class of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyWidth {
    /// IPv4-based datasets (4-byte keys)
    V4,
    /// IPv6-based datasets (16-byte keys)
    V6,
}

impl KeyWidth {
    /// Width in bits
    pub const fn bits(self) -> u32 {
        match self {
            KeyWidth::V4 => 32,
            KeyWidth::V6 => 128,
        }
    }

    /// Encoded key length in bytes
    pub const fn key_len(self) -> usize {
        (self.bits() / 8) as usize
    }

    /// Largest endpoint value representable in this width
    pub const fn max_value(self) -> u128 {
        match self {
            KeyWidth::V4 => u32::MAX as u128,
            KeyWidth::V6 => u128::MAX,
        }
    }

    /// Check whether `value` fits in this width
    pub const fn fits(self, value: u128) -> bool {
        value <= self.max_value()
    }
}

impl std::fmt::Display for KeyWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Encode a 32-bit endpoint as a 4-byte big-endian key
pub fn encode_v4(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

/// Encode a 64-bit value as an 8-byte big-endian key
pub fn encode_u64(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Encode a 128-bit endpoint as a 16-byte key (high half ‖ low half)
pub fn encode_v6(value: u128) -> [u8; 16] {
    let high = (value / TWO_EXP_64) as u64;
    let low = (value % TWO_EXP_64) as u64;

    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&encode_u64(high));
    key[8..].copy_from_slice(&encode_u64(low));
    key
}

/// Encode an endpoint for the given width
///
/// Returns `None` if the value does not fit in the width.
pub fn encode(value: u128, width: KeyWidth) -> Option<Vec<u8>> {
    match width {
        KeyWidth::V4 => u32::try_from(value).ok().map(|v| encode_v4(v).to_vec()),
        KeyWidth::V6 => Some(encode_v6(value).to_vec()),
    }
}

/// Decode a key produced by [`encode`]
///
/// Returns `None` if the key length does not match the width.
pub fn decode(key: &[u8], width: KeyWidth) -> Option<u128> {
    match width {
        KeyWidth::V4 => {
            let bytes: [u8; 4] = key.try_into().ok()?;
            Some(u32::from_be_bytes(bytes) as u128)
        }
        KeyWidth::V6 => {
            if key.len() != 16 {
                return None;
            }
            let high: [u8; 8] = key[..8].try_into().ok()?;
            let low: [u8; 8] = key[8..].try_into().ok()?;
            Some(u64::from_be_bytes(high) as u128 * TWO_EXP_64 + u64::from_be_bytes(low) as u128)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_v4_zero_padded() {
        assert_eq!(encode(0, KeyWidth::V4).unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(encode(1, KeyWidth::V4).unwrap(), vec![0, 0, 0, 1]);
        assert_eq!(
            encode(16_843_009, KeyWidth::V4).unwrap(), // 1.1.1.1
            vec![1, 1, 1, 1]
        );
        assert_eq!(
            encode(u32::MAX as u128, KeyWidth::V4).unwrap(),
            vec![0xff; 4]
        );
    }

    #[test]
    fn test_encode_v4_out_of_range() {
        assert!(encode(u32::MAX as u128 + 1, KeyWidth::V4).is_none());
    }

    #[test]
    fn test_encode_v6_split() {
        let key = encode_v6(TWO_EXP_64);
        assert_eq!(key, [0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0]);

        // ::ffff:1.1.1.1
        let mapped: u128 = 0xffff_0101_0101;
        let key = encode_v6(mapped);
        assert_eq!(&key[..8], &[0u8; 8]);
        assert_eq!(&key[8..], &[0, 0, 0xff, 0xff, 1, 1, 1, 1]);
    }

    #[test]
    fn test_key_lengths() {
        assert_eq!(encode(5, KeyWidth::V4).unwrap().len(), KeyWidth::V4.key_len());
        assert_eq!(encode(5, KeyWidth::V6).unwrap().len(), KeyWidth::V6.key_len());
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert!(decode(&[0, 0, 1], KeyWidth::V4).is_none());
        assert!(decode(&[0; 15], KeyWidth::V6).is_none());
        assert!(decode(&[0; 17], KeyWidth::V6).is_none());
    }

    proptest! {
        #[test]
        fn prop_v4_order_preserved(a in any::<u32>(), b in any::<u32>()) {
            prop_assume!(a < b);
            let ka = encode(a as u128, KeyWidth::V4).unwrap();
            let kb = encode(b as u128, KeyWidth::V4).unwrap();
            prop_assert!(ka < kb);
        }

        #[test]
        fn prop_v6_order_preserved(a in any::<u128>(), b in any::<u128>()) {
            prop_assume!(a < b);
            prop_assert!(encode_v6(a) < encode_v6(b));
        }

        #[test]
        fn prop_v6_is_high_then_low(v in any::<u128>()) {
            let mut expected = encode_u64((v / TWO_EXP_64) as u64).to_vec();
            expected.extend_from_slice(&encode_u64((v % TWO_EXP_64) as u64));
            prop_assert_eq!(encode_v6(v).to_vec(), expected);
        }

        #[test]
        fn prop_decode_inverts_encode(v in any::<u128>(), w in any::<u32>()) {
            prop_assert_eq!(decode(&encode_v6(v), KeyWidth::V6), Some(v));
            prop_assert_eq!(decode(&encode_v4(w), KeyWidth::V4), Some(w as u128));
        }
    }
}
