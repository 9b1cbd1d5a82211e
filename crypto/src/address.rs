//! Human-readable account encoding.
//!
//! Format: `lat_` + base32(4 zero bits ++ public key, 52 chars)
//! + base32(checksum, 8 chars). The checksum is the 5-byte Blake2b digest of
//! the public key, byte-reversed.

use lattice_types::Account;
use thiserror::Error;

const BASE32_ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";

/// Reverse lookup table: ASCII byte to 5-bit value (0xFF = invalid).
const BASE32_DECODE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let mut i = 0;
    while i < 32 {
        table[BASE32_ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

const PREFIX: &str = "lat_";
const KEY_CHARS: usize = 52;
const CHECKSUM_CHARS: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must start with `{PREFIX}`")]
    MissingPrefix,
    #[error("address body must be {expected} characters, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("invalid base32 character {0:?}")]
    InvalidCharacter(char),
    #[error("checksum mismatch")]
    BadChecksum,
}

fn checksum(key: &[u8; 32]) -> [u8; 5] {
    let mut digest = crate::hash::blake2b_40(key);
    digest.reverse();
    digest
}

/// Encode an account as a `lat_` address.
pub fn encode_account(account: &Account) -> String {
    let mut out = String::with_capacity(PREFIX.len() + KEY_CHARS + CHECKSUM_CHARS);
    out.push_str(PREFIX);

    // 260 bits: four leading zero bits then the key, read 5 bits at a time.
    let mut acc: u32 = 0;
    let mut bits = 4;
    for &byte in account.as_bytes() {
        acc = (acc << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((acc >> bits) & 0x1F) as usize] as char);
        }
    }

    let check = u64::from_be_bytes({
        let mut wide = [0u8; 8];
        wide[3..].copy_from_slice(&checksum(account.as_bytes()));
        wide
    });
    for i in (0..CHECKSUM_CHARS).rev() {
        out.push(BASE32_ALPHABET[((check >> (i * 5)) & 0x1F) as usize] as char);
    }
    out
}

fn decode_chars(s: &str) -> Result<Vec<u8>, AddressError> {
    s.chars()
        .map(|c| {
            let v = if c.is_ascii() { BASE32_DECODE[c as usize] } else { 0xFF };
            if v == 0xFF {
                Err(AddressError::InvalidCharacter(c))
            } else {
                Ok(v)
            }
        })
        .collect()
}

/// Decode a `lat_` address back into an account, verifying its checksum.
pub fn decode_account(address: &str) -> Result<Account, AddressError> {
    let body = address
        .strip_prefix(PREFIX)
        .ok_or(AddressError::MissingPrefix)?;
    if body.len() != KEY_CHARS + CHECKSUM_CHARS {
        return Err(AddressError::WrongLength {
            expected: KEY_CHARS + CHECKSUM_CHARS,
            actual: body.len(),
        });
    }
    let values = decode_chars(body)?;

    let mut key = [0u8; 32];
    let mut acc: u32 = 0;
    let mut bits = 0;
    let mut pos = 0;
    for (i, &v) in values[..KEY_CHARS].iter().enumerate() {
        acc = (acc << 5) | v as u32;
        bits += 5;
        if i == 0 {
            // The first character carries the four padding bits.
            if v > 1 {
                return Err(AddressError::BadChecksum);
            }
            bits -= 4;
            acc &= 1;
        }
        if bits >= 8 {
            bits -= 8;
            key[pos] = (acc >> bits) as u8;
            pos += 1;
        }
    }

    let mut check: u64 = 0;
    for &v in &values[KEY_CHARS..] {
        check = (check << 5) | v as u64;
    }
    let expected = checksum(&key);
    if check.to_be_bytes()[3..] != expected {
        return Err(AddressError::BadChecksum);
    }
    Ok(Account::new(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::keypair_from_seed;
    use proptest::prelude::*;

    #[test]
    fn encode_has_expected_shape() {
        let account = keypair_from_seed(&[7u8; 32]).account();
        let addr = encode_account(&account);
        assert!(addr.starts_with("lat_"));
        assert_eq!(addr.len(), 64);
        assert_eq!(decode_account(&addr), Ok(account));
    }

    #[test]
    fn burn_account_encodes_to_ones() {
        let addr = encode_account(&Account::BURN);
        assert!(addr[4..56].chars().all(|c| c == '1'));
        assert_eq!(decode_account(&addr), Ok(Account::BURN));
    }

    #[test]
    fn invalid_prefix_rejected() {
        let addr = encode_account(&Account::new([1; 32])).replacen("lat_", "xyz_", 1);
        assert_eq!(decode_account(&addr), Err(AddressError::MissingPrefix));
    }

    #[test]
    fn flipped_checksum_rejected() {
        let mut addr = encode_account(&Account::new([9; 32]));
        let last = addr.pop().unwrap();
        addr.push(if last == '1' { '3' } else { '1' });
        assert_eq!(decode_account(&addr), Err(AddressError::BadChecksum));
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(matches!(
            decode_account("lat_short"),
            Err(AddressError::WrongLength { .. })
        ));
    }

    #[test]
    fn invalid_character_rejected() {
        let mut addr = encode_account(&Account::new([9; 32]));
        addr.replace_range(10..11, "0");
        assert_eq!(decode_account(&addr), Err(AddressError::InvalidCharacter('0')));
    }

    proptest! {
        #[test]
        fn any_account_survives_encoding(bytes in any::<[u8; 32]>()) {
            let account = Account::new(bytes);
            let addr = encode_account(&account);
            prop_assert!(addr.starts_with("lat_"));
            prop_assert_eq!(addr.len(), 64);
            prop_assert_eq!(decode_account(&addr), Ok(account));
        }
    }
}
