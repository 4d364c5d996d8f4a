//! 128-bit resource identifiers and their textual forms.

use std::fmt;

use sw_domain::{Error, Result};

const BASE62: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const HEX_LEN: usize = 32;
const BASE62_LEN: usize = 22;

/// Global id of a catalogue resource.
///
/// The same value is known as raw `gid` bytes in protobuf payloads, as 32
/// lowercase hex chars in metadata URIs, and as 22 base62 chars in
/// `spotify:<kind>:<id>` URIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u128);

impl ResourceId {
    pub fn from_gid(gid: &[u8]) -> Result<Self> {
        if gid.len() > 16 {
            return Err(Error::Decode(format!("gid too long: {} bytes", gid.len())));
        }
        let mut buf = [0u8; 16];
        buf[16 - gid.len()..].copy_from_slice(gid);
        Ok(Self(u128::from_be_bytes(buf)))
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.is_empty() || hex.len() > HEX_LEN || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::Decode(format!("invalid hex id: {hex:?}")));
        }
        u128::from_str_radix(hex, 16)
            .map(Self)
            .map_err(|e| Error::Decode(format!("invalid hex id {hex:?}: {e}")))
    }

    pub fn from_base62(encoded: &str) -> Result<Self> {
        if encoded.is_empty() || encoded.len() > BASE62_LEN {
            return Err(Error::Decode(format!("invalid base62 id: {encoded:?}")));
        }
        let mut value: u128 = 0;
        for c in encoded.bytes() {
            let digit = BASE62
                .iter()
                .position(|&b| b == c)
                .ok_or_else(|| Error::Decode(format!("invalid base62 char {:?}", c as char)))?;
            value = value
                .checked_mul(62)
                .and_then(|v| v.checked_add(digit as u128))
                .ok_or_else(|| Error::Decode(format!("base62 id overflows: {encoded:?}")))?;
        }
        Ok(Self(value))
    }

    /// Parse `spotify:<kind>:<base62>` into its kind and id.
    pub fn from_uri(uri: &str) -> Result<(String, Self)> {
        let mut parts = uri.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("spotify"), Some(kind), Some(id), None) => {
                Ok((kind.to_string(), Self::from_base62(id)?))
            }
            _ => Err(Error::Decode(format!("unsupported resource uri: {uri:?}"))),
        }
    }

    pub fn gid(&self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    pub fn to_hex(&self) -> String {
        format!("{:032x}", self.0)
    }

    pub fn to_base62(&self) -> String {
        let mut digits = [b'0'; BASE62_LEN];
        let mut value = self.0;
        for slot in digits.iter_mut().rev() {
            *slot = BASE62[(value % 62) as usize];
            value /= 62;
        }
        digits.iter().map(|&b| b as char).collect()
    }

    pub fn to_uri(&self, kind: &str) -> String {
        format!("spotify:{kind}:{}", self.to_base62())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "e1987c10dbc34f4d8be1b11ddfd6bb31";

    #[test]
    fn hex_and_gid_agree() {
        let id = ResourceId::from_hex(HEX).unwrap();
        assert_eq!(id.to_hex(), HEX);
        assert_eq!(id.gid()[0], 0xE1);
        assert_eq!(id.gid()[15], 0x31);
        assert_eq!(ResourceId::from_gid(&id.gid()).unwrap(), id);
    }

    #[test]
    fn short_values_are_zero_padded() {
        let id = ResourceId::from_hex("3e").unwrap();
        assert_eq!(id.to_hex(), "0000000000000000000000000000003e");
        assert_eq!(id.to_base62(), "0000000000000000000010");
        assert_eq!(ResourceId::from_gid(&[0x3e]).unwrap(), id);
    }

    #[test]
    fn base62_alphabet_order() {
        assert_eq!(ResourceId::from_base62("a").unwrap(), ResourceId::from_hex("a").unwrap());
        assert_eq!(ResourceId::from_base62("A").unwrap(), ResourceId::from_hex("24").unwrap());
        assert_eq!(ResourceId::from_base62("Z").unwrap(), ResourceId::from_hex("3d").unwrap());
    }

    #[test]
    fn base62_survives_full_width_values() {
        let id = ResourceId::from_hex(HEX).unwrap();
        let encoded = id.to_base62();
        assert_eq!(encoded.len(), 22);
        assert_eq!(ResourceId::from_base62(&encoded).unwrap(), id);
    }

    #[test]
    fn uri_parsing() {
        let id = ResourceId::from_hex(HEX).unwrap();
        let uri = id.to_uri("track");
        let (kind, parsed) = ResourceId::from_uri(&uri).unwrap();
        assert_eq!(kind, "track");
        assert_eq!(parsed, id);
        assert!(ResourceId::from_uri("spotify:user:bob:playlist:x").is_err());
        assert!(ResourceId::from_uri("track:abc").is_err());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(ResourceId::from_hex("").is_err());
        assert!(ResourceId::from_hex("zz").is_err());
        assert!(ResourceId::from_hex(&"f".repeat(33)).is_err());
        assert!(ResourceId::from_hex("+3e").is_err());
        assert!(ResourceId::from_hex("-1").is_err());
        assert!(ResourceId::from_base62("abc-").is_err());
        assert!(ResourceId::from_base62(&"Z".repeat(22)).is_err());
        assert!(ResourceId::from_gid(&[0u8; 17]).is_err());
    }
}
