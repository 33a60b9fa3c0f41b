//! 48-bit IEEE 802 MAC addresses.
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// MAC address as it appears in the address fields of an 802.11 header.
///
/// Formatted in lowercase colon notation, the way capture tools print it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Read an address from the first six bytes of `buf`, if there are enough.
    pub fn from_slice(buf: &[u8]) -> Option<Self> {
        let bytes: [u8; 6] = buf.get(..6)?.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Group (multicast or broadcast) addresses have bit 0 of the first octet set.
    pub fn is_group(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({})", self)
    }
}

impl FromStr for MacAddress {
    type Err = String;

    /// Accepts `:` or `-` separated hex octets, in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(format!("Invalid MAC address: {}", s));
        }

        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(&parts) {
            if part.len() != 2 {
                return Err(format!("Invalid MAC address octet '{}' in {}", part, s));
            }
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| format!("Invalid MAC address octet '{}' in {}", part, s))?;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        let upper: MacAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let lower: MacAddress = "aa-bb-cc-dd-ee-ff".parse().unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("00:11:22:33:44".parse::<MacAddress>().is_err());
        assert!("00:11:22:33:44:5".parse::<MacAddress>().is_err());
        assert!("00:11:22:33:44:zz".parse::<MacAddress>().is_err());
    }

    #[test]
    fn from_slice_needs_six_bytes() {
        assert_eq!(MacAddress::from_slice(&[1, 2, 3, 4, 5]), None);
        assert_eq!(
            MacAddress::from_slice(&[1, 2, 3, 4, 5, 6, 7]),
            Some(MacAddress([1, 2, 3, 4, 5, 6]))
        );
    }

    #[test]
    fn group_bit() {
        assert!(MacAddress([0xFF; 6]).is_group());
        assert!("01:00:5e:00:00:01".parse::<MacAddress>().unwrap().is_group());
        assert!(!"00:11:22:33:44:55".parse::<MacAddress>().unwrap().is_group());
    }
}
