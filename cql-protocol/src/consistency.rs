//! Consistency levels a request can be executed with.
use crate::error;
use crate::frame::{FromCursor, Serialize};
use crate::types::*;
use derive_more::Display;
use std::convert::{From, TryFrom};
use std::io;
use std::str::FromStr;

/// Number of replicas that must acknowledge a read or write before the coordinator answers.
#[derive(Debug, PartialEq, Clone, Copy, Display, Ord, PartialOrd, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Consistency {
    /// Any node, hinted handoff included. Writes only.
    Any,
    #[default]
    One,
    Two,
    Three,
    /// Majority of replicas across the cluster.
    Quorum,
    All,
    /// Majority of replicas in the coordinator's data center.
    LocalQuorum,
    /// Majority of replicas in every data center.
    EachQuorum,
    Serial,
    LocalSerial,
    /// One replica in the coordinator's data center.
    LocalOne,
}

impl FromStr for Consistency {
    type Err = error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let consistency = match s {
            "Any" | "ANY" => Consistency::Any,
            "One" | "ONE" => Consistency::One,
            "Two" | "TWO" => Consistency::Two,
            "Three" | "THREE" => Consistency::Three,
            "Quorum" | "QUORUM" => Consistency::Quorum,
            "All" | "ALL" => Consistency::All,
            "LocalQuorum" | "LOCAL_QUORUM" => Consistency::LocalQuorum,
            "EachQuorum" | "EACH_QUORUM" => Consistency::EachQuorum,
            "Serial" | "SERIAL" => Consistency::Serial,
            "LocalSerial" | "LOCAL_SERIAL" => Consistency::LocalSerial,
            "LocalOne" | "LOCAL_ONE" => Consistency::LocalOne,
            _ => {
                return Err(error::Error::General(format!(
                    "Invalid consistency provided: {s}"
                )))
            }
        };

        Ok(consistency)
    }
}

impl Serialize for Consistency {
    fn serialize(&self, cursor: &mut io::Cursor<&mut Vec<u8>>) {
        let value: CShort = (*self).into();
        value.serialize(cursor)
    }
}

impl FromCursor for Consistency {
    fn from_cursor(cursor: &mut io::Cursor<&[u8]>) -> error::Result<Consistency> {
        CShort::from_cursor(cursor).and_then(Consistency::try_from)
    }
}

impl TryFrom<CShort> for Consistency {
    type Error = error::Error;

    fn try_from(value: CShort) -> Result<Self, Self::Error> {
        match value {
            0x0000 => Ok(Consistency::Any),
            0x0001 => Ok(Consistency::One),
            0x0002 => Ok(Consistency::Two),
            0x0003 => Ok(Consistency::Three),
            0x0004 => Ok(Consistency::Quorum),
            0x0005 => Ok(Consistency::All),
            0x0006 => Ok(Consistency::LocalQuorum),
            0x0007 => Ok(Consistency::EachQuorum),
            0x0008 => Ok(Consistency::Serial),
            0x0009 => Ok(Consistency::LocalSerial),
            0x000A => Ok(Consistency::LocalOne),
            _ => Err(Self::Error::UnknownConsistency(value)),
        }
    }
}

impl From<Consistency> for CShort {
    fn from(value: Consistency) -> Self {
        match value {
            Consistency::Any => 0x0000,
            Consistency::One => 0x0001,
            Consistency::Two => 0x0002,
            Consistency::Three => 0x0003,
            Consistency::Quorum => 0x0004,
            Consistency::All => 0x0005,
            Consistency::LocalQuorum => 0x0006,
            Consistency::EachQuorum => 0x0007,
            Consistency::Serial => 0x0008,
            Consistency::LocalSerial => 0x0009,
            Consistency::LocalOne => 0x000A,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_consistency_serialize() {
        assert_eq!(Consistency::Any.serialize_to_vec(), &[0, 0]);
        assert_eq!(Consistency::One.serialize_to_vec(), &[0, 1]);
        assert_eq!(Consistency::Quorum.serialize_to_vec(), &[0, 4]);
        assert_eq!(Consistency::LocalOne.serialize_to_vec(), &[0, 10]);
    }

    #[test]
    fn test_consistency_from_cursor() {
        let mut cursor: Cursor<&[u8]> = Cursor::new(&[0, 6]);
        assert_eq!(
            Consistency::from_cursor(&mut cursor).unwrap(),
            Consistency::LocalQuorum
        );
    }

    #[test]
    fn test_unknown_consistency() {
        assert!(matches!(
            Consistency::try_from(0x000B),
            Err(error::Error::UnknownConsistency(0x000B))
        ));
    }

    #[test]
    fn test_consistency_from_str() {
        assert_eq!("Quorum".parse::<Consistency>().unwrap(), Consistency::Quorum);
        assert_eq!(
            "LOCAL_QUORUM".parse::<Consistency>().unwrap(),
            Consistency::LocalQuorum
        );
        assert!("Majority".parse::<Consistency>().is_err());
    }

    #[test]
    fn test_all_codes_round_trip() {
        for code in 0..=0x000A {
            let consistency = Consistency::try_from(code).unwrap();
            assert_eq!(CShort::from(consistency), code);
        }
    }
}
