//! Duration serialization/deserialization helpers.
//!
//! Durations cross the serde boundary as integer milliseconds:
//! - Serialization: `Duration` -> `u64` milliseconds
//! - Deserialization: `u64` milliseconds -> `Duration`

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

fn as_millis(d: &Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Serializes `Duration` as milliseconds.
pub fn serialize<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(as_millis(d))
}

/// Deserializes `Duration` from milliseconds.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

/// `Option<Duration>` helpers.
pub mod option {
    use super::{Deserialize, Deserializer, Duration, Serializer, as_millis};

    pub fn serialize<S>(d: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match d {
            Some(d) => serializer.serialize_some(&as_millis(d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

/// `Vec<Duration>` helpers.
pub mod vec {
    use serde::ser::SerializeSeq;

    use super::{Deserialize, Deserializer, Duration, Serializer, as_millis};

    pub fn serialize<S>(ds: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(ds.len()))?;
        for d in ds {
            seq.serialize_element(&as_millis(d))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Vec::<u64>::deserialize(deserializer)?
            .into_iter()
            .map(Duration::from_millis)
            .collect())
    }
}
