//! Ambient configuration for the partition manager.
//!
//! Mirrors the teacher's `ClusterConfig`/`ServerConfig` split: a single
//! serializable, `Default`-able struct a host binary loads and passes to
//! `PartitionManager::new`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionManagerConfig {
    /// Bound on the cold-start read of the full trigger set from the
    /// definitions store (spec §4.5 step 4). A timeout is treated as an
    /// empty result and logged as `DefinitionsUnavailable`, never retried
    /// synchronously -- the next membership change will try again.
    #[serde(with = "duration_millis")]
    pub definitions_timeout: Duration,

    /// Buffer size for the bounded channels used to fan view-change and
    /// entry-created notifications out to background tasks.
    pub event_channel_capacity: usize,
}

impl Default for PartitionManagerConfig {
    fn default() -> Self {
        Self {
            definitions_timeout: Duration::from_secs(10),
            event_channel_capacity: 256,
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
