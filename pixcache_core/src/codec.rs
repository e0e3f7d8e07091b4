//! Encodings for items persisted by the disk tier

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Turns a cache item into bytes on disk and back
pub trait ItemCodec: Send + Sync + Default + 'static {
    /// Short name used in log messages
    const NAME: &'static str;

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, String>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, String>;
}

/// Compact binary encoding, the default for image payloads
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl ItemCodec for BincodeCodec {
    const NAME: &'static str = "bincode";

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, String> {
        bincode::serialize(value).map_err(|e| e.to_string())
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, String> {
        bincode::deserialize(bytes).map_err(|e| e.to_string())
    }
}

/// Human-readable JSON encoding
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl ItemCodec for JsonCodec {
    const NAME: &'static str = "json";

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, String> {
        serde_json::to_vec(value).map_err(|e| e.to_string())
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, String> {
        serde_json::from_slice(bytes).map_err(|e| e.to_string())
    }
}
