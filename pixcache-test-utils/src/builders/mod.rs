//! Builders for test payloads

mod payload;

pub use payload::TestPayloadBuilder;
