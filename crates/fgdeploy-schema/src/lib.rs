//! Declared configuration for fgdeploy.
//!
//! This crate defines the schema layer: TOML manifest parsing (`ManifestV1`),
//! normalization into per-function desired state (`DesiredFunctionConfig`,
//! `DesiredTriggerConfig`), the canonical function URN (`FunctionUrn`), trigger
//! kind tags, and the camelCase/snake_case key normalization applied to trigger
//! event data.

pub mod desired;
pub mod keys;
pub mod manifest;
pub mod normalize;
pub mod trigger;
pub mod types;
pub mod urn;

pub use desired::{
    CodeSource, DesiredFunctionConfig, DesiredTriggerConfig, LogBinding, NetworkConfig,
    TagPolicy, VpcBinding,
};
pub use keys::{normalize_keys, to_snake_case, EventData};
pub use manifest::{
    parse_manifest_file, parse_manifest_str, CodeType, ConcurrencySection, EnvironmentSection,
    FunctionSection, LogSection, ManifestError, ManifestV1, ProviderSection, TriggerSection,
    VpcSection,
};
pub use normalize::{NormalizeOptions, NormalizedManifest};
pub use trigger::{TriggerKind, TriggerStatus};
pub use types::{ProjectId, TriggerId};
pub use urn::FunctionUrn;
