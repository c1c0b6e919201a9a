use serde::Serialize;

/// Identifies the host SDK embedding this core. Stamped into the `library` section of every
/// event's context, so server-side analytics can tell which platform binding produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkMetadata {
    /// SDK name. Usually, the host platform name (e.g., "attune-web").
    pub name: &'static str,
    /// Version of the SDK.
    pub version: &'static str,
}

impl SdkMetadata {
    /// Metadata for the core library itself, used when a host SDK doesn't supply its own.
    pub fn core() -> SdkMetadata {
        SdkMetadata {
            name: "attune-core",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
