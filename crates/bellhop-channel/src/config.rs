use bellhop_transport::ANY_ORIGIN;
use bellhop_wire::WireConfig;

/// Configuration for a [`Channel`](crate::Channel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Target origin used by [`Channel::connect`](crate::Channel::connect).
    pub default_origin: String,
    /// Inbound decoding limits.
    pub wire: WireConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            default_origin: ANY_ORIGIN.to_string(),
            wire: WireConfig::default(),
        }
    }
}
