//! Connectivity snapshot types.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Link type as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkClass {
    Wifi,
    Ethernet,
    #[serde(rename = "2g")]
    Cellular2g,
    #[serde(rename = "3g")]
    Cellular3g,
    #[serde(rename = "4g")]
    Cellular4g,
    #[serde(rename = "5g")]
    Cellular5g,
    #[default]
    Unknown,
    None,
}

impl NetworkClass {
    /// Links fast enough for heavy operations without asking the user.
    pub fn is_good(self) -> bool {
        matches!(
            self,
            NetworkClass::Wifi
                | NetworkClass::Ethernet
                | NetworkClass::Cellular4g
                | NetworkClass::Cellular5g
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NetworkClass::Wifi => "wifi",
            NetworkClass::Ethernet => "ethernet",
            NetworkClass::Cellular2g => "2g",
            NetworkClass::Cellular3g => "3g",
            NetworkClass::Cellular4g => "4g",
            NetworkClass::Cellular5g => "5g",
            NetworkClass::Unknown => "unknown",
            NetworkClass::None => "none",
        }
    }
}

impl std::fmt::Display for NetworkClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkClass {
    type Err = std::convert::Infallible;

    /// Unrecognized platform strings map to `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "wifi" | "wi-fi" => NetworkClass::Wifi,
            "ethernet" => NetworkClass::Ethernet,
            "2g" => NetworkClass::Cellular2g,
            "3g" => NetworkClass::Cellular3g,
            "4g" | "lte" => NetworkClass::Cellular4g,
            "5g" => NetworkClass::Cellular5g,
            "none" => NetworkClass::None,
            _ => NetworkClass::Unknown,
        })
    }
}

/// Latest connectivity snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkState {
    pub connected: bool,
    pub class: NetworkClass,
}

impl NetworkState {
    pub fn online(class: NetworkClass) -> Self {
        Self {
            connected: true,
            class,
        }
    }

    pub fn offline() -> Self {
        Self {
            connected: false,
            class: NetworkClass::None,
        }
    }

    pub fn is_offline(&self) -> bool {
        !self.connected
    }

    pub fn is_good(&self) -> bool {
        self.connected && self.class.is_good()
    }
}

/// Assumed online until the first report says otherwise.
impl Default for NetworkState {
    fn default() -> Self {
        Self::online(NetworkClass::Unknown)
    }
}
