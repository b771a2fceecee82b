//! CloudFront configuration

use crate::error::{Result, StackError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceClass {
    #[serde(rename = "PriceClass_100")]
    Class100,
    #[serde(rename = "PriceClass_200")]
    Class200,
    #[serde(rename = "PriceClass_All")]
    All,
}

impl PriceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceClass::Class100 => "PriceClass_100",
            PriceClass::Class200 => "PriceClass_200",
            PriceClass::All => "PriceClass_All",
        }
    }
}

impl std::str::FromStr for PriceClass {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PriceClass_100" | "100" => Ok(PriceClass::Class100),
            "PriceClass_200" | "200" => Ok(PriceClass::Class200),
            "PriceClass_All" | "all" => Ok(PriceClass::All),
            other => Err(StackError::InvalidConfig(format!(
                "unknown price class: {}",
                other
            ))),
        }
    }
}

/// Distribution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnConfig {
    pub price_class: PriceClass,

    /// Path patterns served with the cache-optimized, compressed behavior
    pub cached_paths: Vec<String>,

    pub ipv6: bool,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            price_class: PriceClass::Class200,
            cached_paths: vec!["assets/*".to_string(), "icon/*".to_string()],
            ipv6: true,
        }
    }
}
