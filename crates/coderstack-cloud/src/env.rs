//! Target account/region for a stack

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "ap-northeast-1";

/// Account and region a stack is rendered for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEnv {
    /// Account ID; `None` renders an account-agnostic stack
    pub account: Option<String>,

    pub region: String,
}

impl StackEnv {
    /// Build an environment, falling back to [`DEFAULT_REGION`]
    pub fn new(account: Option<String>, region: Option<String>) -> Result<Self> {
        let account = account.filter(|a| !a.trim().is_empty());
        let region = region
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        if let Some(account) = &account
            && (account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()))
        {
            return Err(CloudError::InvalidConfig(format!(
                "account ID must be 12 digits: {}",
                account
            )));
        }

        let valid_region = region.split('-').count() >= 3
            && region
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid_region {
            return Err(CloudError::InvalidConfig(format!(
                "invalid region: {}",
                region
            )));
        }

        Ok(Self { account, region })
    }

    /// `aws://<account>/<region>`
    pub fn uri(&self) -> String {
        format!(
            "aws://{}/{}",
            self.account.as_deref().unwrap_or("unknown-account"),
            self.region
        )
    }
}

impl Default for StackEnv {
    fn default() -> Self {
        Self {
            account: None,
            region: DEFAULT_REGION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_region() {
        let env = StackEnv::new(None, None).unwrap();
        assert_eq!(env.region, "ap-northeast-1");
        assert_eq!(env.uri(), "aws://unknown-account/ap-northeast-1");

        let blank = StackEnv::new(Some(" ".to_string()), Some(String::new())).unwrap();
        assert_eq!(blank, StackEnv::default());
    }

    #[test]
    fn test_explicit_env() {
        let env = StackEnv::new(
            Some("123456789012".to_string()),
            Some("us-east-1".to_string()),
        )
        .unwrap();
        assert_eq!(env.uri(), "aws://123456789012/us-east-1");
    }

    #[test]
    fn test_invalid_env() {
        assert!(StackEnv::new(Some("12345".to_string()), None).is_err());
        assert!(StackEnv::new(None, Some("Tokyo".to_string())).is_err());
    }
}
