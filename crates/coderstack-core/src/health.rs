//! Load balancer health check contract
//!
//! The stack only supplies thresholds; the probe loop itself runs in the
//! load balancer. [`HealthTracker`] reproduces the two-state machine those
//! thresholds drive so the contract can be checked locally.

use crate::error::{Result, StackError};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Target group health check settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub path: String,
    pub interval: Duration,
    pub timeout: Duration,

    /// Consecutive successes needed to become healthy
    pub healthy_threshold: u32,

    /// Consecutive failures needed to become unhealthy
    pub unhealthy_threshold: u32,

    /// Matcher such as "200", "200,302" or "200-299"
    pub healthy_http_codes: String,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            path: "/healthz".to_string(),
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(3),
            healthy_threshold: 3,
            unhealthy_threshold: 2,
            healthy_http_codes: "200".to_string(),
        }
    }
}

impl HealthCheck {
    /// Check the settings against application load balancer limits
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(invalid(format!("path must start with '/': {}", self.path)));
        }
        for (name, value) in [
            ("healthy threshold", self.healthy_threshold),
            ("unhealthy threshold", self.unhealthy_threshold),
        ] {
            if !(2..=10).contains(&value) {
                return Err(invalid(format!("{} must be between 2 and 10, got {}", name, value)));
            }
        }

        let interval = self.interval.as_secs();
        if !(5..=300).contains(&interval) || self.interval.subsec_nanos() != 0 {
            return Err(invalid(format!(
                "interval must be 5-300 whole seconds, got {:?}",
                self.interval
            )));
        }
        let timeout = self.timeout.as_secs();
        if !(2..=120).contains(&timeout) || self.timeout.subsec_nanos() != 0 {
            return Err(invalid(format!(
                "timeout must be 2-120 whole seconds, got {:?}",
                self.timeout
            )));
        }
        if self.timeout >= self.interval {
            return Err(invalid(format!(
                "timeout ({}s) must be shorter than the interval ({}s)",
                timeout, interval
            )));
        }

        self.matcher()?;
        Ok(())
    }

    pub fn matcher(&self) -> Result<HttpCodeMatcher> {
        self.healthy_http_codes.parse()
    }

    /// Classify one probe: `status` is `None` when the connection failed
    pub fn classify(&self, status: Option<u16>, elapsed: Duration) -> Result<ProbeOutcome> {
        let matcher = self.matcher()?;
        let outcome = match status {
            Some(code) if elapsed <= self.timeout && matcher.matches(code) => ProbeOutcome::Success,
            _ => ProbeOutcome::Failure,
        };
        Ok(outcome)
    }
}

fn invalid(message: String) -> StackError {
    StackError::InvalidHealthCheck(message)
}

/// Accepted HTTP status codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCodeMatcher {
    ranges: Vec<RangeInclusive<u16>>,
}

impl HttpCodeMatcher {
    pub fn matches(&self, code: u16) -> bool {
        self.ranges.iter().any(|r| r.contains(&code))
    }
}

impl std::str::FromStr for HttpCodeMatcher {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        let parse_code = |text: &str| -> Result<u16> {
            let code: u16 = text
                .trim()
                .parse()
                .map_err(|_| invalid(format!("invalid HTTP code '{}' in '{}'", text, s)))?;
            if !(200..=499).contains(&code) {
                return Err(invalid(format!("HTTP code {} is outside 200-499", code)));
            }
            Ok(code)
        };

        let mut ranges = Vec::new();
        for part in s.split(',') {
            let range = match part.split_once('-') {
                Some((low, high)) => parse_code(low)?..=parse_code(high)?,
                None => {
                    let code = parse_code(part)?;
                    code..=code
                }
            };
            if range.is_empty() {
                return Err(invalid(format!("empty HTTP code range '{}'", part)));
            }
            ranges.push(range);
        }
        Ok(Self { ranges })
    }
}

/// Result of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success,
    Failure,
}

/// Target health as seen by the load balancer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetHealth {
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for TargetHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetHealth::Healthy => write!(f, "healthy"),
            TargetHealth::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Threshold-driven health state machine
#[derive(Debug, Clone)]
pub struct HealthTracker {
    state: TargetHealth,
    healthy_threshold: u32,
    unhealthy_threshold: u32,
    streak: u32,
}

impl HealthTracker {
    /// New targets start unhealthy
    pub fn new(check: &HealthCheck) -> Self {
        Self {
            state: TargetHealth::Unhealthy,
            healthy_threshold: check.healthy_threshold,
            unhealthy_threshold: check.unhealthy_threshold,
            streak: 0,
        }
    }

    pub fn state(&self) -> TargetHealth {
        self.state
    }

    /// Feed one probe result; returns the new state if it flipped
    pub fn observe(&mut self, outcome: ProbeOutcome) -> Option<TargetHealth> {
        let (opposes, threshold, next) = match (self.state, outcome) {
            (TargetHealth::Unhealthy, ProbeOutcome::Success) => {
                (true, self.healthy_threshold, TargetHealth::Healthy)
            }
            (TargetHealth::Healthy, ProbeOutcome::Failure) => {
                (true, self.unhealthy_threshold, TargetHealth::Unhealthy)
            }
            _ => (false, 0, self.state),
        };

        if !opposes {
            self.streak = 0;
            return None;
        }

        self.streak += 1;
        if self.streak < threshold {
            return None;
        }

        self.state = next;
        self.streak = 0;
        Some(next)
    }
}
