//! Coder on AWS
//!
//! Declares the infrastructure that hosts Coder: a dual-stack VPC, an Aurora
//! PostgreSQL cluster, the provisioner's IAM role, a Fargate service behind
//! an application load balancer and a CloudFront distribution. The result is
//! a [`coderstack_cloud::Stack`] ready to be synthesized.
//!
//! ```no_run
//! use coderstack_cloud::StackEnv;
//! use coderstack_core::{CoderStack, StackConfig};
//!
//! let built = CoderStack::build(&StackConfig::default(), StackEnv::default())?;
//! let template = built.synth()?;
//! println!("{}", template.to_json()?);
//! # Ok::<(), coderstack_core::StackError>(())
//! ```

pub mod construct;
pub mod error;
pub mod health;
pub mod loader;
pub mod model;
pub mod parser;
pub mod stack;

pub use construct::*;
pub use error::{Result, StackError};
pub use health::{HealthCheck, HealthTracker, HttpCodeMatcher, ProbeOutcome, TargetHealth};
pub use loader::load_config;
pub use model::*;
pub use parser::{parse_kdl_file, parse_kdl_string};
pub use stack::{CoderStack, SHARED_TASK_ROLE_METADATA};
