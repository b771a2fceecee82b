//! coderstack cloud declarations
//!
//! This crate provides the building blocks for declaring AWS resources and
//! rendering them into a CloudFormation template. It does not talk to AWS:
//! provisioning, ordering and rollback belong to the engine that deploys the
//! rendered template.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                coderstack CLI                    │
//! │           (synth / plan / validate)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               coderstack-core                    │
//! │  network / database / role / service / cdn       │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               coderstack-cloud                   │
//! │  ┌──────────┐ ┌──────────┐ ┌─────────────────┐  │
//! │  │  Token   │ │  Stack   │ │  CloudAssembly  │  │
//! │  └──────────┘ └──────────┘ └─────────────────┘  │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod action;
pub mod assembly;
pub mod cidr;
pub mod deferred;
pub mod env;
pub mod error;
pub mod stack;
pub mod token;

// Re-exports
pub use action::{Action, Plan, PlanSummary};
pub use assembly::{AssemblyManifest, CloudAssembly, DEFAULT_OUT_DIR, StackArtifact, TemplateFormat};
pub use cidr::{CidrAllocator, Ipv4Cidr};
pub use deferred::Deferred;
pub use env::{DEFAULT_REGION, StackEnv};
pub use error::{CloudError, Result};
pub use stack::{DeletionPolicy, Output, Resource, Stack, Template};
pub use token::{AttributeValues, Token};
