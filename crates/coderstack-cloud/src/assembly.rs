//! Cloud assembly output
//!
//! Writes synthesized templates plus a `manifest.json` describing them into
//! an output directory (`cdk.out` by default) that a provisioning engine
//! picks up.

use crate::env::StackEnv;
use crate::error::{CloudError, Result};
use crate::stack::Template;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const MANIFEST_VERSION: u32 = 1;
const MANIFEST_FILE: &str = "manifest.json";
const MANIFEST_BACKUP: &str = "manifest.json.backup";

/// Default output directory
pub const DEFAULT_OUT_DIR: &str = "cdk.out";

/// Template file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateFormat {
    #[default]
    Json,
    Yaml,
}

impl TemplateFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TemplateFormat::Json => "json",
            TemplateFormat::Yaml => "yaml",
        }
    }
}

impl std::fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Manifest listing all stacks in the assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyManifest {
    /// Manifest version
    pub version: u32,

    /// When the assembly was written
    pub generated_at: DateTime<Utc>,

    /// Artifacts indexed by stack name
    pub stacks: BTreeMap<String, StackArtifact>,
}

impl Default for AssemblyManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            generated_at: Utc::now(),
            stacks: BTreeMap::new(),
        }
    }
}

/// One synthesized stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackArtifact {
    /// Template file name, relative to the assembly directory
    pub template_file: String,

    pub format: TemplateFormat,

    /// `aws://<account>/<region>`
    pub environment: String,

    pub resource_count: usize,
}

/// Reads and writes an assembly directory
pub struct CloudAssembly {
    out_dir: PathBuf,
}

impl CloudAssembly {
    pub fn new(out_dir: impl AsRef<Path>) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn manifest_path(&self) -> PathBuf {
        self.out_dir.join(MANIFEST_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.out_dir.join(MANIFEST_BACKUP)
    }

    async fn ensure_out_dir(&self) -> Result<()> {
        if !self.out_dir.exists() {
            fs::create_dir_all(&self.out_dir).await?;
            tracing::debug!("Created assembly directory: {}", self.out_dir.display());
        }
        Ok(())
    }

    /// Load the manifest, or an empty one if the assembly does not exist yet
    pub async fn load_manifest(&self) -> Result<AssemblyManifest> {
        let path = self.manifest_path();
        if !path.exists() {
            tracing::debug!("Manifest not found, returning empty manifest");
            return Ok(AssemblyManifest::default());
        }

        let content = fs::read_to_string(&path).await?;
        let manifest: AssemblyManifest = serde_json::from_str(&content)?;

        if manifest.version > MANIFEST_VERSION {
            return Err(CloudError::AssemblyError(format!(
                "Manifest version {} is newer than supported version {}",
                manifest.version, MANIFEST_VERSION
            )));
        }

        tracing::debug!("Loaded manifest with {} stacks", manifest.stacks.len());
        Ok(manifest)
    }

    /// Write a stack template and record it in the manifest.
    ///
    /// Returns the path of the written template.
    pub async fn write_stack(
        &self,
        stack_name: &str,
        env: &StackEnv,
        template: &Template,
        format: TemplateFormat,
    ) -> Result<PathBuf> {
        self.ensure_out_dir().await?;

        let template_file = format!("{}.template.{}", stack_name, format.extension());
        let template_path = self.out_dir.join(&template_file);
        let content = match format {
            TemplateFormat::Json => template.to_json()?,
            TemplateFormat::Yaml => template.to_yaml()?,
        };
        fs::write(&template_path, content).await?;
        tracing::info!(path = %template_path.display(), "Wrote template");

        let mut manifest = self.load_manifest().await?;
        manifest.version = MANIFEST_VERSION;
        manifest.generated_at = Utc::now();
        manifest.stacks.insert(
            stack_name.to_string(),
            StackArtifact {
                template_file,
                format,
                environment: env.uri(),
                resource_count: template.resources.len(),
            },
        );
        self.save_manifest(&manifest).await?;

        Ok(template_path)
    }

    async fn save_manifest(&self, manifest: &AssemblyManifest) -> Result<()> {
        let path = self.manifest_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created manifest backup");
        }

        let content = serde_json::to_string_pretty(manifest)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved manifest with {} stacks", manifest.stacks.len());
        Ok(())
    }

    /// Read back a previously written template
    pub async fn read_template(&self, stack_name: &str) -> Result<Template> {
        let manifest = self.load_manifest().await?;
        let artifact = manifest.stacks.get(stack_name).ok_or_else(|| {
            CloudError::AssemblyError(format!("stack '{}' is not in the assembly", stack_name))
        })?;

        let content = fs::read_to_string(self.out_dir.join(&artifact.template_file)).await?;
        let template = match artifact.format {
            TemplateFormat::Json => serde_json::from_str(&content)?,
            TemplateFormat::Yaml => serde_yaml::from_str(&content)?,
        };
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::Stack;
    use serde_json::json;
    use tempfile::tempdir;

    fn template() -> Template {
        let mut stack = Stack::new("Coder", StackEnv::default()).unwrap();
        stack
            .add_resource("Vpc", "AWS::EC2::VPC", json!({"CidrBlock": "10.0.0.0/16"}))
            .unwrap();
        stack.synth().unwrap()
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let temp_dir = tempdir().unwrap();
        let assembly = CloudAssembly::new(temp_dir.path().join("cdk.out"));
        let template = template();

        let path = assembly
            .write_stack("Coder", &StackEnv::default(), &template, TemplateFormat::Json)
            .await
            .unwrap();
        assert!(path.ends_with("Coder.template.json"));

        let manifest = assembly.load_manifest().await.unwrap();
        let artifact = &manifest.stacks["Coder"];
        assert_eq!(artifact.resource_count, 1);
        assert_eq!(artifact.environment, "aws://unknown-account/ap-northeast-1");

        let loaded = assembly.read_template("Coder").await.unwrap();
        assert_eq!(loaded, template);
    }

    #[tokio::test]
    async fn test_yaml_format_and_backup() {
        let temp_dir = tempdir().unwrap();
        let assembly = CloudAssembly::new(temp_dir.path());
        let template = template();

        assembly
            .write_stack("Coder", &StackEnv::default(), &template, TemplateFormat::Json)
            .await
            .unwrap();
        let path = assembly
            .write_stack("Coder", &StackEnv::default(), &template, TemplateFormat::Yaml)
            .await
            .unwrap();
        assert!(path.ends_with("Coder.template.yaml"));
        assert!(temp_dir.path().join(MANIFEST_BACKUP).exists());

        let loaded = assembly.read_template("Coder").await.unwrap();
        assert_eq!(loaded.resources.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_assembly() {
        let temp_dir = tempdir().unwrap();
        let assembly = CloudAssembly::new(temp_dir.path());

        let manifest = assembly.load_manifest().await.unwrap();
        assert!(manifest.stacks.is_empty());
        assert!(matches!(
            assembly.read_template("Coder").await,
            Err(CloudError::AssemblyError(_))
        ));
    }
}
