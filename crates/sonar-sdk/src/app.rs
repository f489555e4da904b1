//! Application root and cloud assembly synthesis.
//!
//! An [`App`] collects stacks; [`App::synth`] renders each of them into a
//! template and records the result in a manifest. Nothing touches the
//! filesystem until [`CloudAssembly::write_to`] is called.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sonar_common::constants::{MANIFEST_FILE, MANIFEST_VERSION};
use sonar_common::error::{Result, SonarError};
use sonar_common::types::Sha256Hash;

use crate::stack::Stack;

/// Artifact type recorded for every synthesized stack.
pub const STACK_ARTIFACT_TYPE: &str = "sonar:stack-template";

/// Root of a set of stacks.
#[derive(Default)]
pub struct App {
    stacks: Vec<Box<dyn Stack>>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field(
                "stacks",
                &self.stacks.iter().map(|s| s.id().as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl App {
    /// Creates an app with no stacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stack.
    pub fn add_stack(&mut self, stack: impl Stack + 'static) -> &mut Self {
        self.stacks.push(Box::new(stack));
        self
    }

    /// Number of stacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    /// Returns `true` if no stack was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Renders every stack into a cloud assembly.
    ///
    /// # Errors
    ///
    /// Returns an error if two stacks share an id or a stack fails to render.
    pub fn synth(&self) -> Result<CloudAssembly> {
        tracing::info!(stacks = self.stacks.len(), "synthesizing cloud assembly");
        let mut templates = BTreeMap::new();
        let mut artifacts = BTreeMap::new();

        for stack in &self.stacks {
            let id = stack.id();
            if artifacts.contains_key(id.as_str()) {
                return Err(SonarError::Config {
                    message: format!("duplicate stack id: \"{id}\""),
                });
            }

            let template = stack.template()?;
            let json = template.to_json_pretty()?;
            let fingerprint = fingerprint(json.as_bytes())?;
            let file = id.template_file();
            tracing::debug!(stack = %id, file = %file, %fingerprint, "rendered stack");

            let _ = artifacts.insert(
                id.to_string(),
                ArtifactEntry {
                    artifact_type: STACK_ARTIFACT_TYPE.to_owned(),
                    template_file: file.clone(),
                    fingerprint,
                    resource_count: template.resources.len(),
                },
            );
            let _ = templates.insert(file, json);
        }

        Ok(CloudAssembly {
            manifest: Manifest {
                version: MANIFEST_VERSION.to_owned(),
                artifacts,
            },
            templates,
        })
    }
}

/// SHA-256 fingerprint of `bytes`.
///
/// # Errors
///
/// Returns an error if the digest cannot be represented as a hash.
pub fn fingerprint(bytes: &[u8]) -> Result<Sha256Hash> {
    let digest = Sha256::digest(bytes);
    Sha256Hash::from_hex(format!("{digest:x}"))
}

/// Index of a cloud assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Manifest layout version.
    pub version: String,
    /// Synthesized stacks by id.
    pub artifacts: BTreeMap<String, ArtifactEntry>,
}

/// One synthesized stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEntry {
    /// Artifact type.
    #[serde(rename = "type")]
    pub artifact_type: String,
    /// Template file name, relative to the assembly directory.
    pub template_file: String,
    /// Fingerprint of the template file contents.
    pub fingerprint: Sha256Hash,
    /// Number of resources in the template.
    pub resource_count: usize,
}

/// Synthesized templates plus their manifest, held in memory.
#[derive(Debug, Clone)]
pub struct CloudAssembly {
    manifest: Manifest,
    templates: BTreeMap<String, String>,
}

impl CloudAssembly {
    /// The assembly manifest.
    #[must_use]
    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Template JSON of the stack `stack_id`.
    #[must_use]
    pub fn template(&self, stack_id: &str) -> Option<&str> {
        self.manifest
            .artifacts
            .get(stack_id)
            .and_then(|entry| self.templates.get(&entry.template_file))
            .map(String::as_str)
    }

    /// Writes every template and the manifest under `dir`, creating it if needed.
    ///
    /// Returns the written paths, manifest last.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a file cannot be written.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        tracing::info!(path = %dir.display(), "writing cloud assembly");
        std::fs::create_dir_all(dir).map_err(|e| SonarError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut written = Vec::with_capacity(self.templates.len() + 1);
        for (file, json) in &self.templates {
            written.push(write_file(&dir.join(file), json)?);
        }
        let manifest = serde_json::to_string_pretty(&self.manifest)?;
        written.push(write_file(&dir.join(MANIFEST_FILE), &manifest)?);
        Ok(written)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<PathBuf> {
    std::fs::write(path, contents).map_err(|e| SonarError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::SonarStack;

    #[test]
    fn empty_app_synthesizes_empty_manifest() {
        let assembly = App::new().synth().expect("synth");
        assert!(assembly.manifest().artifacts.is_empty());
        assert_eq!(assembly.manifest().version, MANIFEST_VERSION);
    }

    #[test]
    fn duplicate_stack_ids_are_rejected() {
        let mut app = App::new();
        let _ = app
            .add_stack(SonarStack::build("sonar").expect("build"))
            .add_stack(SonarStack::build("sonar").expect("build"));
        let err = app.synth().unwrap_err();
        assert!(err.to_string().contains("duplicate stack id"), "got: {err}");
    }

    #[test]
    fn fingerprint_matches_template_bytes() {
        let mut app = App::new();
        let _ = app.add_stack(SonarStack::build("sonar").expect("build"));
        let assembly = app.synth().expect("synth");
        let entry = &assembly.manifest().artifacts["sonar"];
        let template = assembly.template("sonar").expect("template");
        assert_eq!(entry.template_file, "sonar.template.json");
        assert_eq!(entry.fingerprint, fingerprint(template.as_bytes()).expect("hash"));
        assert_eq!(entry.resource_count, 8);
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let hash = fingerprint(b"").expect("hash");
        assert_eq!(
            hash.as_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn write_to_creates_directory_and_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("cdk.out");
        let mut app = App::new();
        let _ = app.add_stack(SonarStack::build("sonar").expect("build"));

        let written = app.synth().expect("synth").write_to(&out).expect("write");
        assert_eq!(written.len(), 2);
        assert!(out.join("sonar.template.json").is_file());
        let manifest: Manifest = serde_json::from_str(
            &std::fs::read_to_string(out.join(MANIFEST_FILE)).expect("read"),
        )
        .expect("parse");
        assert_eq!(manifest.artifacts["sonar"].artifact_type, STACK_ARTIFACT_TYPE);
    }
}
