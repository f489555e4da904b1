//! Rendering a resource graph into a provisioning-engine template.
//!
//! One template resource per declared node, with its dependencies listed
//! explicitly in `DependsOn` and the topological order recorded in the
//! template metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sonar_common::constants::{APP_NAME, TEMPLATE_FORMAT_VERSION};
use sonar_common::error::{Result, SonarError};
use sonar_common::types::StackId;

use crate::graph::ResourceGraph;
use crate::token::Token;

/// A rendered template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    /// Template format version.
    #[serde(rename = "TemplateFormatVersion")]
    pub format_version: String,
    /// Human-readable description.
    pub description: String,
    /// Stack metadata.
    pub metadata: TemplateMetadata,
    /// Resources by logical id.
    pub resources: BTreeMap<String, TemplateResource>,
    /// Stack outputs by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, TemplateOutput>,
}

/// Stack-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateMetadata {
    /// Name of the stack the template belongs to.
    pub stack_name: String,
    /// Logical ids in deployment order, dependencies first.
    pub deployment_order: Vec<String>,
}

/// One rendered resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateResource {
    /// Resource type.
    #[serde(rename = "Type")]
    pub resource_type: String,
    /// Resource properties.
    pub properties: Value,
    /// Logical ids this resource depends on, sorted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// One stack output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateOutput {
    /// Output description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Output value, usually deferred.
    pub value: Value,
}

impl Template {
    /// Renders every declaration of `graph`.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn render(graph: &ResourceGraph, stack: &StackId) -> Result<Self> {
        let order = graph.deployment_order()?;
        let mut resources = BTreeMap::new();
        for node in graph.nodes() {
            let mut depends_on: Vec<String> = graph
                .dependencies(&node.id)
                .into_iter()
                .map(|(id, _)| id.to_string())
                .collect();
            depends_on.dedup();
            let _ = resources.insert(
                node.id.to_string(),
                TemplateResource {
                    resource_type: node.kind().template_type().to_owned(),
                    properties: node.declaration.properties(),
                    depends_on,
                },
            );
        }

        tracing::debug!(stack = %stack, resources = resources.len(), "rendered template");
        Ok(Self {
            format_version: TEMPLATE_FORMAT_VERSION.to_owned(),
            description: format!("{APP_NAME}: {stack} stack"),
            metadata: TemplateMetadata {
                stack_name: stack.to_string(),
                deployment_order: order.iter().map(ToString::to_string).collect(),
            },
            resources,
            outputs: BTreeMap::new(),
        })
    }

    /// Adds an output whose value is `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value reads from a resource that is not part
    /// of this template or if the name is already used.
    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        value: &Token,
    ) -> Result<()> {
        let name = name.into();
        if let Some(missing) = value
            .references()
            .into_iter()
            .find(|id| !self.resources.contains_key(id.as_str()))
        {
            return Err(SonarError::NotFound {
                kind: "resource",
                id: format!("\"{missing}\" (referenced by output \"{name}\")"),
            });
        }
        if self.outputs.contains_key(&name) {
            return Err(SonarError::Config {
                message: format!("duplicate output name: \"{name}\""),
            });
        }
        let _ = self.outputs.insert(
            name,
            TemplateOutput {
                description: Some(description.into()),
                value: value.render(),
            },
        );
        Ok(())
    }

    /// Looks up a rendered resource.
    #[must_use]
    pub fn resource(&self, id: &str) -> Option<&TemplateResource> {
        self.resources.get(id)
    }

    /// Serializes the template as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
