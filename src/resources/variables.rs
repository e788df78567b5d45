//! Namespace variables.
//!
//! Variables live on a namespace (group or workspace) and are inherited by
//! every workspace below it.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use super::{NodeData, ResourceMetadata, found};
use crate::tharsis_client::TharsisClient;
use crate::tharsis_error::{Result, TharsisError};
use crate::tharsis_graphql::{Problem, ProblemsPayload, into_entity, into_unit};

const GET_VARIABLE: &str = r"
    query GetNamespaceVariable($id: String!) {
        node(id: $id) {
            ... on NamespaceVariable {
                id
                metadata { createdAt updatedAt version trn }
                namespacePath
                category
                key
                value
                sensitive
                hcl
            }
        }
    }
";

const LIST_VARIABLES: &str = r"
    query ListNamespaceVariables($namespacePath: String!) {
        namespace(fullPath: $namespacePath) {
            variables {
                id
                metadata { createdAt updatedAt version trn }
                namespacePath
                category
                key
                value
                sensitive
                hcl
            }
        }
    }
";

const CREATE_VARIABLE: &str = r"
    mutation CreateNamespaceVariable($input: CreateNamespaceVariableInput!) {
        createNamespaceVariable(input: $input) {
            variable {
                id
                metadata { createdAt updatedAt version trn }
                namespacePath
                category
                key
                value
                sensitive
                hcl
            }
            problems { message field type }
        }
    }
";

const UPDATE_VARIABLE: &str = r"
    mutation UpdateNamespaceVariable($input: UpdateNamespaceVariableInput!) {
        updateNamespaceVariable(input: $input) {
            variable {
                id
                metadata { createdAt updatedAt version trn }
                namespacePath
                category
                key
                value
                sensitive
                hcl
            }
            problems { message field type }
        }
    }
";

const DELETE_VARIABLE: &str = r"
    mutation DeleteNamespaceVariable($input: DeleteNamespaceVariableInput!) {
        deleteNamespaceVariable(input: $input) {
            problems { message field type }
        }
    }
";

/// Where a variable is exposed to runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableCategory {
    /// Terraform input variable.
    Terraform,
    /// Process environment variable.
    Environment,
}

/// Namespace variable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceVariable {
    /// Variable ID.
    pub id: String,
    /// Resource metadata.
    pub metadata: ResourceMetadata,
    /// Group or workspace path that owns it.
    pub namespace_path: String,
    /// Category.
    pub category: VariableCategory,
    /// Key.
    pub key: String,
    /// Value (absent for sensitive variables).
    #[serde(default)]
    pub value: Option<String>,
    /// Whether the value is write-only.
    #[serde(default)]
    pub sensitive: bool,
    /// Whether the value is an HCL expression.
    #[serde(default)]
    pub hcl: bool,
}

/// Input for creating a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNamespaceVariableInput {
    /// Owning namespace path.
    pub namespace_path: String,
    /// Category.
    pub category: VariableCategory,
    /// Key.
    pub key: String,
    /// Value.
    pub value: String,
    /// Mark the value write-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitive: Option<bool>,
    /// Treat the value as HCL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hcl: Option<bool>,
}

/// Input for updating a variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNamespaceVariableInput {
    /// Variable ID.
    pub id: String,
    /// New key.
    pub key: String,
    /// New value.
    pub value: String,
    /// Treat the value as HCL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hcl: Option<bool>,
    /// Expected version (optimistic lock).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Input for deleting a variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteNamespaceVariableInput {
    /// Variable ID.
    pub id: String,
    /// Expected version (optimistic lock).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Namespace variable operations.
#[derive(Debug, Clone, Copy)]
pub struct Variables<'a> {
    client: &'a TharsisClient,
}

impl<'a> Variables<'a> {
    pub(crate) const fn new(client: &'a TharsisClient) -> Self {
        Self { client }
    }

    /// Get a variable by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the variable does not exist, or any transport
    /// error.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<NamespaceVariable> {
        if id.is_empty() {
            return Err(TharsisError::bad_request(
                "an ID must be specified to get a variable",
            ));
        }
        let transport = self.client.authenticated()?;
        let data: NodeData<NamespaceVariable> = transport
            .execute("GetNamespaceVariable", GET_VARIABLE, json!({ "id": id }))
            .await?;
        found(data.node, "variable")
    }

    /// List the variables set directly on a namespace.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the namespace does not exist, or any transport
    /// error.
    #[instrument(skip(self))]
    pub async fn list(&self, namespace_path: &str) -> Result<Vec<NamespaceVariable>> {
        let transport = self.client.authenticated()?;
        let data: NamespaceData = transport
            .execute(
                "ListNamespaceVariables",
                LIST_VARIABLES,
                json!({ "namespacePath": namespace_path }),
            )
            .await?;
        Ok(found(data.namespace, "namespace")?.variables)
    }

    /// Create a variable.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems (`Conflict` for a duplicate key) or any
    /// transport error.
    #[instrument(skip(self, input), fields(namespace = %input.namespace_path, key = %input.key))]
    pub async fn create(&self, input: &CreateNamespaceVariableInput) -> Result<NamespaceVariable> {
        let transport = self.client.authenticated()?;
        let data: CreateVariableData = transport
            .execute("CreateNamespaceVariable", CREATE_VARIABLE, json!({ "input": input }))
            .await?;
        data.create_namespace_variable.into_variable()
    }

    /// Update a variable.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(id = %input.id, key = %input.key))]
    pub async fn update(&self, input: &UpdateNamespaceVariableInput) -> Result<NamespaceVariable> {
        let transport = self.client.authenticated()?;
        let data: UpdateVariableData = transport
            .execute("UpdateNamespaceVariable", UPDATE_VARIABLE, json!({ "input": input }))
            .await?;
        data.update_namespace_variable.into_variable()
    }

    /// Delete a variable.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(id = %input.id))]
    pub async fn delete(&self, input: &DeleteNamespaceVariableInput) -> Result<()> {
        let transport = self.client.authenticated()?;
        let data: DeleteVariableData = transport
            .execute("DeleteNamespaceVariable", DELETE_VARIABLE, json!({ "input": input }))
            .await?;
        into_unit(&data.delete_namespace_variable.problems)
    }
}

// ============================================================================
// GraphQL response types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct NamespaceData {
    namespace: Option<NamespaceVariables>,
}

#[derive(Debug, Deserialize)]
struct NamespaceVariables {
    #[serde(default)]
    variables: Vec<NamespaceVariable>,
}

#[derive(Debug, Deserialize)]
struct VariablePayload {
    variable: Option<NamespaceVariable>,
    #[serde(default)]
    problems: Vec<Problem>,
}

impl VariablePayload {
    fn into_variable(self) -> Result<NamespaceVariable> {
        into_entity(&self.problems, self.variable)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateVariableData {
    create_namespace_variable: VariablePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateVariableData {
    update_namespace_variable: VariablePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteVariableData {
    delete_namespace_variable: ProblemsPayload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tharsis_error::is_conflict_error;

    #[test]
    fn namespace_variables_decode() {
        let raw = r#"{"namespace": {"variables": [
            {
                "id": "V_1",
                "metadata": {"createdAt": "2024-08-01T00:00:00Z", "updatedAt": "2024-08-01T00:00:00Z", "version": "1"},
                "namespacePath": "ops/prod",
                "category": "TERRAFORM",
                "key": "region",
                "value": "eu-west-1",
                "sensitive": false,
                "hcl": false
            },
            {
                "id": "V_2",
                "metadata": {"createdAt": "2024-08-01T00:00:00Z", "updatedAt": "2024-08-01T00:00:00Z", "version": "1"},
                "namespacePath": "ops/prod",
                "category": "ENVIRONMENT",
                "key": "AWS_SECRET_ACCESS_KEY",
                "value": null,
                "sensitive": true,
                "hcl": false
            }
        ]}}"#;
        let data: NamespaceData = serde_json::from_str(raw).unwrap();
        let vars = data.namespace.unwrap().variables;
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0].category, VariableCategory::Terraform);
        assert_eq!(vars[1].category, VariableCategory::Environment);
        assert!(vars[1].sensitive);
        assert!(vars[1].value.is_none());
    }

    #[test]
    fn missing_namespace_is_absent() {
        let data: NamespaceData = serde_json::from_str(r#"{"namespace": null}"#).unwrap();
        assert!(data.namespace.is_none());
    }

    #[test]
    fn create_input_serializes_category() {
        let input = CreateNamespaceVariableInput {
            namespace_path: "ops/prod".to_string(),
            category: VariableCategory::Environment,
            key: "TF_LOG".to_string(),
            value: "debug".to_string(),
            sensitive: None,
            hcl: None,
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({"namespacePath": "ops/prod", "category": "ENVIRONMENT", "key": "TF_LOG", "value": "debug"})
        );
    }

    #[test]
    fn duplicate_key_is_conflict() {
        let raw = r#"{"createNamespaceVariable": {"variable": null, "problems": [
            {"message": "variable region already exists", "field": ["key"], "type": "CONFLICT"}
        ]}}"#;
        let data: CreateVariableData = serde_json::from_str(raw).unwrap();
        assert!(is_conflict_error(&data.create_namespace_variable.into_variable().unwrap_err()));
    }
}
