//! Terraform module attestations (signed in-toto statements attached to a
//! module and matched against version digests).

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use super::{NodeData, ResourceMetadata, found};
use crate::tharsis_client::TharsisClient;
use crate::tharsis_error::Result;
use crate::tharsis_graphql::{Problem, ProblemsPayload, into_entity, into_unit};
use crate::tharsis_paginator::{Connection, Page, PaginationOptions};

const LIST_ATTESTATIONS: &str = r"
    query ListTerraformModuleAttestations($id: String!, $first: Int, $after: String, $digest: String) {
        node(id: $id) {
            ... on TerraformModule {
                attestations(first: $first, after: $after, digest: $digest) {
                    totalCount
                    pageInfo { hasNextPage endCursor }
                    edges {
                        node {
                            id
                            metadata { createdAt updatedAt version trn }
                            description
                            schemaType
                            predicateType
                            digests
                            data
                        }
                    }
                }
            }
        }
    }
";

const CREATE_ATTESTATION: &str = r"
    mutation CreateTerraformModuleAttestation($input: CreateTerraformModuleAttestationInput!) {
        createTerraformModuleAttestation(input: $input) {
            moduleAttestation {
                id
                metadata { createdAt updatedAt version trn }
                description
                schemaType
                predicateType
                digests
                data
            }
            problems { message field type }
        }
    }
";

const UPDATE_ATTESTATION: &str = r"
    mutation UpdateTerraformModuleAttestation($input: UpdateTerraformModuleAttestationInput!) {
        updateTerraformModuleAttestation(input: $input) {
            moduleAttestation {
                id
                metadata { createdAt updatedAt version trn }
                description
                schemaType
                predicateType
                digests
                data
            }
            problems { message field type }
        }
    }
";

const DELETE_ATTESTATION: &str = r"
    mutation DeleteTerraformModuleAttestation($input: DeleteTerraformModuleAttestationInput!) {
        deleteTerraformModuleAttestation(input: $input) {
            problems { message field type }
        }
    }
";

/// Attestation attached to a module.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerraformModuleAttestation {
    /// Attestation ID.
    pub id: String,
    /// Resource metadata.
    pub metadata: ResourceMetadata,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Statement schema (`https://in-toto.io/Statement/v0.1`).
    #[serde(default)]
    pub schema_type: String,
    /// Predicate type.
    #[serde(default)]
    pub predicate_type: String,
    /// Subject digests the attestation covers.
    #[serde(default)]
    pub digests: Vec<String>,
    /// Base64 DSSE envelope.
    pub data: String,
}

/// Filter for listing the attestations of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTerraformModuleAttestationsInput {
    /// Module ID.
    pub module_id: String,
    /// Only attestations covering this digest.
    pub digest: Option<String>,
    /// Page size and cursor.
    pub pagination: PaginationOptions,
}

/// Input for creating an attestation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTerraformModuleAttestationInput {
    /// Module resource path.
    pub module_path: String,
    /// Base64 DSSE envelope.
    pub attestation_data: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Input for updating an attestation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTerraformModuleAttestationInput {
    /// Attestation ID.
    pub id: String,
    /// New description.
    pub description: String,
    /// Expected version (optimistic lock).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Input for deleting an attestation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTerraformModuleAttestationInput {
    /// Attestation ID.
    pub id: String,
    /// Expected version (optimistic lock).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Terraform module attestation operations.
#[derive(Debug, Clone, Copy)]
pub struct TerraformModuleAttestations<'a> {
    client: &'a TharsisClient,
}

impl<'a> TerraformModuleAttestations<'a> {
    pub(crate) const fn new(client: &'a TharsisClient) -> Self {
        Self { client }
    }

    /// List one page of attestations of a module.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the module does not exist, or any transport error.
    #[instrument(skip(self, input), fields(module_id = %input.module_id, digest = ?input.digest))]
    pub async fn list(
        &self,
        input: &ListTerraformModuleAttestationsInput,
    ) -> Result<Page<TerraformModuleAttestation>> {
        let transport = self.client.authenticated()?;
        let variables = json!({
            "id": input.module_id,
            "first": input.pagination.limit,
            "after": input.pagination.cursor,
            "digest": input.digest,
        });
        let data: NodeData<ModuleAttestations> = transport
            .execute("ListTerraformModuleAttestations", LIST_ATTESTATIONS, variables)
            .await?;
        Ok(found(data.node, "terraform module")?.attestations.into_page())
    }

    /// Attach an attestation to a module.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems (`BadRequest` for a malformed envelope)
    /// or any transport error.
    #[instrument(skip(self, input), fields(module = %input.module_path))]
    pub async fn create(
        &self,
        input: &CreateTerraformModuleAttestationInput,
    ) -> Result<TerraformModuleAttestation> {
        let transport = self.client.authenticated()?;
        let data: CreateAttestationData = transport
            .execute("CreateTerraformModuleAttestation", CREATE_ATTESTATION, json!({ "input": input }))
            .await?;
        data.create_terraform_module_attestation.into_attestation()
    }

    /// Update the description of an attestation.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(id = %input.id))]
    pub async fn update(
        &self,
        input: &UpdateTerraformModuleAttestationInput,
    ) -> Result<TerraformModuleAttestation> {
        let transport = self.client.authenticated()?;
        let data: UpdateAttestationData = transport
            .execute("UpdateTerraformModuleAttestation", UPDATE_ATTESTATION, json!({ "input": input }))
            .await?;
        data.update_terraform_module_attestation.into_attestation()
    }

    /// Delete an attestation.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(id = %input.id))]
    pub async fn delete(&self, input: &DeleteTerraformModuleAttestationInput) -> Result<()> {
        let transport = self.client.authenticated()?;
        let data: DeleteAttestationData = transport
            .execute("DeleteTerraformModuleAttestation", DELETE_ATTESTATION, json!({ "input": input }))
            .await?;
        into_unit(&data.delete_terraform_module_attestation.problems)
    }
}

// ============================================================================
// GraphQL response types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ModuleAttestations {
    attestations: Connection<TerraformModuleAttestation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttestationPayload {
    module_attestation: Option<TerraformModuleAttestation>,
    #[serde(default)]
    problems: Vec<Problem>,
}

impl AttestationPayload {
    fn into_attestation(self) -> Result<TerraformModuleAttestation> {
        into_entity(&self.problems, self.module_attestation)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAttestationData {
    create_terraform_module_attestation: AttestationPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAttestationData {
    update_terraform_module_attestation: AttestationPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteAttestationData {
    delete_terraform_module_attestation: ProblemsPayload,
}
