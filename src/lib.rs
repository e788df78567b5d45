//! Tharsis SDK - GraphQL client for the Tharsis infrastructure-as-code service.
//!
//! A typed client for the Tharsis API with:
//! - **Transports**: Lazily built authenticated and unauthenticated GraphQL transports
//! - **Authentication**: Pluggable token providers (static token, service account login)
//! - **Errors**: Every GraphQL error, mutation problem and HTTP status normalized to one code set
//! - **Resources**: Groups, workspaces, module registry, runners, jobs, variables
//! - **Pagination**: Cursor pages and a helper to walk them all
//!
//! ## Quick Start
//!
//! All configuration can be loaded from environment variables. Create a `.env` file:
//!
//! ```text
//! THARSIS_ENDPOINT=https://tharsis.example.com
//! THARSIS_STATIC_TOKEN=your_token_here
//! ```
//!
//! Then look up a resource:
//!
//! ```ignore
//! use tharsis_sdk::TharsisClient;
//! use tharsis_sdk::resources::groups::GetGroupInput;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TharsisClient::from_env()?;
//!
//!     let group = client.groups().get(&GetGroupInput::by_path("ops/prod")).await?;
//!     println!("{} ({})", group.full_path, group.id);
//!
//!     Ok(())
//! }
//! ```

// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy for strict discipline
#![deny(clippy::all)]                 // All standard Clippy lints
#![deny(clippy::pedantic)]            // Very strict Clippy lints
#![deny(clippy::nursery)]             // Experimental lints
#![deny(clippy::unwrap_used)]         // unwrap() is forbidden
#![deny(clippy::expect_used)]         // expect() is forbidden
#![deny(clippy::panic)]               // panic!() is forbidden
#![deny(clippy::print_stdout)]        // println!() is forbidden in production
#![deny(clippy::todo)]                // TODO is forbidden
#![deny(clippy::unimplemented)]       // unimplemented!() is forbidden
#![deny(clippy::missing_const_for_fn)] // Force const when possible
#![deny(clippy::unwrap_in_result)]    // unwrap() in Result is forbidden
#![deny(clippy::module_inception)]    // Module with same name as crate is forbidden
#![deny(clippy::redundant_clone)]     // Useless clones are forbidden
#![deny(clippy::shadow_unrelated)]    // Shadowing unrelated variables is forbidden
#![deny(clippy::too_many_arguments)]  // Limit function arguments
#![deny(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Modules
// ============================================================================

/// Error type, error codes and the normalization pipeline.
///
/// Use this module to classify failures (`is_not_found_error`, ...).
pub mod tharsis_error;

/// Client configuration loaded from code or environment.
pub mod tharsis_config;

/// Bearer token providers.
///
/// Use this module to plug static tokens, service account logins or your own
/// token source into the authenticated transport.
pub mod tharsis_auth;

/// GraphQL transport and wire types.
pub mod tharsis_graphql;

/// Cursor pagination helpers.
pub mod tharsis_paginator;

/// Client entry point holding the lazily built transports.
pub mod tharsis_client;

/// Typed resource wrappers.
///
/// Use this module for the inputs and results of every resource operation.
pub mod resources;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use tharsis_auth::{OidcTokenSource, ServiceAccountTokenProvider, StaticTokenProvider, TokenProvider};
pub use tharsis_client::TharsisClient;
pub use tharsis_config::TharsisConfig;
pub use tharsis_error::{
    ErrorCode, Result, TharsisError, is_bad_request_error, is_conflict_error, is_forbidden_error,
    is_internal_error, is_not_found_error, is_not_implemented_error, is_optimistic_lock_error,
    is_too_large_error, is_too_many_requests_error, is_unauthorized_error,
};
pub use tharsis_graphql::GraphqlTransport;
pub use tharsis_paginator::{Page, PageInfo, PaginationOptions, collect_all};
