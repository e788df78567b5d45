use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tharsis_sdk::resources::groups::{CreateGroupInput, GetGroupInput};
use tharsis_sdk::resources::workspaces::ListWorkspacesInput;
use tharsis_sdk::{
    ErrorCode, OidcTokenSource, PaginationOptions, ServiceAccountTokenProvider, StaticTokenProvider,
    TharsisClient, TharsisConfig, TharsisError, TokenProvider, collect_all, is_conflict_error,
    is_forbidden_error, is_not_found_error, is_too_large_error, is_unauthorized_error,
};

fn group_json() -> Value {
    json!({
        "id": "G_1",
        "metadata": {"createdAt": "2024-03-01T12:00:00Z", "updatedAt": "2024-03-01T12:00:00Z", "version": "1", "trn": "trn:group:ops/prod"},
        "name": "prod",
        "description": "",
        "fullPath": "ops/prod"
    })
}

fn workspace_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "metadata": {"createdAt": "2024-03-01T12:00:00Z", "updatedAt": "2024-03-01T12:00:00Z", "version": "1"},
        "name": name,
        "description": "",
        "fullPath": format!("ops/prod/{name}"),
        "groupPath": "ops/prod",
        "dirtyState": false,
        "locked": false,
        "maxJobDuration": 720,
        "terraformVersion": "1.7.5",
        "preventDestroyPlan": false
    })
}

fn client_with_token(server: &MockServer, token: &str) -> TharsisClient {
    let cfg = TharsisConfig::new(server.uri()).with_token_provider(StaticTokenProvider::new(token));
    TharsisClient::new(cfg)
}

#[tokio::test]
async fn authenticated_request_sends_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_partial_json(json!({
            "operationName": "GetGroupByPath",
            "variables": {"path": "ops/prod"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"group": group_json()}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_token(&server, "secret-token");
    let group = client
        .groups()
        .get(&GetGroupInput::by_path("ops/prod"))
        .await
        .unwrap();

    assert_eq!(group.id, "G_1");
    assert_eq!(group.full_path, "ops/prod");
}

#[tokio::test]
async fn unauthenticated_request_has_no_authorization_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({"operationName": "ServiceAccountCreateToken"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"serviceAccountCreateToken": {"token": "sa-token", "expiresIn": 300, "problems": []}}
        })))
        .mount(&server)
        .await;

    let client = client_with_token(&server, "secret-token");
    let token = client
        .service_accounts()
        .create_token("ops/deployer", "oidc-jwt")
        .await
        .unwrap();
    assert_eq!(token.token, "sa-token");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());

    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["variables"]["input"]["serviceAccountPath"], "ops/deployer");
    assert_eq!(body["variables"]["input"]["token"], "oidc-jwt");
}

#[tokio::test]
async fn authenticated_call_without_provider_fails_before_sending() {
    let server = MockServer::start().await;
    let client = TharsisClient::new(TharsisConfig::new(server.uri()));

    let err = client
        .groups()
        .get(&GetGroupInput::by_path("ops/prod"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::Internal);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn http_status_maps_to_error_code() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&server)
        .await;

    let client = client_with_token(&server, "stale");
    let err = client
        .groups()
        .get(&GetGroupInput::by_id("G_1"))
        .await
        .unwrap_err();

    assert!(is_unauthorized_error(&err));
    assert!(err.to_string().contains("token expired"));
}

#[tokio::test]
async fn uncoded_graphql_errors_take_the_http_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"errors": [{"message": "token expired"}]})),
        )
        .mount(&server)
        .await;

    let client = client_with_token(&server, "stale");
    let err = client
        .groups()
        .get(&GetGroupInput::by_path("ops/prod"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::Unauthorized);
    assert_eq!(err.to_string(), "unauthorized: token expired");
}

#[tokio::test]
async fn coded_graphql_errors_win_over_http_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{"message": "group ops/gone not found", "extensions": {"code": "NOT_FOUND"}}]
        })))
        .mount(&server)
        .await;

    let client = client_with_token(&server, "t");
    let err = client
        .groups()
        .get(&GetGroupInput::by_path("ops/gone"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(err.to_string(), "not found: group ops/gone not found");
}

#[tokio::test]
async fn graphql_error_code_is_normalized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "not allowed to view group", "extensions": {"code": "FORBIDDEN"}}]
        })))
        .mount(&server)
        .await;

    let client = client_with_token(&server, "t");
    let err = client
        .groups()
        .get(&GetGroupInput::by_path("ops/secret"))
        .await
        .unwrap_err();

    assert!(is_forbidden_error(&err));
    assert_eq!(err.to_string(), "forbidden: not allowed to view group");
}

#[tokio::test]
async fn null_lookup_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"group": null}})))
        .mount(&server)
        .await;

    let client = client_with_token(&server, "t");
    let err = client
        .groups()
        .get(&GetGroupInput::by_path("ops/missing"))
        .await
        .unwrap_err();

    assert!(is_not_found_error(&err));
}

#[tokio::test]
async fn mutation_problems_become_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "operationName": "CreateGroup",
            "variables": {"input": {"name": "prod", "parentPath": "ops"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"createGroup": {"group": null, "problems": [
                {"message": "group ops/prod already exists", "field": ["name"], "type": "CONFLICT"},
                {"message": "description too long", "field": ["description"], "type": "BAD_REQUEST"}
            ]}}
        })))
        .mount(&server)
        .await;

    let client = client_with_token(&server, "t");
    let input = CreateGroupInput {
        name: "prod".to_string(),
        parent_path: Some("ops".to_string()),
        description: "x".repeat(10),
    };
    let err = client.groups().create(&input).await.unwrap_err();

    match &err {
        TharsisError::Multiple(errors) => {
            assert_eq!(errors.len(), 2);
            assert_eq!(errors[0].code(), ErrorCode::Conflict);
            assert_eq!(errors[1].code(), ErrorCode::BadRequest);
        }
        other => panic!("expected multiple errors, got {other:?}"),
    }
    assert!(is_conflict_error(&err));
}

#[tokio::test]
async fn module_version_upload_is_raw_put() {
    let server = MockServer::start().await;
    let archive = vec![0x1f_u8, 0x8b, 0x08, 0x00, 0x42];

    Mock::given(method("PUT"))
        .and(path("/v1/module-registry/versions/TMV_1/upload"))
        .and(header("authorization", "Bearer t"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_token(&server, "t");
    client
        .terraform_module_versions()
        .upload("TMV_1", archive.clone())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body, archive);
}

#[tokio::test]
async fn oversized_upload_is_too_large() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/module-registry/versions/TMV_2/upload"))
        .respond_with(ResponseTemplate::new(413))
        .mount(&server)
        .await;

    let client = client_with_token(&server, "t");
    let err = client
        .terraform_module_versions()
        .upload("TMV_2", vec![0_u8; 16])
        .await
        .unwrap_err();

    assert!(is_too_large_error(&err));
}

#[tokio::test]
async fn service_account_token_is_cached() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "operationName": "ServiceAccountCreateToken",
            "variables": {"input": {"serviceAccountPath": "ops/deployer", "token": "oidc-jwt"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"serviceAccountCreateToken": {"token": "sa-token", "expiresIn": 3600, "problems": []}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer sa-token"))
        .and(body_partial_json(json!({"operationName": "GetGroupByPath"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"group": group_json()}})))
        .expect(2)
        .mount(&server)
        .await;

    let source: OidcTokenSource = Arc::new(|| Ok::<_, TharsisError>("oidc-jwt".to_string()));
    let provider = ServiceAccountTokenProvider::new(&server.uri(), "ops/deployer", source).unwrap();
    let client = TharsisClient::new(TharsisConfig::new(server.uri()).with_token_provider(provider));

    for _ in 0..2 {
        let group = client
            .groups()
            .get(&GetGroupInput::by_path("ops/prod"))
            .await
            .unwrap();
        assert_eq!(group.id, "G_1");
    }
}

async fn mount_token_exchange(server: &MockServer, expires_in: u64, times: u64) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({"operationName": "ServiceAccountCreateToken"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"serviceAccountCreateToken": {"token": "sa-token", "expiresIn": expires_in, "problems": []}}
        })))
        .expect(times)
        .mount(server)
        .await;
}

fn service_account_provider(server: &MockServer) -> ServiceAccountTokenProvider {
    let source: OidcTokenSource = Arc::new(|| Ok::<_, TharsisError>("oidc-jwt".to_string()));
    ServiceAccountTokenProvider::new(&server.uri(), "ops/deployer", source).unwrap()
}

#[tokio::test]
async fn service_account_token_is_renewed_inside_leeway() {
    let server = MockServer::start().await;
    mount_token_exchange(&server, 10, 2).await;

    let provider = service_account_provider(&server);
    assert_eq!(provider.get_token().await.unwrap(), "sa-token");
    assert_eq!(provider.get_token().await.unwrap(), "sa-token");
}

#[tokio::test]
async fn service_account_token_with_huge_lifetime_is_cached() {
    let server = MockServer::start().await;
    mount_token_exchange(&server, u64::MAX, 1).await;

    let provider = service_account_provider(&server);
    assert_eq!(provider.get_token().await.unwrap(), "sa-token");
    assert_eq!(provider.get_token().await.unwrap(), "sa-token");
}

#[tokio::test]
async fn service_account_login_sends_configured_user_agent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("user-agent", "release-bot/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"serviceAccountCreateToken": {"token": "sa-token", "expiresIn": 600, "problems": []}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source: OidcTokenSource = Arc::new(|| Ok::<_, TharsisError>("oidc-jwt".to_string()));
    let provider = ServiceAccountTokenProvider::with_http_options(
        &server.uri(),
        "ops/deployer",
        source,
        Duration::from_secs(5),
        "release-bot/3",
    )
    .unwrap();

    assert_eq!(provider.get_token().await.unwrap(), "sa-token");
}

#[tokio::test]
async fn collect_all_walks_workspace_pages() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "operationName": "ListWorkspaces",
            "variables": {"after": "c1"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"workspaces": {
            "totalCount": 3,
            "pageInfo": {"hasNextPage": false, "endCursor": "c2"},
            "edges": [{"node": workspace_json("W_3", "dns")}]
        }}})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "operationName": "ListWorkspaces",
            "variables": {"after": null, "groupPath": "ops/prod"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"workspaces": {
            "totalCount": 3,
            "pageInfo": {"hasNextPage": true, "endCursor": "c1"},
            "edges": [
                {"node": workspace_json("W_1", "network")},
                {"node": workspace_json("W_2", "compute")}
            ]
        }}})))
        .mount(&server)
        .await;

    let client = client_with_token(&server, "t");
    let workspaces = client.workspaces();
    let all = collect_all(None, None, |cursor| {
        let input = ListWorkspacesInput {
            group_path: Some("ops/prod".to_string()),
            search: None,
            pagination: PaginationOptions::with_limit(2).after(cursor),
        };
        async move { workspaces.list(&input).await }
    })
    .await
    .unwrap();

    let ids: Vec<_> = all.iter().map(|ws| ws.id.as_str()).collect();
    assert_eq!(ids, ["W_1", "W_2", "W_3"]);
}
