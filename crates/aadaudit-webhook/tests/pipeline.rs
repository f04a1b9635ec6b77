// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end: webhook POST through Graph enrichment into Log Analytics,
//! with both remote services mocked.

use std::sync::Arc;

use aadaudit_webhook::config::{Config, SinkConfig};
use aadaudit_webhook::server::{audit_router, build_sink};
use aadaudit_webhook::{
	BatchProcessor, GraphDirectoryClient, HealthState, IdentityResolver, Metrics, ProcessingReport,
	RecordEnricher,
};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TENANT: &str = "tenant-1";
const ADMINS: &str = "550e8400-e29b-41d4-a716-446655440000";
const RETIRED: &str = "6ba7b810-9dad-41d1-80b4-00c04fd430c8";

fn config(server: &MockServer) -> Config {
	let uri = server.uri();
	let vars = [
		("AADAUDIT_TENANT_ID", TENANT.to_string()),
		("AADAUDIT_CLIENT_ID", "client-1".to_string()),
		("AADAUDIT_CLIENT_SECRET", "s3cret".to_string()),
		("AADAUDIT_GRAPH_URL", uri.clone()),
		("AADAUDIT_LOGIN_URL", uri.clone()),
		("AADAUDIT_WORKSPACE_ID", "ws-1".to_string()),
		("AADAUDIT_WORKSPACE_KEY", "c2hhcmVkLWtleQ==".to_string()),
		("AADAUDIT_LOG_ANALYTICS_URL", uri),
	];
	Config::from_lookup(|name| {
		vars
			.iter()
			.find(|(key, _)| *key == name)
			.map(|(_, value)| value.clone())
	})
	.unwrap()
}

fn app(config: &Config) -> Router {
	assert!(matches!(config.sink, SinkConfig::LogAnalytics(_)));

	let directory = Arc::new(GraphDirectoryClient::new(config.graph_config()).unwrap());
	let resolver = Arc::new(IdentityResolver::new(directory));
	let processor = BatchProcessor::new(
		RecordEnricher::new(config.user_prefix.clone(), resolver),
		build_sink(&config.sink).unwrap(),
		Arc::new(Metrics::new().unwrap()),
		HealthState::new(),
	);
	audit_router(Arc::new(processor), config.max_body_bytes)
}

async fn mount_directory(server: &MockServer) {
	Mock::given(method("POST"))
		.and(path(format!("/{TENANT}/oauth2/v2.0/token")))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"token_type": "Bearer",
			"expires_in": 3599,
			"access_token": "graph-token"
		})))
		.expect(1)
		.mount(server)
		.await;

	Mock::given(method("GET"))
		.and(path("/v1.0/users/u-1"))
		.and(header("authorization", "Bearer graph-token"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"displayName": "Ada Lovelace",
			"userPrincipalName": "ada@contoso.com"
		})))
		.expect(1)
		.mount(server)
		.await;

	Mock::given(method("GET"))
		.and(path(format!("/v1.0/groups/{ADMINS}")))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"displayName": "AKS Admins"})))
		.expect(1)
		.mount(server)
		.await;

	Mock::given(method("GET"))
		.and(path(format!("/v1.0/groups/{RETIRED}")))
		.respond_with(ResponseTemplate::new(404))
		.expect(1)
		.mount(server)
		.await;
}

fn event(username: &str, groups: &[&str], request_uri: &str, source_ips: &[&str]) -> Value {
	json!({
		"kind": "Event",
		"apiVersion": "audit.k8s.io/v1",
		"level": "Metadata",
		"stage": "ResponseComplete",
		"requestURI": request_uri,
		"verb": "get",
		"user": {"username": username, "groups": groups},
		"sourceIPs": source_ips,
		"userAgent": "kubectl/v1.29.0",
		"objectRef": {"resource": "secrets", "namespace": "prod", "name": "db"},
		"responseStatus": {"code": 200},
		"stageTimestamp": "2024-03-01T10:00:00.5Z",
		"annotations": {
			"authorization.k8s.io/decision": "allow",
			"authorization.k8s.io/reason": "RBAC"
		}
	})
}

async fn post(app: Router, body: Value) -> (StatusCode, Value) {
	let request = Request::builder()
		.method("POST")
		.uri("/audits")
		.header("content-type", "application/json")
		.body(Body::from(serde_json::to_vec(&body).unwrap()))
		.unwrap();
	let response = app.oneshot(request).await.unwrap();
	let status = response.status();
	let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
	(status, serde_json::from_slice(&bytes).unwrap())
}

async fn shipped_records(server: &MockServer) -> Vec<Value> {
	server
		.received_requests()
		.await
		.unwrap()
		.into_iter()
		.filter(|request| request.url.path() == "/api/logs")
		.flat_map(|request| serde_json::from_slice::<Vec<Value>>(&request.body).unwrap())
		.collect()
}

#[tokio::test]
async fn enriches_tenant_users_and_ships_them() {
	let server = MockServer::start().await;
	mount_directory(&server).await;
	Mock::given(method("POST"))
		.and(path("/api/logs"))
		.and(header("Log-Type", "KubernetesAudit"))
		.respond_with(ResponseTemplate::new(200))
		.expect(2)
		.mount(&server)
		.await;

	let config = config(&server);
	let user = format!("https://sts.windows.net/{TENANT}/#u-1");
	let body = json!({
		"kind": "EventList",
		"apiVersion": "audit.k8s.io/v1",
		"items": [
			event(&user, &["system:authenticated", ADMINS, RETIRED], "/api/v1/namespaces/prod/secrets/db", &["10.0.0.4", "192.168.1.1"]),
			event("system:serviceaccount:kube-system:coredns", &["system:serviceaccounts"], "/api/v1/endpoints", &["10.0.0.5"]),
			event(&user, &[], "/api/v1/namespaces/prod/pods", &[]),
		]
	});

	let (status, report) = post(app(&config), body).await;

	assert_eq!(status, StatusCode::OK);
	let report: ProcessingReport = serde_json::from_value(report).unwrap();
	assert_eq!(report.received, 3);
	assert_eq!(report.emitted, 2);
	assert_eq!(report.skipped, 1);
	assert_eq!(report.failed(), 0);

	let records = shipped_records(&server).await;
	assert_eq!(records.len(), 2);

	let first = &records[0];
	assert_eq!(first["userObjectId"], "u-1");
	assert_eq!(first["userDisplayName"], "Ada Lovelace");
	assert_eq!(first["userPrincipalName"], "ada@contoso.com");
	assert_eq!(
		first["userGroups"],
		format!("system:authenticated|AKS Admins|Unknown AAD Group ID: {RETIRED}")
	);
	assert_eq!(first["sourceIPAddress"], "10.0.0.4|192.168.1.1");
	assert_eq!(first["resourceType"], "secrets");
	assert_eq!(first["authorizationDecision"], "allow");

	let second = &records[1];
	assert_eq!(second["userGroups"], "NONE");
	assert_eq!(second["sourceIPAddress"], "UNKNOWN");
	assert_eq!(second["requestURI"], "/api/v1/namespaces/prod/pods");
}

#[tokio::test]
async fn sink_rejection_does_not_fail_the_batch() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path(format!("/{TENANT}/oauth2/v2.0/token")))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"expires_in": 3599,
			"access_token": "graph-token"
		})))
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/v1.0/users/u-1"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"displayName": "Ada"})))
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/logs"))
		.respond_with(ResponseTemplate::new(500))
		.expect(2)
		.mount(&server)
		.await;

	let config = config(&server);
	let user = format!("https://sts.windows.net/{TENANT}/#u-1");
	let body = json!({
		"kind": "EventList",
		"items": [event(&user, &[], "/a", &[]), event(&user, &[], "/b", &[])]
	});

	let (status, report) = post(app(&config), body).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(report["sink_failed"], 2);
	assert_eq!(report["emitted"], 0);
}

#[tokio::test]
async fn malformed_envelope_is_rejected_without_remote_calls() {
	let server = MockServer::start().await;
	let config = config(&server);

	let (status, body) = post(app(&config), json!({"kind": "EventList", "items": {}})).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body["error"].is_string());
	assert!(server.received_requests().await.unwrap().is_empty());
}
