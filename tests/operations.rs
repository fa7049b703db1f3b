//! Dispatcher tests: parameter objects in, flattened records out.

use sentinelone::{testing::test_client, BatchPolicy, Error, Operation};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn list_operation_yields_one_record_per_item() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/web/api/v2.1/agents"))
        .and(query_param("limit", "2"))
        .and(query_param("osTypes", "windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "a1"}, {"id": "a2"}],
            "pagination": {"nextCursor": "more"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let op = Operation::from_parameters(
        "agent",
        "getAgents",
        &json!({"limit": 2, "filters": {"osTypes": ["windows"], "siteIds": ""}}),
    )
    .expect("parameters");
    let records = client.execute(&op).await.expect("execute");
    assert_eq!(records, vec![json!({"id": "a1"}), json!({"id": "a2"})]);
}

#[tokio::test]
async fn mutation_yields_single_record() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/web/api/v2.1/threats/mitigate/kill"))
        .and(body_json(json!({"filter": {"ids": ["t1", "t2"]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"affected": 2}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let op = Operation::from_parameters(
        "threat",
        "mitigateThreat",
        &json!({"mitigationAction": "kill", "threatIds": "t1,t2"}),
    )
    .expect("parameters");
    let records = client.execute(&op).await.expect("execute");
    assert_eq!(records, vec![json!({"affected": 2})]);
}

#[tokio::test]
async fn continue_on_fail_turns_errors_into_records() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/web/api/v2.1/device-control"))
        .and(body_json(json!({"filter": {"ids": ["r1"]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"affected": 1}})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/web/api/v2.1/device-control"))
        .and(body_json(json!({"filter": {"ids": ["missing"]}})))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errors": [{"code": 4040000, "title": "Rule not found"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let items = vec![
        json!({"deleteRuleIds": "r1"}),
        json!({"deleteRuleIds": "missing"}),
        json!({}),
    ];
    let records = client
        .execute_items("deviceControl", "deleteRules", &items, BatchPolicy::ContinueOnFail)
        .await
        .expect("batch continues");
    assert_eq!(records.len(), 3);
    assert_eq!(records[0], json!({"affected": 1}));
    assert!(records[1]["error"]
        .as_str()
        .unwrap()
        .contains("Rule not found"));
    assert!(records[2]["error"]
        .as_str()
        .unwrap()
        .contains("deleteRuleIds"));
}

#[tokio::test]
async fn abort_stops_at_first_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/web/api/v2.1/agents/actions/uninstall"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "errors": [{"code": 4030010, "title": "Action is not allowed"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let ops = vec![
        Operation::from_parameters("agent", "uninstall", &json!({"actionAgentIds": "a1"}))
            .expect("parameters"),
        Operation::from_parameters("agent", "uninstall", &json!({"actionAgentIds": "a2"}))
            .expect("parameters"),
    ];
    let err = client
        .execute_batch(&ops, BatchPolicy::Abort)
        .await
        .expect_err("first failure aborts");
    match err {
        Error::Api(api) => assert_eq!(api.status, 403),
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn batch_concatenates_records_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/web/api/v2.1/agents/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"key": "env"}, {"key": "owner"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/web/api/v2.1/agents/actions/manage-tags"))
        .and(body_json(json!({
            "filter": {"ids": ["a1"]},
            "data": {"type": "add", "tags": [{"key": "env", "value": "prod"}]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"affected": 1}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let ops = vec![
        Operation::from_parameters("tag", "getTags", &json!({})).expect("parameters"),
        Operation::from_parameters(
            "tag",
            "manageTags",
            &json!({
                "tagAgentIds": "a1",
                "tags": {"tagValues": [{"key": "env", "value": "prod"}]}
            }),
        )
        .expect("parameters"),
    ];
    let records = client
        .execute_batch(&ops, BatchPolicy::default())
        .await
        .expect("batch");
    assert_eq!(
        records,
        vec![
            json!({"key": "env"}),
            json!({"key": "owner"}),
            json!({"affected": 1}),
        ]
    );
}
