use sentinelone::{testing::test_client, FilterSpec, MitigationAction, PageMode, Target};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn list_threats_with_filters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/web/api/v2.1/threats"))
        .and(query_param("classifications", "Malware,Ransomware"))
        .and(query_param("resolved", "true"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "t1"}, {"id": "t2"}],
            "pagination": {"nextCursor": "c1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let filters = FilterSpec::new()
        .with("classifications", vec!["Malware", "Ransomware"])
        .with("resolved", true);
    let threats = client
        .threats()
        .list(&filters, PageMode::limited(10).unwrap())
        .await
        .expect("list threats");
    assert_eq!(threats, vec![json!({"id": "t1"}), json!({"id": "t2"})]);
}

#[tokio::test]
async fn mitigate_each_action_hits_its_endpoint() {
    let server = MockServer::start().await;

    for action in MitigationAction::ALL {
        Mock::given(method("POST"))
            .and(path(format!("/web/api/v2.1/threats/mitigate/{action}")))
            .and(body_json(json!({"filter": {"ids": ["t1"]}})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"affected": 1}})),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = test_client(&server.uri());
    for action in MitigationAction::ALL {
        let result = client
            .threats()
            .mitigate(action, &Target::ids("t1"))
            .await
            .expect("mitigate");
        assert_eq!(result["affected"], 1);
    }
}

#[tokio::test]
async fn mitigate_by_filter() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/web/api/v2.1/threats/mitigate/network-quarantine"))
        .and(body_json(json!({
            "filter": {"siteIds": ["s1"], "classifications": ["Malware"]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"affected": 4}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let target = Target::Filter(
        FilterSpec::new()
            .with("siteIds", "s1")
            .with("classifications", vec!["Malware"]),
    );
    let result = client
        .threats()
        .mitigate(MitigationAction::NetworkQuarantine, &target)
        .await
        .expect("mitigate");
    assert_eq!(result["affected"], 4);
}
