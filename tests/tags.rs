use sentinelone::{testing::test_client, FilterSpec, PageMode, Tag, TagAction, Target};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn list_tags() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/web/api/v2.1/agents/tags"))
        .and(query_param("key", "env"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "tag1", "key": "env", "value": "prod"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let tags = client
        .tags()
        .list(&FilterSpec::new().with("key", "env"), PageMode::default())
        .await
        .expect("list tags");
    assert_eq!(tags[0]["value"], "prod");
}

#[tokio::test]
async fn manage_tags_body_shape() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/web/api/v2.1/agents/actions/manage-tags"))
        .and(body_json(json!({
            "filter": {"ids": ["a1", "a2"]},
            "data": {
                "type": "override",
                "tags": [{"key": "env", "value": "staging"}]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"affected": 2}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let result = client
        .tags()
        .manage(
            TagAction::Override,
            &[Tag::new("env", "staging")],
            &Target::ids("a1,a2"),
        )
        .await
        .expect("manage tags");
    assert_eq!(result["affected"], 2);
}

#[tokio::test]
async fn manage_tags_by_filter_with_no_tags() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/web/api/v2.1/agents/actions/manage-tags"))
        .and(body_json(json!({
            "filter": {"siteIds": ["s1"]},
            "data": {"type": "remove", "tags": []}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"affected": 0}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let target = Target::Filter(FilterSpec::new().with("siteIds", "s1"));
    let result = client
        .tags()
        .manage(TagAction::Remove, &[], &target)
        .await
        .expect("manage tags");
    assert_eq!(result["affected"], 0);
}
