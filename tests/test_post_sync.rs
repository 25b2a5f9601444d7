mod common;

use polkasync::db::models::ProposalType;
use polkasync::error::AppError;
use polkasync::search::record::build_search_record;

#[tokio::test]
async fn sync_indexes_post_with_composite_object_id() {
    let env = common::TestEnv::start().await;
    let server = env.server();

    env.insert_post(common::post(
        "polkadot",
        ProposalType::ReferendumsV2,
        "42",
        "Runtime upgrade",
        "# Runtime upgrade\n\nEnact **v1.2.0** on the relay chain.",
    ))
    .await;

    let response = env
        .sync_post(&server, "polkadot", "referendums_v2", "42")
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["object_id"], "polkadot_referendums_v2_42");
    assert_eq!(body["action"], "indexed");
    assert_eq!(body["truncated"], false);

    env.wait_for_search_indexing().await;

    let hits = env
        .search
        .search("relay chain", Some("polkadot"), 10)
        .await
        .expect("search failed");
    assert!(hits.iter().any(|h| h.object_id == "polkadot_referendums_v2_42"));
}

#[tokio::test]
async fn oversized_post_is_truncated_to_budget() {
    let env = common::TestEnv::start_with_budget(4_000).await;
    let server = env.server();

    let content = "lorem ipsum dolor ".repeat(2_000);
    env.insert_post(common::post(
        "kusama",
        ProposalType::Discussions,
        "7",
        "Very long discussion",
        &content,
    ))
    .await;

    let response = env.sync_post(&server, "kusama", "discussions", "7").await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["truncated"], true);
    assert!(body["serialized_bytes"].as_u64().unwrap() <= 4_000);
}

#[tokio::test]
async fn deleted_post_is_removed_from_index() {
    let env = common::TestEnv::start().await;
    let server = env.server();

    let keyword = format!("deleteme{}", uuid::Uuid::new_v4().simple());
    let mut post = common::post(
        "polkadot",
        ProposalType::Bounties,
        "3",
        &format!("Bounty {keyword}"),
        "Bounty body",
    );
    env.insert_post(post.clone()).await;
    env.sync_post(&server, "polkadot", "bounties", "3").await;
    env.wait_for_search_indexing().await;

    post.is_deleted = true;
    env.insert_post(post).await;
    let response = env.sync_post(&server, "polkadot", "bounties", "3").await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["action"], "deleted");

    env.wait_for_search_indexing().await;
    let hits = env
        .search
        .search(&keyword, None, 10)
        .await
        .expect("search failed");
    assert!(hits.is_empty(), "deleted post still indexed: {hits:?}");
}

#[tokio::test]
async fn sync_rejects_bad_requests() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();

    server
        .post("/api/v1/sync/post")
        .json(&serde_json::json!({
            "service_token": "nope",
            "network": "polkadot",
            "proposal_type": "referendums_v2",
            "index": "1"
        }))
        .await
        .assert_status_unauthorized();

    env.sync_post(&server, "polkadot", "not_a_type", "1")
        .await
        .assert_status_bad_request();

    env.sync_post(&server, "polkadot", "referendums_v2", "999")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn network_sync_indexes_only_that_network() {
    let env = common::TestEnv::start().await;
    let server = env.server();

    env.insert_post(common::post("polkadot", ProposalType::Tips, "1", "Tip one", "First tip"))
        .await;
    env.insert_post(common::post("polkadot", ProposalType::Tips, "2", "Tip two", "Second tip"))
        .await;
    env.insert_post(common::post("kusama", ProposalType::Tips, "1", "Kusama tip", "Other chain"))
        .await;

    let response = server
        .post("/api/v1/sync/network/polkadot")
        .json(&serde_json::json!({ "service_token": common::SERVICE_TOKEN }))
        .await;
    let report: serde_json::Value = response.json();
    assert_eq!(report["network"], "polkadot");
    assert_eq!(report["indexed"], 2);
    assert_eq!(report["failures"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn network_sync_without_search_fails() {
    let env = common::TestEnv::start().await;
    let server = env.server_without_search();

    server
        .post("/api/v1/sync/network/polkadot")
        .json(&serde_json::json!({ "service_token": common::SERVICE_TOKEN }))
        .await
        .assert_status_internal_server_error();
}

#[tokio::test]
async fn post_with_unindexable_id_is_rejected() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();

    env.insert_post(common::post(
        "polkadot",
        ProposalType::Discussions,
        "12.5",
        "Dotted index",
        "Body",
    ))
    .await;

    env.sync_post(&server, "polkadot", "discussions", "12.5")
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn index_rejection_is_reported_as_error() {
    let env = common::TestEnv::start().await;

    let mut record = build_search_record(&common::post(
        "polkadot",
        ProposalType::Discussions,
        "1",
        "Bad id",
        "Body",
    ));
    record.object_id = "not/a/valid/id".to_string();

    let result = env.search.upsert_record(&record).await;
    assert!(
        matches!(result, Err(AppError::Search(_))),
        "expected rejection, got {result:?}"
    );
}
