use axum::http::StatusCode;
use mercury_server::domain::campaign::{BrandTier, CampaignStatus, UseCase};
use std::time::Duration;

mod common;

async fn post_send(app: &common::TestApp, campaign: &common::SeededCampaign, to: &str) -> reqwest::Response {
    app.client
        .post(format!("{}/v1/messages", app.server_url))
        .json(&common::send_request(campaign, to, "Your order has shipped"))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn campaign_is_throttled_after_its_burst_capacity() {
    let app = common::TestApp::spawn().await;
    let campaign = common::seed_campaign_with(
        &app,
        UseCase::CustomerCare,
        CampaignStatus::Approved,
        false,
        Some(BrandTier { capacity: 2, refill_per_sec: 0.001 }),
    );

    for i in 1..=2 {
        let resp = post_send(&app, &campaign, "+12125550401").await;
        assert_eq!(resp.status(), StatusCode::CREATED, "send {i} within capacity");
    }

    let resp = post_send(&app, &campaign, "+12125550401").await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["reasons"].as_array().unwrap().iter().any(|r| r == "throughput_exceeded"));

    // The throughput check carries a retry hint.
    let throughput = body["checks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "throughput")
        .expect("throughput check reported");
    assert!(throughput["detail"].as_str().unwrap().contains("retry after"));
}

#[tokio::test]
async fn tokens_refill_over_time() {
    let app = common::TestApp::spawn().await;
    let campaign = common::seed_campaign_with(
        &app,
        UseCase::CustomerCare,
        CampaignStatus::Approved,
        false,
        Some(BrandTier { capacity: 1, refill_per_sec: 2.0 }),
    );

    assert_eq!(post_send(&app, &campaign, "+12125550402").await.status(), StatusCode::CREATED);
    assert_eq!(
        post_send(&app, &campaign, "+12125550402").await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        post_send(&app, &campaign, "+12125550402").await.status(),
        StatusCode::CREATED,
        "bucket refilled after the wait"
    );
}

#[tokio::test]
async fn campaigns_do_not_share_buckets() {
    let app = common::TestApp::spawn().await;
    let tier = BrandTier { capacity: 1, refill_per_sec: 0.001 };
    let campaign_a =
        common::seed_campaign_with(&app, UseCase::CustomerCare, CampaignStatus::Approved, false, Some(tier));
    let campaign_b =
        common::seed_campaign_with(&app, UseCase::CustomerCare, CampaignStatus::Approved, false, Some(tier));

    assert_eq!(post_send(&app, &campaign_a, "+12125550403").await.status(), StatusCode::CREATED);
    assert_eq!(
        post_send(&app, &campaign_a, "+12125550403").await.status(),
        StatusCode::UNPROCESSABLE_ENTITY,
        "campaign A exhausted"
    );
    assert_eq!(
        post_send(&app, &campaign_b, "+12125550403").await.status(),
        StatusCode::CREATED,
        "campaign B unaffected"
    );
}

#[tokio::test]
async fn denied_candidates_do_not_consume_tokens() {
    let app = common::TestApp::spawn().await;
    let campaign = common::seed_campaign_with(
        &app,
        UseCase::CustomerCare,
        CampaignStatus::Approved,
        false,
        Some(BrandTier { capacity: 1, refill_per_sec: 0.001 }),
    );

    // Content-denied sends must not burn throughput budget.
    for _ in 0..3 {
        let resp = app
            .client
            .post(format!("{}/v1/messages", app.server_url))
            .json(&common::send_request(&campaign, "+12125550404", "vodka"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    // The full bucket is still available for a clean candidate.
    assert_eq!(post_send(&app, &campaign, "+12125550404").await.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn brands_without_a_tier_use_the_configured_default() {
    let app = common::TestApp::spawn_with(|config| {
        config.rate_limit.default_capacity = 1;
        config.rate_limit.default_refill_per_sec = 0.001;
    })
    .await;
    // No BrandTier registered for this brand.
    let campaign = common::seed_campaign(&app, UseCase::CustomerCare, CampaignStatus::Approved);

    assert_eq!(post_send(&app, &campaign, "+12125550405").await.status(), StatusCode::CREATED);
    assert_eq!(
        post_send(&app, &campaign, "+12125550405").await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );
}
