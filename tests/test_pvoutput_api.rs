mod common;
use common::*;

use chrono::Local;
use growatt_bridge::pvoutput::{OutputParams, PvOutput, StatusParams};

#[tokio::test]
async fn succeeds_on_first_attempt() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/addstatus.jsp")
        .match_header("X-Pvoutput-Apikey", "test-api-key")
        .match_header("X-Pvoutput-SystemId", "12345")
        .match_header("X-Rate-Limit", "1")
        .with_status(200)
        .with_header("X-Rate-Limit-Remaining", "298")
        .with_header("X-Rate-Limit-Reset", "1700000000")
        .expect(1)
        .create_async()
        .await;

    let mut pvo = PvOutput::new(Factory::config_with_base_url(&server.url())).unwrap();
    pvo.send_status(&StatusParams::new(Local::now())).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn low_quota_response_still_succeeds() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/addstatus.jsp")
        .with_status(200)
        .with_header("X-Rate-Limit-Remaining", "5")
        .with_header("X-Rate-Limit-Reset", "1700000000")
        .expect(1)
        .create_async()
        .await;

    let mut pvo = PvOutput::new(Factory::config_with_base_url(&server.url())).unwrap();
    pvo.send_status(&StatusParams::new(Local::now())).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
#[cfg_attr(not(feature = "mocks"), ignore)]
async fn gives_up_after_three_attempts() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/addstatus.jsp")
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let mut pvo = PvOutput::new(Factory::config_with_base_url(&server.url())).unwrap();
    let result = pvo.send_status(&StatusParams::new(Local::now())).await;

    assert!(result.is_err());
    mock.assert_async().await;
}

#[tokio::test]
#[cfg_attr(not(feature = "mocks"), ignore)]
async fn rate_limited_responses_retry_until_attempts_exhausted() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/addstatus.jsp")
        .with_status(403)
        .with_header("X-Rate-Limit-Remaining", "0")
        .with_header("X-Rate-Limit-Reset", "0")
        .expect(3)
        .create_async()
        .await;

    let mut pvo = PvOutput::new(Factory::config_with_base_url(&server.url())).unwrap();
    let result = pvo.send_status(&StatusParams::new(Local::now())).await;

    assert!(result.is_err());
    mock.assert_async().await;
}

#[tokio::test]
async fn end_of_day_output_hits_its_own_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/addoutput.jsp")
        .with_status(200)
        .with_header("X-Rate-Limit-Remaining", "290")
        .with_header("X-Rate-Limit-Reset", "1700000000")
        .expect(1)
        .create_async()
        .await;

    let mut pvo = PvOutput::new(Factory::config_with_base_url(&server.url())).unwrap();
    pvo.send_output(&OutputParams {
        date: Local::now(),
        generated: Some(12_340),
        exported: None,
        comment: None,
    })
    .await
    .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_mode_skips_the_network() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/addstatus.jsp")
        .expect(0)
        .create_async()
        .await;

    let mut pvo = PvOutput::new(Factory::test_mode_config(&server.url())).unwrap();
    pvo.send_status(&StatusParams::new(Local::now())).await.unwrap();

    mock.assert_async().await;
}
