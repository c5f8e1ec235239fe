//! Redis-backed tests for unread counter arithmetic. Run against a local
//! Redis with `cargo test -- --ignored`.

use chat_service::redis_client::RedisClient;
use chat_service::services::unread_service::UnreadService;
use uuid::Uuid;

async fn test_client() -> RedisClient {
    let url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
    RedisClient::from_url(&url).await.expect("redis unavailable")
}

#[tokio::test]
#[ignore = "requires a redis instance"]
async fn counter_increments_and_resets() {
    let redis = test_client().await;
    let info_key = format!("channel:{}:info", Uuid::new_v4());
    let reader = "did:privy:reader";

    assert_eq!(UnreadService::count(&redis, &info_key, reader).await.unwrap(), 0);
    for expected in 1..=3 {
        let count = UnreadService::increment(&redis, &info_key, reader)
            .await
            .unwrap();
        assert_eq!(count, expected);
    }
    assert_eq!(UnreadService::count(&redis, &info_key, reader).await.unwrap(), 3);

    UnreadService::reset(&redis, &info_key, reader).await.unwrap();
    assert_eq!(UnreadService::count(&redis, &info_key, reader).await.unwrap(), 0);

    // A reset counter resumes from zero, not from the old value.
    assert_eq!(
        UnreadService::increment(&redis, &info_key, reader)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
#[ignore = "requires a redis instance"]
async fn counters_are_isolated_per_user() {
    let redis = test_client().await;
    let info_key = format!("conversation:{}:info", Uuid::new_v4().simple());

    UnreadService::increment(&redis, &info_key, "0xAAA1").await.unwrap();
    UnreadService::increment(&redis, &info_key, "0xAAA1").await.unwrap();
    UnreadService::increment(&redis, &info_key, "0xBBB2").await.unwrap();

    assert_eq!(UnreadService::count(&redis, &info_key, "0xAAA1").await.unwrap(), 2);
    assert_eq!(UnreadService::count(&redis, &info_key, "0xBBB2").await.unwrap(), 1);

    UnreadService::reset(&redis, &info_key, "0xAAA1").await.unwrap();
    assert_eq!(UnreadService::count(&redis, &info_key, "0xAAA1").await.unwrap(), 0);
    assert_eq!(UnreadService::count(&redis, &info_key, "0xBBB2").await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires a redis instance"]
async fn last_message_metadata_round_trips() {
    let redis = test_client().await;
    let info_key = format!("channel:{}:info", Uuid::new_v4());

    UnreadService::record_message(&redis, &info_key, "hello", "0xSENDER", "2026-08-30T12:00:00Z")
        .await
        .unwrap();

    let (message, time, sender) = UnreadService::last_message_meta(&redis, &info_key)
        .await
        .unwrap();
    assert_eq!(message, "hello");
    assert_eq!(time, "2026-08-30T12:00:00Z");
    assert_eq!(sender.as_deref(), Some("0xSENDER"));
}
