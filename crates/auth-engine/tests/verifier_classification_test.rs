//! Verifier classification tests: a verification attempt resolves to
//! exactly one of four outcomes, and a timeout is never read as a
//! rejection.

use std::sync::Arc;
use std::time::Duration;

use mockito::Server;
use url::Url;

use auth_engine::{ApiClient, SessionVerifier, UserRecord, VerifyOutcome};
use client_storage::{CredentialStore, FileStorage};

fn credential_store(dir: &tempfile::TempDir) -> Arc<CredentialStore> {
    let storage = FileStorage::open(dir.path().join("credentials.json")).unwrap();
    Arc::new(CredentialStore::new(Box::new(storage)))
}

fn verifier(server_url: &str, credentials: Arc<CredentialStore>) -> SessionVerifier {
    let api = Arc::new(
        ApiClient::new(
            Url::parse(server_url).unwrap(),
            Duration::from_millis(500),
            credentials.clone(),
        )
        .unwrap(),
    );
    SessionVerifier::new(api, credentials)
}

fn cached_user() -> UserRecord {
    serde_json::from_str(r#"{"id": "user-1", "role": "DOCTOR"}"#).unwrap()
}

#[tokio::test]
async fn accepted_profile_classifies_fresh_and_overwrites_the_cache() {
    //* Given
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let credentials = credential_store(&dir);
    credentials.store_tokens("acc-1", "ref-1").unwrap();

    let profile_mock = server
        .mock("GET", "/api/auth/profile")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "user-1", "email": "dr@example.com", "role": "DOCTOR"}"#)
        .expect(1)
        .create_async()
        .await;

    //* When
    let outcome = verifier(&server.url(), credentials.clone())
        .verify()
        .await
        .unwrap();

    //* Then
    profile_mock.assert_async().await;
    match outcome {
        VerifyOutcome::Fresh(user) => assert_eq!(user.id, "user-1"),
        other => panic!("expected Fresh, got {:?}", other),
    }
    let cached: UserRecord = credentials.user().unwrap().unwrap();
    assert_eq!(cached.email.as_deref(), Some("dr@example.com"));
}

#[tokio::test]
async fn explicit_rejection_classifies_invalid() {
    //* Given: profile and refresh both rejected.
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let credentials = credential_store(&dir);
    credentials.store_tokens("revoked", "dead-ref").unwrap();
    credentials.store_user(&cached_user()).unwrap();

    let profile_mock = server
        .mock("GET", "/api/auth/profile")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/api/auth/refresh-token")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    //* When
    let outcome = verifier(&server.url(), credentials)
        .verify()
        .await
        .unwrap();

    //* Then
    profile_mock.assert_async().await;
    refresh_mock.assert_async().await;
    assert_eq!(outcome, VerifyOutcome::Invalid);
}

#[tokio::test]
async fn throttling_classifies_rate_limited() {
    //* Given
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let credentials = credential_store(&dir);
    credentials.store_tokens("acc-1", "ref-1").unwrap();
    credentials.store_user(&cached_user()).unwrap();

    let profile_mock = server
        .mock("GET", "/api/auth/profile")
        .with_status(429)
        .expect(1)
        .create_async()
        .await;

    //* When
    let outcome = verifier(&server.url(), credentials.clone())
        .verify()
        .await
        .unwrap();

    //* Then: the local session stands, unverified.
    profile_mock.assert_async().await;
    assert_eq!(outcome, VerifyOutcome::RateLimited);
    assert!(credentials.token_pair().unwrap().is_some());
}

#[tokio::test]
async fn unreachable_backend_with_a_cache_classifies_unreachable() {
    //* Given a cached session and nothing listening.
    let dir = tempfile::tempdir().unwrap();
    let credentials = credential_store(&dir);
    credentials.store_tokens("acc-1", "ref-1").unwrap();
    credentials.store_user(&cached_user()).unwrap();

    //* When
    let outcome = verifier("http://127.0.0.1:9", credentials.clone())
        .verify()
        .await
        .unwrap();

    //* Then: not reachable is not rejected.
    assert_eq!(outcome, VerifyOutcome::Unreachable);
    assert!(credentials.token_pair().unwrap().is_some());
}

#[tokio::test]
async fn unreachable_backend_without_a_cache_degrades_to_invalid() {
    //* Given tokens but no cached user.
    let dir = tempfile::tempdir().unwrap();
    let credentials = credential_store(&dir);
    credentials.store_tokens("acc-1", "ref-1").unwrap();

    //* When
    let outcome = verifier("http://127.0.0.1:9", credentials)
        .verify()
        .await
        .unwrap();

    //* Then
    assert_eq!(outcome, VerifyOutcome::Invalid);
}

#[tokio::test]
async fn no_stored_credentials_classifies_invalid_without_network() {
    //* Given an empty store and a server that must not be called.
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let credentials = credential_store(&dir);

    let profile_mock = server
        .mock("GET", "/api/auth/profile")
        .expect(0)
        .create_async()
        .await;

    //* When
    let outcome = verifier(&server.url(), credentials)
        .verify()
        .await
        .unwrap();

    //* Then
    profile_mock.assert_async().await;
    assert_eq!(outcome, VerifyOutcome::Invalid);
}

#[tokio::test]
async fn undecodable_success_body_classifies_unreachable_not_invalid() {
    //* Given a proxy that answers the profile check with 200 and an
    //  HTML sign-in page instead of the expected JSON.
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let credentials = credential_store(&dir);
    credentials.store_tokens("acc-1", "ref-1").unwrap();
    credentials.store_user(&cached_user()).unwrap();

    let portal_mock = server
        .mock("GET", "/api/auth/profile")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<!doctype html><html><body>Sign in to the network</body></html>")
        .expect(1)
        .create_async()
        .await;

    //* When
    let outcome = verifier(&server.url(), credentials.clone())
        .verify()
        .await
        .unwrap();

    //* Then: ambiguity is not rejection. The stored pair and cached
    //  user remain for the stale fallback.
    portal_mock.assert_async().await;
    assert_eq!(outcome, VerifyOutcome::Unreachable);
    assert_eq!(
        credentials.token_pair().unwrap(),
        Some(("acc-1".to_string(), "ref-1".to_string()))
    );
    let cached: Option<UserRecord> = credentials.user().unwrap();
    assert_eq!(cached.unwrap().id, "user-1");
}
