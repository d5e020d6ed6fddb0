use std::time::Duration;

use miette::{IntoDiagnostic, Result};
use plinth_client::{PlinthClient, PlinthClientError};
use pretty_assertions::assert_eq;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(cache: &tempfile::TempDir) -> PlinthClient {
    PlinthClient::builder()
        .cache(cache.path())
        .retry_min_delay(Duration::from_millis(1))
        .build()
}

#[async_std::test]
async fn second_get_is_served_from_cache() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pkg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().into_diagnostic()?;
    let client = client_for(&cache);
    let url: Url = format!("{}/pkg", server.uri()).parse().into_diagnostic()?;

    let first = client.get(&url, false).await?;
    let second = client.get(&url, false).await?;
    assert_eq!(first, b"payload".to_vec());
    assert_eq!(second, b"payload".to_vec());
    Ok(())
}

#[async_std::test]
async fn refresh_bypasses_read_but_writes_back() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pkg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"one".to_vec()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pkg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"two".to_vec()))
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().into_diagnostic()?;
    let client = client_for(&cache);
    let url: Url = format!("{}/pkg", server.uri()).parse().into_diagnostic()?;

    assert_eq!(client.get(&url, false).await?, b"one".to_vec());
    // Bypasses the cached "one"...
    assert_eq!(client.get(&url, true).await?, b"two".to_vec());
    // ...and the refreshed bytes were written back.
    assert_eq!(client.get(&url, false).await?, b"two".to_vec());
    Ok(())
}

#[async_std::test]
async fn not_found_is_authoritative_and_not_retried() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().into_diagnostic()?;
    let client = client_for(&cache);
    let url: Url = format!("{}/missing", server.uri())
        .parse()
        .into_diagnostic()?;

    let err = client.get(&url, false).await.unwrap_err();
    assert!(matches!(err, PlinthClientError::NotFound(_)));
    Ok(())
}

#[async_std::test]
async fn server_errors_are_retried_until_success() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().into_diagnostic()?;
    let client = client_for(&cache);
    let url: Url = format!("{}/flaky", server.uri()).parse().into_diagnostic()?;

    assert_eq!(client.get(&url, false).await?, b"ok".to_vec());
    Ok(())
}

#[async_std::test]
async fn expired_ttl_goes_back_to_the_network() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pkg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .expect(2)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().into_diagnostic()?;
    let client = PlinthClient::builder()
        .cache(cache.path())
        .ttl(Duration::ZERO)
        .retry_min_delay(Duration::from_millis(1))
        .build();
    let url: Url = format!("{}/pkg", server.uri()).parse().into_diagnostic()?;

    client.get(&url, false).await?;
    client.get(&url, false).await?;
    Ok(())
}
