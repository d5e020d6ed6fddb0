use std::time::Duration;

use miette::{IntoDiagnostic, Result};
use plinth_client::PlinthClient;
use plinth_common::{CancelToken, MaintainerRole, Package};
use pretty_assertions::assert_eq;
use quarry::{
    CratesIoFetcher, GithubEnricher, MetadataEnricher, NpmFetcher, PackageFetcher, PyPiFetcher,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client() -> PlinthClient {
    PlinthClient::builder()
        .retry_min_delay(Duration::from_millis(1))
        .build()
}

#[async_std::test]
async fn npm_fetcher_decodes_a_packument() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/left-pad"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dist-tags": { "latest": "1.3.0" },
            "description": "String left pad",
            "license": "WTFPL",
            "repository": { "type": "git", "url": "git+https://github.com/stevemao/left-pad.git" },
            "versions": {
                "1.0.0": { "dependencies": {} },
                "1.3.0": { "dependencies": { "Pad-Core": "^2.0.0", "util-deprecate": "~1.0.0" } }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = NpmFetcher::new(test_client(), server.uri().parse().into_diagnostic()?);
    let package = fetcher
        .fetch("Left-Pad", false, &CancelToken::new())
        .await?;

    assert_eq!(package.name, "left-pad");
    assert_eq!(package.version.as_deref(), Some("1.3.0"));
    assert_eq!(package.dependencies, vec!["pad-core", "util-deprecate"]);
    assert_eq!(package.license.as_deref(), Some("WTFPL"));
    assert_eq!(
        package.repository.as_ref().map(|u| u.as_str()),
        Some("https://github.com/stevemao/left-pad")
    );

    // Second fetch is served from the in-process packument cache.
    fetcher.fetch("left-pad", false, &CancelToken::new()).await?;
    Ok(())
}

#[async_std::test]
async fn crates_io_fetcher_filters_dev_and_optional_deps() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crates/tracing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "crate": {
                "name": "tracing",
                "description": "Application-level tracing.",
                "repository": "https://github.com/tokio-rs/tracing",
                "downloads": 123456,
                "max_stable_version": "0.1.37"
            },
            "versions": [ { "num": "0.1.37", "license": "MIT" } ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crates/tracing/0.1.37/dependencies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dependencies": [
                { "crate_id": "tracing_core", "kind": "normal", "optional": false },
                { "crate_id": "pin-project-lite", "kind": "normal", "optional": false },
                { "crate_id": "log", "kind": "normal", "optional": true },
                { "crate_id": "criterion", "kind": "dev", "optional": false }
            ]
        })))
        .mount(&server)
        .await;

    let base = format!("{}/", server.uri());
    let fetcher = CratesIoFetcher::new(test_client(), base.parse().into_diagnostic()?);
    let package = fetcher.fetch("tracing", false, &CancelToken::new()).await?;

    assert_eq!(package.version.as_deref(), Some("0.1.37"));
    assert_eq!(
        package.dependencies,
        vec!["pin-project-lite", "tracing-core"]
    );
    assert_eq!(package.license.as_deref(), Some("MIT"));
    assert_eq!(package.downloads, Some(123456));
    Ok(())
}

#[async_std::test]
async fn pypi_fetcher_filters_extra_requirements() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pypi/requests/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "info": {
                "name": "requests",
                "version": "2.31.0",
                "summary": "Python HTTP for Humans.",
                "license": "Apache 2.0",
                "author": "Kenneth Reitz",
                "project_urls": { "Source": "https://github.com/psf/requests" },
                "requires_dist": [
                    "charset_normalizer (<4,>=2)",
                    "idna (<4,>=2.5)",
                    "PySocks (!=1.5.7,>=1.5.6) ; extra == 'socks'"
                ]
            }
        })))
        .mount(&server)
        .await;

    let base = format!("{}/", server.uri());
    let fetcher = PyPiFetcher::new(test_client(), base.parse().into_diagnostic()?);
    let package = fetcher.fetch("Requests", false, &CancelToken::new()).await?;

    assert_eq!(package.name, "requests");
    assert_eq!(package.dependencies, vec!["charset-normalizer", "idna"]);
    assert_eq!(
        package.repository.as_ref().map(|u| u.as_str()),
        Some("https://github.com/psf/requests")
    );
    Ok(())
}

#[async_std::test]
async fn github_enricher_collects_repo_metadata() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/psf/requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stargazers_count": 50000,
            "archived": false,
            "language": "Python",
            "topics": ["http", "client"],
            "pushed_at": "2024-05-01T10:00:00Z",
            "owner": { "login": "psf" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/psf/requests/releases/latest"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/psf/requests/contributors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "login": "psf" },
            { "login": "kennethreitz" }
        ])))
        .mount(&server)
        .await;

    let base = format!("{}/", server.uri());
    let enricher = GithubEnricher::new(test_client(), base.parse().into_diagnostic()?);
    let mut package = Package::new("requests", plinth_common::ManifestKind::PyPi);
    package.repository = Some("https://github.com/psf/requests".parse().into_diagnostic()?);

    let pairs = enricher
        .enrich(&package, false, &CancelToken::new())
        .await?;
    let meta: plinth_common::Meta = pairs.into_iter().collect();

    assert_eq!(meta.repo_stars(), Some(50000));
    assert_eq!(meta.repo_archived(), Some(false));
    assert_eq!(meta.repo_language(), Some("Python"));
    assert_eq!(meta.repo_topics(), vec!["http", "client"]);
    let maintainers = meta.maintainers();
    assert_eq!(maintainers.len(), 2);
    assert_eq!(maintainers[0].role, MaintainerRole::Owner);
    assert_eq!(maintainers[1].role, MaintainerRole::Maintainer);
    Ok(())
}
