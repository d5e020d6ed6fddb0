use async_trait::async_trait;
use plinth_client::{PlinthClient, PlinthClientError};
use plinth_common::{keys, CancelToken, Maintainer, MaintainerRole, Package};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::enrich::MetadataEnricher;
use crate::error::Result;

const MAX_MAINTAINERS: usize = 5;

/// Enriches nodes whose repository lives on GitHub with stars, archive
/// status, language, topics, commit/release recency, and a maintainer list.
#[derive(Debug)]
pub struct GithubEnricher {
    client: PlinthClient,
    api_base: Url,
}

impl GithubEnricher {
    pub fn new(client: PlinthClient, api_base: Url) -> Self {
        Self { client, api_base }
    }

    pub fn with_client(client: PlinthClient) -> Self {
        Self::new(
            client,
            "https://api.github.com/".parse().expect("static API URL"),
        )
    }

    /// `https://github.com/{owner}/{repo}[.git][/...]` -> `(owner, repo)`.
    fn slug(repository: &Url) -> Option<(String, String)> {
        if repository.host_str() != Some("github.com") {
            return None;
        }
        let mut segments = repository.path_segments()?.filter(|s| !s.is_empty());
        let owner = segments.next()?.to_string();
        let repo = segments.next()?.trim_end_matches(".git").to_string();
        if owner.is_empty() || repo.is_empty() {
            None
        } else {
            Some((owner, repo))
        }
    }
}

#[async_trait]
impl MetadataEnricher for GithubEnricher {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn enrich(
        &self,
        package: &Package,
        refresh: bool,
        cancel: &CancelToken,
    ) -> Result<Vec<(String, Value)>> {
        let Some((owner, repo)) = package.repository.as_ref().and_then(Self::slug) else {
            return Ok(Vec::new());
        };

        let repo_url = self
            .api_base
            .join(&format!("repos/{owner}/{repo}"))
            .map_err(PlinthClientError::from)?;
        let data: RepoData = self.client.get_json(&repo_url, refresh, cancel).await?;

        let mut out: Vec<(String, Value)> = vec![
            (
                keys::REPO_URL.into(),
                Value::from(format!("https://github.com/{owner}/{repo}")),
            ),
            (keys::REPO_OWNER.into(), Value::from(data.owner.login.clone())),
            (keys::REPO_STARS.into(), Value::from(data.stargazers_count)),
            (keys::REPO_ARCHIVED.into(), Value::from(data.archived)),
        ];
        if let Some(language) = data.language {
            out.push((keys::REPO_LANGUAGE.into(), Value::from(language)));
        }
        if !data.topics.is_empty() {
            out.push((keys::REPO_TOPICS.into(), Value::from(data.topics)));
        }
        if let Some(pushed_at) = data.pushed_at {
            out.push((keys::REPO_LAST_COMMIT.into(), Value::from(pushed_at)));
        }

        // Latest release is optional; repositories without releases 404 here.
        let release_url = self
            .api_base
            .join(&format!("repos/{owner}/{repo}/releases/latest"))
            .map_err(PlinthClientError::from)?;
        match self
            .client
            .get_json::<ReleaseData>(&release_url, refresh, cancel)
            .await
        {
            Ok(release) => {
                if let Some(published_at) = release.published_at {
                    out.push((keys::REPO_LAST_RELEASE.into(), Value::from(published_at)));
                }
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        let contributors_url = self
            .api_base
            .join(&format!(
                "repos/{owner}/{repo}/contributors?per_page={MAX_MAINTAINERS}"
            ))
            .map_err(PlinthClientError::from)?;
        match self
            .client
            .get_json::<Vec<ContributorData>>(&contributors_url, refresh, cancel)
            .await
        {
            Ok(contributors) => {
                let maintainers: Vec<Maintainer> = contributors
                    .into_iter()
                    .take(MAX_MAINTAINERS)
                    .map(|c| Maintainer {
                        role: if c.login == data.owner.login {
                            MaintainerRole::Owner
                        } else {
                            MaintainerRole::Maintainer
                        },
                        name: c.login,
                    })
                    .collect();
                if !maintainers.is_empty() {
                    out.push((
                        keys::REPO_MAINTAINERS.into(),
                        serde_json::to_value(maintainers).expect("maintainers serialize"),
                    ));
                }
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        Ok(out)
    }
}

#[derive(Debug, Deserialize)]
struct RepoData {
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    pushed_at: Option<String>,
    owner: OwnerData,
}

#[derive(Debug, Deserialize)]
struct OwnerData {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseData {
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContributorData {
    login: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn slugs_from_repository_urls() {
        let url: Url = "https://github.com/orogene/orogene.git".parse().unwrap();
        assert_eq!(
            GithubEnricher::slug(&url),
            Some(("orogene".to_string(), "orogene".to_string()))
        );
        let other: Url = "https://gitlab.com/foo/bar".parse().unwrap();
        assert_eq!(GithubEnricher::slug(&other), None);
    }
}
