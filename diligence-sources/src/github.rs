//! GitHub REST response types shared by the activity, audit and coverage connectors

use diligence_net::{FetchRequest, SharedFetcher};
use serde::Deserialize;

use crate::{Endpoints, SourceError};

const ACCEPT: &str = "application/vnd.github+json";

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Owner {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Repository {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub open_issues_count: u64,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    pub owner: Owner,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub items: Vec<Repository>,
}

/// Metadata of a repository's preferred README file
#[derive(Debug, Deserialize)]
pub(crate) struct ReadmeEntry {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitPerson {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitDetail {
    #[serde(default)]
    pub author: Option<CommitPerson>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Commit {
    pub commit: CommitDetail,
    #[serde(default)]
    pub author: Option<Owner>,
}

impl Commit {
    /// Account login when linked, otherwise the git author email or name
    pub fn author_key(&self) -> Option<String> {
        if let Some(author) = &self.author {
            return Some(author.login.to_lowercase());
        }
        let person = self.commit.author.as_ref()?;
        person
            .email
            .as_deref()
            .or(person.name.as_deref())
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

/// Thin client over the GitHub REST API
#[derive(Clone)]
pub(crate) struct GitHub {
    fetcher: SharedFetcher,
    api: String,
    raw: String,
}

impl GitHub {
    pub fn new(fetcher: SharedFetcher, endpoints: &Endpoints) -> Self {
        Self {
            fetcher,
            api: endpoints.github_api.trim_end_matches('/').to_string(),
            raw: endpoints.github_raw.trim_end_matches('/').to_string(),
        }
    }

    pub fn request(&self, path: &str) -> FetchRequest {
        FetchRequest::get(format!("{}/{}", self.api, path.trim_start_matches('/'))).header("Accept", ACCEPT)
    }

    pub async fn json<T: serde::de::DeserializeOwned>(&self, request: FetchRequest) -> Result<T, SourceError> {
        Ok(self.fetcher.fetch_json(request).await?)
    }

    /// Repositories of an organization, most recently pushed first.
    /// A 404 retries the handle as a user account.
    pub async fn recent_repositories(&self, handle: &str, limit: usize) -> Result<Vec<Repository>, SourceError> {
        let org = self
            .request(&format!("orgs/{}/repos", handle))
            .param("sort", "pushed")
            .param("per_page", limit);
        match self.json(org).await {
            Err(e) if e.is_not_found() => {
                let user = self
                    .request(&format!("users/{}/repos", handle))
                    .param("sort", "pushed")
                    .param("per_page", limit);
                self.json(user).await
            }
            other => other,
        }
    }

    pub async fn search_repositories(
        &self,
        query: &str,
        sort: &str,
        limit: usize,
    ) -> Result<Vec<Repository>, SourceError> {
        let request = self
            .request("search/repositories")
            .param("q", query)
            .param("sort", sort)
            .param("order", "desc")
            .param("per_page", limit);
        let response: SearchResponse = self.json(request).await?;
        Ok(response.items)
    }

    /// Commits on the default branch since an RFC 3339 timestamp, first page only
    pub async fn commits_since(&self, full_name: &str, since: &str) -> Result<Vec<Commit>, SourceError> {
        let request = self
            .request(&format!("repos/{}/commits", full_name))
            .param("since", since)
            .param("per_page", 100);
        self.json(request).await
    }

    /// Path of the README GitHub renders for a repository.
    /// Falls back to `README.md` when the lookup answers 404.
    pub async fn readme_path(&self, full_name: &str) -> Result<String, SourceError> {
        let request = self.request(&format!("repos/{}/readme", full_name));
        match self.json::<ReadmeEntry>(request).await {
            Ok(entry) if !entry.path.trim().is_empty() => Ok(entry.path.trim_start_matches('/').to_string()),
            Ok(_) => Ok("README.md".to_string()),
            Err(e) if e.is_not_found() => Ok("README.md".to_string()),
            Err(e) => Err(e),
        }
    }

    /// Raw README text of a repository, whatever its file name
    pub async fn readme(&self, repo: &Repository) -> Result<String, SourceError> {
        let branch = repo.default_branch.as_deref().unwrap_or("main");
        let path = self.readme_path(&repo.full_name).await?;
        let url = format!("{}/{}/{}/{}", self.raw, repo.full_name, branch, path);
        Ok(self.fetcher.get(&url).await?.body)
    }
}
