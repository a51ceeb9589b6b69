//! GitHub issues as a remote mirror.
//!
//! Entries map onto issues: the summary line is the title, the rest of the
//! message is the body, tags are labels, and `done` means closed. GitHub
//! never deletes issues, so removal closes them with an explanatory comment
//! instead. Pull requests come back from the issues endpoint too and are
//! filtered out.

use std::{collections::BTreeSet, fs, io, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value as JsonValue, json};
use tracing::{debug, error};

use crate::{
    backend::{Backend, Change, RemoveOutcome, TagFilter},
    config,
    error::{Error, Result},
    model::{Entry, State, sort_entries},
    store::Store,
};

const API_ROOT: &str = "https://api.github.com";
const API_USER_KEY: &str = "github.api.user";
const API_REPO_KEY: &str = "github.api.repo";
const PAGE_SIZE: usize = 100;

/// Label applied when an entry carries no tags, so nothing lands unlabeled.
const DEFAULT_LABEL: &str = "task";

/// A connected GitHub repository acting as a remote backend.
pub struct GithubBackend {
    user: String,
    repo: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct GithubIssue {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    #[serde(default)]
    labels: Vec<GithubLabel>,
    /// Present only when the "issue" is actually a pull request.
    #[serde(default)]
    pull_request: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct GithubLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

impl GithubBackend {
    /// Construct from stored configuration and the per-project token file.
    ///
    /// # Errors
    ///
    /// Returns an error if the user/repo keys or the access token are missing.
    pub fn from_store(store: &Store) -> Result<Self> {
        let user = store.config_get(API_USER_KEY)?.ok_or_else(|| {
            Error::Config(format!("{API_USER_KEY} is not set; run `pb remote add github`"))
        })?;
        let repo = store.config_get(API_REPO_KEY)?.ok_or_else(|| {
            Error::Config(format!("{API_REPO_KEY} is not set; run `pb remote add github`"))
        })?;
        let project = config::project_id(store)?;
        let token = read_token(&project)?.ok_or(Error::MissingToken { project })?;
        Ok(Self { user, repo, token })
    }

    fn url(&self, path: &str) -> String {
        format!("{API_ROOT}/repos/{}/{}{path}", self.user, self.repo)
    }

    fn call(&self, method: &str, path: &str, body: Option<JsonValue>) -> Result<ureq::Response> {
        let url = self.url(path);
        debug!(method, %url, "GitHub API request");

        let request = ureq::request(method, &url)
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", "pebble")
            .set("Authorization", &format!("Bearer {}", self.token));

        let result = match body {
            Some(payload) => request.send_json(payload),
            None => request.call(),
        };

        match result {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(status, response)) => {
                let message = response
                    .into_json::<ApiErrorBody>()
                    .map(|body| body.message)
                    .unwrap_or_else(|_| "no error details".to_string());
                error!(status, %message, "GitHub API refused the request");
                Err(Error::RemoteApi { status, message })
            }
            Err(other) => Err(Error::RemoteTransport(other.to_string())),
        }
    }

    fn call_json<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<T> {
        self.call(method, path, body)?
            .into_json::<T>()
            .map_err(|error| Error::RemoteTransport(format!("invalid JSON from remote: {error}")))
    }

    fn fetch_issues(&self) -> Result<Vec<GithubIssue>> {
        let mut issues = Vec::new();
        let mut page = 1u32;
        loop {
            let batch: Vec<GithubIssue> = self.call_json(
                "GET",
                &format!("/issues?state=all&per_page={PAGE_SIZE}&page={page}"),
                None,
            )?;
            if batch.is_empty() {
                break;
            }
            let raw_len = batch.len();
            issues.extend(batch.into_iter().filter(|issue| issue.pull_request.is_none()));
            if raw_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }
        Ok(issues)
    }

    fn set_issue_state(&self, entry: &Entry, state: &str) -> Result<()> {
        let Some(remote_id) = entry.remote_id.as_deref() else {
            debug!(entry = ?entry.id, "entry has no linked issue; skipping remote state change");
            return Ok(());
        };
        self.call(
            "PATCH",
            &format!("/issues/{remote_id}"),
            Some(json!({ "state": state })),
        )?;
        Ok(())
    }
}

impl Backend for GithubBackend {
    fn name(&self) -> &'static str {
        "github"
    }

    fn fetch_entries(&self, filter: &TagFilter, id: Option<i64>) -> Result<Vec<Entry>> {
        // Remote issues carry no local id to be addressed by.
        if id.is_some() {
            return Ok(Vec::new());
        }
        let mut entries: Vec<Entry> = self
            .fetch_issues()?
            .into_iter()
            .map(issue_to_entry)
            .filter(|entry| filter.matches(&entry.tags))
            .collect();
        sort_entries(&mut entries);
        Ok(entries)
    }

    fn fetch_features(&self) -> Result<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }

    fn add_entry(&mut self, entry: &mut Entry) -> Result<()> {
        let (title, body) = split_msg(&entry.msg);
        let issue: GithubIssue = self.call_json(
            "POST",
            "/issues",
            Some(json!({
                "title": title,
                "body": body,
                "labels": labels_for(entry),
            })),
        )?;
        entry.remote_id = Some(issue.number.to_string());
        Ok(())
    }

    fn update_entry(&mut self, entry: &mut Entry, msg: &str) -> Result<()> {
        let Some(remote_id) = entry.remote_id.as_deref() else {
            debug!(entry = ?entry.id, "entry has no linked issue; skipping remote update");
            return Ok(());
        };
        let (title, body) = split_msg(msg);
        self.call(
            "PATCH",
            &format!("/issues/{remote_id}"),
            Some(json!({ "title": title, "body": body })),
        )?;
        Ok(())
    }

    fn tag_entry(&mut self, entry: &Entry, tag: &str) -> Result<Change> {
        let Some(remote_id) = entry.remote_id.as_deref() else {
            debug!(entry = ?entry.id, "entry has no linked issue; skipping remote label");
            return Ok(Change::Noop);
        };
        self.call(
            "POST",
            &format!("/issues/{remote_id}/labels"),
            Some(json!({ "labels": [tag] })),
        )?;
        Ok(Change::Applied)
    }

    fn untag_entry(&mut self, entry: &Entry, tag: &str) -> Result<Change> {
        let Some(remote_id) = entry.remote_id.as_deref() else {
            debug!(entry = ?entry.id, "entry has no linked issue; skipping remote unlabel");
            return Ok(Change::Noop);
        };
        match self.call("DELETE", &format!("/issues/{remote_id}/labels/{tag}"), None) {
            Ok(_) => Ok(Change::Applied),
            // 404 here means the label was not on the issue to begin with.
            Err(Error::RemoteApi { status: 404, .. }) => Ok(Change::Noop),
            Err(error) => Err(error),
        }
    }

    fn add_feature(&mut self, _tag: &str) -> Result<()> {
        // Features are a local presentation concept; GitHub has no analogue.
        Ok(())
    }

    fn remove_feature(&mut self, _tag: &str) -> Result<()> {
        Ok(())
    }

    fn start_entry(&mut self, entry: &Entry, _deadline: Option<DateTime<Utc>>) -> Result<()> {
        self.set_issue_state(entry, "open")
    }

    fn end_entry(&mut self, entry: &Entry) -> Result<()> {
        self.set_issue_state(entry, "closed")
    }

    fn backlog_entry(&mut self, entry: &Entry) -> Result<()> {
        self.set_issue_state(entry, "open")
    }

    fn remove_entry(&mut self, entry: &Entry) -> Result<RemoveOutcome> {
        let Some(remote_id) = entry.remote_id.as_deref() else {
            debug!(entry = ?entry.id, "entry has no linked issue; nothing to remove remotely");
            return Ok(RemoveOutcome::Deleted);
        };
        self.call(
            "POST",
            &format!("/issues/{remote_id}/comments"),
            Some(json!({ "body": "NOTE: remotely removed entry" })),
        )?;
        self.call(
            "PATCH",
            &format!("/issues/{remote_id}"),
            Some(json!({ "state": "closed" })),
        )?;
        Ok(RemoveOutcome::ClosedInstead)
    }
}

/// Split a message into issue title and body.
fn split_msg(msg: &str) -> (String, String) {
    match msg.split_once('\n') {
        Some((title, rest)) => (
            title.trim_end().to_string(),
            rest.trim_start_matches(['\r', '\n']).to_string(),
        ),
        None => (msg.to_string(), String::new()),
    }
}

/// Join issue title and body back into a message.
fn join_msg(title: &str, body: Option<&str>) -> String {
    match body {
        Some(body) if !body.trim().is_empty() => format!("{title}\n\n{}", body.trim_end()),
        _ => title.to_string(),
    }
}

fn labels_for(entry: &Entry) -> Vec<String> {
    if entry.tags.is_empty() {
        vec![DEFAULT_LABEL.to_string()]
    } else {
        entry.tags.iter().cloned().collect()
    }
}

fn issue_to_entry(issue: GithubIssue) -> Entry {
    let state = if issue.state == "closed" {
        State::Done
    } else {
        State::Backlog
    };
    let mut tags: BTreeSet<String> = issue
        .labels
        .into_iter()
        .map(|label| label.name)
        .collect();
    if tags.is_empty() {
        tags.insert(DEFAULT_LABEL.to_string());
    }
    Entry {
        id: None,
        state,
        msg: join_msg(&issue.title, issue.body.as_deref()),
        points: 1,
        remote_id: Some(issue.number.to_string()),
        tags,
        history: Vec::new(),
        deadline: None,
    }
}

/// Arguments collected from the user when attaching the GitHub remote.
#[derive(Debug, Clone)]
pub struct Setup {
    pub user: String,
    pub repo: String,
    pub token: String,
}

/// Store the GitHub connection settings and the access token.
///
/// # Errors
///
/// Returns an error if any field is blank or the token file cannot be
/// written.
pub fn setup(store: &mut Store, setup: &Setup) -> Result<()> {
    if setup.user.trim().is_empty() || setup.repo.trim().is_empty() || setup.token.trim().is_empty()
    {
        return Err(Error::Config(
            "github remote needs a user, a repo, and an access token".into(),
        ));
    }
    let project = config::project_id(store)?;
    store_token(&project, setup.token.trim())?;
    store.config_set(API_USER_KEY, setup.user.trim())?;
    store.config_set(API_REPO_KEY, setup.repo.trim())?;
    Ok(())
}

/// Drop the GitHub connection settings and the stored token.
///
/// # Errors
///
/// Returns an error if config or the token file cannot be written.
pub fn deactivate(store: &mut Store) -> Result<()> {
    store.config_delete(API_USER_KEY)?;
    store.config_delete(API_REPO_KEY)?;
    let project = config::project_id(store)?;
    remove_token(&project)
}

/// Guess `(user, repo)` from `.git/config` in the working directory, so the
/// setup prompts can offer defaults.
#[must_use]
pub fn git_remote_defaults() -> Option<(String, String)> {
    let content = fs::read_to_string(".git/config").ok()?;
    parse_git_config(&content)
}

fn parse_git_config(content: &str) -> Option<(String, String)> {
    let mut in_origin = false;
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_origin = line == "[remote \"origin\"]";
            continue;
        }
        if in_origin {
            if let Some((key, value)) = line.split_once('=') {
                if key.trim() == "url" {
                    return parse_remote_url(value.trim());
                }
            }
        }
    }
    None
}

/// Pull `(user, repo)` out of an https or ssh remote url.
fn parse_remote_url(url: &str) -> Option<(String, String)> {
    let trimmed = url.trim_end_matches(".git");
    let mut parts = trimmed.rsplit(['/', ':']);
    let repo = parts.next().filter(|part| !part.is_empty())?.to_string();
    let user = parts.next().filter(|part| !part.is_empty())?.to_string();
    Some((user, repo))
}

/// Tokens live outside the repo, keyed by project id, so the database can be
/// committed or shared without leaking credentials.
fn token_file() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| Error::Config("no user config directory on this platform".into()))?;
    Ok(base.join("pebble").join("github-tokens"))
}

pub(crate) fn read_token(project: &str) -> Result<Option<String>> {
    let path = token_file()?;
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error.into()),
    };
    for line in content.lines() {
        if let Some((id, token)) = line.split_once('=') {
            if id.trim() == project && !token.trim().is_empty() {
                return Ok(Some(token.trim().to_string()));
            }
        }
    }
    Ok(None)
}

fn store_token(project: &str, token: &str) -> Result<()> {
    let path = token_file()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut lines = existing_token_lines(&path, project)?;
    lines.push(format!("{project}={token}"));
    fs::write(&path, lines.join("\n") + "\n")?;
    Ok(())
}

fn remove_token(project: &str) -> Result<()> {
    let path = token_file()?;
    if !path.exists() {
        return Ok(());
    }
    let lines = existing_token_lines(&path, project)?;
    if lines.is_empty() {
        fs::remove_file(&path)?;
    } else {
        fs::write(&path, lines.join("\n") + "\n")?;
    }
    Ok(())
}

/// Token file lines with any line for `project` filtered out.
fn existing_token_lines(path: &std::path::Path, project: &str) -> Result<Vec<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(error.into()),
    };
    Ok(content
        .lines()
        .filter(|line| {
            !line.trim().is_empty()
                && line
                    .split_once('=')
                    .is_none_or(|(id, _)| id.trim() != project)
        })
        .map(ToOwned::to_owned)
        .collect())
}
