//! Jenkins remote API client.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::{JenkinsError, JenkinsResult};

/// A job as listed by the Jenkins API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobSummary {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<JobSummary>,
}

/// Operations jobforge needs from a Jenkins server.
///
/// Job names may contain `/` to address jobs inside folders.
#[async_trait]
pub trait JenkinsApi: Send + Sync {
    async fn list_jobs(&self) -> JenkinsResult<Vec<JobSummary>>;

    async fn job_exists(&self, name: &str) -> JenkinsResult<bool>;

    /// The job's `config.xml`.
    async fn get_config(&self, name: &str) -> JenkinsResult<String>;

    async fn create_job(&self, name: &str, config: &str) -> JenkinsResult<()>;

    async fn reconfigure_job(&self, name: &str, config: &str) -> JenkinsResult<()>;

    async fn delete_job(&self, name: &str) -> JenkinsResult<()>;

    /// Run a groovy script on the controller, returning its output.
    async fn run_script(&self, script: &str) -> JenkinsResult<String>;
}

/// URL path of a job, relative to the server root.
///
/// `team/app` becomes `job/team/job/app`.
pub fn job_path(name: &str) -> String {
    name.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| format!("job/{}", urlencoding::encode(segment)))
        .collect::<Vec<_>>()
        .join("/")
}

/// Split a job name into its folder path and leaf name.
fn split_folder(name: &str) -> (String, &str) {
    match name.trim_end_matches('/').rsplit_once('/') {
        Some((folder, leaf)) => (format!("{}/", job_path(folder)), leaf),
        None => (String::new(), name.trim_end_matches('/')),
    }
}

/// HTTP client for the Jenkins remote API.
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    http: reqwest::Client,
    base: Url,
    credentials: Option<(String, String)>,
    timeout: Option<Duration>,
}

impl JenkinsClient {
    pub fn new(url: &str) -> JenkinsResult<Self> {
        let mut base = Url::parse(url).map_err(|e| JenkinsError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base,
            credentials: None,
            timeout: None,
        })
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> JenkinsResult<Url> {
        self.base.join(path).map_err(|e| JenkinsError::InvalidUrl {
            url: format!("{}{}", self.base, path),
            message: e.to_string(),
        })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut request = self.http.request(method, url);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        request
    }

    /// Send a request, failing on any non-success status.
    async fn send(&self, method: Method, path: &str, body: Option<RequestBody<'_>>) -> JenkinsResult<reqwest::Response> {
        let url = self.url(path)?;
        debug!(%method, %url, "Jenkins request");

        let mut request = self.request(method, url.clone());
        match body {
            Some(RequestBody::Xml(xml)) => {
                request = request
                    .header(reqwest::header::CONTENT_TYPE, "application/xml; charset=utf-8")
                    .body(xml.to_string());
            }
            Some(RequestBody::Form(form)) => {
                request = request.form(form);
            }
            None => {}
        }

        let response = request.send().await.map_err(|e| JenkinsError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(JenkinsError::Api {
                url: url.to_string(),
                status,
                body,
            });
        }
        Ok(response)
    }

    async fn text(&self, response: reqwest::Response) -> JenkinsResult<String> {
        let url = response.url().to_string();
        response
            .text()
            .await
            .map_err(|e| JenkinsError::Parse {
                url,
                message: e.to_string(),
            })
    }
}

enum RequestBody<'a> {
    Xml(&'a str),
    Form(&'a [(&'a str, &'a str)]),
}

#[async_trait]
impl JenkinsApi for JenkinsClient {
    async fn list_jobs(&self) -> JenkinsResult<Vec<JobSummary>> {
        let response = self
            .send(Method::GET, "api/json?tree=jobs[name,url,color]", None)
            .await?;
        let url = response.url().to_string();
        let list: JobList = response.json().await.map_err(|e| JenkinsError::Parse {
            url,
            message: e.to_string(),
        })?;
        Ok(list.jobs)
    }

    async fn job_exists(&self, name: &str) -> JenkinsResult<bool> {
        let path = format!("{}/api/json?tree=name", job_path(name));
        match self.send(Method::GET, &path, None).await {
            Ok(_) => Ok(true),
            Err(JenkinsError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_config(&self, name: &str) -> JenkinsResult<String> {
        let path = format!("{}/config.xml", job_path(name));
        let response = self.send(Method::GET, &path, None).await?;
        self.text(response).await
    }

    async fn create_job(&self, name: &str, config: &str) -> JenkinsResult<()> {
        info!(job = name, "Creating Jenkins job");
        let (folder, leaf) = split_folder(name);
        let path = format!("{}createItem?name={}", folder, urlencoding::encode(leaf));
        self.send(Method::POST, &path, Some(RequestBody::Xml(config)))
            .await?;
        Ok(())
    }

    async fn reconfigure_job(&self, name: &str, config: &str) -> JenkinsResult<()> {
        info!(job = name, "Reconfiguring Jenkins job");
        let path = format!("{}/config.xml", job_path(name));
        self.send(Method::POST, &path, Some(RequestBody::Xml(config)))
            .await?;
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> JenkinsResult<()> {
        info!(job = name, "Deleting Jenkins job");
        let path = format!("{}/doDelete", job_path(name));
        self.send(Method::POST, &path, None).await?;
        Ok(())
    }

    async fn run_script(&self, script: &str) -> JenkinsResult<String> {
        let form = [("script", script)];
        let response = self
            .send(Method::POST, "scriptText", Some(RequestBody::Form(&form)))
            .await?;
        self.text(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_path_folders() {
        assert_eq!(job_path("app"), "job/app");
        assert_eq!(job_path("team/app"), "job/team/job/app");
        assert_eq!(job_path("my job"), "job/my%20job");
    }

    #[test]
    fn test_split_folder() {
        assert_eq!(split_folder("app"), (String::new(), "app"));
        assert_eq!(split_folder("a/b/app"), ("job/a/job/b/".to_string(), "app"));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = JenkinsClient::new("https://ci.example.com/jenkins").unwrap();
        assert_eq!(client.base_url().as_str(), "https://ci.example.com/jenkins/");
        assert_eq!(
            client.url("job/app/config.xml").unwrap().as_str(),
            "https://ci.example.com/jenkins/job/app/config.xml"
        );
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            JenkinsClient::new("not a url"),
            Err(JenkinsError::InvalidUrl { .. })
        ));
    }
}
