// src/site/rest.rs

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::{Params, SiteClient};
use crate::error::{AppError, AppResult};

const REST_PATH: &str = "webservice/rest/server.php";

/// `SiteClient` speaking the site's REST protocol over HTTP.
#[derive(Clone)]
pub struct RestSiteClient {
    http: reqwest::Client,
    endpoint: Url,
    token: String,
    user_id: i64,
}

impl RestSiteClient {
    pub fn new(site_url: &str, token: &str, user_id: i64) -> AppResult<Self> {
        let endpoint = rest_endpoint(site_url)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            token: token.to_string(),
            user_id,
        })
    }
}

/// `https://site/sub` and `https://site/sub/` both map to
/// `https://site/sub/webservice/rest/server.php`.
fn rest_endpoint(site_url: &str) -> AppResult<Url> {
    let mut base = Url::parse(site_url)
        .map_err(|e| AppError::InternalServerError(format!("Invalid site URL: {}", e)))?;

    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(REST_PATH)
        .map_err(|e| AppError::InternalServerError(format!("Invalid site URL: {}", e)))
}

/// Turns an `{"exception": …, "message": …}` payload into an error.
fn check_exception(value: Value) -> AppResult<Value> {
    match value.get("exception") {
        Some(_) => {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Error calling the web service")
                .to_string();
            Err(AppError::Validation(message))
        }
        None => Ok(value),
    }
}

#[async_trait]
impl SiteClient for RestSiteClient {
    fn user_id(&self) -> i64 {
        self.user_id
    }

    async fn call(&self, function: &str, params: Params) -> AppResult<Value> {
        let mut form: Params = vec![
            ("wstoken".to_string(), self.token.clone()),
            ("wsfunction".to_string(), function.to_string()),
            ("moodlewsrestformat".to_string(), "json".to_string()),
        ];
        form.extend(params);

        tracing::debug!("Calling {}", function);

        let response = self
            .http
            .post(self.endpoint.clone())
            .form(&form)
            .send()
            .await?
            .error_for_status()?;

        let value: Value = response.json().await?;
        check_exception(value)
    }
}
