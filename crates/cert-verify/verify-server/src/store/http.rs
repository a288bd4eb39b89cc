use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    Client,
    StatusCode,
};
use url::Url;

use super::{
    ContentStore,
    StoreError,
};

/// Object store reachable over plain HTTP(S): `GET {base_url}/{container}/{path}`.
#[derive(Debug, Clone)]
pub struct HttpContentStore {
    client: Client,
    base_url: Url,
    container: String,
    auth_token: Option<String>,
}

impl HttpContentStore {
    pub fn new(
        base_url: Url,
        container: String,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            container,
            auth_token,
        })
    }

    fn object_url(&self, path: &str) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::Backend(format!("base url {} cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .extend(self.container.split('/').filter(|s| !s.is_empty()))
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn get(&self, path: &str) -> Result<Bytes, StoreError> {
        if path.split('/').any(|segment| segment == "..") {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        let url = self.object_url(path)?;
        tracing::debug!(target: "cert_verify::store", %url, "Fetching certificate object");

        let mut request = self.client.get(url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|err| {
            if err.is_connect() || err.is_timeout() {
                StoreError::Unreachable(err.to_string())
            } else {
                StoreError::Backend(err.to_string())
            }
        })?;

        match response.status() {
            status if status.is_success() => {
                response
                    .bytes()
                    .await
                    .map_err(|err| StoreError::Backend(err.to_string()))
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(path.to_string())),
            status => Err(StoreError::Backend(format!("unexpected status {status}"))),
        }
    }
}
