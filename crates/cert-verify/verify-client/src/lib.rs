use reqwest::{
    Client,
    StatusCode,
    header,
};
use serde_json::{
    Map,
    Value,
    json,
};
use url::Url;

pub use cert_verify_core::{
    CertificateRef,
    ErrorCode,
    ErrorResponse,
    Response,
    ResponseCode,
    Verdict,
};

const VERIFY_PATH: &str = "v1/certs/verify";
const TRACE_ID_HEADER: &str = "x-trace-id";

/// A client for the certificate verification API
///
/// ``` no_run
/// use cert_verify_client::CertVerifyClient;
///
/// #[tokio::main]
/// async fn main() {
///     let client = CertVerifyClient::new("http://localhost:9000").unwrap();
///     let response = client
///         .verify_by_id("https://cdn.example.com/e-credentials/2024/a.json")
///         .await
///         .unwrap();
///     println!("valid: {}", response.verdict().valid());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CertVerifyClient {
    client: Client,
    base_url: Url,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Service error {code} ({response_code:?}): {message}")]
    Service {
        code: ErrorCode,
        message: String,
        response_code: ResponseCode,
    },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ErrorResponse> for ClientError {
    fn from(err: ErrorResponse) -> Self {
        Self::Service {
            code: err.code,
            message: err.message,
            response_code: err.response_code,
        }
    }
}

impl CertVerifyClient {
    /// Create a new client for the service at `url`
    pub fn new(url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: Url::parse(url)?,
        })
    }

    /// Create a new client that sends `auth` as the `Authorization` header
    pub fn new_with_auth(url: &str, auth: &str) -> Result<Self, ClientError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            auth.parse().map_err(|_| {
                ClientError::InvalidResponse("Invalid authorization header".to_string())
            })?,
        );

        Ok(Self {
            client: Client::builder().default_headers(headers).build()?,
            base_url: Url::parse(url)?,
        })
    }

    /// Verify a certificate document sent inline
    pub async fn verify_inline(&self, document: Map<String, Value>) -> Result<Response, ClientError> {
        self.verify(CertificateRef::Inline(document), None).await
    }

    /// Verify a certificate the service fetches from its content store
    pub async fn verify_by_id(&self, id: &str) -> Result<Response, ClientError> {
        self.verify(CertificateRef::Id(id.to_string()), None).await
    }

    /// Verify a certificate, tagging the call with `trace_id` when given
    pub async fn verify(
        &self,
        certificate: CertificateRef,
        trace_id: Option<&str>,
    ) -> Result<Response, ClientError> {
        let body = json!({ "request": { "certificate": certificate } });

        let mut request = self.client.post(self.base_url.join(VERIFY_PATH)?).json(&body);
        if let Some(trace_id) = trace_id {
            request = request.header(TRACE_ID_HEADER, trace_id);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        match status {
            StatusCode::OK => Ok(serde_json::from_slice(&bytes)?),
            StatusCode::BAD_REQUEST | StatusCode::INTERNAL_SERVER_ERROR => {
                match serde_json::from_slice::<ErrorResponse>(&bytes) {
                    Ok(err) => Err(err.into()),
                    Err(_) => {
                        Err(ClientError::InvalidResponse(format!(
                            "HTTP error: {status}: {}",
                            String::from_utf8_lossy(&bytes)
                        )))
                    }
                }
            }
            _ => Err(ClientError::InvalidResponse(format!("HTTP error: {status}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cert_verify_server::Config;
    use clap::Parser;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;
    use wiremock::{
        Mock,
        MockServer,
        ResponseTemplate,
        matchers::{
            body_json,
            header,
            method,
            path,
        },
    };

    fn envelope(valid: bool, messages: &[&str]) -> Value {
        json!({
            "id": "api.cert.verify",
            "ver": "v1",
            "ts": "2024-06-01T12:00:00.000Z",
            "params": { "msgid": "trace-client", "status": "successful" },
            "responseCode": "OK",
            "result": {
                "response": { "valid": valid, "errorCount": messages.len(), "messages": messages }
            }
        })
    }

    #[tokio::test]
    async fn verify_by_id_posts_reference() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/certs/verify"))
            .and(body_json(json!({ "request": { "certificate": { "id": "2024/a.json" } } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(true, &[])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = CertVerifyClient::new(&mock_server.uri()).unwrap();
        let response = client.verify_by_id("2024/a.json").await.unwrap();

        assert!(response.verdict().valid());
        assert_eq!(response.params.msgid, "trace-client");
    }

    #[tokio::test]
    async fn verify_sends_trace_id() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-trace-id", "trace-client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
                false,
                &["ERROR: Assertion.expires - certificate has expired"],
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = CertVerifyClient::new(&mock_server.uri()).unwrap();
        let mut document = Map::new();
        document.insert("expires".to_string(), json!("2001-01-01T00:00:00Z"));
        let response = client
            .verify(CertificateRef::Inline(document), Some("trace-client"))
            .await
            .unwrap();

        assert!(!response.verdict().valid());
        assert_eq!(response.verdict().error_count(), 1);
    }

    #[tokio::test]
    async fn service_errors_are_typed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "CONTENT_FETCH_ERROR",
                "message": "failed to fetch certificate `a.json`: object `a.json` not found",
                "responseCode": "CLIENT_ERROR"
            })))
            .mount(&mock_server)
            .await;

        let client = CertVerifyClient::new(&mock_server.uri()).unwrap();
        match client.verify_by_id("a.json").await.unwrap_err() {
            ClientError::Service {
                code,
                response_code,
                message,
            } => {
                assert_eq!(code, ErrorCode::ContentFetchError);
                assert_eq!(response_code, ResponseCode::ClientError);
                assert!(message.contains("not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unexpected_status_is_invalid_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&mock_server)
            .await;

        let client = CertVerifyClient::new(&mock_server.uri()).unwrap();
        let err = client.verify_by_id("a.json").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_client_with_auth() {
        let auth_token = "Bearer test_token";
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Authorization", auth_token))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(true, &[])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = CertVerifyClient::new_with_auth(&mock_server.uri(), auth_token).unwrap();
        assert!(client.verify_by_id("a.json").await.is_ok());
    }

    #[test]
    fn rejects_bad_urls() {
        assert!(matches!(
            CertVerifyClient::new("not a url"),
            Err(ClientError::UrlParseError(_))
        ));
    }

    #[tokio::test]
    async fn end_to_end_against_running_server() {
        let enc_service = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(false)))
            .mount(&enc_service)
            .await;

        let root = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("e-credentials")).unwrap();
        std::fs::write(
            root.path().join("e-credentials/hosted.json"),
            json!({
                "verification": { "type": ["hosted"] },
                "expires": "2001-01-01T00:00:00Z"
            })
            .to_string(),
        )
        .unwrap();

        let server = Config::try_parse_from(vec![
            "program",
            "--listen-addr",
            "127.0.0.1:0",
            "--enc-service-url",
            &enc_service.uri(),
            "--store-provider",
            "local",
            "--store-root",
            root.path().to_str().unwrap(),
            "--scratch-dir",
            scratch.path().to_str().unwrap(),
        ])
        .unwrap()
        .build()
        .await
        .unwrap();
        let listen_addr = server.listener.local_addr().unwrap();

        let cancel_token = CancellationToken::new();
        let task_handle = tokio::spawn(server.run(cancel_token.clone()));

        let client = CertVerifyClient::new(&format!("http://{listen_addr}")).unwrap();

        let response = client
            .verify(
                CertificateRef::Id("e-credentials/hosted.json".to_string()),
                Some("e2e"),
            )
            .await
            .unwrap();
        assert_eq!(response.params.msgid, "e2e");
        assert_eq!(
            response.verdict().messages(),
            ["ERROR: Assertion.expires - certificate has expired"]
        );

        let mut signed = Map::new();
        signed.insert(
            "verification".to_string(),
            json!({ "type": ["signed-badge"], "creator": "https://x/keys/5_publicKey.json" }),
        );
        signed.insert("signature".to_string(), json!({ "signatureValue": "c2ln" }));
        let response = client.verify_inline(signed).await.unwrap();
        assert_eq!(
            response.verdict().messages(),
            ["ERROR: Assertion.signature - certificate is not valid, signature verification failed"]
        );

        match client.verify_by_id("missing.json").await.unwrap_err() {
            ClientError::Service { code, .. } => assert_eq!(code, ErrorCode::ContentFetchError),
            other => panic!("unexpected error: {other:?}"),
        }

        cancel_token.cancel();
        task_handle.await.unwrap().unwrap();
    }
}
