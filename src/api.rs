// API client module: a small blocking HTTP client for the Feishu/Lark open
// platform. It owns the reqwest client (with its timeouts) and the base URL,
// and performs the multipart image upload. Token acquisition lives in
// `token`, input resolution in `source`.

use crate::error::{Error, Result};
use crate::source::ByteBuffer;
use crate::token::AccessToken;
use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://open.feishu.cn";
pub const UPLOAD_ENDPOINT: &str = "/open-apis/im/v1/images";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Holds a reqwest blocking client and the base URL of the open platform.
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

/// Server-side storage policy for the uploaded image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImageKind {
    #[default]
    Message,
    Avatar,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Message => "message",
            ImageKind::Avatar => "avatar",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "message" => Ok(ImageKind::Message),
            "avatar" => Ok(ImageKind::Avatar),
            other => Err(format!("unknown image type '{}' (expected message or avatar)", other)),
        }
    }
}

#[derive(Debug)]
pub struct UploadRequest {
    pub image: ByteBuffer,
    pub kind: ImageKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub image_key: String,
}

#[derive(Deserialize, Debug)]
struct UploadResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<UploadData>,
}

#[derive(Deserialize, Debug)]
struct UploadData {
    image_key: Option<String>,
}

impl ApiClient {
    /// Build a client for `base_url`. Every request made through it is bound
    /// by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| Error::transport("Failed to build HTTP client", e))?;
        Ok(ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self, token: &AccessToken) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let val = HeaderValue::from_str(&format!("Bearer {}", token.value()))
            .map_err(|_| Error::Decode("Access token is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, val);
        Ok(headers)
    }

    /// Upload the image with a single multipart POST. The token is passed in
    /// explicitly; a rejected or stale token surfaces as an error and is
    /// never refreshed here.
    pub fn upload(&self, token: &AccessToken, req: UploadRequest) -> Result<UploadResult> {
        let url = self.url(UPLOAD_ENDPOINT);
        let size = req.image.len();
        let file_name = req.image.file_name().unwrap_or("image").to_string();

        let part = multipart::Part::bytes(req.image.into_bytes()).file_name(file_name);
        let form = multipart::Form::new()
            .part("image", part)
            .text("image_type", req.kind.as_str());

        debug!(%url, size, kind = %req.kind, "uploading image");
        let res = self
            .client
            .post(&url)
            .headers(self.auth_headers(token)?)
            .multipart(form)
            .send()
            .map_err(|e| Error::transport("Failed to send upload request", e))?;

        let body: UploadResponse = read_json(res, "upload")?;
        if body.code != 0 {
            return Err(Error::Upload {
                code: body.code,
                msg: body.msg,
            });
        }
        let image_key = body
            .data
            .and_then(|d| d.image_key)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Decode("Upload response is missing data.image_key".into()))?;

        info!(%image_key, "image uploaded");
        Ok(UploadResult { image_key })
    }
}

/// Read a JSON body regardless of the HTTP status: the open platform reports
/// business failures as JSON with a non-zero `code`, often alongside a 4xx.
/// A body that is not JSON is a decode error, unless the status already
/// says the request failed, in which case the status is the better message.
pub(crate) fn read_json<T: DeserializeOwned>(res: Response, what: &str) -> Result<T> {
    let status = res.status();
    let text = res
        .text()
        .map_err(|e| Error::transport(format!("Failed to read {} response", what), e))?;
    match serde_json::from_str(&text) {
        Ok(parsed) => Ok(parsed),
        Err(_) if !status.is_success() => {
            Err(Error::http_status(format!("{} request failed", what), status))
        }
        Err(e) => Err(Error::Decode(format!("Malformed {} response JSON: {}", what, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::Server) -> ApiClient {
        ApiClient::new(&server.url(), Duration::from_secs(5)).unwrap()
    }

    fn request(bytes: &[u8], kind: ImageKind) -> UploadRequest {
        UploadRequest {
            image: ByteBuffer::new(bytes.to_vec()),
            kind,
        }
    }

    #[test]
    fn upload_returns_image_key_on_success() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", UPLOAD_ENDPOINT)
            .match_header("authorization", "Bearer t-abc")
            .match_header("content-type", Matcher::Regex("multipart/form-data".into()))
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="image_type""#.into()),
                Matcher::Regex("avatar".into()),
                Matcher::Regex(r#"name="image""#.into()),
                Matcher::Regex("PNGDATA".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"code":0,"msg":"ok","data":{"image_key":"img_abc123"}}"#)
            .expect(1)
            .create();

        let api = client_for(&server);
        let token = AccessToken::new("t-abc");
        let result = api.upload(&token, request(b"PNGDATA", ImageKind::Avatar)).unwrap();

        assert_eq!(
            result,
            UploadResult {
                image_key: "img_abc123".into()
            }
        );
        mock.assert();
    }

    #[test]
    fn non_zero_code_is_an_upload_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", UPLOAD_ENDPOINT)
            .with_status(400)
            .with_body(r#"{"code":234006,"msg":"The image size exceeds the limit."}"#)
            .create();

        let err = client_for(&server)
            .upload(&AccessToken::new("t"), request(b"x", ImageKind::Message))
            .unwrap_err();
        match err {
            Error::Upload { code, msg } => {
                assert_eq!(code, 234006);
                assert_eq!(msg, "The image size exceeds the limit.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn stale_token_is_reported_not_refreshed() {
        let mut server = mockito::Server::new();
        let upload = server
            .mock("POST", UPLOAD_ENDPOINT)
            .with_status(401)
            .with_body(r#"{"code":99991663,"msg":"Invalid access token for authorization."}"#)
            .expect(1)
            .create();
        let auth = server
            .mock("POST", crate::token::AUTH_ENDPOINT)
            .expect(0)
            .create();

        let err = client_for(&server)
            .upload(&AccessToken::new("expired"), request(b"x", ImageKind::Message))
            .unwrap_err();
        assert!(matches!(err, Error::Upload { code: 99991663, .. }));
        upload.assert();
        auth.assert();
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", UPLOAD_ENDPOINT)
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create();

        let err = client_for(&server)
            .upload(&AccessToken::new("t"), request(b"x", ImageKind::Message))
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn non_json_error_status_is_a_transport_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", UPLOAD_ENDPOINT)
            .with_status(502)
            .with_body("Bad Gateway")
            .create();

        let err = client_for(&server)
            .upload(&AccessToken::new("t"), request(b"x", ImageKind::Message))
            .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn success_without_image_key_is_a_decode_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", UPLOAD_ENDPOINT)
            .with_status(200)
            .with_body(r#"{"code":0,"msg":"ok","data":{}}"#)
            .create();

        let err = client_for(&server)
            .upload(&AccessToken::new("t"), request(b"x", ImageKind::Message))
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn connection_refused_is_a_transport_error() {
        // nothing listens on the discard port locally
        let api = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = api
            .upload(&AccessToken::new("t"), request(b"x", ImageKind::Message))
            .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[test]
    fn unanswered_upload_times_out() {
        // the backlog completes the handshake; nobody ever reads or replies
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let api = ApiClient::new(&base_url, Duration::from_secs(1)).unwrap();

        let started = std::time::Instant::now();
        let err = api
            .upload(&AccessToken::new("t"), request(b"x", ImageKind::Message))
            .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }), "unexpected error: {err:?}");
        assert!(started.elapsed() < Duration::from_secs(10));
        drop(listener);
    }

    #[test]
    fn image_kind_parses_and_prints() {
        assert_eq!("avatar".parse::<ImageKind>().unwrap(), ImageKind::Avatar);
        assert_eq!(ImageKind::default().to_string(), "message");
        assert!("banner".parse::<ImageKind>().is_err());
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let api = ApiClient::new("https://open.larksuite.com/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(api.url(UPLOAD_ENDPOINT), "https://open.larksuite.com/open-apis/im/v1/images");
    }
}
