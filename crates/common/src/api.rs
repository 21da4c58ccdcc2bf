//! A small generic REST interface using HTDSA signing.
//!
//! An [`Endpoint`] is a base URL plus path segments. Segments are appended
//! explicitly with [`Endpoint::at`], or passed as extra arguments to the
//! request methods:
//!
//! * `api.at("sso").at("grant").get(&[], &[])` -> `.../sso/grant`
//! * `api.at("account").at("amcgregor").get(&[], &[])` -> `.../account/amcgregor`
//! * `api.at("company").get(&["Google"], &[])` -> `.../company/Google`
//!
//! Query parameters on `GET`, `HEAD` and `DELETE` go into the URL; form
//! fields on `POST`, `PUT` and `PATCH` are sent url-encoded in the body.

use std::sync::Arc;

use error_stack::{Report, ResultExt};
use http::{header, HeaderMap, Method, Request, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::HtdsaError;
use crate::exchange::{SignedClient, Transport};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A successful (`200 OK`) and verified response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Report<HtdsaError>> {
        serde_json::from_slice(&self.body).change_context(HtdsaError::Transport {
            message: "Failed to decode JSON response body".into(),
        })
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn encode_pairs(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// An API endpoint and factory for endpoints beneath it.
pub struct Endpoint<T> {
    base: String,
    segments: Vec<String>,
    client: Arc<SignedClient<T>>,
}

impl<T> Clone for Endpoint<T> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            segments: self.segments.clone(),
            client: Arc::clone(&self.client),
        }
    }
}

impl<T: Transport> Endpoint<T> {
    /// Construct an endpoint rooted at the absolute URL `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base` is not an absolute URL.
    pub fn new(base: &str, client: Arc<SignedClient<T>>) -> Result<Self, Report<HtdsaError>> {
        Url::parse(base).change_context(HtdsaError::Configuration {
            message: format!("Endpoint base must be an absolute URL: {base}"),
        })?;

        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            segments: Vec::new(),
            client,
        })
    }

    /// A new endpoint with `segment` appended to the path.
    #[must_use]
    pub fn at(&self, segment: impl AsRef<str>) -> Self {
        let mut child = self.clone();
        child.segments.push(segment.as_ref().to_string());
        child
    }

    /// The URL of this endpoint with `args` appended as further segments.
    #[must_use]
    pub fn url(&self, args: &[&str]) -> String {
        let mut url = self.base.clone();

        for segment in self.segments.iter().map(String::as_str).chain(args.iter().copied()) {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }

        url
    }

    async fn request(
        &self,
        method: Method,
        url: String,
        body: Option<String>,
    ) -> Result<Option<ApiResponse>, Report<HtdsaError>> {
        let mut builder = Request::builder().method(method).uri(&url);
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, FORM_CONTENT_TYPE);
        }

        let request = builder
            .body(body.map(String::into_bytes).unwrap_or_default())
            .change_context(HtdsaError::Configuration {
                message: format!("Failed to build request for {url}"),
            })?;

        let response = self.client.execute(request).await?;

        if response.status() != StatusCode::OK {
            log::debug!("{} returned {}", url, response.status());
            return Ok(None);
        }

        let (parts, body) = response.into_parts();
        Ok(Some(ApiResponse {
            headers: parts.headers,
            body,
        }))
    }

    async fn query_request(
        &self,
        method: Method,
        args: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Option<ApiResponse>, Report<HtdsaError>> {
        let mut url = self.url(args);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&encode_pairs(query));
        }

        self.request(method, url, None).await
    }

    async fn form_request(
        &self,
        method: Method,
        args: &[&str],
        form: &[(&str, &str)],
    ) -> Result<Option<ApiResponse>, Report<HtdsaError>> {
        let body = (!form.is_empty()).then(|| encode_pairs(form));
        self.request(method, self.url(args), body).await
    }

    /// # Errors
    ///
    /// Returns a transport or verification error.
    pub async fn get(
        &self,
        args: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Option<ApiResponse>, Report<HtdsaError>> {
        self.query_request(Method::GET, args, query).await
    }

    /// # Errors
    ///
    /// Returns a transport or verification error.
    pub async fn head(
        &self,
        args: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Option<ApiResponse>, Report<HtdsaError>> {
        self.query_request(Method::HEAD, args, query).await
    }

    /// # Errors
    ///
    /// Returns a transport or verification error.
    pub async fn delete(
        &self,
        args: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Option<ApiResponse>, Report<HtdsaError>> {
        self.query_request(Method::DELETE, args, query).await
    }

    /// # Errors
    ///
    /// Returns a transport or verification error.
    pub async fn post(
        &self,
        args: &[&str],
        form: &[(&str, &str)],
    ) -> Result<Option<ApiResponse>, Report<HtdsaError>> {
        self.form_request(Method::POST, args, form).await
    }

    /// # Errors
    ///
    /// Returns a transport or verification error.
    pub async fn put(
        &self,
        args: &[&str],
        form: &[(&str, &str)],
    ) -> Result<Option<ApiResponse>, Report<HtdsaError>> {
        self.form_request(Method::PUT, args, form).await
    }

    /// # Errors
    ///
    /// Returns a transport or verification error.
    pub async fn patch(
        &self,
        args: &[&str],
        form: &[(&str, &str)],
    ) -> Result<Option<ApiResponse>, Report<HtdsaError>> {
        self.form_request(Method::PATCH, args, form).await
    }

    /// Methods the endpoint allows, from the `Allow` header of an `OPTIONS`
    /// request. `None` when the endpoint does not answer `200 OK`.
    ///
    /// # Errors
    ///
    /// Returns a transport or verification error.
    pub async fn allowed(&self) -> Result<Option<Vec<String>>, Report<HtdsaError>> {
        let Some(response) = self.request(Method::OPTIONS, self.url(&[]), None).await? else {
            return Ok(None);
        };

        let allow = response
            .headers
            .get(header::ALLOW)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        Ok(Some(
            allow
                .split(',')
                .map(str::trim)
                .filter(|method| !method.is_empty())
                .map(str::to_string)
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use async_trait::async_trait;
    use futures::executor::block_on;
    use http::{HeaderValue, Response};
    use serde::Deserialize;

    use super::*;
    use crate::clock::FixedClock;
    use crate::exchange::SignedAuth;
    use crate::request_signing::ResponseSigner;
    use crate::test_support::tests::{client_keypair, fixed_instant, service_keypair};

    /// Answers every request with `200 OK`, echoing method and URL as JSON.
    #[derive(Default)]
    struct EchoService {
        seen: RefCell<Vec<(Method, String, Option<String>, Vec<u8>)>>,
    }

    #[async_trait(?Send)]
    impl Transport for EchoService {
        async fn send(
            &self,
            request: Request<Vec<u8>>,
        ) -> Result<Response<Vec<u8>>, Report<HtdsaError>> {
            let url = request.uri().to_string();
            let method = request.method().clone();
            let content_type = request
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.seen
                .borrow_mut()
                .push((method.clone(), url.clone(), content_type, request.body().clone()));

            let status = if url.ends_with("/missing") {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::OK
            };
            let body = serde_json::json!({ "method": method.as_str(), "url": url })
                .to_string()
                .into_bytes();

            let mut response = Response::builder()
                .status(status)
                .header(header::ALLOW, HeaderValue::from_static("GET, POST ,PUT"))
                .body(body.clone())
                .expect("should build response");

            ResponseSigner::new(service_keypair().signing_key)?
                .sign_at(&fixed_instant(), "svc-42", method.as_str(), &url, &body)
                .apply(response.headers_mut())?;

            Ok(response)
        }
    }

    #[derive(Debug, Deserialize)]
    struct Echo {
        method: String,
        url: String,
    }

    fn api() -> Endpoint<EchoService> {
        let auth = SignedAuth::new(
            "svc-42",
            client_keypair().signing_key,
            service_keypair().verifying_key,
        )
        .expect("should build auth")
        .with_clock(Arc::new(FixedClock(fixed_instant())));

        let client = Arc::new(SignedClient::new(auth, EchoService::default()));
        Endpoint::new("https://api.example.com/v1/", client).expect("should build endpoint")
    }

    #[test]
    fn test_url_building() {
        let api = api();
        assert_eq!(api.url(&[]), "https://api.example.com/v1");
        assert_eq!(
            api.at("sso").at("grant").url(&[]),
            "https://api.example.com/v1/sso/grant"
        );
        assert_eq!(
            api.at("company").url(&["Google"]),
            "https://api.example.com/v1/company/Google"
        );
    }

    #[test]
    fn test_segments_are_encoded() {
        let api = api();
        assert_eq!(
            api.at("account").at("a b/c").url(&[]),
            "https://api.example.com/v1/account/a%20b%2Fc"
        );
    }

    #[test]
    fn test_at_does_not_mutate_parent() {
        let api = api();
        let _child = api.at("account");
        assert_eq!(api.url(&[]), "https://api.example.com/v1");
    }

    #[test]
    fn test_rejects_relative_base() {
        let client = Arc::new(SignedClient::new(
            SignedAuth::new(
                "svc-42",
                client_keypair().signing_key,
                service_keypair().verifying_key,
            )
            .unwrap(),
            EchoService::default(),
        ));

        assert!(Endpoint::new("/v1/widgets", client).is_err());
    }

    #[test]
    fn test_get_with_query() {
        let api = api();
        let response = block_on(api.at("widgets").get(&["42"], &[("fields", "name,size")]))
            .expect("should verify")
            .expect("should be 200");

        let echo: Echo = response.json().expect("should decode");
        assert_eq!(echo.method, "GET");
        assert_eq!(
            echo.url,
            "https://api.example.com/v1/widgets/42?fields=name%2Csize"
        );
    }

    #[test]
    fn test_put_sends_put_with_form_body() {
        let api = api();
        block_on(api.at("widgets").put(&["42"], &[("name", "sprocket & cog")]))
            .expect("should verify")
            .expect("should be 200");

        let seen = api.client.transport_seen();
        let (method, _, content_type, body) = seen.last().expect("should record request");
        assert_eq!(method, &Method::PUT);
        assert_eq!(content_type.as_deref(), Some(FORM_CONTENT_TYPE));
        assert_eq!(body, b"name=sprocket%20%26%20cog");
    }

    #[test]
    fn test_post_and_patch_methods() {
        let api = api();
        let posted = block_on(api.at("widgets").post(&[], &[("name", "cog")]))
            .unwrap()
            .unwrap();
        assert_eq!(posted.json::<Echo>().unwrap().method, "POST");

        let patched = block_on(api.at("widgets").patch(&["7"], &[]))
            .unwrap()
            .unwrap();
        assert_eq!(patched.json::<Echo>().unwrap().method, "PATCH");
    }

    #[test]
    fn test_non_ok_returns_none() {
        let api = api();
        let result = block_on(api.at("missing").delete(&[], &[])).expect("should not error");
        assert!(result.is_none());
    }

    #[test]
    fn test_allowed_methods() {
        let api = api();
        let allowed = block_on(api.at("widgets").allowed())
            .expect("should verify")
            .expect("should be 200");
        assert_eq!(allowed, vec!["GET", "POST", "PUT"]);
    }

    impl SignedClient<EchoService> {
        fn transport_seen(&self) -> Vec<(Method, String, Option<String>, Vec<u8>)> {
            self.transport().seen.borrow().clone()
        }
    }
}
