//! HTTP client that never follows redirects on its own.

use crate::request::{MultipartField, RequestBody};
use crate::{CookieJar, HttpError, HttpExchange, HttpRequest, HttpResult};
use reqwest::header::COOKIE;
use reqwest::multipart::{Form, Part};
use reqwest::redirect::Policy;
use tracing::{debug, trace};

/// Default cap on redirect hops in one chain.
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// Issues one HTTP call per request and keeps cookies in a caller-owned
/// [`CookieJar`].
#[derive(Debug, Clone)]
pub struct CookieHttpClient {
    client: reqwest::Client,
    max_redirects: usize,
}

impl CookieHttpClient {
    pub fn new() -> HttpResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .user_agent(concat!("template-library-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(HttpError::Client)?;

        Ok(Self {
            client,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        })
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Send one request.
    ///
    /// Cookies from `jar` that apply to the URL are attached. Responses in
    /// [200, 399] have their cookies merged into `jar`; [400, 599] become
    /// [`HttpError::Status`].
    pub async fn do_request(
        &self,
        request: &HttpRequest,
        jar: &mut CookieJar,
    ) -> HttpResult<HttpExchange> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        if let Some(cookies) = jar.header_for(&request.url) {
            builder = builder.header(COOKIE, cookies);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match &request.body {
            Some(RequestBody::Form(fields)) => builder.form(fields),
            Some(RequestBody::Json(body)) => builder.json(body),
            Some(RequestBody::Multipart(fields)) => builder.multipart(multipart_form(fields)),
            None => builder,
        };

        debug!(method = %request.method, url = %request.url, "HTTP request");

        let response = builder
            .send()
            .await
            .map_err(|e| HttpError::transport(&request.url, e))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError::transport(&request.url, e))?;

        let exchange = HttpExchange {
            method: request.method.clone(),
            url: request.url.clone(),
            status,
            headers,
            body,
        };

        debug!(
            method = %exchange.method,
            url = %exchange.url,
            status,
            body_len = exchange.body.len(),
            "HTTP response"
        );

        if (400..=599).contains(&status) {
            return Err(HttpError::Status(Box::new(exchange)));
        }

        jar.merge_response(&exchange.url, &exchange.headers);
        Ok(exchange)
    }

    /// Send `request` and follow 3xx responses until a final answer.
    ///
    /// 302 and 303 continue with a bodiless GET, other redirects repeat the
    /// method and body. Cookies set along the way are merged into `jar` and
    /// sent on later hops.
    pub async fn do_request_follow_redirects(
        &self,
        request: HttpRequest,
        jar: &mut CookieJar,
    ) -> HttpResult<HttpExchange> {
        let start = request.url.to_string();
        let mut request = request;
        let mut hops = 0;

        loop {
            let exchange = self.do_request(&request, jar).await?;
            if !exchange.is_redirect() {
                trace!(hops, url = %exchange.url, "Redirect chain finished");
                return Ok(exchange);
            }

            if hops >= self.max_redirects {
                return Err(HttpError::TooManyRedirects {
                    url: start,
                    limit: self.max_redirects,
                });
            }
            hops += 1;

            let next = exchange
                .location()
                .ok_or_else(|| HttpError::MissingLocation {
                    url: exchange.url.to_string(),
                })?;

            debug!(
                status = exchange.status,
                from = %exchange.url,
                to = %next,
                hop = hops,
                "Following redirect"
            );
            request = request.redirected(next, exchange.status);
        }
    }
}

fn multipart_form(fields: &[MultipartField]) -> Form {
    fields.iter().fold(Form::new(), |form, field| match field {
        MultipartField::Text { name, value } => form.text(name.clone(), value.clone()),
        MultipartField::File {
            name,
            file_name,
            contents,
        } => form.part(
            name.clone(),
            Part::bytes(contents.to_vec()).file_name(file_name.clone()),
        ),
    })
}
