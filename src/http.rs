//! HTTP client construction shared by the relay implementations.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};

use crate::client::ClientError;
use crate::options::TransportOptions;

/// Build a configured HTTP client from transport options.
///
/// Applies the connect timeout and proxy. The idle timeout is enforced per
/// request, see [`send_with_timeout`] and [`crate::sse::sse_data`].
pub fn build_http_client(transport_options: &TransportOptions) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    if let Some(timeout) = transport_options.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }

    if let Some(proxy_url) = &transport_options.http.proxy {
        match reqwest::Proxy::all(proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => tracing::warn!(proxy = %proxy_url, error = %e, "ignoring invalid proxy url"),
        }
    }

    builder.build()
}

/// Send `request` and wait at most `timeout` for the response headers.
///
/// The body is not read here; streaming reads carry their own bound.
pub async fn send_with_timeout(
    request: RequestBuilder,
    timeout: Option<Duration>,
) -> Result<Response, ClientError> {
    let pending = request.send();
    match timeout {
        Some(limit) => tokio::time::timeout(limit, pending)
            .await
            .map_err(|_| ClientError::IdleTimeout(limit))?
            .map_err(ClientError::from),
        None => Ok(pending.await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::HttpTransport;
    use tokio::net::TcpListener;

    #[test]
    fn test_build_http_client() {
        let transport_options = TransportOptions::new(HttpTransport::new("test"))
            .with_connect_timeout(Duration::from_secs(10));

        let client = build_http_client(&transport_options);
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let transport_options = TransportOptions::new(
            HttpTransport::new("test").with_proxy("http://proxy.example.com:8080".to_string()),
        );

        let client = build_http_client(&transport_options);
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn silent_server_hits_the_header_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _holder = tokio::spawn(async move {
            let mut accepted = Vec::new();
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    accepted.push(socket);
                }
            }
        });

        let request = Client::new().get(format!("http://{addr}/"));
        let result = tokio::time::timeout(
            Duration::from_secs(3),
            send_with_timeout(request, Some(Duration::from_millis(200))),
        )
        .await
        .expect("header wait must be bounded");

        assert!(matches!(result, Err(ClientError::IdleTimeout(_))));
    }
}
