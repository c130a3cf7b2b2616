//! # Listing Detail Lookups
//!
//! Request/response calls for the contact details that the feed does not carry.
//! They have no state and no retries: anything other than a clean 2xx with a
//! usable value is "no result".
//!
//! Wire shape:
//! - `GET {base}/phone/{reference}` → `{"phone": "+43 ..."}`
//! - `GET {base}/contact/{reference}` → `{"name": "...", "address": "..."}`

use serde::Deserialize;

use super::ky_http::ApiClient;

/// Seller name and address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Seller name.
    pub name: String,
    /// Postal address.
    pub address: String,
}

#[derive(Debug, Deserialize)]
struct PhoneReply {
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContactReply {
    name: Option<String>,
    address: Option<String>,
}

/// # Details Client
pub struct DetailsClient {
    api: ApiClient,
}

impl DetailsClient {
    /// Creates a lookup client against `base_url`, without retries.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            api: ApiClient::new(base_url, None, 0)?,
        })
    }

    /// Phone number for the listing `reference`, if the service has one.
    pub async fn phone_number(&self, reference: &str) -> Option<String> {
        let reply: PhoneReply = self.fetch("phone", reference).await?;
        reply.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty())
    }

    /// Seller name and address for the listing `reference`; both must be present.
    pub async fn contact(&self, reference: &str) -> Option<Contact> {
        let reply: ContactReply = self.fetch("contact", reference).await?;
        let name = reply.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())?;
        let address = reply.address.map(|a| a.trim().to_string()).filter(|a| !a.is_empty())?;
        Some(Contact { name, address })
    }

    async fn fetch<T>(&self, kind: &str, reference: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        match self.api.get::<T>(&[kind, reference]).await {
            Ok(resp) if resp.success => resp.data,
            Ok(resp) => {
                log::debug!("{} lookup for {} returned HTTP {}", kind, reference, resp.status);
                None
            }
            Err(e) => {
                log::warn!("{} lookup for {} failed: {:#}", kind, reference, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Minimal HTTP/1.1 responder: one request per connection, routed on the path.
    fn spawn_mock_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
        let port = listener.local_addr().unwrap().port();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&buf);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                let (status, body) = match path.as_str() {
                    "/api/phone/42" => ("200 OK", r#"{"phone":" +43 660 1234567 "}"#),
                    "/api/phone/blank" => ("200 OK", r#"{"phone":""}"#),
                    "/api/phone/garbled" => ("200 OK", "<html>oops</html>"),
                    "/api/contact/42" => ("200 OK", r#"{"name":"Autohaus Berger","address":"Hauptstrasse 1, 8010 Graz"}"#),
                    "/api/contact/half" => ("200 OK", r#"{"name":"Private"}"#),
                    _ => ("404 Not Found", r#"{"error":"not found"}"#),
                };

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        format!("http://127.0.0.1:{}/api/", port)
    }

    #[tokio::test]
    async fn phone_lookup() {
        let client = DetailsClient::new(&spawn_mock_server()).unwrap();

        assert_eq!(client.phone_number("42").await.as_deref(), Some("+43 660 1234567"));
        assert_eq!(client.phone_number("blank").await, None);
        assert_eq!(client.phone_number("garbled").await, None);
        assert_eq!(client.phone_number("unknown").await, None);
    }

    #[tokio::test]
    async fn contact_lookup() {
        let client = DetailsClient::new(&spawn_mock_server()).unwrap();

        assert_eq!(
            client.contact("42").await,
            Some(Contact {
                name: "Autohaus Berger".into(),
                address: "Hauptstrasse 1, 8010 Graz".into(),
            })
        );
        assert_eq!(client.contact("half").await, None);
        assert_eq!(client.contact("missing").await, None);
    }

    #[tokio::test]
    async fn unreachable_service_is_no_result() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = DetailsClient::new(&format!("http://127.0.0.1:{}/", port)).unwrap();
        assert_eq!(client.phone_number("42").await, None);
    }
}
