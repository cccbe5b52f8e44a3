//! Best-effort HTTP header grab used by the classifier's `Server` heuristic.

use std::time::Duration;

use phantom_core::Port;
use phantom_intel::HttpHeaders;
use reqwest::Client;

/// Fetches response headers from a device's web interface.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Option<Client>,
}

impl HttpProbe {
    /// Build a probe with a hard per-request timeout. Certificate errors
    /// are ignored since LAN devices almost never carry valid certs.
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build();

        match client {
            Ok(client) => Self {
                client: Some(client),
            },
            Err(e) => {
                tracing::warn!(error = %e, "HTTP client unavailable, header probing disabled");
                Self { client: None }
            }
        }
    }

    /// Headers from `ip`'s web root, or `None` on any failure.
    ///
    /// Plain HTTP is tried first; HTTPS only when 80 is closed and 443 is open.
    pub async fn fetch_headers(&self, ip: &str, open_ports: &[Port]) -> Option<HttpHeaders> {
        let client = self.client.as_ref()?;
        let url = probe_url(ip, open_ports)?;

        match client.get(&url).send().await {
            Ok(resp) => {
                let headers: HttpHeaders = resp
                    .headers()
                    .iter()
                    .filter_map(|(name, value)| {
                        value
                            .to_str()
                            .ok()
                            .map(|v| (name.as_str().to_string(), v.to_string()))
                    })
                    .collect();
                tracing::debug!(ip = %ip, url = %url, count = headers.len(), "HTTP headers fetched");
                Some(headers)
            }
            Err(e) => {
                tracing::debug!(ip = %ip, url = %url, error = %e, "HTTP probe failed");
                None
            }
        }
    }
}

fn probe_url(ip: &str, open_ports: &[Port]) -> Option<String> {
    if open_ports.contains(&80) {
        Some(format!("http://{ip}/"))
    } else if open_ports.contains(&443) {
        Some(format!("https://{ip}/"))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_url_prefers_plain_http() {
        assert_eq!(probe_url("10.0.0.1", &[443, 80]).as_deref(), Some("http://10.0.0.1/"));
        assert_eq!(probe_url("10.0.0.1", &[22, 443]).as_deref(), Some("https://10.0.0.1/"));
        assert_eq!(probe_url("10.0.0.1", &[22, 8080]), None);
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_none() {
        let probe = HttpProbe::new(Duration::from_millis(200));
        // Nothing listens on the discard port.
        assert!(probe.fetch_headers("127.0.0.1:9", &[80]).await.is_none());
    }
}
