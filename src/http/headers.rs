// Default header set applied when the caller supplies none.

use crate::agent::{random_agent, DEFAULT_AGENT};

/// Ordered header list, sent in insertion order.
pub type Headers = Vec<(String, String)>;

/// Resolve the header set for a request.
///
/// A non-empty caller set is used as-is (with its `User-Agent` swapped for a
/// random one when `random_agent` is set). Otherwise the defaults are returned.
pub fn default_headers(headers: Option<Headers>, random_agent_requested: bool) -> Headers {
    match headers {
        Some(mut headers) if !headers.is_empty() => {
            if random_agent_requested {
                for (name, value) in headers.iter_mut() {
                    if name.eq_ignore_ascii_case("user-agent") {
                        *value = random_agent().to_string();
                    }
                }
            }
            headers
        }
        _ => {
            let agent = if random_agent_requested {
                random_agent()
            } else {
                DEFAULT_AGENT
            };
            vec![
                ("Accept".to_string(), "*/*".to_string()),
                ("Accept-Encoding".to_string(), "gzip, deflate".to_string()),
                ("User-Agent".to_string(), agent.to_string()),
            ]
        }
    }
}
