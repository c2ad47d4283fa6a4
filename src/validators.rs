use url::Url;

use crate::error::{ErrorMessage, HttpError};

/// Check a lesson video link against the allowed hosts
///
/// Links are often pasted without a scheme (`youtube.com/watch/...`), so a
/// value that does not parse as an absolute URL is retried with `https://`.
/// Subdomains of an allowed host pass as well (`www.youtube.com`).
pub fn validate_video_host(video: &str, allowed_hosts: &[String]) -> Result<(), HttpError> {
    let rejected =
        || HttpError::bad_request(ErrorMessage::VideoHostNotAllowed(allowed_hosts.join(", ")).to_string());

    let video = video.trim();
    let parsed = match Url::parse(video) {
        Ok(url) if url.has_host() => url,
        _ => Url::parse(&format!("https://{}", video)).map_err(|_| rejected())?,
    };

    let host = parsed.host_str().ok_or_else(rejected)?.to_lowercase();

    let allowed = allowed_hosts
        .iter()
        .any(|allowed| host == *allowed || host.ends_with(&format!(".{}", allowed)));

    if allowed { Ok(()) } else { Err(rejected()) }
}
