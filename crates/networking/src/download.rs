//! Theme file downloads

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::client::{HttpRequest, HttpTransport};
use crate::Result;

/// Download `url` and write the body into `to`
///
/// Returns the number of bytes written. Any non-2xx status is an error.
pub async fn download_to<W>(transport: &dyn HttpTransport, url: &str, to: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin + Send,
{
    let response = transport
        .send(HttpRequest::get(url))
        .await?
        .error_for_status()?;

    to.write_all(&response.body).await?;
    to.flush().await?;

    Ok(response.body.len() as u64)
}

/// Turn a theme name into a file-system friendly, title-cased file stem
///
/// `"monokai (dark)_soda"` becomes `"Monokai-Dark-Soda"`.
pub fn theme_file_name(name: &str) -> String {
    let cleaned = name
        .replace(" - ", "-")
        .replace(|c: char| c == '(' || c == ')', "")
        .replace(|c: char| c == '_' || c == ' ', "-");

    let mut out = String::with_capacity(cleaned.len());
    let mut at_word_start = true;
    for ch in cleaned.chars() {
        if at_word_start {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = !ch.is_alphanumeric();
    }
    out
}
