use std::path::Path;

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chatkeep_common::Attachment;

/// Image types both wire formats accept inline.
fn media_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

pub async fn load_attachment(path: &Path) -> Result<Attachment> {
    let Some(media_type) = media_type_for(path) else {
        bail!("unsupported attachment type: {}", path.display());
    };
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Attachment {
        media_type: media_type.to_string(),
        data: STANDARD.encode(bytes),
    })
}
