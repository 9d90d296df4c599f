//! Command implementations
//!
//! Each command takes an already-built [`Client`] and prints its result on
//! stdout. Errors are returned to `main` with context attached.

use crate::s3::{Client, ObjectInfo};
use anyhow::{Context, Result};
use futures::StreamExt;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// List command
pub async fn cmd_ls(client: &Client, scope: &str, filter: &str) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::with_capacity(64 * 1024, stdout.lock());

    let mut objects = client.list_objects(scope, filter);
    let mut total = 0usize;
    let mut total_size = 0u64;

    while let Some(object) = objects.next().await {
        let object = object.with_context(|| format!("Failed to list scope '{}'", scope))?;
        writeln!(out, "{}", format_entry(&object))?;
        total += 1;
        total_size += object.size;
    }

    out.flush()?;
    tracing::debug!("Listed {} objects ({})", total, format_bytes(total_size));

    Ok(())
}

/// Download command
pub async fn cmd_get(client: &Client, scope: &str, key: &str, output: Option<&Path>) -> Result<()> {
    let mut reader = client
        .get_object(scope, key)
        .await
        .with_context(|| format!("Failed to get '{}' from scope '{}'", key, scope))?;

    let written = match output {
        Some(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let written = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            eprintln!("Downloaded: {} -> {} ({})", key, path.display(), format_bytes(written));
            written
        }
        None => {
            let mut stdout = tokio::io::stdout();
            let written = tokio::io::copy(&mut reader, &mut stdout).await?;
            stdout.flush().await?;
            written
        }
    };

    tracing::debug!("Read {} bytes of '{}'", written, key);
    Ok(())
}

/// Upload command
pub async fn cmd_put(
    client: &Client,
    scope: &str,
    key: &str,
    file: &Path,
    content_type: Option<&str>,
) -> Result<()> {
    let source = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let size = source
        .metadata()
        .await
        .with_context(|| format!("Failed to stat {}", file.display()))?
        .len();

    let info = client
        .put_object(scope, key, source, size, content_type)
        .await
        .with_context(|| format!("Failed to put '{}' into scope '{}'", key, scope))?;

    println!(
        "Uploaded: {} -> {}/{} ({})",
        file.display(),
        info.bucket,
        info.key,
        format_bytes(info.size)
    );
    if let Some(etag) = &info.etag {
        tracing::debug!("ETag: {}", etag);
    }

    Ok(())
}

/// Remove command
pub async fn cmd_rm(client: &Client, scope: &str, key: &str) -> Result<()> {
    client
        .delete_object(scope, key)
        .await
        .with_context(|| format!("Failed to remove '{}' from scope '{}'", key, scope))?;

    println!("Removed: {}", key);
    Ok(())
}

/// Presign command
pub async fn cmd_presign(client: &Client, scope: &str, key: &str, expires: u64) -> Result<()> {
    let url = client
        .presigned_get_object(scope, key, Duration::from_secs(expires))
        .await
        .with_context(|| format!("Failed to presign '{}' in scope '{}'", key, scope))?;

    println!("{}", url);
    Ok(())
}

/// Make bucket command
pub async fn cmd_mb(client: &Client, name: &str) -> Result<()> {
    client
        .make_bucket(name)
        .await
        .with_context(|| format!("Failed to create bucket '{}'", name))?;

    println!("Bucket created: {}", client.namespace().bucket_name(name));
    Ok(())
}

/// Remove bucket command
pub async fn cmd_rb(client: &Client, name: &str) -> Result<()> {
    client
        .remove_bucket(name)
        .await
        .with_context(|| format!("Failed to remove bucket '{}'", name))?;

    println!("Bucket deleted: {}", client.namespace().bucket_name(name));
    Ok(())
}

/// One `ls` line: timestamp, size, key
fn format_entry(object: &ObjectInfo) -> String {
    format!(
        "[{}] {:>10} {}",
        object.last_modified.as_deref().unwrap_or("unknown"),
        format_bytes(object.size),
        object.key
    )
}

/// Format a byte count with binary units (0B, 1.0KiB, 10MiB)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes < 1024 {
        return format!("{}B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if value < 10.0 {
        format!("{:.1}{}", value, UNITS[unit])
    } else {
        format!("{:.0}{}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(1023), "1023B");
        assert_eq!(format_bytes(1024), "1.0KiB");
        assert_eq!(format_bytes(1536), "1.5KiB");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10MiB");
    }

    #[test]
    fn test_format_entry() {
        let object = ObjectInfo::new("logs/a.txt".to_string(), 2048);
        assert_eq!(format_entry(&object), "[unknown]     2.0KiB logs/a.txt");
    }
}
