use crate::config::ScraperConfig;
use crate::fetch::Fetcher;
use crate::log::EventLog;
use crate::throttle::Throttle;
use crate::urls::path_basename;
use crate::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

const CHUNK_BYTES: usize = 8 * 1024;
pub const DISPLAY_PREFIX: &str = "downloads";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadedImage {
    pub image_url: String,
    /// `downloads/{file_name}`, relative to the presentation root.
    pub display_path: String,
    pub saved_path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DownloadStatus {
    Downloaded,
    Failed,
    SkippedNoName,
}

fn status_as_str(value: DownloadStatus) -> &'static str {
    match value {
        DownloadStatus::Downloaded => "downloaded",
        DownloadStatus::Failed => "failed",
        DownloadStatus::SkippedNoName => "skipped_no_name",
    }
}

/// Downloads `references` into `output_dir` in order.
///
/// References without a usable file name, or whose fetch or local write
/// fails, are logged and left out of the result. A file named like an earlier
/// one overwrites it. Only failing to create `output_dir` or the manifest
/// aborts the batch.
pub fn download_images(
    fetcher: &dyn Fetcher,
    references: &[String],
    output_dir: &Path,
    manifest_path: &Path,
    config: &ScraperConfig,
    throttle: &Throttle,
    log: &EventLog,
) -> Result<Vec<DownloadedImage>> {
    std::fs::create_dir_all(output_dir)?;
    let mut manifest = csv::Writer::from_path(manifest_path)?;
    manifest.write_record(["image_url", "status", "display_path", "bytes", "sha256"])?;

    let mut saved: Vec<DownloadedImage> = Vec::new();
    for image_url in references {
        let _slot = throttle.wait();

        let file_name = match path_basename(image_url) {
            Some(name) if !name.is_empty() => name,
            _ => {
                log.warn(
                    "download_skipped_no_name",
                    serde_json::json!({ "url": image_url }),
                );
                manifest.write_record([
                    image_url.as_str(),
                    status_as_str(DownloadStatus::SkippedNoName),
                    "",
                    "",
                    "",
                ])?;
                continue;
            }
        };

        match download_one(fetcher, image_url, &file_name, output_dir, config, log) {
            Some(image) => {
                log.info(
                    "download_saved",
                    serde_json::json!({
                        "url": image_url,
                        "file": file_name,
                        "bytes": image.bytes,
                    }),
                );
                manifest.write_record([
                    image_url.as_str(),
                    status_as_str(DownloadStatus::Downloaded),
                    image.display_path.as_str(),
                    image.bytes.to_string().as_str(),
                    image.sha256.as_str(),
                ])?;
                saved.push(image);
            }
            None => {
                manifest.write_record([
                    image_url.as_str(),
                    status_as_str(DownloadStatus::Failed),
                    "",
                    "",
                    "",
                ])?;
            }
        }
    }

    manifest.flush()?;
    Ok(saved)
}

/// `None` when the fetch or the local write fails; the failure is logged and
/// no partial file is left behind.
fn download_one(
    fetcher: &dyn Fetcher,
    image_url: &str,
    file_name: &str,
    output_dir: &Path,
    config: &ScraperConfig,
    log: &EventLog,
) -> Option<DownloadedImage> {
    let body = match fetcher.open(image_url, config.image_timeout()) {
        Ok(body) => body,
        Err(err) => {
            log.warn(
                "download_failed",
                serde_json::json!({ "url": image_url, "error": err.to_string() }),
            );
            return None;
        }
    };

    let out_path = output_dir.join(file_name);
    match write_body(body, &out_path) {
        Ok((bytes, sha256)) => Some(DownloadedImage {
            image_url: image_url.to_string(),
            display_path: format!("{DISPLAY_PREFIX}/{file_name}"),
            saved_path: out_path,
            bytes,
            sha256,
        }),
        Err(err) => {
            let _ = std::fs::remove_file(&out_path);
            log.warn(
                "download_failed",
                serde_json::json!({
                    "url": image_url,
                    "file": file_name,
                    "error": err.to_string(),
                }),
            );
            None
        }
    }
}

/// Streams `body` into `out_path`, returning the byte count and hex SHA-256.
fn write_body(mut body: Box<dyn Read + Send>, out_path: &Path) -> std::io::Result<(u64, String)> {
    let mut file = std::fs::File::create(out_path)?;
    let mut hasher = Sha256::new();
    let mut bytes = 0_u64;
    let mut buf = vec![0_u8; CHUNK_BYTES];
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        file.write_all(&buf[..n])?;
        hasher.update(&buf[..n]);
        bytes += n as u64;
    }
    file.flush()?;
    Ok((bytes, hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::fake::FakeFetcher;
    use std::time::{Duration, Instant};

    fn run(
        fetcher: &FakeFetcher,
        references: &[&str],
        dir: &Path,
    ) -> Result<Vec<DownloadedImage>> {
        let references: Vec<String> = references.iter().map(|s| s.to_string()).collect();
        download_images(
            fetcher,
            &references,
            &dir.join("downloads"),
            &dir.join("manifest.csv"),
            &ScraperConfig::default(),
            &Throttle::disabled(),
            &EventLog::discard(),
        )
    }

    #[test]
    fn preserves_order_and_omits_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = FakeFetcher::new()
            .bytes("https://cdn.example.com/b.jpg", b"bbbb")
            .bytes("https://cdn.example.com/a.jpg", b"aa")
            .status("https://cdn.example.com/missing.jpg", 404)
            .bytes("https://cdn.example.com/dir/", b"index");
        let out = run(
            &fetcher,
            &[
                "https://cdn.example.com/b.jpg",
                "https://cdn.example.com/missing.jpg",
                "https://cdn.example.com/dir/",
                "https://cdn.example.com/a.jpg",
            ],
            dir.path(),
        )
        .expect("download");

        let display: Vec<&str> = out.iter().map(|d| d.display_path.as_str()).collect();
        assert_eq!(display, vec!["downloads/b.jpg", "downloads/a.jpg"]);
        assert_eq!(
            std::fs::read(dir.path().join("downloads").join("b.jpg")).expect("read"),
            b"bbbb"
        );
        assert_eq!(out[0].bytes, 4);
        assert_eq!(out[0].sha256, hex::encode(Sha256::digest(b"bbbb")));
        // The empty-basename reference is never fetched.
        assert!(!fetcher
            .calls
            .borrow()
            .iter()
            .any(|c| c.ends_with("/dir/")));
    }

    #[test]
    fn later_reference_with_same_name_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = FakeFetcher::new()
            .bytes("https://one.example.com/x/photo.jpg", b"first")
            .bytes("https://two.example.com/y/photo.jpg", b"second");
        let out = run(
            &fetcher,
            &[
                "https://one.example.com/x/photo.jpg",
                "https://two.example.com/y/photo.jpg",
            ],
            dir.path(),
        )
        .expect("download");
        assert_eq!(out.len(), 2);
        assert_eq!(
            std::fs::read(dir.path().join("downloads").join("photo.jpg")).expect("read"),
            b"second"
        );
    }

    #[test]
    fn broken_stream_removes_partial_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = FakeFetcher::new().broken("https://cdn.example.com/cut.jpg", b"partial");
        let out = run(&fetcher, &["https://cdn.example.com/cut.jpg"], dir.path()).expect("download");
        assert!(out.is_empty());
        assert!(!dir.path().join("downloads").join("cut.jpg").exists());
    }

    #[test]
    fn manifest_records_every_attempt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = FakeFetcher::new().bytes("https://cdn.example.com/ok.png", b"png");
        run(
            &fetcher,
            &[
                "https://cdn.example.com/ok.png",
                "https://cdn.example.com/",
                "https://cdn.example.com/gone.png",
            ],
            dir.path(),
        )
        .expect("download");

        let mut reader = csv::Reader::from_path(dir.path().join("manifest.csv")).expect("csv");
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.expect("row")).collect();
        let statuses: Vec<&str> = rows.iter().map(|r| &r[1]).collect();
        assert_eq!(statuses, vec!["downloaded", "skipped_no_name", "failed"]);
        assert_eq!(&rows[0][2], "downloads/ok.png");
        assert_eq!(&rows[0][3], "3");
    }

    #[test]
    fn unwritable_file_name_skips_only_that_reference() {
        let dir = tempfile::tempdir().expect("tempdir");
        let long_url = format!("https://cdn.example.com/{}.jpg", "a".repeat(300));
        let fetcher = FakeFetcher::new()
            .bytes("https://cdn.example.com/ok.jpg", b"ok")
            .bytes(&long_url, b"too long")
            .bytes("https://cdn.example.com/after.jpg", b"after");
        let out = run(
            &fetcher,
            &[
                "https://cdn.example.com/ok.jpg",
                long_url.as_str(),
                "https://cdn.example.com/after.jpg",
            ],
            dir.path(),
        )
        .expect("download");

        let display: Vec<&str> = out.iter().map(|d| d.display_path.as_str()).collect();
        assert_eq!(display, vec!["downloads/ok.jpg", "downloads/after.jpg"]);
        let mut reader = csv::Reader::from_path(dir.path().join("manifest.csv")).expect("csv");
        let statuses: Vec<String> = reader
            .records()
            .map(|r| r.expect("row")[1].to_string())
            .collect();
        assert_eq!(statuses, vec!["downloaded", "failed", "downloaded"]);
    }

    #[test]
    fn each_download_waits_after_the_previous_finishes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = FakeFetcher::new()
            .bytes("https://cdn.example.com/slow.jpg", b"slow")
            .slow("https://cdn.example.com/slow.jpg", Duration::from_millis(150))
            .bytes("https://cdn.example.com/next.jpg", b"next");
        let references = vec![
            "https://cdn.example.com/slow.jpg".to_string(),
            "https://cdn.example.com/next.jpg".to_string(),
        ];
        let started = Instant::now();
        let out = download_images(
            &fetcher,
            &references,
            &dir.path().join("downloads"),
            &dir.path().join("manifest.csv"),
            &ScraperConfig::default(),
            &Throttle::new(Duration::from_millis(100)),
            &EventLog::discard(),
        )
        .expect("download");
        assert_eq!(out.len(), 2);
        assert!(
            started.elapsed() >= Duration::from_millis(240),
            "elapsed={:?}",
            started.elapsed()
        );
    }

    #[test]
    fn unwritable_output_dir_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("downloads");
        std::fs::write(&blocker, b"not a directory").expect("write");
        let fetcher = FakeFetcher::new().bytes("https://cdn.example.com/a.jpg", b"a");
        let err = run(&fetcher, &["https://cdn.example.com/a.jpg"], dir.path());
        assert!(matches!(err, Err(crate::ScrapeError::Io(_))), "err={err:?}");
    }
}
