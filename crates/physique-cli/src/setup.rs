//! `physique setup`: downloads the ONNX pose model and pins it to a digest.

use anyhow::{bail, Context, Result};
use physique_models::sha256_file_hex;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Download the model to a `.part` file, verify it, then move it into place.
fn download_model(url: &str, expected_sha256: &str, dest: &Path) -> Result<()> {
    let tmp_path = part_path(dest);

    println!("  downloading {url}...");

    let resp = ureq::get(url)
        .call()
        .with_context(|| format!("failed to download {url}"))?;

    let content_length = resp
        .headers()
        .get("Content-Length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let mut reader = resp.into_body().into_reader();
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut buf = [0u8; 65536];
    let mut total: u64 = 0;
    let mut last_pct: u64 = 0;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        total += n as u64;

        // Print progress every 10%
        if let Some(len) = content_length.filter(|len| *len > 0) {
            let pct = (total * 100) / len;
            if pct / 10 > last_pct / 10 {
                print!("  {pct}%\r");
                io::stdout().flush().ok();
                last_pct = pct;
            }
        }
    }

    file.flush()?;
    drop(file);

    print!("  verifying checksum... ");
    io::stdout().flush().ok();
    install_verified(&tmp_path, expected_sha256, dest)?;
    println!("ok");

    Ok(())
}

/// Move `tmp_path` onto `dest` if its digest matches, else delete it.
fn install_verified(tmp_path: &Path, expected_sha256: &str, dest: &Path) -> Result<()> {
    let digest = sha256_file_hex(tmp_path)?;
    if !digest.eq_ignore_ascii_case(expected_sha256) {
        fs::remove_file(tmp_path).ok();
        bail!(
            "checksum mismatch for {}:\n  expected: {}\n  got:      {}",
            dest.display(),
            expected_sha256,
            digest
        );
    }

    fs::rename(tmp_path, dest).with_context(|| {
        format!(
            "failed to rename {} -> {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    Ok(())
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Whether `dest` already holds the pinned model.
fn already_present(dest: &Path, expected_sha256: &str) -> bool {
    if !dest.exists() {
        return false;
    }
    match sha256_file_hex(dest) {
        Ok(digest) if digest.eq_ignore_ascii_case(expected_sha256) => true,
        Ok(_) => {
            println!("  {} exists but checksum differs, re-downloading", dest.display());
            false
        }
        Err(_) => {
            println!("  {} exists but unreadable, re-downloading", dest.display());
            false
        }
    }
}

/// Run the setup command: download and verify the pose model.
pub fn run(url: &str, sha256: &str, model_dir: Option<PathBuf>, name: &str) -> Result<()> {
    let expected = sha256.trim();
    if expected.len() != 64 || !expected.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("--sha256 must be 64 hex characters, got {expected:?}");
    }

    let dir = model_dir.unwrap_or_else(physique_core::default_model_dir);
    println!("Model directory: {}", dir.display());

    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;

    let dest = dir.join(name);
    if already_present(&dest, expected) {
        println!("  {name} already present (checksum ok)");
        println!("Nothing to download.");
        return Ok(());
    }

    download_model(url, expected, &dest)?;

    println!();
    println!("Setup complete: {name} installed.");
    println!("Set PHYSIQUE_MODEL_SHA256={expected} to have physiqued verify it at startup.");

    Ok(())
}
