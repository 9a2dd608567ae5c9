//! Local Tesseract OCR provider (shells out to the `tesseract` CLI).

use super::{fetch_image, OcrInput, OcrProvider, OcrResult};
use crate::config::OcrConfig;
use anyhow::Context;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub struct TesseractProvider {
    command: String,
    lang: String,
    oem: Option<u8>,
    psm: Option<u8>,
    client: reqwest::Client,
}

impl TesseractProvider {
    pub fn new(config: &OcrConfig, client: reqwest::Client) -> Self {
        Self {
            command: config.tesseract_cmd.clone(),
            lang: config.lang.clone(),
            oem: config.oem,
            psm: config.psm,
            client,
        }
    }

    /// Image on stdin, text on stdout.
    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.lang.clone(),
        ];
        if let Some(oem) = self.oem {
            args.push("--oem".to_string());
            args.push(oem.to_string());
        }
        if let Some(psm) = self.psm {
            args.push("--psm".to_string());
            args.push(psm.to_string());
        }
        args
    }
}

#[async_trait::async_trait]
impl OcrProvider for TesseractProvider {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn process(&self, input: &OcrInput) -> anyhow::Result<OcrResult> {
        let data = match input {
            OcrInput::Bytes { data, .. } => data.clone(),
            OcrInput::Url { url, .. } => fetch_image(&self.client, url).await?,
        };

        let args = self.args();
        debug!("Running {} {}", self.command, args.join(" "));

        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.command))?;

        let mut stdin = child.stdin.take().context("tesseract stdin unavailable")?;
        // Feed stdin concurrently so a full stdout pipe can't deadlock us.
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&data).await;
            drop(stdin);
            result
        });

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for tesseract")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("tesseract exited with {}: {}", output.status, stderr.trim());
        }
        writer
            .await
            .context("tesseract stdin writer panicked")?
            .context("Failed to write image to tesseract")?;

        Ok(OcrResult {
            text: String::from_utf8_lossy(&output.stdout).into_owned(),
            provider_name: "tesseract".to_string(),
        })
    }
}
