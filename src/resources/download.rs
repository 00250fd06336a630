//! Remote source acquisition over HTTP(S) and FTP.
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::error::ExecError;
use crate::exec::CancelToken;

const CHUNK_SIZE: usize = 64 * 1024;

/// Network timeouts applied to every download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Time allowed to establish a connection.
    pub connect: Duration,
    /// Time allowed for the whole transfer.
    pub overall: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            overall: Duration::from_secs(600),
        }
    }
}

/// Downloads remote sources into local files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Downloader {
    timeouts: Timeouts,
}

impl Downloader {
    /// Create a downloader with the given timeouts.
    #[must_use]
    pub const fn new(timeouts: Timeouts) -> Self {
        Self { timeouts }
    }

    /// Fetch `url` into `dest`, returning the number of bytes written.
    ///
    /// `dest` is created or truncated. The cancel token is checked between
    /// chunks.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Acquisition`] for unsupported schemes and
    /// network failures, [`ExecError::Cancelled`] if cancelled mid-transfer.
    pub fn fetch(
        &self,
        url: &Url,
        dest: &Path,
        skip_tls_verify: bool,
        cancel: &CancelToken,
    ) -> Result<u64, ExecError> {
        cancel.check()?;
        match url.scheme() {
            "http" | "https" => self.fetch_http(url, dest, skip_tls_verify, cancel),
            "ftp" => self.fetch_ftp(url, dest, cancel),
            other => Err(ExecError::Acquisition(format!(
                "unknown or unsupported protocol '{other}' to download data from '{url}'"
            ))),
        }
    }

    fn fetch_http(
        &self,
        url: &Url,
        dest: &Path,
        skip_tls_verify: bool,
        cancel: &CancelToken,
    ) -> Result<u64, ExecError> {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(self.timeouts.connect))
            .timeout_global(Some(self.timeouts.overall))
            .tls_config(
                ureq::tls::TlsConfig::builder()
                    .disable_verification(skip_tls_verify)
                    .build(),
            )
            .build();
        let agent = ureq::Agent::new_with_config(config);

        tracing::debug!("GET {url}");
        let response = agent
            .get(url.as_str())
            .header("User-Agent", concat!("taskscript/", env!("CARGO_PKG_VERSION")))
            .call()
            .map_err(|e| ExecError::Acquisition(format!("failed to download '{url}': {e}")))?;
        let mut reader = response.into_body().into_reader();
        stream_to_file(&mut reader, dest, cancel)
            .map_err(|e| annotate(e, url))
    }

    fn fetch_ftp(&self, url: &Url, dest: &Path, cancel: &CancelToken) -> Result<u64, ExecError> {
        let ftp_err = |e: suppaftp::FtpError| {
            ExecError::Acquisition(format!("failed to download '{url}': {e}"))
        };
        let host = url
            .host_str()
            .ok_or_else(|| ExecError::Acquisition(format!("missing host in '{url}'")))?;
        let port = url.port().unwrap_or(21);

        let addr = std::net::ToSocketAddrs::to_socket_addrs(&(host, port))
            .map_err(|e| ExecError::Acquisition(format!("failed to resolve '{host}': {e}")))?
            .next()
            .ok_or_else(|| ExecError::Acquisition(format!("failed to resolve '{host}'")))?;

        tracing::debug!("FTP RETR {url}");
        let mut ftp =
            suppaftp::FtpStream::connect_timeout(addr, self.timeouts.connect).map_err(ftp_err)?;
        let (user, password) = if url.username().is_empty() {
            ("anonymous", "anonymous")
        } else {
            (url.username(), url.password().unwrap_or_default())
        };
        ftp.login(user, password).map_err(ftp_err)?;
        ftp.transfer_type(suppaftp::types::FileType::Binary)
            .map_err(ftp_err)?;

        let mut stream = ftp.retr_as_stream(url.path()).map_err(ftp_err)?;
        let written = stream_to_file(&mut stream, dest, cancel).map_err(|e| annotate(e, url))?;
        ftp.finalize_retr_stream(stream).map_err(ftp_err)?;
        if let Err(e) = ftp.quit() {
            tracing::debug!("ftp quit failed: {e}");
        }
        Ok(written)
    }
}

fn annotate(err: ExecError, url: &Url) -> ExecError {
    match err {
        ExecError::Io { context, source } => {
            ExecError::Acquisition(format!("failed to download '{url}': {context}: {source}"))
        }
        other => other,
    }
}

/// Copy `reader` into a fresh file at `dest`, checking `cancel` per chunk.
///
/// # Errors
///
/// Returns [`ExecError::Io`] on read/write failures and
/// [`ExecError::Cancelled`] when cancelled.
pub fn stream_to_file(
    reader: &mut impl Read,
    dest: &Path,
    cancel: &CancelToken,
) -> Result<u64, ExecError> {
    let file = File::create(dest)
        .map_err(|e| ExecError::io(format!("creating {}", dest.display()), e))?;
    let mut writer = BufWriter::new(file);
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        cancel.check()?;
        let n = reader
            .read(&mut buf)
            .map_err(|e| ExecError::io("reading response body", e))?;
        if n == 0 {
            break;
        }
        writer
            .write_all(buf.get(..n).unwrap_or_default())
            .map_err(|e| ExecError::io(format!("writing {}", dest.display()), e))?;
        total += n as u64;
    }
    writer
        .flush()
        .map_err(|e| ExecError::io(format!("writing {}", dest.display()), e))?;
    Ok(total)
}
