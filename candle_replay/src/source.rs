use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no source given")]
    Empty,
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("fetch {url}: HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Where CSV text comes from: a local file (upload) or a URL (auto-load).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataSource {
    File(PathBuf),
    Url(String),
}

impl DataSource {
    pub fn parse(raw: &str) -> Result<Self, LoadError> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(LoadError::Empty);
        }
        let lower = s.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Ok(DataSource::Url(s.to_string()))
        } else {
            Ok(DataSource::File(PathBuf::from(s)))
        }
    }

    /// Blocking; call from a worker thread.
    pub fn read_text(&self) -> Result<String, LoadError> {
        match self {
            DataSource::File(path) => std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            }),
            DataSource::Url(url) => fetch(url),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::File(path) => write!(f, "{}", path.display()),
            DataSource::Url(url) => write!(f, "{url}"),
        }
    }
}

fn fetch(url: &str) -> Result<String, LoadError> {
    let http = |source| LoadError::Http {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(http)?;
    let resp = client.get(url).send().map_err(http)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(LoadError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    resp.text().map_err(http)
}
