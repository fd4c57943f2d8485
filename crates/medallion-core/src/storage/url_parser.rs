//! URL parsing for storage backends.
//!
//! Extracts backend configuration from S3 URLs and local filesystem paths.

use object_store::path::Path;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::{InvalidUrlSnafu, StorageError};

use super::{LocalConfig, S3Config};

const S3_PATH: &str =
    r"^https://s3\.(?P<region>[\w\-]+)\.amazonaws\.com/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_VIRTUAL: &str =
    r"^https://(?P<bucket>[a-z0-9\-\.]+)\.s3\.(?P<region>[\w\-]+)\.amazonaws\.com(/(?P<key>.+))?$";
const S3_URL: &str = r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_ENDPOINT_URL: &str = r"^[sS]3[aA]?::(?<protocol>https?)://(?P<endpoint>[^:/]+):(?<port>\d+)/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";

const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_URL: &str = r"^file:(?P<path>.*)$";
const FILE_PATH: &str = r"^(?P<path>/.*)$";

static S3_MATCHERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [S3_PATH, S3_VIRTUAL, S3_ENDPOINT_URL, S3_URL]
        .iter()
        .map(|p| Regex::new(p).expect("valid S3 URL pattern"))
        .collect()
});

static LOCAL_MATCHERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [FILE_URI, FILE_URL, FILE_PATH]
        .iter()
        .map(|p| Regex::new(p).expect("valid file URL pattern"))
        .collect()
});

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Local(LocalConfig),
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    ///
    /// Relative local paths are resolved against the current directory.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        if let Some(matches) = S3_MATCHERS.iter().find_map(|r| r.captures(url)) {
            return Ok(Self::parse_s3(&matches));
        }

        if let Some(matches) = LOCAL_MATCHERS.iter().find_map(|r| r.captures(url)) {
            let path = matches.name("path").map(|m| m.as_str()).unwrap_or_default();
            return Self::parse_local(path, url);
        }

        if !url.is_empty() && !url.contains("://") {
            let absolute = std::env::current_dir()
                .map(|cwd| cwd.join(url))
                .map_err(|_| InvalidUrlSnafu { url }.build())?;
            return Self::parse_local(&absolute.to_string_lossy(), url);
        }

        InvalidUrlSnafu { url }.fail()
    }

    fn parse_s3(matches: &regex::Captures) -> Self {
        let bucket = matches
            .name("bucket")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let region = std::env::var("AWS_DEFAULT_REGION")
            .ok()
            .or_else(|| matches.name("region").map(|m| m.as_str().to_string()));

        let endpoint = std::env::var("AWS_ENDPOINT").ok().or_else(|| {
            matches.name("endpoint").map(|endpoint| {
                let port = matches
                    .name("port")
                    .and_then(|p| p.as_str().parse::<u16>().ok())
                    .unwrap_or(443);
                let protocol = matches
                    .name("protocol")
                    .map(|p| p.as_str())
                    .unwrap_or("https");
                format!("{protocol}://{}:{port}", endpoint.as_str())
            })
        });

        let key = matches
            .name("key")
            .map(|m| Path::from(m.as_str().trim_end_matches('/')));

        BackendConfig::S3(S3Config {
            endpoint,
            region,
            bucket,
            key,
        })
    }

    fn parse_local(path: &str, url: &str) -> Result<Self, StorageError> {
        if path.is_empty() {
            return InvalidUrlSnafu { url }.fail();
        }
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let path = match path.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        };

        Ok(BackendConfig::Local(LocalConfig { path }))
    }

    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::S3(s3) => s3.key.as_ref(),
            BackendConfig::Local(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_url_parsing() {
        let config = BackendConfig::parse_url("s3://mybucket/path/to/data").unwrap();
        match config {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "mybucket");
                assert_eq!(s3.key, Some(Path::from("path/to/data")));
            }
            _ => panic!("Expected S3 config"),
        }
    }

    #[test]
    fn test_s3_trailing_slash_is_ignored() {
        let config = BackendConfig::parse_url("s3://mybucket/landing/sales/").unwrap();
        match config {
            BackendConfig::S3(s3) => assert_eq!(s3.key, Some(Path::from("landing/sales"))),
            _ => panic!("Expected S3 config"),
        }
    }

    #[test]
    fn test_s3_path_style_url() {
        let config =
            BackendConfig::parse_url("https://s3.us-east-1.amazonaws.com/mybucket/path/to/data")
                .unwrap();
        match config {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "mybucket");
                assert_eq!(s3.key, Some(Path::from("path/to/data")));
            }
            _ => panic!("Expected S3 config"),
        }
    }

    #[test]
    fn test_s3_endpoint_url() {
        let config =
            BackendConfig::parse_url("s3::http://localhost:9000/mybucket/path/to/data").unwrap();
        match config {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "mybucket");
                assert_eq!(s3.key, Some(Path::from("path/to/data")));
            }
            _ => panic!("Expected S3 config"),
        }
    }

    #[test]
    fn test_local_url_parsing() {
        let config = BackendConfig::parse_url("/local/path/to/data").unwrap();
        assert_eq!(
            config,
            BackendConfig::Local(LocalConfig {
                path: "/local/path/to/data".to_string()
            })
        );
    }

    #[test]
    fn test_local_file_uri() {
        let config = BackendConfig::parse_url("file:///local/path/to/data/").unwrap();
        assert_eq!(
            config,
            BackendConfig::Local(LocalConfig {
                path: "/local/path/to/data".to_string()
            })
        );
    }

    #[test]
    fn test_relative_path_is_resolved() {
        let config = BackendConfig::parse_url("warehouse").unwrap();
        match config {
            BackendConfig::Local(local) => {
                assert!(local.path.starts_with('/'));
                assert!(local.path.ends_with("/warehouse"));
            }
            _ => panic!("Expected Local config"),
        }
    }

    #[test]
    fn test_invalid_url() {
        assert!(BackendConfig::parse_url("gopher://nowhere").is_err());
        assert!(BackendConfig::parse_url("").is_err());
    }
}
