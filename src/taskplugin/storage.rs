use anyhow::Context;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use std::sync::Arc;
use tracing::{debug, error};
use url::Url;

use crate::config::UriEncoding;
use crate::errors::StorageError;
use crate::task::PipelineTask;
use crate::util::redact_uri;

pub const ARTIFACT_DIR: &str = "artifact";
pub const ARTIFACT_FILE: &str = "artifact.tar.gz";

/// Turns the packed storage URI carried on a pipeline task into a plain one.
#[async_trait]
pub trait UriDecrypter: Send + Sync {
    async fn decrypt(&self, encrypted: &str) -> anyhow::Result<String>;
}

/// For deployments that store the URI unencrypted
pub struct PlainUri;

#[async_trait]
impl UriDecrypter for PlainUri {
    async fn decrypt(&self, encrypted: &str) -> anyhow::Result<String> {
        Ok(encrypted.to_string())
    }
}

pub struct Base64Uri;

#[async_trait]
impl UriDecrypter for Base64Uri {
    async fn decrypt(&self, encrypted: &str) -> anyhow::Result<String> {
        let raw = BASE64_STANDARD
            .decode(encrypted.trim())
            .context("storage uri is not valid base64")?;
        String::from_utf8(raw).context("decoded storage uri is not utf-8")
    }
}

/// Object store location parsed from `scheme://ak:sk@endpoint/bucket[/sub/folder]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Storage {
    pub endpoint: String,
    pub bucket: String,
    pub subfolder: String,
    pub insecure: bool,
}

impl Storage {
    pub fn from_uri(uri: &str) -> Result<Self, StorageError> {
        let parsed = Url::parse(uri).map_err(|e| StorageError::Parse {
            uri: redact_uri(uri),
            reason: e.to_string(),
        })?;

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| StorageError::MissingEndpoint { uri: redact_uri(uri) })?;
        let endpoint = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let mut segments = parsed.path().split('/').filter(|s| !s.is_empty());
        let bucket = segments.next().unwrap_or_default().to_string();
        let subfolder = segments.collect::<Vec<_>>().join("/");

        Ok(Self {
            endpoint,
            bucket,
            subfolder,
            insecure: matches!(parsed.scheme(), "http" | "s3"),
        })
    }

    /// `<endpoint>/[<subfolder>/]<pipeline>/<service>/artifact/artifact.tar.gz`
    pub fn artifact_path(&self, pipeline_name: &str, service_name: &str) -> String {
        let mut parts = vec![self.endpoint.as_str()];
        if !self.subfolder.is_empty() {
            parts.push(self.subfolder.as_str());
        }
        parts.extend([pipeline_name, service_name, ARTIFACT_DIR, ARTIFACT_FILE]);
        parts.join("/")
    }
}

#[derive(Clone)]
pub struct StorageResolver {
    decrypter: Arc<dyn UriDecrypter>,
}

impl StorageResolver {
    pub fn new(decrypter: Arc<dyn UriDecrypter>) -> Self {
        Self { decrypter }
    }

    pub fn from_encoding(encoding: UriEncoding) -> Self {
        match encoding {
            UriEncoding::Plain => Self::new(Arc::new(PlainUri)),
            UriEncoding::Base64 => Self::new(Arc::new(Base64Uri)),
        }
    }

    pub async fn resolve(&self, encrypted: &str) -> Result<Storage, StorageError> {
        let uri = self.decrypter.decrypt(encrypted).await.map_err(|e| {
            error!("failed to create object storage from {}", redact_uri(encrypted));
            StorageError::Decrypt {
                uri: redact_uri(encrypted),
                reason: format!("{:#}", e),
            }
        })?;
        let store = Storage::from_uri(&uri).inspect_err(|e| error!("{}", e))?;
        debug!(
            "resolved object storage {} (bucket {}, insecure {})",
            store.endpoint, store.bucket, store.insecure
        );
        Ok(store)
    }

    /// Artifact location of the service built by `pipeline_task`.
    pub async fn artifact_path(&self, pipeline_task: &PipelineTask) -> Result<String, StorageError> {
        let store = self.resolve(&pipeline_task.storage_uri).await?;
        Ok(store.artifact_path(&pipeline_task.pipeline_name, &pipeline_task.service_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(uri: &str) -> PipelineTask {
        PipelineTask {
            pipeline_name: "web-build".into(),
            service_name: "web".into(),
            storage_uri: uri.into(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_endpoint_bucket_and_subfolder() {
        let store = Storage::from_uri("s3://ak:sk@minio.local:9000/bucket/team/ci").unwrap();
        assert_eq!(store.endpoint, "minio.local:9000");
        assert_eq!(store.bucket, "bucket");
        assert_eq!(store.subfolder, "team/ci");
        assert!(store.insecure);

        let store = Storage::from_uri("https://ak:sk@cos.example.com/bucket").unwrap();
        assert_eq!(store.subfolder, "");
        assert!(!store.insecure);
    }

    #[test]
    fn artifact_path_omits_missing_subfolder() {
        let with = Storage::from_uri("s3://ak:sk@minio/bucket/sub").unwrap();
        assert_eq!(
            with.artifact_path("web-build", "web"),
            "minio/sub/web-build/web/artifact/artifact.tar.gz"
        );
        let without = Storage::from_uri("s3://ak:sk@minio/bucket").unwrap();
        assert_eq!(
            without.artifact_path("web-build", "web"),
            "minio/web-build/web/artifact/artifact.tar.gz"
        );
    }

    #[test]
    fn parse_errors_redact_credentials() {
        let err = Storage::from_uri("s3://ak:verysecret@/bucket").unwrap_err();
        let msg = err.to_string();
        assert!(!msg.contains("verysecret"), "{msg}");

        let err = Storage::from_uri("s3://AKID:wJalr/XUtnFEMI/K7MDENG@minio.local:9000/bucket").unwrap_err();
        let msg = err.to_string();
        assert!(!msg.contains("K7MDENG"), "{msg}");
        assert!(msg.contains("s3://AKID:***@minio.local:9000/bucket"), "{msg}");

        let err = Storage::from_uri("definitely not a uri").unwrap_err();
        assert!(matches!(err, StorageError::Parse { .. }));
    }

    #[tokio::test]
    async fn base64_resolver_decodes_before_parsing() {
        let packed = BASE64_STANDARD.encode("s3://ak:sk@minio:9000/bucket/sub");
        let resolver = StorageResolver::from_encoding(UriEncoding::Base64);
        let path = resolver.artifact_path(&task(&packed)).await.unwrap();
        assert_eq!(path, "minio:9000/sub/web-build/web/artifact/artifact.tar.gz");
    }

    #[tokio::test]
    async fn undecodable_uri_is_a_decrypt_error() {
        let resolver = StorageResolver::from_encoding(UriEncoding::Base64);
        let err = resolver.artifact_path(&task("%%%not-base64%%%")).await.unwrap_err();
        match err {
            StorageError::Decrypt { uri, .. } => assert_eq!(uri, "%%%not-base64%%%"),
            other => panic!("expected Decrypt, got: {other}"),
        }
    }
}
