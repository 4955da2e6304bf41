//! [`BlobStore`] backed by AWS S3 (or an S3-compatible endpoint).

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{ServerSideEncryption, Tag as S3Tag, Tagging};
use tracing::{debug, info};

use antivirus_shared::{Encryption, StoreConfig, StoreError, Tag, TagSet};

use crate::{BlobStore, StoreResult};

/// S3 client wrapper. Cheap to clone.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Build a client from the default AWS provider chain plus `config` overrides.
    ///
    /// Path-style addressing is always on so that endpoint overrides
    /// (localstack, MinIO) work without wildcard DNS.
    pub async fn connect(config: &StoreConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(true);
        if let Some(endpoint) = &config.endpoint {
            info!(%endpoint, "using store endpoint override");
            builder = builder.endpoint_url(endpoint);
        }

        Self::from_conf(builder.build())
    }

    /// Build from a fully specified SDK config.
    pub fn from_conf(conf: aws_sdk_s3::Config) -> Self {
        Self {
            client: Client::from_conf(conf),
        }
    }
}

/// Map any SDK failure to a [`StoreError::Other`] carrying the full context.
fn other<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    StoreError::Other(DisplayErrorContext(&err).to_string())
}

/// Some stores answer a missing key on non-GET calls with a bare `NoSuchKey` code.
fn is_no_such_key_code<E, R>(err: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata,
{
    err.as_service_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == "NoSuchKey")
}

fn build_tag_set(tags: &TagSet) -> StoreResult<Tagging> {
    let tag_set = tags
        .iter()
        .map(|t| {
            S3Tag::builder()
                .key(&t.key)
                .value(&t.value)
                .build()
                .map_err(|e| StoreError::Other(format!("invalid tag '{}': {e}", t.key)))
        })
        .collect::<StoreResult<Vec<_>>>()?;

    Tagging::builder()
        .set_tag_set(Some(tag_set))
        .build()
        .map_err(|e| StoreError::Other(format!("invalid tag set: {e}")))
}

#[async_trait]
impl BlobStore for S3Store {
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Err(StoreError::no_such_key(bucket, key));
            }
            Err(err) => return Err(other(err)),
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Other(format!("failed to read object body: {e}")))?
            .into_bytes()
            .to_vec();

        debug!(bucket, key, bytes = body.len(), "object downloaded");
        Ok(body)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        encryption: Encryption,
    ) -> StoreResult<()> {
        let len = body.len();
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body));

        if encryption == Encryption::Aes256 {
            request = request.server_side_encryption(ServerSideEncryption::Aes256);
        }

        request.send().await.map_err(other)?;

        debug!(bucket, key, bytes = len, "object uploaded");
        Ok(())
    }

    async fn get_tags(&self, bucket: &str, key: &str) -> StoreResult<TagSet> {
        let output = match self
            .client
            .get_object_tagging()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) if is_no_such_key_code(&err) => {
                return Err(StoreError::no_such_key(bucket, key));
            }
            Err(err) => return Err(other(err)),
        };

        Ok(output
            .tag_set()
            .iter()
            .map(|t| Tag::new(t.key(), t.value()))
            .collect())
    }

    async fn put_tags(&self, bucket: &str, key: &str, tags: &TagSet) -> StoreResult<()> {
        let tagging = build_tag_set(tags)?;

        match self
            .client
            .put_object_tagging()
            .bucket(bucket)
            .key(key)
            .tagging(tagging)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_no_such_key_code(&err) => Err(StoreError::no_such_key(bucket, key)),
            Err(err) => Err(other(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_s3::config::Credentials;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_store(server: &MockServer) -> S3Store {
        let conf = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("eu-west-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .endpoint_url(server.uri())
            .force_path_style(true)
            .build();
        S3Store::from_conf(conf)
    }

    const NO_SUCH_KEY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><Key>main.cvd</Key></Error>"#;

    #[tokio::test]
    async fn get_object_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/defs/daily.cvd"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"signatures".to_vec()))
            .mount(&server)
            .await;

        let store = test_store(&server);
        let body = store.get_object("defs", "daily.cvd").await.expect("get");
        assert_eq!(body, b"signatures");
    }

    #[tokio::test]
    async fn get_object_maps_missing_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/defs/main.cvd"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("content-type", "application/xml")
                    .set_body_string(NO_SUCH_KEY),
            )
            .mount(&server)
            .await;

        let store = test_store(&server);
        let err = store.get_object("defs", "main.cvd").await.unwrap_err();
        assert_eq!(err, StoreError::no_such_key("defs", "main.cvd"));
    }

    #[tokio::test]
    async fn get_object_keeps_other_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/defs/main.cvd"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("content-type", "application/xml")
                    .set_body_string(
                        "<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
                    ),
            )
            .mount(&server)
            .await;

        let store = test_store(&server);
        let err = store.get_object("defs", "main.cvd").await.unwrap_err();
        assert!(!err.is_no_such_key());
        assert!(err.to_string().contains("AccessDenied"), "{err}");
    }

    #[tokio::test]
    async fn put_object_requests_aes256() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/defs/main.cvd"))
            .and(header("x-amz-server-side-encryption", "AES256"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = test_store(&server);
        store
            .put_object("defs", "main.cvd", b"db".to_vec(), Encryption::Aes256)
            .await
            .expect("put");
    }

    #[tokio::test]
    async fn put_tags_sends_whole_set_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/uploads/file-key"))
            .and(query_param("tagging", ""))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = test_store(&server);
        let tags = TagSet::from(vec![
            Tag::new("VIRUS_SCAN", "failed"),
            Tag::new("upload-source", "online"),
        ]);
        store.put_tags("uploads", "file-key", &tags).await.expect("put tags");

        let requests = server.received_requests().await.expect("recorded");
        let body = String::from_utf8_lossy(&requests[0].body).into_owned();
        let status = body.find("<Key>VIRUS_SCAN</Key>").expect("status tag sent");
        let source = body.find("<Key>upload-source</Key>").expect("other tag sent");
        assert!(status < source, "{body}");
        assert!(body.contains("<Value>failed</Value>"), "{body}");
    }

    #[tokio::test]
    async fn tagging_maps_missing_key_code() {
        let server = MockServer::start().await;
        Mock::given(path("/uploads/gone"))
            .and(query_param("tagging", ""))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("content-type", "application/xml")
                    .set_body_string(NO_SUCH_KEY),
            )
            .mount(&server)
            .await;

        let store = test_store(&server);
        let err = store.get_tags("uploads", "gone").await.unwrap_err();
        assert_eq!(err, StoreError::no_such_key("uploads", "gone"));

        let err = store
            .put_tags("uploads", "gone", &TagSet::from(vec![Tag::new("a", "1")]))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::no_such_key("uploads", "gone"));
    }

    #[tokio::test]
    async fn get_tags_preserves_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uploads/file-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<Tagging xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><TagSet>
<Tag><Key>VIRUS_SCAN</Key><Value>okay</Value></Tag>
<Tag><Key>upload-source</Key><Value>online</Value></Tag>
</TagSet></Tagging>"#,
            ))
            .mount(&server)
            .await;

        let store = test_store(&server);
        let tags = store.get_tags("uploads", "file-key").await.expect("tags");
        assert_eq!(
            tags,
            TagSet::from(vec![
                Tag::new("VIRUS_SCAN", "okay"),
                Tag::new("upload-source", "online"),
            ])
        );
    }
}
