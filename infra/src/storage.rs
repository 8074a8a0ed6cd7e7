use crate::error::InfraError;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use serde::Serialize;

#[cfg(any(test, feature = "mocks"))]
use mockall::automock;

/// Largest batch a single `DeleteObjects` request accepts.
pub const MAX_DELETE_BATCH: usize = 1000;

#[cfg_attr(any(test, feature = "mocks"), automock)]
#[async_trait]
pub trait ObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), InfraError>;
    async fn list_keys(&self, bucket: &str) -> Result<Vec<String>, InfraError>;
    /// Returns how many of `keys` were actually deleted.
    async fn delete_keys(&self, bucket: &str, keys: Vec<String>) -> Result<usize, InfraError>;
}

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    s3_client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(s3_client: aws_sdk_s3::Client) -> Self {
        Self { s3_client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), InfraError> {
        self.s3_client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| InfraError::aws("s3", e.into_service_error()))
    }

    async fn list_keys(&self, bucket: &str) -> Result<Vec<String>, InfraError> {
        let mut keys = vec![];
        let mut continuation_token = None;
        loop {
            let page = self
                .s3_client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| InfraError::aws("s3", e.into_service_error()))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );
            match page.next_continuation_token() {
                Some(token) => continuation_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(keys)
    }

    async fn delete_keys(&self, bucket: &str, keys: Vec<String>) -> Result<usize, InfraError> {
        let requested = keys.len();
        let objects = keys
            .into_iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| InfraError::aws("s3", e))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| InfraError::aws("s3", e))?;

        let response = self
            .s3_client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| InfraError::aws("s3", e.into_service_error()))?;

        for error in response.errors() {
            tracing::warn!(
                "could not delete {:?} from {}: {:?}",
                error.key(),
                bucket,
                error.message()
            );
        }
        Ok(requested.saturating_sub(response.errors().len()))
    }
}

/// The header is written even when `rows` is empty. `header` must name the
/// fields of `T` in declaration order.
pub fn to_csv<T: Serialize>(header: &[&str], rows: &[T]) -> Result<Vec<u8>, InfraError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(vec![]);
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| InfraError::Io(e.into_error()))
}

/// Serialises `rows` to CSV in memory and uploads it as one object, without
/// a local file. Returns the number of rows uploaded.
pub async fn upload_csv<S, T>(
    store: &S,
    header: &[&str],
    rows: &[T],
    bucket: &str,
    key: &str,
) -> Option<usize>
where
    S: ObjectStore + ?Sized,
    T: Serialize,
{
    tracing::info!(
        "upload_csv, going to upload {} rows to s3 object {}/{}",
        rows.len(),
        bucket,
        key
    );
    let body = match to_csv(header, rows) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!("upload_csv, could not serialise rows: {}", e);
            return None;
        }
    };
    match store.put_object(bucket, key, body).await {
        Ok(()) => Some(rows.len()),
        Err(e) => {
            tracing::error!("upload_csv, upload to {}/{} failed: {}", bucket, key, e);
            None
        }
    }
}

/// Empties `bucket`. Failures are logged, never returned. Returns how many
/// keys were deleted; keys S3 reports as failed are not counted.
pub async fn delete_all_objects<S: ObjectStore + ?Sized>(store: &S, bucket: &str) -> usize {
    tracing::info!(
        "delete_all_objects, going to delete objects from bucket={}",
        bucket
    );
    let keys = match store.list_keys(bucket).await {
        Ok(keys) => keys,
        Err(e) => {
            tracing::error!(
                "delete_all_objects, exception \"{}\" occurred while listing bucket={}",
                e,
                bucket
            );
            return 0;
        }
    };

    let mut deleted = 0;
    for batch in keys.chunks(MAX_DELETE_BATCH) {
        match store.delete_keys(bucket, batch.to_vec()).await {
            Ok(count) => deleted += count,
            Err(e) => {
                tracing::error!(
                    "delete_all_objects, exception \"{}\" occurred while deleting objects from bucket={}",
                    e,
                    bucket
                );
                return deleted;
            }
        }
    }
    if deleted < keys.len() {
        tracing::error!(
            "delete_all_objects, {} of {} objects in bucket={} were not deleted",
            keys.len() - deleted,
            keys.len(),
            bucket
        );
    }
    tracing::info!(
        "delete_all_objects, after deleting {} objects from bucket={}",
        deleted,
        bucket
    );
    deleted
}
