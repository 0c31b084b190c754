//! Persisted-state verification
//!
//! Exact content assertions against the object store. No retries live
//! here: by the time a scenario verifies, the worker's own log line has
//! already signalled that the commit finished. Failures carry the full
//! expected/actual payload for diagnosis.

use std::io::Read;

use flate2::read::GzDecoder;

use crate::error::{HarnessError, HarnessResult};
use crate::store::client::StoreClient;
use crate::store::layout::ChunkIndex;

pub struct StoreVerifier<'a> {
    client: &'a StoreClient,
}

impl<'a> StoreVerifier<'a> {
    pub fn new(client: &'a StoreClient) -> Self {
        StoreVerifier { client }
    }

    /// Assert that the object at `key` exists and its (optionally
    /// gunzipped) bytes equal `expected` exactly.
    pub async fn assert_content(
        &self,
        key: &str,
        expected: &[u8],
        decompress: bool,
    ) -> HarnessResult<()> {
        let Some(stored) = self.client.get_object(key).await? else {
            return Err(mismatch(key, expected, b"<object not found>", decompress));
        };

        let actual = if decompress { gunzip(key, &stored)? } else { stored };

        if actual == expected {
            tracing::debug!("✅ '{}' matches ({} bytes)", key, expected.len());
            Ok(())
        } else {
            Err(mismatch(key, expected, &actual, decompress))
        }
    }

    /// Assert a plain-text object, e.g. a pointer body.
    pub async fn assert_text(&self, key: &str, expected: &str) -> HarnessResult<()> {
        self.assert_content(key, expected.as_bytes(), false).await
    }

    /// Fetch and strict-parse an index file, checking its intra-file
    /// invariants.
    pub async fn fetch_index(&self, key: &str) -> HarnessResult<ChunkIndex> {
        let Some(raw) = self.client.get_object(key).await? else {
            return Err(mismatch(key, b"<an index file>", b"<object not found>", false));
        };

        let index = ChunkIndex::parse_strict(&raw)?;
        index.validate().map_err(|detail| HarnessError::Verification {
            key: key.to_string(),
            expected: "a well-formed chunk index".to_string(),
            actual: detail,
            decompressed: false,
        })?;
        Ok(index)
    }
}

fn gunzip(key: &str, bytes: &[u8]) -> HarnessResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| HarnessError::Verification {
            key: key.to_string(),
            expected: "a gzip stream".to_string(),
            actual: format!("undecodable content: {e}"),
            decompressed: true,
        })?;
    Ok(out)
}

fn mismatch(key: &str, expected: &[u8], actual: &[u8], decompressed: bool) -> HarnessError {
    HarnessError::Verification {
        key: key.to_string(),
        expected: String::from_utf8_lossy(expected).into_owned(),
        actual: String::from_utf8_lossy(actual).into_owned(),
        decompressed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::body::Body;
    use axum::extract::State;
    use axum::http::{StatusCode, Uri};
    use axum::response::{IntoResponse, Response};
    use axum::Router;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Arc;

    type Objects = Arc<HashMap<String, Vec<u8>>>;

    async fn serve_object(State(objects): State<Objects>, uri: Uri) -> Response {
        match objects.get(uri.path()) {
            Some(bytes) => (StatusCode::OK, Body::from(bytes.clone())).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }

    /// Stand-in store emulator: a local HTTP server holding fixed objects.
    async fn stub_store(objects: HashMap<String, Vec<u8>>) -> StoreClient {
        let app = Router::new()
            .fallback(serve_object)
            .with_state(Arc::new(objects));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        StoreClient::new(&format!("http://{addr}"), "test-bucket").unwrap()
    }

    fn gzipped(payload: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        encoder.finish().unwrap()
    }

    #[tokio::test]
    async fn exact_match_passes() {
        let mut objects = HashMap::new();
        objects.insert("/test-bucket/ns/pointer.txt".to_string(), b"ns/index.json".to_vec());
        let client = stub_store(objects).await;

        StoreVerifier::new(&client)
            .assert_text("ns/pointer.txt", "ns/index.json")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn mismatch_carries_expected_and_actual() {
        let mut objects = HashMap::new();
        objects.insert("/test-bucket/ns/pointer.txt".to_string(), b"ns/other.json".to_vec());
        let client = stub_store(objects).await;

        let err = StoreVerifier::new(&client)
            .assert_text("ns/pointer.txt", "ns/index.json")
            .await
            .unwrap_err();

        assert_matches!(err, HarnessError::Verification { key, expected, actual, decompressed } => {
            assert_eq!(key, "ns/pointer.txt");
            assert_eq!(expected, "ns/index.json");
            assert_eq!(actual, "ns/other.json");
            assert!(!decompressed);
        });
    }

    #[tokio::test]
    async fn missing_object_fails_verification() {
        let client = stub_store(HashMap::new()).await;

        let err = StoreVerifier::new(&client)
            .assert_text("ns/absent.txt", "anything")
            .await
            .unwrap_err();

        assert_matches!(err, HarnessError::Verification { actual, .. } => {
            assert_eq!(actual, "<object not found>");
        });
    }

    #[tokio::test]
    async fn gunzips_before_comparing() {
        let payload = b"{\"foo\": \"bar\", \"counter\":0}\n{\"foo\": \"bar\", \"counter\":1}\n";
        let mut objects = HashMap::new();
        objects.insert("/test-bucket/ns/chunk.gz".to_string(), gzipped(payload));
        let client = stub_store(objects).await;

        StoreVerifier::new(&client)
            .assert_content("ns/chunk.gz", payload, true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn corrupt_gzip_is_reported_as_such() {
        let mut objects = HashMap::new();
        objects.insert("/test-bucket/ns/chunk.gz".to_string(), b"not a gzip stream".to_vec());
        let client = stub_store(objects).await;

        let err = StoreVerifier::new(&client)
            .assert_content("ns/chunk.gz", b"whatever", true)
            .await
            .unwrap_err();

        assert_matches!(err, HarnessError::Verification { decompressed: true, .. });
    }

    #[tokio::test]
    async fn fetch_index_applies_strict_schema_and_invariants() {
        let good = br#"{"chunks":[{"byte_length_uncompressed":2890,"num_records":100,"byte_length":275,"byte_offset":0,"first_record_offset":0}]}"#;
        let unknown_field = br#"{"chunks":[{"byte_length_uncompressed":1,"num_records":1,"byte_length":1,"byte_offset":0,"first_record_offset":0,"surprise":1}]}"#;
        let broken_chain = br#"{"chunks":[{"byte_length_uncompressed":1,"num_records":10,"byte_length":1,"byte_offset":0,"first_record_offset":0},{"byte_length_uncompressed":1,"num_records":10,"byte_length":1,"byte_offset":50,"first_record_offset":99}]}"#;

        let mut objects = HashMap::new();
        objects.insert("/test-bucket/ns/good.index.json".to_string(), good.to_vec());
        objects.insert("/test-bucket/ns/unknown.index.json".to_string(), unknown_field.to_vec());
        objects.insert("/test-bucket/ns/broken.index.json".to_string(), broken_chain.to_vec());
        let client = stub_store(objects).await;
        let verifier = StoreVerifier::new(&client);

        let index = verifier.fetch_index("ns/good.index.json").await.unwrap();
        assert_eq!(index.total_records(), 100);

        assert_matches!(
            verifier.fetch_index("ns/unknown.index.json").await.unwrap_err(),
            HarnessError::Json(_)
        );
        assert_matches!(
            verifier.fetch_index("ns/broken.index.json").await.unwrap_err(),
            HarnessError::Verification { .. }
        );
    }
}
