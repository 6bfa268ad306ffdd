//! Amazon S3 source.
//!
//! Lists objects under a prefix with `ListObjectsV2` (following continuation
//! tokens, so listings over 1000 keys are not truncated) and downloads each
//! object that survives the path checks. Requests are signed with AWS
//! Signature V4 using `hmac` + `sha2`; no AWS SDK is involved.
//!
//! # Configuration
//!
//! ```toml
//! [source]
//! kind = "s3"
//! bucket = "acme-code"
//! prefix = "services/billing/"
//! region = "us-east-1"
//! # endpoint_url = "http://localhost:9000"   # MinIO, path-style
//! ```
//!
//! Credentials come from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and,
//! optionally, `AWS_SESSION_TOKEN`.
//!
//! A listing failure (bad credentials, `NoSuchBucket`) aborts the run. A
//! failed download only skips that object.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::classify::{Classifier, SkipReason, SkippedFile};
use crate::config::S3SourceConfig;
use crate::ingest::Ingestion;

type HmacSha256 = Hmac<Sha256>;

/// One listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Object {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// List the bucket and classify every object under the prefix.
pub async fn scan_s3(s3_config: &S3SourceConfig, classifier: &Classifier) -> Result<Ingestion> {
    let client = S3Client::from_env(s3_config)?;
    let objects = client.list_objects().await?;
    info!(
        bucket = %s3_config.bucket,
        prefix = %s3_config.prefix,
        objects = objects.len(),
        "listed objects"
    );

    let mut ingestion = Ingestion::default();

    for obj in &objects {
        let rel_key = relative_key(&s3_config.prefix, &obj.key);

        if let Some(reason) = classifier.check_path(rel_key) {
            debug!(key = %obj.key, %reason, "skipping object");
            ingestion.skipped.push(SkippedFile {
                path: obj.key.clone(),
                reason,
            });
            continue;
        }

        let bytes = match client.get_object(&obj.key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    "failed to download s3://{}/{}: {:#}",
                    s3_config.bucket, obj.key, e
                );
                ingestion.skipped.push(SkippedFile {
                    path: obj.key.clone(),
                    reason: SkipReason::Unreadable,
                });
                continue;
            }
        };

        match classifier.classify_bytes(&obj.key, bytes) {
            Ok(file) => ingestion.files.push(file),
            Err(reason) => {
                debug!(key = %obj.key, %reason, "skipping object");
                ingestion.skipped.push(SkippedFile {
                    path: obj.key.clone(),
                    reason,
                });
            }
        }
    }

    ingestion.files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(ingestion)
}

/// List every object under the configured prefix.
pub async fn list_bucket(s3_config: &S3SourceConfig) -> Result<Vec<S3Object>> {
    S3Client::from_env(s3_config)?.list_objects().await
}

/// Key with the configured prefix stripped, so path rules apply to the
/// corpus layout rather than to the bucket layout. The prefix is only
/// stripped on a segment boundary; otherwise the full key is checked.
fn relative_key<'k>(prefix: &str, key: &'k str) -> &'k str {
    if prefix.is_empty() {
        return key;
    }
    let rest = if prefix.ends_with('/') {
        key.strip_prefix(prefix)
    } else {
        key.strip_prefix(prefix).and_then(|rest| rest.strip_prefix('/'))
    };
    rest.unwrap_or(key)
}

// ============ Client ============

/// AWS credentials loaded from environment variables.
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID environment variable not set")?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

struct S3Client<'a> {
    config: &'a S3SourceConfig,
    creds: AwsCredentials,
    http: reqwest::Client,
}

impl<'a> S3Client<'a> {
    fn from_env(config: &'a S3SourceConfig) -> Result<Self> {
        Ok(Self {
            config,
            creds: AwsCredentials::from_env()?,
            http: reqwest::Client::new(),
        })
    }

    /// Scheme and host (with port) of the endpoint, plus the path prefix
    /// that addresses the bucket. Custom endpoints use path-style URLs.
    fn endpoint(&self) -> (&str, String, String) {
        match &self.config.endpoint_url {
            Some(endpoint) => {
                let (scheme, rest) = match endpoint.split_once("://") {
                    Some((scheme, rest)) => (scheme, rest),
                    None => ("https", endpoint.as_str()),
                };
                (
                    scheme,
                    rest.trim_end_matches('/').to_string(),
                    format!("/{}", uri_encode(&self.config.bucket)),
                )
            }
            None => (
                "https",
                format!(
                    "{}.s3.{}.amazonaws.com",
                    self.config.bucket, self.config.region
                ),
                String::new(),
            ),
        }
    }

    async fn list_objects(&self) -> Result<Vec<S3Object>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("list-type".to_string(), "2".to_string()),
                ("max-keys".to_string(), "1000".to_string()),
            ];
            if !self.config.prefix.is_empty() {
                query.push(("prefix".to_string(), self.config.prefix.clone()));
            }
            if let Some(ref token) = continuation_token {
                query.push(("continuation-token".to_string(), token.clone()));
            }

            let (_, _, bucket_path) = self.endpoint();
            let path = format!("{}/", bucket_path);
            let resp = self.signed_get(&path, query).await.with_context(|| {
                format!(
                    "Failed to list S3 objects in s3://{}/{}",
                    self.config.bucket, self.config.prefix
                )
            })?;

            let status = resp.status();
            let body = resp.text().await?;
            if !status.is_success() {
                bail!(
                    "S3 ListObjectsV2 on bucket '{}' failed (HTTP {}): {}",
                    self.config.bucket,
                    status,
                    describe_error(&body)
                );
            }

            let page = parse_list_objects_response(&body)?;
            objects.extend(page.objects);

            match page.next_token {
                Some(token) if page.is_truncated => continuation_token = Some(token),
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let (_, _, bucket_path) = self.endpoint();
        let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        let path = format!("{}/{}", bucket_path, encoded_key);

        let resp = self.signed_get(&path, Vec::new()).await?;
        if !resp.status().is_success() {
            bail!("S3 GetObject failed (HTTP {}) for key '{}'", resp.status(), key);
        }
        Ok(resp.bytes().await?.to_vec())
    }

    /// Issue a SigV4-signed GET. `canonical_uri` must already be encoded.
    async fn signed_get(
        &self,
        canonical_uri: &str,
        mut query: Vec<(String, String)>,
    ) -> Result<reqwest::Response> {
        let (scheme, host, _) = self.endpoint();

        query.sort();
        let canonical_query = query
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let signed = sign_get(
            &self.creds,
            &self.config.region,
            &host,
            canonical_uri,
            &canonical_query,
            Utc::now(),
        );

        let mut url = format!("{}://{}{}", scheme, host, canonical_uri);
        if !canonical_query.is_empty() {
            url.push('?');
            url.push_str(&canonical_query);
        }

        let mut req = self
            .http
            .get(&url)
            .header("Authorization", &signed.authorization)
            .header("x-amz-content-sha256", &signed.payload_hash)
            .header("x-amz-date", &signed.amz_date);
        if let Some(ref token) = self.creds.session_token {
            req = req.header("x-amz-security-token", token);
        }

        Ok(req.send().await?)
    }
}

// ============ AWS SigV4 ============

struct SignedHeaders {
    authorization: String,
    amz_date: String,
    payload_hash: String,
}

/// Build the SigV4 `Authorization` header for an empty-body GET.
fn sign_get(
    creds: &AwsCredentials,
    region: &str,
    host: &str,
    canonical_uri: &str,
    canonical_query: &str,
    now: DateTime<Utc>,
) -> SignedHeaders {
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let payload_hash = hex_sha256(b"");

    let mut headers = vec![
        ("host", host.to_string()),
        ("x-amz-content-sha256", payload_hash.clone()),
        ("x-amz-date", amz_date.clone()),
    ];
    if let Some(ref token) = creds.session_token {
        headers.push(("x-amz-security-token", token.clone()));
    }
    headers.sort();

    let signed_headers = headers.iter().map(|(k, _)| *k).collect::<Vec<_>>().join(";");
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    let canonical_request = format!(
        "GET\n{}\n{}\n{}\n{}\n{}",
        canonical_uri, canonical_query, canonical_headers, signed_headers, payload_hash
    );

    let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(&creds.secret_access_key, &date_stamp, region, "s3");
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    SignedHeaders {
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            creds.access_key_id, credential_scope, signed_headers, signature
        ),
        amz_date,
        payload_hash,
    }
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// RFC 3986 encoding: everything except `A-Z a-z 0-9 - _ . ~`.
fn uri_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => result.push_str(&format!("%{:02X}", byte)),
        }
    }
    result
}

// ============ XML ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    contents: Vec<ListedObject>,
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedObject {
    key: String,
    #[serde(default)]
    last_modified: Option<String>,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct S3ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

struct ListPage {
    objects: Vec<S3Object>,
    is_truncated: bool,
    next_token: Option<String>,
}

fn parse_list_objects_response(xml: &str) -> Result<ListPage> {
    let result: ListBucketResult =
        quick_xml::de::from_str(xml).context("Malformed ListObjectsV2 response")?;

    let objects = result
        .contents
        .into_iter()
        // Zero-byte "folder" placeholders end in '/'.
        .filter(|obj| !obj.key.is_empty() && !obj.key.ends_with('/'))
        .map(|obj| S3Object {
            last_modified: obj
                .last_modified
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_default(),
            key: obj.key,
            size: obj.size,
        })
        .collect();

    Ok(ListPage {
        objects,
        is_truncated: result.is_truncated,
        next_token: result.next_continuation_token,
    })
}

fn describe_error(body: &str) -> String {
    match quick_xml::de::from_str::<S3ErrorBody>(body) {
        Ok(err) if err.message.is_empty() => err.code,
        Ok(err) => format!("{}: {}", err.code, err.message),
        Err(_) => body.chars().take(500).collect(),
    }
}
