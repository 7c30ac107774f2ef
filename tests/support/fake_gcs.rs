//! In-process stand-in for the Cloud Storage JSON API.
//!
//! Serves the subset of calls the `gs` driver issues on an ephemeral port and
//! records what it saw so tests can assert on the wire format.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex},
};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    created: String,
    updated: String,
}

#[derive(Debug, Default)]
struct Inner {
    buckets: HashMap<String, BTreeMap<String, StoredObject>>,
    /// Names some other project holds; creating them conflicts
    foreign: HashSet<String>,
    /// Buckets whose listing is refused with 403
    unlisted: HashSet<String>,
    ranges: Vec<Option<String>>,
    bucket_inserts: Vec<Value>,
    list_calls: usize,
    delete_calls: usize,
}

/// Handle to a running fake server
#[derive(Clone)]
pub struct FakeGcs {
    pub base_url: String,
    inner: Arc<Mutex<Inner>>,
}

impl FakeGcs {
    pub async fn start() -> Self {
        let inner = Arc::new(Mutex::new(Inner::default()));
        let app = Router::new()
            .route("/storage/v1/b", post(insert_bucket))
            .route("/storage/v1/b/{bucket}/o", get(list_objects))
            .route(
                "/storage/v1/b/{bucket}/o/{object}",
                get(get_object).delete(delete_object),
            )
            .route(
                "/storage/v1/b/{bucket}/o/{object}/copyTo/b/{dst_bucket}/o/{dst_object}",
                post(copy_object),
            )
            .route("/upload/storage/v1/b/{bucket}/o", post(upload_object))
            .with_state(inner.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            inner,
        }
    }

    /// Create `bucket` as if the caller already owned it
    pub fn add_bucket(&self, bucket: &str) {
        self.inner
            .lock()
            .unwrap()
            .buckets
            .entry(bucket.to_string())
            .or_default();
    }

    /// Reserve `bucket` for another project
    pub fn add_foreign_bucket(&self, bucket: &str) {
        self.inner
            .lock()
            .unwrap()
            .foreign
            .insert(bucket.to_string());
    }

    /// Answer `objects.list` on `bucket` with 403 while other calls still work
    pub fn deny_listing(&self, bucket: &str) {
        self.inner
            .lock()
            .unwrap()
            .unlisted
            .insert(bucket.to_string());
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.inner.lock().unwrap().buckets.contains_key(bucket)
    }

    /// `Range` headers of every media download, in order
    pub fn ranges(&self) -> Vec<Option<String>> {
        self.inner.lock().unwrap().ranges.clone()
    }

    /// Bodies of every `buckets.insert` call, in order
    pub fn bucket_inserts(&self) -> Vec<Value> {
        self.inner.lock().unwrap().bucket_inserts.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.inner.lock().unwrap().list_calls
    }

    pub fn delete_calls(&self) -> usize {
        self.inner.lock().unwrap().delete_calls
    }
}

type Shared = Arc<Mutex<Inner>>;

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": status.as_u16(), "message": message } })),
    )
        .into_response()
}

fn resource(bucket: &str, name: &str, object: &StoredObject) -> Value {
    json!({
        "kind": "storage#object",
        "bucket": bucket,
        "name": name,
        "size": object.data.len().to_string(),
        "timeCreated": object.created,
        "updated": object.updated,
    })
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

async fn insert_bucket(
    State(inner): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let mut inner = inner.lock().unwrap();
    inner.bucket_inserts.push(body.clone());

    if !query.contains_key("project") {
        return error(StatusCode::BAD_REQUEST, "Required parameter: project");
    }
    let Some(name) = body.get("name").and_then(Value::as_str).map(str::to_string) else {
        return error(StatusCode::BAD_REQUEST, "Required field: name");
    };
    if inner.foreign.contains(&name) {
        return error(
            StatusCode::CONFLICT,
            "The requested bucket name is not available. Please try another one.",
        );
    }
    if inner.buckets.contains_key(&name) {
        return error(
            StatusCode::CONFLICT,
            "You already own this bucket. Please select another name.",
        );
    }

    inner.buckets.insert(name.clone(), BTreeMap::new());
    Json(json!({ "kind": "storage#bucket", "name": name })).into_response()
}

async fn list_objects(
    State(inner): State<Shared>,
    Path(bucket): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut inner = inner.lock().unwrap();
    inner.list_calls += 1;
    if inner.unlisted.contains(&bucket) {
        return error(
            StatusCode::FORBIDDEN,
            "caller does not have storage.objects.list access to the Google Cloud Storage bucket.",
        );
    }
    let Some(objects) = inner.buckets.get(&bucket) else {
        return error(StatusCode::NOT_FOUND, "The specified bucket does not exist.");
    };

    let prefix = query.get("prefix").cloned().unwrap_or_default();
    let max_results = query
        .get("maxResults")
        .and_then(|m| m.parse::<usize>().ok())
        .filter(|m| *m > 0)
        .unwrap_or(1000);
    let after = query.get("pageToken").cloned();

    let mut matching = objects
        .iter()
        .filter(|(name, _)| name.starts_with(&prefix))
        .filter(|(name, _)| after.as_ref().map_or(true, |token| name.as_str() > token.as_str()));

    let items: Vec<Value> = matching
        .by_ref()
        .take(max_results)
        .map(|(name, object)| resource(&bucket, name, object))
        .collect();
    let more = matching.next().is_some();

    let mut body = json!({ "kind": "storage#objects" });
    if !items.is_empty() {
        body["items"] = Value::Array(items.clone());
    }
    if more {
        if let Some(last) = items.last().and_then(|item| item["name"].as_str()) {
            body["nextPageToken"] = Value::String(last.to_string());
        }
    }
    Json(body).into_response()
}

fn parse_range(header: &str, len: usize) -> Result<(usize, usize), ()> {
    let spec = header.strip_prefix("bytes=").ok_or(())?;
    let (start, end) = spec.split_once('-').ok_or(())?;
    let start: usize = start.parse().map_err(|_| ())?;
    if start >= len {
        return Err(());
    }
    let end = if end.is_empty() {
        len
    } else {
        let end: usize = end.parse().map_err(|_| ())?;
        (end + 1).min(len)
    };
    Ok((start, end))
}

async fn get_object(
    State(inner): State<Shared>,
    Path((bucket, name)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut inner = inner.lock().unwrap();
    let media = query.get("alt").map(String::as_str) == Some("media");
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if media {
        inner.ranges.push(range.clone());
    }

    let Some(objects) = inner.buckets.get(&bucket) else {
        return error(StatusCode::NOT_FOUND, "The specified bucket does not exist.");
    };
    let Some(object) = objects.get(&name) else {
        return error(
            StatusCode::NOT_FOUND,
            &format!("No such object: {}/{}", bucket, name),
        );
    };

    if !media {
        return Json(resource(&bucket, &name, object)).into_response();
    }

    match range {
        None => (StatusCode::OK, object.data.clone()).into_response(),
        Some(range) => match parse_range(&range, object.data.len()) {
            Ok((start, end)) => (
                StatusCode::PARTIAL_CONTENT,
                object.data[start..end].to_vec(),
            )
                .into_response(),
            Err(()) => error(
                StatusCode::RANGE_NOT_SATISFIABLE,
                "The requested range cannot be satisfied.",
            ),
        },
    }
}

async fn upload_object(
    State(inner): State<Shared>,
    Path(bucket): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let mut inner = inner.lock().unwrap();
    if query.get("uploadType").map(String::as_str) != Some("media") {
        return error(StatusCode::BAD_REQUEST, "Unsupported upload type");
    }
    let Some(name) = query.get("name").cloned() else {
        return error(StatusCode::BAD_REQUEST, "Required parameter: name");
    };
    let Some(objects) = inner.buckets.get_mut(&bucket) else {
        return error(StatusCode::NOT_FOUND, "The specified bucket does not exist.");
    };

    let created = objects
        .get(&name)
        .map(|o| o.created.clone())
        .unwrap_or_else(now);
    let object = StoredObject {
        data: body.to_vec(),
        created,
        updated: now(),
    };
    let value = resource(&bucket, &name, &object);
    objects.insert(name, object);
    Json(value).into_response()
}

async fn copy_object(
    State(inner): State<Shared>,
    Path((bucket, name, dst_bucket, dst_name)): Path<(String, String, String, String)>,
) -> Response {
    let mut inner = inner.lock().unwrap();
    let Some(source) = inner
        .buckets
        .get(&bucket)
        .and_then(|objects| objects.get(&name))
        .cloned()
    else {
        return error(
            StatusCode::NOT_FOUND,
            &format!("No such object: {}/{}", bucket, name),
        );
    };
    let Some(objects) = inner.buckets.get_mut(&dst_bucket) else {
        return error(StatusCode::NOT_FOUND, "The specified bucket does not exist.");
    };

    let object = StoredObject {
        data: source.data,
        created: now(),
        updated: now(),
    };
    let value = resource(&dst_bucket, &dst_name, &object);
    objects.insert(dst_name, object);
    Json(value).into_response()
}

async fn delete_object(
    State(inner): State<Shared>,
    Path((bucket, name)): Path<(String, String)>,
) -> Response {
    let mut inner = inner.lock().unwrap();
    inner.delete_calls += 1;
    match inner
        .buckets
        .get_mut(&bucket)
        .and_then(|objects| objects.remove(&name))
    {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => error(
            StatusCode::NOT_FOUND,
            &format!("No such object: {}/{}", bucket, name),
        ),
    }
}
