//! Response caching middleware.
//!
//! # Responsibilities
//! - Serve repeated GETs from memory instead of the backend pool
//! - Bound memory with LRU eviction and per-entry TTL expiry
//!
//! # Design Decisions
//! - Only GET responses with 2xx status are cached
//! - The fingerprint covers the URL plus the headers that shape the body
//!   (Accept, Accept-Encoding)
//! - Map and recency list mutate together under one mutex; the list is an
//!   index-linked slab rather than a pointer-chased structure
//! - Expired entries are removed lazily, on the access that finds them

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{response::Parts, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::config::CacheConfig;

/// Sentinel index for list ends.
const NIL: usize = usize::MAX;

/// A captured upstream response.
#[derive(Debug, Clone)]
struct CacheEntry {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// A slot in the recency list. `prev`/`next` are slab indices.
#[derive(Debug)]
struct Node {
    key: u64,
    entry: CacheEntry,
    prev: usize,
    next: usize,
}

/// Fingerprint map plus doubly-linked recency list over a slab of nodes.
/// Most recently used at `head`, eviction candidate at `tail`. Map keys
/// and linked nodes stay in bijection: every mutation below updates both.
#[derive(Debug, Default)]
struct CacheState {
    map: HashMap<u64, usize>,
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl CacheState {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            NIL => self.head = next,
            p => self.nodes[p].next = next,
        }
        match next {
            NIL => self.tail = prev,
            n => self.nodes[n].prev = prev,
        }
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        match self.head {
            NIL => self.tail = idx,
            h => self.nodes[h].prev = idx,
        }
        self.head = idx;
    }

    fn touch(&mut self, idx: usize) {
        self.unlink(idx);
        self.push_front(idx);
    }

    /// Drop a node from both structures and recycle its slot. The entry
    /// payload is cleared so the slab does not pin evicted bodies.
    fn remove(&mut self, idx: usize) {
        self.unlink(idx);
        self.map.remove(&self.nodes[idx].key);
        self.nodes[idx].entry.body = Bytes::new();
        self.nodes[idx].entry.headers = HeaderMap::new();
        self.free.push(idx);
    }

    fn insert(&mut self, key: u64, entry: CacheEntry) {
        if let Some(&idx) = self.map.get(&key) {
            self.nodes[idx].entry = entry;
            self.touch(idx);
            return;
        }

        let node = Node {
            key,
            entry,
            prev: NIL,
            next: NIL,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.map.insert(key, idx);
        self.push_front(idx);
    }

    fn evict_tail(&mut self) {
        if self.tail != NIL {
            self.remove(self.tail);
        }
    }
}

/// LRU + TTL response cache shared by the middleware.
pub struct ResponseCache {
    state: Mutex<CacheState>,
    max_size: usize,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            state: Mutex::new(CacheState::new()),
            max_size: config.max_size,
            ttl: config.ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("cache mutex poisoned").map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, key: u64) -> Option<CacheEntry> {
        let mut state = self.state.lock().expect("cache mutex poisoned");
        let idx = *state.map.get(&key)?;
        if state.nodes[idx].entry.is_expired(Instant::now()) {
            state.remove(idx);
            return None;
        }
        state.touch(idx);
        Some(state.nodes[idx].entry.clone())
    }

    fn put(&self, key: u64, status: StatusCode, headers: HeaderMap, body: Bytes) {
        let entry = CacheEntry {
            status,
            headers,
            body,
            expires_at: Instant::now() + self.ttl,
        };
        let mut state = self.state.lock().expect("cache mutex poisoned");
        state.insert(key, entry);
        while state.map.len() > self.max_size {
            state.evict_tail();
        }
    }
}

/// Cache key over the request URL and the content-negotiation headers.
fn fingerprint(request: &Request) -> u64 {
    let mut hasher = DefaultHasher::new();
    request.uri().to_string().hash(&mut hasher);
    header_str(request, "accept").hash(&mut hasher);
    header_str(request, "accept-encoding").hash(&mut hasher);
    hasher.finish()
}

fn header_str<'a>(request: &'a Request, name: &str) -> &'a str {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn hit_response(entry: CacheEntry) -> Response {
    let mut response = Response::new(Body::from(entry.body));
    *response.status_mut() = entry.status;
    *response.headers_mut() = entry.headers;
    response
        .headers_mut()
        .insert("x-cache-status", HeaderValue::from_static("HIT"));
    response
}

/// Middleware function: replay fresh entries, otherwise buffer the
/// downstream response and store it when cacheable.
pub async fn cache(
    State(cache): State<Arc<ResponseCache>>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = fingerprint(&request);
    if let Some(entry) = cache.get(key) {
        return hit_response(entry);
    }

    let response = next.run(request).await;
    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(error = %err, "Failed to read upstream response body");
            let mut response = Response::new(Body::from("Backend server error"));
            *response.status_mut() = StatusCode::BAD_GATEWAY;
            return response;
        }
    };

    if parts.status.is_success() {
        cache.put(key, parts.status, parts.headers.clone(), bytes.clone());
    }

    rebuild(parts, bytes)
}

fn rebuild(parts: Parts, bytes: Bytes) -> Response {
    Response::from_parts(parts, Body::from(bytes))
}
