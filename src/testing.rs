// src/testing.rs

//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::error::{AppError, Result};
use crate::models::Member;
use crate::services::{Page, PageFetcher};
use crate::storage::SnapshotStore;

/// Serves a fixed sequence of pages and counts fetches.
///
/// Pages past the end of the script are empty.
pub struct ScriptedFetcher {
    pages: Vec<Page>,
    fail_on: Option<u32>,
    calls: AtomicU32,
}

impl ScriptedFetcher {
    pub fn new(pages: Vec<Page>) -> Self {
        Self {
            pages,
            fail_on: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Pages of generated members with the given sizes.
    pub fn with_sizes(sizes: &[usize]) -> Self {
        let pages = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| Self::page(i as u32 + 1, size))
            .collect();
        Self::new(pages)
    }

    /// Roster served as pages of `page_size` members.
    pub fn with_roster(members: &[Member], page_size: usize) -> Self {
        let pages = members
            .chunks(page_size)
            .map(|chunk| Page::new(chunk.to_vec()))
            .collect();
        Self::new(pages)
    }

    pub fn page(number: u32, size: usize) -> Page {
        Page::new(
            (0..size)
                .map(|i| Member::new(format!("member-{number}-{i}"), i as u64, 1))
                .collect(),
        )
    }

    /// Make the fetch of `page` fail.
    pub fn failing_on(mut self, page: u32) -> Self {
        self.fail_on = Some(page);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_page(&self, page: u32) -> Result<Page> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == Some(page) {
            return Err(AppError::parse("connection reset by peer"));
        }
        Ok(self
            .pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default())
    }
}

/// Snapshot store backed by a map, with injectable failures.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    broken_keys: HashSet<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, key: &str, bytes: &[u8]) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        self
    }

    /// Make every load and store of `key` fail.
    pub fn breaking(mut self, key: &str) -> Self {
        self.broken_keys.insert(key.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl SnapshotStore for MemoryStorage {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.broken_keys.contains(key) {
            return Err(AppError::store(format!("{key}: service unavailable")));
        }
        Ok(self.get(key))
    }

    async fn store(&self, key: &str, bytes: &[u8]) -> Result<()> {
        if self.broken_keys.contains(key) {
            return Err(AppError::store(format!("{key}: access denied")));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}

/// Canned HTTP response for [`serve`]: request target, status, body.
pub type Route = (&'static str, u16, &'static str);

/// Serve canned responses on a loopback port and return its base URL.
///
/// Requests are matched on the exact target (path and query); anything
/// else gets a 404.
pub async fn serve(routes: Vec<Route>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = routes.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                }

                let head = String::from_utf8_lossy(&request);
                let target = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = routes
                    .iter()
                    .find(|(path, _, _)| *path == target)
                    .map(|(_, status, body)| (*status, *body))
                    .unwrap_or((404, "<html><body>Not Found</body></html>"));

                let response = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}
