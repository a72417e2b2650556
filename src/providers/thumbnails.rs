//! Background thumbnail downloads for search hits.
//!
//! A [`ThumbnailPool`] fetches every hit's thumbnail with at most
//! `max_concurrent` requests in flight and pushes each finished download onto
//! an unbounded queue. The consumer drains the queue whenever it refreshes
//! ([`ThumbnailPool::try_drain`]) or awaits items one at a time
//! ([`ThumbnailPool::next`]). Results arrive in completion order; `index`
//! maps each one back to its hit.
//!
//! [`ThumbnailPool::cancel`] aborts the download task and drops the queue
//! without waiting for requests already in flight.

use super::{http, CoverHit};
use crate::error::CoverError;
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use reqwest::Client;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One finished thumbnail download.
#[derive(Debug)]
pub struct Thumbnail {
    /// Position of `hit` in the list the pool was started with.
    pub index: usize,
    pub hit: CoverHit,
    /// Image scaled to fit the configured thumbnail box.
    pub image: Result<DynamicImage, CoverError>,
}

pub struct ThumbnailPool {
    receiver: Option<UnboundedReceiver<Thumbnail>>,
    task: Option<JoinHandle<()>>,
    total: usize,
    received: usize,
}

impl ThumbnailPool {
    /// Start downloading `hits` in the background. Must be called from within
    /// a Tokio runtime.
    pub fn start(hits: Vec<CoverHit>, client: Client, size: [u32; 2], max_concurrent: usize) -> Self {
        let total = hits.len();
        let (tx, rx) = mpsc::unbounded_channel();
        let concurrency = max_concurrent.max(1);
        debug!("Fetching {total} thumbnail(s), {concurrency} at a time");

        let task = tokio::spawn(async move {
            stream::iter(hits.into_iter().enumerate())
                .map(|(index, hit)| {
                    let client = client.clone();
                    async move {
                        let image = fetch_thumbnail(&client, &hit.thumbnail_url, size).await;
                        if let Err(e) = &image {
                            warn!("Thumbnail {} failed: {e}", index + 1);
                        }
                        Thumbnail { index, hit, image }
                    }
                })
                .buffer_unordered(concurrency)
                .for_each(|thumbnail| {
                    // The receiver is gone once the pool is cancelled.
                    let _ = tx.send(thumbnail);
                    futures::future::ready(())
                })
                .await;
        });

        Self {
            receiver: Some(rx),
            task: Some(task),
            total,
            received: 0,
        }
    }

    /// Every thumbnail finished since the last call. Never blocks.
    pub fn try_drain(&mut self) -> Vec<Thumbnail> {
        let mut drained = Vec::new();
        let Some(rx) = self.receiver.as_mut() else {
            return drained;
        };
        loop {
            match rx.try_recv() {
                Ok(thumbnail) => drained.push(thumbnail),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        self.received += drained.len();
        drained
    }

    /// Wait for the next thumbnail; `None` once all have been delivered or
    /// the pool was cancelled.
    pub async fn next(&mut self) -> Option<Thumbnail> {
        let thumbnail = self.receiver.as_mut()?.recv().await;
        if thumbnail.is_some() {
            self.received += 1;
        }
        thumbnail
    }

    /// Abort outstanding downloads and discard anything queued.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if self.receiver.take().is_some() {
            debug!(
                "Thumbnail pool cancelled after {}/{} result(s)",
                self.received, self.total
            );
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Thumbnails not yet handed to the consumer. Zero after cancellation.
    pub fn pending(&self) -> usize {
        if self.receiver.is_none() {
            return 0;
        }
        self.total - self.received
    }
}

impl Drop for ThumbnailPool {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn fetch_thumbnail(
    client: &Client,
    url: &str,
    [width, height]: [u32; 2],
) -> Result<DynamicImage, CoverError> {
    let bytes = http::fetch_bytes(client, url).await?;
    let origin = url.to_string();
    tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes)
            .map(|img| img.thumbnail(width, height))
            .map_err(|e| CoverError::ImageDecode {
                origin,
                detail: e.to_string(),
            })
    })
    .await
    .map_err(|e| CoverError::Internal(format!("thumbnail task panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    /// Serve `body` as `image/png` to every connection.
    async fn serve(body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let body = body.clone();
                tokio::spawn(async move {
                    let mut request = [0u8; 1024];
                    let _ = socket.read(&mut request).await;
                    let head = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn hit(n: usize, url: String) -> CoverHit {
        CoverHit {
            title: format!("Book {n}"),
            author: "Unknown".into(),
            thumbnail_url: url.clone(),
            full_url: url,
            source: "Test".into(),
        }
    }

    #[tokio::test]
    async fn downloads_and_scales_every_hit() {
        let base = serve(png(300, 400)).await;
        let hits: Vec<CoverHit> = (0..5).map(|n| hit(n, format!("{base}/{n}.png"))).collect();
        let mut pool = ThumbnailPool::start(hits, http::client(5).unwrap(), [150, 200], 2);
        assert_eq!(pool.total(), 5);

        let mut seen = Vec::new();
        while let Some(thumbnail) = pool.next().await {
            let image = thumbnail.image.unwrap();
            assert_eq!((image.width(), image.height()), (150, 200));
            assert_eq!(thumbnail.hit.title, format!("Book {}", thumbnail.index));
            seen.push(thumbnail.index);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(pool.pending(), 0);
    }

    #[tokio::test]
    async fn failed_download_is_reported_per_hit() {
        let hits = vec![hit(0, "http://127.0.0.1:1/none.png".into())];
        let mut pool = ThumbnailPool::start(hits, http::client(5).unwrap(), [150, 200], 4);
        let thumbnail = pool.next().await.unwrap();
        assert!(matches!(thumbnail.image, Err(CoverError::DownloadFailed { .. })));
        assert!(pool.next().await.is_none());
    }

    #[tokio::test]
    async fn cancel_discards_queue() {
        let base = serve(png(10, 10)).await;
        let hits: Vec<CoverHit> = (0..3).map(|n| hit(n, format!("{base}/{n}.png"))).collect();
        let mut pool = ThumbnailPool::start(hits, http::client(5).unwrap(), [150, 200], 1);
        pool.cancel();
        assert!(pool.try_drain().is_empty());
        assert!(pool.next().await.is_none());
        assert_eq!(pool.pending(), 0);
    }

    #[tokio::test]
    async fn empty_pool_finishes_immediately() {
        let mut pool = ThumbnailPool::start(Vec::new(), http::client(5).unwrap(), [150, 200], 4);
        assert!(pool.next().await.is_none());
        assert!(pool.try_drain().is_empty());
    }
}
