//! 书库封面缓存
//!
//! 封面从 EPUB 元数据中按需提取并缩放，以 data URL 形式缓存在内存里，按书籍 id 索引。
//! 缓存只在书库视图挂载期间有效，卸载时全部失效，不会写回书籍记录。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use futures::future::join_all;
use image::codecs::jpeg::JpegEncoder;
use moka::future::Cache as MokaCache;
use tracing::{debug, warn};

use crate::formats::epub::extract_cover;
use crate::formats::BookFormat;
use crate::models::BookRecord;

const COVER_WIDTH: u32 = 100;
const COVER_HEIGHT: u32 = 150;
const COVER_JPEG_QUALITY: u8 = 80;
const DEFAULT_MAX_COVERS: u64 = 256;
const DEFAULT_COVER_TIME_TO_IDLE_SECS: u64 = 30 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cover {
    /// data URL
    Image(String),
    /// 无封面，显示占位图
    Placeholder,
}

impl Cover {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Cover::Placeholder)
    }
}

pub struct CoverCache {
    cache: MokaCache<i64, Cover>,
    mounted: bool,
}

impl CoverCache {
    pub fn new() -> Self {
        Self::with_limits(
            DEFAULT_MAX_COVERS,
            Duration::from_secs(DEFAULT_COVER_TIME_TO_IDLE_SECS),
        )
    }

    pub fn with_limits(max_covers: u64, time_to_idle: Duration) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(max_covers)
            .time_to_idle(time_to_idle)
            .build();
        Self {
            cache,
            mounted: false,
        }
    }

    /// 书库视图挂载，开始缓存封面
    pub fn mount(&mut self) {
        self.mounted = true;
    }

    /// 书库视图卸载，释放全部封面
    pub fn unmount(&mut self) {
        if self.mounted {
            debug!(entries = self.cache.entry_count(), "Releasing cover cache");
        }
        self.cache.invalidate_all();
        self.mounted = false;
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub async fn cached(&self, id: i64) -> Option<Cover> {
        self.cache.get(&id).await
    }

    pub async fn cover_for(&self, record: &BookRecord) -> Cover {
        if record.book_type != BookFormat::Epub {
            return Cover::Placeholder;
        }
        let bytes = record.content.shared_bytes();
        match record.id {
            Some(id) if self.mounted => self.cache.get_with(id, derive_cover(bytes)).await,
            _ => derive_cover(bytes).await,
        }
    }

    /// 并发获取一批书籍的封面
    pub async fn covers_for(&self, books: &[BookRecord]) -> HashMap<i64, Cover> {
        let covers = join_all(books.iter().map(|book| self.cover_for(book))).await;
        books
            .iter()
            .zip(covers)
            .filter_map(|(book, cover)| book.id.map(|id| (id, cover)))
            .collect()
    }
}

impl Default for CoverCache {
    fn default() -> Self {
        Self::new()
    }
}

async fn derive_cover(bytes: Arc<[u8]>) -> Cover {
    let result = tokio::task::spawn_blocking(move || {
        let (data, mime) = extract_cover(&bytes)?;
        Some(encode_cover(&data, &mime))
    })
    .await;
    match result {
        Ok(Some(url)) => Cover::Image(url),
        Ok(None) => Cover::Placeholder,
        Err(err) => {
            warn!("Cover extraction task failed: {err}");
            Cover::Placeholder
        }
    }
}

/// 缩放为缩略图并编码为 JPEG data URL；无法解码时保留原图
fn encode_cover(data: &[u8], mime: &str) -> String {
    match thumbnail_jpeg(data) {
        Ok(jpeg) => format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg)),
        Err(err) => {
            debug!(mime, "Cover thumbnail failed, keeping original image: {err}");
            format!("data:{};base64,{}", mime, STANDARD.encode(data))
        }
    }
}

fn thumbnail_jpeg(data: &[u8]) -> image::ImageResult<Vec<u8>> {
    let rgb = image::load_from_memory(data)?
        .thumbnail(COVER_WIDTH, COVER_HEIGHT)
        .to_rgb8();
    let mut buffer = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, COVER_JPEG_QUALITY);
        encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)?;
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, image::ImageOutputFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_encode_cover_thumbnails_to_jpeg() {
        let url = encode_cover(&png_bytes(400, 600), "image/png");
        assert!(url.starts_with("data:image/jpeg;base64,"));
        let encoded = url.trim_start_matches("data:image/jpeg;base64,");
        let decoded = STANDARD.decode(encoded).unwrap();
        let thumb = image::load_from_memory(&decoded).unwrap();
        assert!(thumb.width() <= COVER_WIDTH && thumb.height() <= COVER_HEIGHT);
    }

    #[test]
    fn test_encode_cover_keeps_undecodable_image() {
        let url = encode_cover(b"<svg/>", "image/svg+xml");
        assert_eq!(url, format!("data:image/svg+xml;base64,{}", STANDARD.encode(b"<svg/>")));
    }

    #[tokio::test]
    async fn test_text_books_use_placeholder() {
        let cache = CoverCache::new();
        let mut record = BookRecord::text("a.txt", "hello");
        record.id = Some(1);
        assert!(cache.cover_for(&record).await.is_placeholder());
    }

    #[tokio::test]
    async fn test_cache_lifetime_follows_mount() {
        let mut cache = CoverCache::new();
        let mut record = BookRecord::epub("broken.epub", vec![0u8; 8]);
        record.id = Some(7);

        cache.mount();
        let covers = cache.covers_for(std::slice::from_ref(&record)).await;
        assert_eq!(covers.get(&7), Some(&Cover::Placeholder));
        assert_eq!(cache.cached(7).await, Some(Cover::Placeholder));

        cache.unmount();
        assert!(!cache.is_mounted());
        assert_eq!(cache.cached(7).await, None);

        // 未挂载时不缓存
        cache.cover_for(&record).await;
        assert_eq!(cache.cached(7).await, None);
    }
}
