//! Default request headers for image fetches.
//!
//! Image CDNs behind search engines commonly refuse tool-identifying agents,
//! so fetches present themselves as a desktop browser loading an image.

/// Browser User-Agent sent with every image request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Accept header preferring raster image formats.
pub const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// Accept-Language header.
pub const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";
