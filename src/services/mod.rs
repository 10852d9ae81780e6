pub mod emby;
pub mod m3u;
pub mod monitor;
pub mod sync;
pub mod workspace;
