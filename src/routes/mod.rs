pub mod accounts;
pub mod emby;
pub mod health;
pub mod monitor;
pub mod playlist;
