//! Wall-clock host.
//!
//! - [`config`]: [`EventLoopConfig`] and its defaults
//! - [`env_config`]: `TRIFUTURE_*` environment overrides and TOML loading
//! - [`event_loop`]: the [`EventLoop`] itself and its [`Remote`] injector
//!
//! ```
//! use trifuture::future::after;
//! use trifuture::runtime::EventLoop;
//! use trifuture::types::{Delay, Outcome};
//!
//! let event_loop = EventLoop::new();
//! let soon = after::<_, ()>(Delay::from_millis(1), 5);
//! assert_eq!(event_loop.block_on(&soon), Some(Outcome::Resolve(5)));
//! ```

pub mod config;
pub mod env_config;
pub mod event_loop;

pub use config::EventLoopConfig;
pub use event_loop::{EventLoop, Remote};
