//! Cache keys for transcoded outputs.
//!
//! A key is derived from three strings: a deployment prefix, the info hash of
//! the source, and the origin path inside it. Identical inputs always give the
//! same key, so separate processes agree on where an output lives.
//!
//! ```rust
//! use cachekey::{CacheKey, KeyInputs};
//!
//! let inputs = KeyInputs::new("cache-", "08ada5a7a6183aae1e09d831df6748d566095a10", "/Sintel/Sintel.mp4");
//! let key = inputs.key();
//! assert_eq!(key, CacheKey::derive("cache-", "08ada5a7a6183aae1e09d831df6748d566095a10", "/Sintel/Sintel.mp4"));
//! assert_eq!(key.as_str().len(), 40);
//! ```

pub mod key;

pub use key::{CacheKey, HashError, KeyInputs, KEY_HEX_LEN};
