pub mod geocode;
pub mod headlines;
pub mod metadata;
pub mod sync;
pub mod xmp;
