#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use photoscan_3d as k3d;

#[doc(inline)]
pub use photoscan_mask as mask;

#[doc(inline)]
pub use photoscan_registration as registration;
