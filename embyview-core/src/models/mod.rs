pub mod display_item;

pub use display_item::{DisplayItem, FileFormat, ImageKind, MediaKind};
