pub mod engine;
pub mod surface;

pub use engine::{extract_cover, parse_epub, EpubBook, EpubChapter};
pub use surface::EpubSurface;
