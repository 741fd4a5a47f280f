pub mod bot;
pub mod config;
pub mod error;
pub mod format;
pub mod fuzzy_search;
pub mod kinopoisk;
pub mod searcher;
pub mod store;
pub mod types;
pub mod vk_video;

#[cfg(test)]
mod test_support;

pub use bot::run;
