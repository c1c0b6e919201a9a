//! Content-variant resolution: the entry/experience wire model and the pure
//! [`resolve`] function that maps a baseline entry plus the visitor's selection set to the entry
//! to render.

mod models;
mod resolve;

pub use models::{
    AudienceRef, Entry, EntryRef, ExperienceComponent, ExperienceConfig, ExperienceEntry,
    ExperienceType, InlineValue, InlineValueType, TryParse, PERSONALIZATION_META_FIELD,
};
pub use resolve::{resolve, Resolution};
