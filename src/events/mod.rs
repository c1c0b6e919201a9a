//! Analytics events: the wire model, the builder that stamps shared contextual metadata, and the
//! queued dispatcher that ships batches to the ingestion endpoint.

mod builder;
mod dispatcher;
mod event;

pub use builder::{AmbientSource, EventBuilder, NoAmbient};
pub use dispatcher::{AnonymousIdSource, EventDispatcher, EventDispatcherConfig};
pub use event::{
    BatchEvent, ComponentViewProperties, Event, EventContext, PageProperties,
    UniversalEventProperties,
};
