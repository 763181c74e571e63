//! Decorations and the event stream that describes them to the builder.

mod consumer;
mod event;
mod static_set;
mod types;

pub use consumer::EventConsumer;
pub use event::{DecorationEvent, DecorationSource, EventRecorder, SpanSink};
pub use static_set::{DecorationSet, LineRange, MarkRange, ReplaceRange};
pub use types::{
    Attrs, Decoration, DecorationOrigin, LineDecoration, MarkDecoration, PointDecoration, Widget,
    combine_attrs,
};
