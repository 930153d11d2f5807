//! Context engine module - turns stored memories into prompt context

pub mod context_builder;

pub use context_builder::{
    ContextWindow, CURRENT_SESSION_LIMIT, PAST_FETCH_LIMIT, PAST_KEEP_LIMIT,
};
