use kanji_recognizer::InferenceEngine;

pub const DEFAULT_TOP_N: usize = 6;

/// State shared by every request thread. Built once at startup and never
/// mutated, so handlers borrow it through an `Arc` without locking.
#[derive(Debug)]
pub struct AppContext {
    pub engine: InferenceEngine,
    /// Ranks returned per request, never more than the model has classes.
    pub top_n: usize,
}

impl AppContext {
    pub fn new(engine: InferenceEngine, requested_top_n: usize) -> AppContext {
        let classes = engine.class_index().len();
        let top_n = requested_top_n.min(classes);
        if top_n < requested_top_n {
            tracing::warn!(requested_top_n, classes, "model has fewer classes than requested ranks");
        }
        AppContext { engine, top_n }
    }
}
