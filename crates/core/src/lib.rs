//! Domain logic for the pinmark annotating proxy.
//!
//! Everything here is free of network and database I/O: the annotation
//! entity and its validation, position fractions, per-request session
//! parameters, the HTML URL rewriter, the injected runtime generator, and
//! the feedback bridge that fronts whichever store the server is wired to.

pub mod annotation;
pub mod error;
pub mod feedback;
pub mod rewrite;
pub mod runtime;
pub mod session;
pub mod types;
