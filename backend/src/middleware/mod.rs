//! Request middleware.
//!
//! Purpose: request lifecycle concerns that sit outside individual
//! handlers, namely trace identifiers and visit logging.

pub mod trace;
pub mod visit_log;

pub use trace::Trace;
pub use visit_log::VisitLog;
