// Library root for the Last Man Standing pick engine.
//
// Everything in this crate is synchronous and free of I/O: callers feed in
// fixtures, teams and predictions, and re-invoke the builders whenever the
// underlying data changes.

pub mod deadline;
pub mod fixture_index;
pub mod gate;
pub mod history;
pub mod model;
pub mod planner;
pub mod schedule;
pub mod stats;
