//! Weekly class timetable fed by scanned or pasted course payloads.
//!
//! Raw text goes through [`parser::extract_payload`] (or, failing that,
//! [`schedule::reconcile_csv`]), then [`schedule::reconcile`] turns the untrusted entries into a fresh
//! [`schedule::ScheduleMap`], which an [`import::ImportSession`] previews and
//! commits to a [`store::ScheduleStore`].

pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod import;
pub mod parser;
pub mod schedule;
pub mod store;
pub mod web;

pub use error::{ImportError, StoreError};
