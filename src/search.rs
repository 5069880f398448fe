//! Background search over the indexed rows.
//!
//! A search is a follow over the growing row count rather than a one-shot scan:
//! it keeps running, testing new rows as they are indexed, until it is stopped.

pub(crate) mod worker;

pub(crate) use worker::run_search;
