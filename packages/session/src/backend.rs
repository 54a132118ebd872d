//! Persistence backend seam
//!
//! A session only needs two calls: fetch a page of segments and apply a
//! change-set. Anything that can answer them (HTTP client, in-memory store)
//! implements [`ScriptBackend`].

use crate::errors::BackendError;
use screenplay_editor::{SaveChangesRequest, SaveChangesResponse, SegmentsPage};
use std::future::Future;

pub trait ScriptBackend: Send + Sync + 'static {
    /// Segments of `script_id` ordered by position, `skip`/`limit` applied
    fn fetch_segments(
        &self,
        script_id: &str,
        skip: usize,
        limit: usize,
    ) -> impl Future<Output = Result<SegmentsPage, BackendError>> + Send;

    /// Apply a change-set. Validation problems come back as
    /// `success == false`, transport problems as errors.
    fn save_changes(
        &self,
        script_id: &str,
        request: &SaveChangesRequest,
    ) -> impl Future<Output = Result<SaveChangesResponse, BackendError>> + Send;
}
