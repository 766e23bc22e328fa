//! Integration tests for snapshot building, live state, reconciliation, and sync

mod apply_convergence;
mod http_sync;
mod live_state;
mod reconcile_properties;
mod support;
