//! Integration tests for treesync

mod integration;
