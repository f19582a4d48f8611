//! Core types for the sigrelay Signal bridge adapter.
//!
//! This crate defines the data shared between the bridge core and its hosts:
//! backend addresses, normalized events, and the adapter configuration. It
//! contains no networking.

pub mod address;
pub mod config;
pub mod error;
pub mod event;
