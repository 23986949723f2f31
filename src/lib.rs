//! Climate chamber controller library.
//!
//! Exposes the control kernel, its ports and the host adapters for the
//! simulator binary and for integration testing.  Nothing in the kernel
//! touches hardware directly; see [`app::ports`].

#![deny(unused_must_use)]

pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod fsm;
pub mod history;
pub mod storage;

pub mod adapters;
pub mod control;
pub mod sensors;
pub mod web;
