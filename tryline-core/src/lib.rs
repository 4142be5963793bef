//! Tryline Core
//!
//! Core types shared by the Tryline analysis worker.
//!
//! This crate contains:
//! - Domain types: the analysis job, its status and its opaque summary
//! - DTOs: the update bodies written to the shared job table

pub mod domain;
pub mod dto;
