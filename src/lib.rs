//! Headless SPA content API.
//!
//! A request runs through a [`application::pipeline::Pipeline`] of named
//! phases that resolve the domain, culture, site and content of a URL and
//! shape them into a JSON data model, fronted by a short-lived micro-cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
