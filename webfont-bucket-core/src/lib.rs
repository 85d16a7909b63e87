#![doc = "webfont-bucket-core: core pipeline logic for webfont-bucket."]

//! This crate holds everything that happens between "an SVG landed in a bucket"
//! and "the icon font for its folder is published next to it": trigger decoding,
//! the object store and font generator contracts, the concurrent batch
//! download/upload steps, icon map extraction and scratch cleanup.
//!
//! # Usage
//! Build a [`pipeline::Pipeline`] from a [`config::PipelineConfig`], an
//! [`contract::ObjectStore`] and a [`contract::FontSynthesizer`], then feed it
//! the S3 notification with [`pipeline::Pipeline::run`].

pub mod batch;
pub mod config;
pub mod contract;
pub mod download;
pub mod error;
pub mod fs_store;
pub mod icon_map;
pub mod pipeline;
pub mod scratch;
pub mod synthesize;
pub mod trigger;
pub mod upload;
