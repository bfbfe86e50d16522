//! Fetches SREF ensemble subsets from the NOMADS grib filter and converts
//! them to NetCDF with `wgrib2`.
//!
//! [`plan::plan`] expands the core x perturbation grid into an ordered list
//! of [`plan::FetchTask`]s; [`app::App`] runs them one at a time, skipping
//! any task whose converted file is already present.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod nomads;
pub mod output;
pub mod plan;
pub mod wgrib2;
pub mod workspace;
