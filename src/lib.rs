//! # churnflow - guided customer-churn modelling
//!
//! churnflow walks a tabular customer dataset through six ordered steps:
//! load, visualize, encode, split, train and predict. Every step reads the
//! output of earlier ones from a [`workflow::Session`], which refuses to run a
//! step whose inputs are missing or out of date.
//!
//! ## Quick Start
//!
//! ```no_run
//! use churnflow::data::SplitOptions;
//! use churnflow::model::{ModelStore, TrainOptions};
//! use churnflow::workflow::Session;
//! use std::collections::BTreeMap;
//! use std::path::Path;
//!
//! # fn example() -> churnflow::error::Result<()> {
//! let mut session = Session::with_model_store(ModelStore::new("models"));
//! session.load(Path::new("data/Churn_Modelling.csv"))?;
//! session.encode(&["Geography", "Gender"], true)?;
//! session.split(&SplitOptions::new("Exited"))?;
//!
//! let report = session.train(&TrainOptions::default())?;
//! println!("accuracy {:.3}", report.metrics.accuracy);
//!
//! let features = report.model.feature_names.clone();
//! let customer: BTreeMap<String, f64> = features.into_iter().map(|f| (f, 0.0)).collect();
//! println!("{}", session.predict(&customer, 5)?.message());
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`data`]: loading, column summaries, one-hot encoding, stratified split
//! - [`model`]: logistic regression training, metrics, scoring, persistence
//! - [`workflow`]: the session context, stage graph and history
//! - [`config`]: workflow defaults read from a JSON file
//! - [`error`]: the [`error::ChurnError`] type
//! - [`logging`]: `tracing` subscriber setup for the binary
//!
//! ## Errors
//!
//! Library operations return [`error::Result`]. Running a step too early is a
//! [`error::ChurnError::Precondition`]; running it on outdated inputs is a
//! [`error::ChurnError::Stale`]. Neither panics, and a failed step leaves the
//! session as it was.

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod model;
pub mod workflow;
