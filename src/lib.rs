//! Activity correlation and flow graphs for AI-assistant memory.
//!
//! `loci-flow` takes discrete activity events (edits, navigation, searches,
//! conversation turns), discovers how they relate, and assembles them into a
//! directed "flow" graph that can be analyzed and exported for later recall.
//!
//! | Strategy | Evidence | Default strength |
//! |----------|----------|------------------|
//! | **Temporal** | Runs of events inside a 5 minute window | `run / 10` |
//! | **Causal** | Adjacent events with the same type or source | 0.6 – 1.0 by gap |
//! | **Semantic** | Token overlap of event content | Jaccard similarity |
//! | **Contextual** | Shared file, project, namespace, class, method | `base + size / scale` |
//!
//! # Architecture
//!
//! - **Engine**: pure, synchronous functions: detect, build, analyze, export
//! - **Storage**: SQLite tables for events, relations and flows behind narrow traits
//! - **Export**: JSON, Graphviz DOT, and Mermaid text
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite database initialization, schema, and migrations
//! - [`error`]: Engine error taxonomy
//! - [`flow`]: Correlation detection, graph building, analysis, and export
//! - [`store`]: Event, relation, and flow repositories

pub mod config;
pub mod db;
pub mod error;
pub mod flow;
pub mod store;
