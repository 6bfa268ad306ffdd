//! # Code Scribe
//!
//! Source-code ingestion and LLM documentation pipeline.
//!
//! Code Scribe pulls a codebase from a local directory, a Git repository or
//! an S3 bucket, keeps only source files, groups them by detected language,
//! extracts structural elements, slices the files into fixed-width chunks,
//! and asks a text-generation service to document every chunk, optionally
//! rolling the results up into one hierarchical overview.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌────────────┐   ┌──────────┐   ┌──────────┐
//! │  Sources    │──▶│ Classifier │──▶│ Language │──▶│ Organize │
//! │ FS/Git/S3   │   │            │   │ Detector │   │          │
//! └─────────────┘   └────────────┘   └──────────┘   └────┬─────┘
//!                                                        │
//!                        ┌───────────────┬───────────────┤
//!                        ▼               ▼               ▼
//!                   ┌──────────┐   ┌──────────┐   ┌──────────────┐
//!                   │ Elements │   │ Chunker  │──▶│ Synthesizer  │
//!                   └──────────┘   └──────────┘   │ (+ context)  │
//!                                                 └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! scribe organize               # classify and group files
//! scribe metadata               # write file_metadata.json
//! scribe structure              # write file_structure.json
//! scribe analyze src/app.py     # print extracted elements
//! scribe document --hierarchical
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`classify`] | Source / non-source file classification |
//! | [`connector_fs`] | Filesystem source |
//! | [`connector_git`] | Git repository source |
//! | [`connector_s3`] | Amazon S3 source |
//! | [`language`] | Language detection |
//! | [`organize`] | Grouping by language |
//! | [`elements`] | Regex element extraction |
//! | [`chunk`] | Fixed-width chunking |
//! | [`metadata`] / [`structure`] | Context stores |
//! | [`context`] | Per-chunk context assembly |
//! | [`generation`] | Text-generation clients and retry |
//! | [`synthesize`] | Documentation synthesis |

pub mod chunk;
pub mod classify;
pub mod config;
pub mod connector_fs;
pub mod connector_git;
pub mod connector_s3;
pub mod context;
pub mod document_cmd;
pub mod elements;
pub mod error;
pub mod generation;
pub mod ingest;
pub mod language;
pub mod logging;
pub mod metadata;
pub mod models;
pub mod organize;
pub mod persist;
pub mod progress;
pub mod report;
pub mod structure;
pub mod synthesize;
