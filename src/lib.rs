//! # lexrag
//!
//! Retrieval-augmented question answering over legal documents.
//!
//! PDFs and text files are extracted, split into boundary-preserving
//! chunks, embedded and stored in a SQLite-backed vector store. Questions
//! are embedded the same way, the nearest chunks become the grounding
//! context, and a language model answers from that context.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Extract    │──▶│   Pipeline   │──▶│  SQLite  │
//! │  PDF / txt  │   │ Chunk+Embed  │   │ vectors  │
//! └─────────────┘   └──────────────┘   └────┬─────┘
//!                                           │
//!                       ┌───────────────────┤
//!                       ▼                   ▼
//!                  ┌──────────┐       ┌──────────┐
//!                  │   CLI    │       │   HTTP   │
//!                  │ (lexrag) │       │  (axum)  │
//!                  └──────────┘       └──────────┘
//! ```
//!
//! The chunker, pipeline, retrieval and capability traits live in
//! [`lexrag_core`]; this crate provides the concrete clients, the store and
//! the transports.
//!
//! ## Quick Start
//!
//! ```bash
//! lexrag init                          # create database and collection
//! lexrag ingest-dir ./contracts        # index every PDF in a directory
//! lexrag query "Who may terminate the lease?"
//! lexrag serve                         # start HTTP server on :4000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`app`] | Process-wide store and clients |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`http`] | JSON HTTP calls with retry |
//! | [`embedding`] | Embedding clients |
//! | [`generation`] | Generation clients |
//! | [`extract`] | PDF and text extraction |
//! | [`ingest`] | File, upload and directory ingestion |
//! | [`query`] | CLI query output |
//! | [`server`] | HTTP server |

pub mod app;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod http;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod query;
pub mod server;
pub mod sqlite_store;
