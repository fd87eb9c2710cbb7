//! Region OCR Server Library
//!
//! Box-segmented OCR: crops user-drawn regions out of an uploaded image,
//! binarizes each crop and recognizes its text with Tesseract. The server
//! binary in main.rs wires these modules behind an HTTP endpoint.
//!
//! # Modules
//!
//! - `ocr`: preprocessing, engine boundary and the recognition pipeline
//! - `backend`: forwarding results to the storage backend
//! - `routes`: HTTP handlers

pub mod backend;
pub mod config;
pub mod error;
pub mod ocr;
pub mod routes;
pub mod state;
