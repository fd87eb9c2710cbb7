//! Route modules for Region OCR Server

pub mod health;
pub mod images;
