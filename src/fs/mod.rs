// src/fs/mod.rs

//! File system access for the deployment engine
//!
//! - [`local`] maps resolved directory and file references onto local
//!   paths rooted at known folders.
//! - [`staging`] manages the content-addressed staging area for
//!   downloaded packages.
//! - [`temp`] manages temporary extraction directories for archive
//!   packages.

pub mod local;
pub mod staging;
pub mod temp;
