//! Auth-domain identifiers, scope resolution, discovery documents, and credential models.

pub mod challenge;
pub mod client;
pub mod discovery;
pub mod id;
pub mod scope;
pub mod token;

pub use challenge::*;
pub use client::*;
pub use discovery::*;
pub use id::*;
pub use scope::*;
pub use token::*;
