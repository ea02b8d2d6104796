mod base;
mod connection;
mod importer;
mod profile;

pub use base::*;
pub use connection::*;
pub use importer::*;
pub use profile::*;
