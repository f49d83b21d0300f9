//! Jets from simulated collisions and their dijet observables
//!
//! The [producer] turns simulated events into jet records that are
//! stored in a simple tag-based text format. The [analysis] reads the
//! records back and fills histograms of event, jet and dijet
//! observables.
#[cfg(feature = "serde")]
extern crate serde;
extern crate xmltree;

pub mod analysis;
pub mod cluster;
pub mod config;
pub mod data;
pub mod error;
pub mod histogram;
pub mod logging;
pub mod particle;
pub mod producer;
pub mod reader;
pub mod simulator;
pub mod store;
mod tags;
pub mod writer;

pub use data::*;
pub use error::Error;
pub use histogram::{read_histograms, write_histograms, Hist1D};
pub use reader::*;
pub use store::{open_records, RecordSink};
pub use tags::VERSION;
pub use writer::*;

pub type XmlTree = xmltree::Element;
