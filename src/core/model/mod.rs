//! Statistical track models
//!
//! Each track is summarised by one Gaussian over its feature frames; tracks
//! are compared with a closed-form divergence between Gaussians. Two
//! flavours exist: the packed SCMS model and the full-covariance
//! Mandel/Ellis model.

mod mandel_ellis;
mod neighbors;
mod packed;
mod scms;
mod track;

pub use mandel_ellis::MandelEllisModel;
pub use neighbors::{nearest_neighbors, Candidate, Neighbor, Seed};
pub use packed::{packed_len, PackedSymmetricMatrix};
pub use scms::ScmsModel;
pub use track::{SimilarityModel, TrackModel};
