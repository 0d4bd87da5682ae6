//! Wire-format tests against reference byte vectors, plus cross-type round trips.

mod serialization;
mod variant;
