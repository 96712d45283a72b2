//! End-to-end tests through the `Database` API.
//!
//! Each test file covers one scenario, using seeded inputs so that failures
//! reproduce.

#![cfg(test)]

mod helpers;

mod test_alice_knows_bob;
mod test_blob_bit_exactness;
mod test_granularity_equivalence;
mod test_holds_gc;
mod test_literal_interning;
mod test_mode_switch;
mod test_persistence;
mod test_round_trip;
mod test_set_solitary;
