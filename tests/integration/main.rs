//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one subsystem against
//! the mock adapters in `mocks`. All tests run on the host with no real
//! hardware required.

mod console_tests;
mod maint_controller_tests;
mod mocks;
mod transport_tests;
