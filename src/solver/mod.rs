//! The four Difference Solvers from spec.md §4.4, all grounded on
//! `uberdot/differencesolver.py`.

pub mod link_diff;
pub mod remove_profile;
pub mod state_diff;
pub mod state_fs;
pub mod uninstall;
pub mod update;
