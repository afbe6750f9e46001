//! End-to-end scenarios across scorer, policy, cache and dispatcher.

mod verification_scenarios;
