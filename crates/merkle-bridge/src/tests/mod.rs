//! Shared test support: fixture addresses and in-memory chains.
