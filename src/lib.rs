//! The workspace root carries no code of its own — every component lives in
//! `crates/`. This crate exists only to host `tests/`, the end-to-end
//! scenario suite that exercises the whole coordinator rather than one
//! component at a time.
