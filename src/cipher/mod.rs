//! Reference cipher primitives with fault hooks.
//!
//! Both ciphers are plain table implementations. Besides ordinary encryption
//! they expose round keys, the tables the analyses invert, and an
//! `*_with_fault` entry point that perturbs the state at a chosen round.

pub mod aes;
pub mod des;

pub use aes::Aes128;
