//! Shared audio building blocks.
//!
//! - **PolyTables**: precomputed 4/5/9/17-bit polynomial sequences used by
//!   TIA- and POKEY-style noise generators
//! - **AudioChip trait**: common interface for pluggable audio chips

pub mod audio_chip;
pub mod polynomial;

pub use audio_chip::AudioChip;
pub use polynomial::PolyTables;
