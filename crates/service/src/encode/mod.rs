//! Encoding modules for vidpress

pub mod two_pass;

pub use two_pass::{
    pass1_command, pass2_command, EncodeError, EncodeObserver, EncodeOutcome, EncodeRequest,
    NullObserver, TwoPassEncoder, ANALYZE_WEIGHT, ENCODE_WEIGHT,
};
