//! FIR filter design and application.
//!
//! - [`design`]: windowed-sinc lowpass/highpass design (Hamming for the MNE
//!   style highpass, Kaiser for the polyphase anti-alias filter).
//! - [`apply`]: zero-phase overlap-add convolution with reflect-limited edge
//!   padding.

pub mod apply;
pub mod design;

pub use apply::{apply_zero_phase, filter_zero_phase};
pub use design::{design_highpass, firwin, highpass_length, Window};
