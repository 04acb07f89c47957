//! Audio file helpers for waveform datasets and vocoder output.

pub mod io;
