//! RNS polynomial ring `Z_Q[X] / (X^N + 1)` with NTT-based multiplication.

pub mod basis;
pub mod errors;
pub mod ntt;
pub mod poly;

pub use basis::RnsBasis;
pub use errors::{RingError, RingResult};
pub use ntt::NttTable;
pub use poly::RnsPoly;
