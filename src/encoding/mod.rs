mod ckks_encoder;

pub use ckks_encoder::CkksEncoder;
