pub mod decoder;
pub mod extract;
pub mod gate;

pub use decoder::{
    CallbackDecoder, Claims, DecodeArgs, DecodeError, DecodeStrategy, LibraryDecoder,
    TokenDecoder,
};
pub use gate::{AuthGate, AuthGateBuilder, ConfigError, Decision, Rejection};
