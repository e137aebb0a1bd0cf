//! Bidirectional marshalling between typed and dynamic values.

pub mod decode;
pub mod encode;

pub use decode::decode;
pub use encode::encode;
