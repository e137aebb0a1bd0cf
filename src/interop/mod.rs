//! Function and asynchronous interop with the dynamic host.

pub mod function;
pub mod promise;

pub use function::bind_function;
pub use promise::{all, all_settled, any, new_async, race, Promise};
