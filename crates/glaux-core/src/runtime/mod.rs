//! Runtime data: values, descriptors and the constant pool.

pub mod constpool;
pub mod function;
pub mod value;

pub use constpool::{ConstIndex, ConstPool};
pub use function::{FunctionDescriptor, StructLayout};
pub use value::Value;
