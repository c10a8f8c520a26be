pub mod errors;
pub mod formats;
pub mod model;
pub mod paths;
mod registry;

pub use errors::FormatError;
pub use model::{FieldMask, RawDeviceRecord};
pub use registry::{all_formats, decode, find_format, DeviceFormat, FormatDescriptor};

#[cfg(test)]
mod tests;
